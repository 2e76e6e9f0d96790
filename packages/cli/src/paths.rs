//! Conventional settings file locations.

use std::path::{Path, PathBuf};

/// Which locations an application's settings are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The user's own files, falling back to system-wide ones.
    User,
    /// System-wide files only.
    System,
}

/// Layers for `organization`/`application`, most specific first.
///
/// User scope lists `<config_dir>/<org>/<app>.<ext>` and
/// `<config_dir>/<org>.<ext>`, then the system layers. System layers live
/// under `/etc/xdg` and only exist on Unix.
pub fn platform_layers(
    organization: &str,
    application: &str,
    scope: Scope,
    extension: &str,
) -> Vec<PathBuf> {
    let user_dir = match scope {
        Scope::User => dirs::config_dir(),
        Scope::System => None,
    };
    layers_under(
        user_dir.as_deref(),
        system_config_dir().as_deref(),
        organization,
        application,
        extension,
    )
}

fn system_config_dir() -> Option<PathBuf> {
    if cfg!(unix) {
        Some(PathBuf::from("/etc/xdg"))
    } else {
        None
    }
}

/// Layers below explicit user and system directories.
///
/// An empty `application` yields only the organization-wide file for
/// each directory.
pub fn layers_under(
    user_dir: Option<&Path>,
    system_dir: Option<&Path>,
    organization: &str,
    application: &str,
    extension: &str,
) -> Vec<PathBuf> {
    let extension = extension.trim_start_matches('.');
    let mut layers = Vec::new();
    for base in [user_dir, system_dir].into_iter().flatten() {
        if !application.is_empty() {
            layers.push(
                base.join(organization)
                    .join(format!("{}.{}", application, extension)),
            );
        }
        layers.push(base.join(format!("{}.{}", organization, extension)));
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_then_system() {
        let layers = layers_under(
            Some(Path::new("/home/u/.config")),
            Some(Path::new("/etc/xdg")),
            "Acme",
            "Rocket",
            "ini",
        );
        assert_eq!(
            layers,
            vec![
                PathBuf::from("/home/u/.config/Acme/Rocket.ini"),
                PathBuf::from("/home/u/.config/Acme.ini"),
                PathBuf::from("/etc/xdg/Acme/Rocket.ini"),
                PathBuf::from("/etc/xdg/Acme.ini"),
            ]
        );
    }

    #[test]
    fn organization_only() {
        let layers = layers_under(None, Some(Path::new("/etc/xdg")), "Acme", "", ".json");
        assert_eq!(layers, vec![PathBuf::from("/etc/xdg/Acme.json")]);
    }

    #[test]
    #[cfg(unix)]
    fn system_scope_skips_user_dir() {
        assert_eq!(
            platform_layers("Acme", "Rocket", Scope::System, "ini"),
            vec![
                PathBuf::from("/etc/xdg/Acme/Rocket.ini"),
                PathBuf::from("/etc/xdg/Acme.ini"),
            ]
        );
    }
}
