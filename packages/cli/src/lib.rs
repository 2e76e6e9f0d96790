//! # strata-cli
//!
//! Command-line access to layered settings files.
//!
//! ## Usage
//!
//! ```bash
//! # Explicit layers, most specific first
//! strata --file ~/.config/acme/rocket.ini --file /etc/xdg/acme/rocket.ini get window/width
//!
//! # Conventional locations for an organization and application
//! strata --org acme --app rocket set window/width 800
//! strata --org acme --app rocket --format json dump --json
//! ```
//!
//! Exit codes: 0 on success, 1 when `get` finds nothing, 2 when a file
//! could not be read, parsed or written.

pub mod cli;
pub mod commands;
mod error;
pub mod paths;

use std::io::Write;
use std::path::PathBuf;

use strata_core_store::Status;
use strata_json_store::JsonCodec;
use strata_store::SettingsContext;

pub use cli::{Args, Command, ValueType};
pub use error::CliError;
pub use paths::{platform_layers, Scope};

/// Layers named on the command line; explicit files win over `--org/--app`.
pub fn resolve_layers(args: &Args) -> Result<Vec<PathBuf>, CliError> {
    if !args.files.is_empty() {
        return Ok(args.files.clone());
    }
    match (&args.org, &args.app) {
        (Some(org), Some(app)) => Ok(platform_layers(org, app, args.scope(), &args.format)),
        _ => Err(CliError::NoLayers),
    }
}

/// Run one command and return the process exit code.
pub fn run(args: &Args, out: &mut impl Write) -> Result<i32, CliError> {
    let layers = resolve_layers(args)?;

    let ctx = SettingsContext::new();
    ctx.registry().register("json", JsonCodec);

    let mut settings = ctx.open(&layers)?;
    settings.set_fallbacks_enabled(!args.no_fallback);
    settings.set_atomic_sync_required(!args.in_place);

    let outcome = commands::execute(&mut settings, &args.command, out)?;
    if args.command.mutates() {
        if let Err(e) = settings.sync() {
            eprintln!("Error: {}", e);
        }
    }

    match settings.status() {
        Status::NoError => Ok(outcome.exit_code()),
        status => {
            log::warn!("finished with status {}", status);
            Ok(2)
        }
    }
}
