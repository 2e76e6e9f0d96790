#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Settings error: {0}")]
    Store(#[from] strata_store::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read '{value}' as {kind}")]
    InvalidValue { value: String, kind: &'static str },

    #[error("No settings files: pass --file or both --org and --app")]
    NoLayers,
}
