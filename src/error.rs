use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing context keys for {filter}: {keys}")]
    MissingContextKeys { filter: String, keys: String },

    #[error("Invalid pipeline definition: {0}")]
    Definition(String),

    #[error("Invalid only/except policy: {0}")]
    Policy(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pipeline not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeedError>;
