use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoGateError {
    #[error("Reference table error: {0}")]
    ReferenceTable(String),

    #[error("No requested drug has a safety profile: {0:?}")]
    NoEligibleDrugs(Vec<String>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, IoGateError>;
