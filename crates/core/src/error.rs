use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid media object {object_id}: {reason}")]
    InvalidMediaObject { object_id: String, reason: String },

    #[error("Invalid task content: {0}")]
    InvalidContent(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
