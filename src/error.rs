#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("buffer overflow at offset {offset}: need {need} bytes, have {have}")]
    BufferOverflow { offset: usize, need: usize, have: usize },

    #[error("{field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("value {value} at offset {offset} is not below {limit}")]
    OutOfRange { offset: usize, value: u64, limit: u64 },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
