use thiserror::Error;

/// Standard error type for the Etude framework.
///
/// Handlers return it through [`HandlerResult`](crate::handler::HandlerResult).
/// The dispatcher does not distinguish variants: whatever reaches it is
/// answered with `500 Internal Server Error` and the error message as body.
#[derive(Debug, Error)]
pub enum EtudeError {
    #[error("{0}")]
    Message(String),

    #[error("failed to decode JSON body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to decode form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),

    #[error("failed to encode JSON response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("response already written")]
    AlreadyWritten,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("no template engine configured")]
    NoTemplateEngine,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtudeError {
    /// Create a free-form error, typically returned from a handler.
    pub fn msg(message: impl Into<String>) -> Self {
        EtudeError::Message(message.into())
    }
}

pub type EtudeResult<T> = Result<T, EtudeError>;
