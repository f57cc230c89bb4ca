/// Errors from the auth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("verification code must be exactly six digits")]
    InvalidCode,
    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("auth rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("auth response could not be decoded: {0}")]
    Decode(String),
}
