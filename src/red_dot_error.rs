/// Error type for the red-dot engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedDotError {
    /// The tag is empty, has an empty segment or contains whitespace
    InvalidTag { tag: String, reason: &'static str },
}

impl std::fmt::Display for RedDotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedDotError::InvalidTag { tag, reason } => {
                write!(f, "Invalid red dot tag \"{}\": {}", tag, reason)
            }
        }
    }
}

impl std::error::Error for RedDotError {}

pub type RedDotResult<T> = Result<T, RedDotError>;
