use thiserror::Error;

/// Error for the reflection system.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum ReflectionError {
    #[error("type '{0}' is already registered")]
    DuplicateType(String),

    #[error("type '{0}' not found in the registry")]
    UnknownType(String),

    #[error("malformed stream at byte {offset}: {reason}")]
    MalformedStream { offset: usize, reason: String },

    #[error("index {index} out of range for pointer table of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid layout for member '{member}' of type '{type_name}': {reason}")]
    InvalidMemberLayout {
        type_name: String,
        member: String,
        reason: String,
    },

    #[error("invalid type descriptor '{0}': {1}")]
    InvalidTypeDescriptor(String, String),

    #[error("allocator for type '{0}' returned no instance")]
    AllocationFailure(String),

    #[error("invalid utf-8 in stream: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error when there's no better context.
    #[error("{0}")]
    Generic(String),
}
