pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while decoding an image, translating it,
/// or running the resulting program.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bytes do not start with the PNG signature.
    #[error("not a PNG file: wrong signature")]
    Format,

    /// A PNG, but one using a profile this decoder does not handle.
    #[error("unsupported PNG: {0}")]
    UnsupportedFormat(String),

    /// A PNG signature followed by structurally broken contents.
    #[error("corrupt PNG: {0}")]
    CorruptImage(String),

    /// A `[` or `]` with no partner, at byte `position` of the code.
    #[error("malformed program: unmatched bracket at position {position}")]
    MalformedProgram { position: usize },

    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(usize),

    /// Snake rendering needs a turn column on each side plus one for code.
    #[error("image width {0} is too small, need at least 3")]
    InvalidWidth(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptImage(msg.into())
    }
}
