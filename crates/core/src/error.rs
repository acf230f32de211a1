use std::fmt;

/// Where in the source document a parse failure occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
}

impl SourceLocation {
    #[must_use]
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

#[derive(Debug)]
pub enum MalformedDocument {
    DuplicateKey {
        key: String,
        location: SourceLocation,
    },
    BadIndentation {
        location: SourceLocation,
    },
    UnexpectedEnd,
}

impl fmt::Display for MalformedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key, location } => {
                write!(
                    f,
                    "duplicate key `{key}` within the same scope at line {}",
                    location.line
                )
            }
            Self::BadIndentation { location } => {
                write!(f, "indentation collapsed mid-block at line {}", location.line)
            }
            Self::UnexpectedEnd => write!(f, "document ended inside an open block"),
        }
    }
}

impl std::error::Error for MalformedDocument {}

#[derive(Debug)]
pub enum Error {
    Malformed(MalformedDocument),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(error) => write!(f, "malformed document: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(error) => Some(error),
        }
    }
}

impl From<MalformedDocument> for Error {
    fn from(value: MalformedDocument) -> Self {
        Self::Malformed(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
