use std::fmt;
use std::path::PathBuf;

pub type AppResult<T> = Result<T, AppError>;

/// Why a document could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenErrorKind {
    NotFound,
    Locked,
    Corrupt,
}

impl fmt::Display for OpenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::Locked => "locked",
            Self::Corrupt => "corrupt",
        };
        f.write_str(label)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("cannot open {}: document is {kind}", path.display())]
    Open { path: PathBuf, kind: OpenErrorKind },
    #[error("rasterization failed for page {page}: {message}")]
    Rasterize { page: usize, message: String },
    #[error("search failed for page {page}: {message}")]
    Search { page: usize, message: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for AppError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl AppError {
    pub fn io_with_context(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn open(path: impl Into<PathBuf>, kind: OpenErrorKind) -> Self {
        Self::Open {
            path: path.into(),
            kind,
        }
    }

    pub fn rasterize(page: usize, message: impl Into<String>) -> Self {
        Self::Rasterize {
            page,
            message: message.into(),
        }
    }

    pub fn search(page: usize, message: impl Into<String>) -> Self {
        Self::Search {
            page,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn open_kind(&self) -> Option<OpenErrorKind> {
        match self {
            Self::Open { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
