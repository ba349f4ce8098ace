//! Error types for the ShortCSS compiler

use thiserror::Error;

/// Stable prefix carried by every compiler error message.
pub const ERROR_PREFIX: &str = "shortcss error:";

/// File name used when an error is raised before its location is known.
pub const UNKNOWN_FILE: &str = "<unknown>";

/// Broad classification of a [`CompilerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unterminated blocks, mismatched braces/parentheses, duplicate names.
    Structural,
    /// Unknown names, disallowed variables, unresolved references.
    Semantic,
    /// Broken theme snapshot or configuration.
    Configuration,
    Io,
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("shortcss error: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shortcss error: Parse error in {file} at line {line}: {message}")]
    Parse { file: String, line: usize, message: String },

    #[error("shortcss error: Semantic error in {file} at line {line}: {message}")]
    Semantic { file: String, line: usize, message: String },

    #[error("shortcss error: Theme error: {message}")]
    Theme { message: String },

    #[error("shortcss error: File not found: {path}")]
    FileNotFound { path: String },

    #[error("shortcss error: Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn semantic(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Semantic {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn theme(message: impl Into<String>) -> Self {
        Self::Theme {
            message: message.into(),
        }
    }

    // Location is filled in later by the enclosing block via `located`
    pub fn parse_legacy(line: usize, message: impl Into<String>) -> Self {
        Self::parse(UNKNOWN_FILE, line, message)
    }

    pub fn semantic_legacy(line: usize, message: impl Into<String>) -> Self {
        Self::semantic(UNKNOWN_FILE, line, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Structural,
            Self::Semantic { .. } => ErrorKind::Semantic,
            Self::Theme { .. } | Self::InvalidFormat { .. } => ErrorKind::Configuration,
            Self::Io(_) | Self::FileNotFound { .. } => ErrorKind::Io,
        }
    }

    /// Attach a file and line to an error that was raised without one.
    ///
    /// Errors that already carry a location keep it; a line of 0 is replaced
    /// by `line`.
    pub fn located(self, file: &str, line: usize) -> Self {
        match self {
            Self::Parse { file: f, line: l, message } => Self::Parse {
                file: if f == UNKNOWN_FILE { file.to_string() } else { f },
                line: if l == 0 { line } else { l },
                message,
            },
            Self::Semantic { file: f, line: l, message } => Self::Semantic {
                file: if f == UNKNOWN_FILE { file.to_string() } else { f },
                line: if l == 0 { line } else { l },
                message,
            },
            other => other,
        }
    }

    /// The bare message without prefix or location.
    pub fn message(&self) -> String {
        match self {
            Self::Parse { message, .. }
            | Self::Semantic { message, .. }
            | Self::Theme { message }
            | Self::InvalidFormat { message } => message.clone(),
            Self::FileNotFound { path } => path.clone(),
            Self::Io(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_message_has_prefix() {
        let errors = vec![
            CompilerError::parse("a.scs", 3, "Unterminated block"),
            CompilerError::semantic("a.scs", 4, "Unknown abbreviation 'xyz'"),
            CompilerError::theme("collision"),
            CompilerError::FileNotFound { path: "x".to_string() },
            CompilerError::InvalidFormat { message: "bad".to_string() },
            CompilerError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
        ];

        for error in errors {
            assert!(error.to_string().starts_with(ERROR_PREFIX), "{}", error);
        }
    }

    #[test]
    fn test_located_fills_only_missing_parts() {
        let error = CompilerError::semantic_legacy(0, "boom").located("main.scs", 12);
        assert_eq!(
            error.to_string(),
            "shortcss error: Semantic error in main.scs at line 12: boom"
        );

        let error = CompilerError::parse("other.scs", 2, "boom").located("main.scs", 12);
        assert!(error.to_string().contains("other.scs at line 2"));
    }

    #[test]
    fn test_kind() {
        assert_eq!(CompilerError::parse_legacy(1, "x").kind(), ErrorKind::Structural);
        assert_eq!(CompilerError::semantic_legacy(1, "x").kind(), ErrorKind::Semantic);
        assert_eq!(CompilerError::theme("x").kind(), ErrorKind::Configuration);
    }
}
