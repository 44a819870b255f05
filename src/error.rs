//! # Error Handling
//!
//! Error taxonomy for the tiling pipeline, with rich context and classification helpers.
//!
//! ## Taxonomy
//!
//! - `Config`: invalid configuration. Raised before any image I/O; fatal.
//! - `ImageRead`: missing or undecodable source. Fatal for a single image, isolated in
//!   directory mode (the file is skipped and the error recorded).
//! - `InvalidPatch`: zero-area window reached the scorer. Indicates a planning defect; fatal.
//! - `OutOfBounds`: crop rectangle leaves the image. Defensive; fatal.
//! - `Io` / `Encode`: output directory or patch write failures; isolated per file in batches.
//! - `External`: wrapped third-party failure (resizer buffers, manifest serialization).
//!
//! Nothing in this crate is retried: the core has no transient failure surface.
//!
//! ## Usage
//!
//! ```rust
//! use salient_tiles::error::{TileError, HasRecoverySuggestion};
//!
//! let error = TileError::config("output_size", "0", "must be greater than 0")
//!     .with_recovery_suggestion("Pass a positive --output-size");
//!
//! assert_eq!(error.category(), "config");
//! assert_eq!(error.recovery_suggestion(), Some("Pass a positive --output-size"));
//! ```

use std::{error::Error as StdError, fmt, path::Path, time::SystemTime};

use tile_scale::{Rect, ScaleError};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Debug,
    Info,
    /// Problems that were isolated and did not stop the run
    Warning,
    Error,
    /// Errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    pub severity: ErrorSeverity,
    /// Whether a batch may skip past this error
    pub recoverable: bool,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            recoverable: false,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }
}

/// Base error type for the tiling pipeline
#[derive(Debug)]
pub enum TileError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Source image missing or undecodable
    ImageRead {
        path: String,
        reason: String,
        context: ErrorContext,
    },
    /// Zero-area patch handed to the saliency scorer
    InvalidPatch {
        width: u32,
        height: u32,
        context: ErrorContext,
    },
    /// Crop rectangle exceeds the image
    OutOfBounds {
        rect: Rect,
        image_width: u32,
        image_height: u32,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Patch encoding failures
    Encode {
        path: String,
        source: image::ImageError,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl TileError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an image read error. Recoverable: a batch skips the file.
    pub fn image_read(path: &Path, reason: impl Into<String>) -> Self {
        Self::ImageRead {
            path: path.display().to_string(),
            reason: reason.into(),
            context: ErrorContext::new().recoverable(),
        }
    }

    pub fn invalid_patch(width: u32, height: u32) -> Self {
        Self::InvalidPatch {
            width,
            height,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    pub fn out_of_bounds(rect: Rect, image_width: u32, image_height: u32) -> Self {
        Self::OutOfBounds {
            rect,
            image_width,
            image_height,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: Option<&Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.map(|p| p.display().to_string()),
            source,
            context: ErrorContext::new().recoverable(),
        }
    }

    pub fn encode(path: &Path, source: image::ImageError) -> Self {
        Self::Encode {
            path: path.display().to_string(),
            source,
            context: ErrorContext::new().recoverable(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::ImageRead { context, .. } => context,
            Self::InvalidPatch { context, .. } => context,
            Self::OutOfBounds { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::ImageRead { context, .. } => context,
            Self::InvalidPatch { context, .. } => context,
            Self::OutOfBounds { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::ImageRead { .. } => "image_read",
            Self::InvalidPatch { .. } => "invalid_patch",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::Io { .. } => "io",
            Self::Encode { .. } => "encode",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            TileError::ImageRead { path, reason, .. } => {
                write!(f, "Failed to read image '{}': {}", path, reason)
            }
            TileError::InvalidPatch { width, height, .. } => {
                write!(f, "Invalid patch: zero area ({}x{})", width, height)
            }
            TileError::OutOfBounds {
                rect,
                image_width,
                image_height,
                ..
            } => write!(
                f,
                "Crop {}x{} at ({}, {}) exceeds image bounds {}x{}",
                rect.w, rect.h, rect.x, rect.y, image_width, image_height
            ),
            TileError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            TileError::Encode { path, source, .. } => {
                write!(f, "Failed to encode patch '{}': {}", path, source)
            }
            TileError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }?;

        if let Some(context) = &self.context().context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl StdError for TileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type TileResult<T> = Result<T, TileError>;

/// Trait for errors a batch run may skip past
pub trait Recoverable {
    fn is_recoverable(&self) -> bool;
}

impl Recoverable for TileError {
    fn is_recoverable(&self) -> bool {
        self.context().recoverable
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for TileError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for TileError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error is fatal to the whole invocation
    pub fn is_fatal(error: &TileError) -> bool {
        matches!(
            error,
            TileError::Config { .. } | TileError::InvalidPatch { .. } | TileError::OutOfBounds { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Check if directory mode records this error and moves on to the next file
    pub fn isolates_in_batch(error: &TileError) -> bool {
        !is_fatal(error) && error.is_recoverable()
    }
}

impl From<ScaleError> for TileError {
    fn from(error: ScaleError) -> Self {
        match error {
            ScaleError::InvalidPatch { width, height } => Self::invalid_patch(width, height),
            ScaleError::OutOfBounds { rect, width, height } => {
                Self::out_of_bounds(rect, width, height)
            }
            other => Self::external("tile_scale", other),
        }
    }
}

impl From<serde_json::Error> for TileError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = TileError::config("window_sizes", "[]", "must not be empty");
        assert_eq!(error.category(), "config");
        assert!(classify::is_fatal(&error));
        assert!(!classify::isolates_in_batch(&error));
    }

    #[test]
    fn test_image_read_is_isolated() {
        let error = TileError::image_read(Path::new("broken.png"), "unexpected EOF");
        assert_eq!(error.category(), "image_read");
        assert!(!classify::is_fatal(&error));
        assert!(classify::isolates_in_batch(&error));
        assert_eq!(
            error.to_string(),
            "Failed to read image 'broken.png': unexpected EOF"
        );
    }

    #[test]
    fn test_error_with_context() {
        let error = TileError::io(
            "create output directory",
            Some(Path::new("/nope")),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        )
        .with_context("persisting patches")
        .with_recovery_suggestion("check directory permissions")
        .with_metadata("source", "a.jpg");

        assert_eq!(error.category(), "io");
        assert_eq!(error.recovery_suggestion(), Some("check directory permissions"));
        assert_eq!(error.context().metadata.get("source").map(String::as_str), Some("a.jpg"));
        assert!(error.to_string().ends_with("(persisting patches)"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_scale_error_conversion() {
        let e: TileError = ScaleError::InvalidPatch { width: 0, height: 3 }.into();
        assert_eq!(e.category(), "invalid_patch");
        assert!(classify::is_fatal(&e));

        let e: TileError = ScaleError::OutOfBounds {
            rect: Rect::square(10, 10, 20),
            width: 15,
            height: 15,
        }
        .into();
        assert_eq!(e.category(), "out_of_bounds");

        let e: TileError = ScaleError::BadBuffer { expected: 3, actual: 2 }.into();
        assert_eq!(e.category(), "external");
    }
}
