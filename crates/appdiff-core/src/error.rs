use std::path::PathBuf;

/// Errors that can abort an appdiff run.
///
/// Per-application diff tool failures are not represented here: they are
/// recorded as [`DiffFailure`](crate::DiffFailure) data and reported, never
/// propagated. Library crates use this type directly; the binary crate
/// converts to `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use appdiff_core::AppDiffError;
///
/// let err = AppDiffError::Upstream("argocd returned 503".into());
/// assert!(err.to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AppDiffError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A call to the deployment server or the code-hosting platform failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The deployment server answered with a body that is not the expected JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The external diff tool could not be located or installed.
    #[error("diff tool error: {0}")]
    ToolInvocation(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppDiffError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = AppDiffError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn malformed_response_displays_message() {
        let err = AppDiffError::MalformedResponse("expected value".into());
        assert_eq!(err.to_string(), "malformed response: expected value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = AppDiffError::FileNotFound(PathBuf::from("/tmp/event.json"));
        assert!(err.to_string().contains("/tmp/event.json"));
    }
}
