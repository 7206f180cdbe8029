use std::path::{Path, PathBuf};

pub type BackdropResult<T> = Result<T, BackdropError>;

#[derive(thiserror::Error, Debug)]
pub enum BackdropError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackdropError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_dependency(msg: impl Into<String>) -> Self {
        Self::MissingDependency(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Fatal errors end a batch; encode errors are per-file and recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            BackdropError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            BackdropError::missing_dependency("x")
                .to_string()
                .contains("missing dependency:")
        );
        assert!(
            BackdropError::encode("x")
                .to_string()
                .contains("encode error:")
        );
    }

    #[test]
    fn io_names_the_path() {
        let err = BackdropError::io(
            "assets/images",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("assets/images"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn only_encode_errors_are_recoverable() {
        assert!(!BackdropError::encode("bad pixels").is_fatal());
        assert!(BackdropError::missing_dependency("cwebp").is_fatal());
        assert!(BackdropError::validation("quality").is_fatal());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = BackdropError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
