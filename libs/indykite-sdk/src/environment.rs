//! Read-only access to environment variables and files
//!
//! Credential resolution never touches process state directly; it goes through
//! an [`Environment`] so tests can supply a deterministic one.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Read-only key-value and byte-read capability
pub trait Environment: Send + Sync {
    /// Value of an environment variable, `None` when unset
    fn var(&self, key: &str) -> Option<String>;

    /// Full contents of a file
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The real process environment and filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory environment, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
    files: HashMap<PathBuf, Vec<u8>>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_environment_lookup() {
        let env = StaticEnvironment::new()
            .with_var("KEY", "value")
            .with_file("/creds.json", b"{}".to_vec());

        assert_eq!(env.var("KEY").as_deref(), Some("value"));
        assert!(env.var("OTHER").is_none());
        assert_eq!(env.read_file(Path::new("/creds.json")).unwrap(), b"{}");
    }

    #[test]
    fn test_static_environment_missing_file() {
        let env = StaticEnvironment::new();
        let err = env.read_file(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
