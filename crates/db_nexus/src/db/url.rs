//! Connection URL parsing.
//!
//! Accepted forms:
//! - `sqlite://` or `sqlite:///:memory:`: private in-memory database.
//! - `sqlite:///relative/path.db`: path relative to the working directory.
//! - `sqlite:////absolute/path.db`: absolute path.

use crate::error::ConfigurationError;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

const SCHEME_SEPARATOR: &str = "://";
const MEMORY_PATH: &str = ":memory:";

/// Resolved storage location of one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Shared-cache in-memory database, unique per manager.
    Memory { name: String },
    File(PathBuf),
}

impl ConnectionTarget {
    pub fn parse(url: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = url.trim();
        let (scheme, rest) = trimmed
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| invalid("missing `://` separator"))?;

        if scheme.is_empty() {
            return Err(invalid("missing scheme"));
        }
        if !scheme.eq_ignore_ascii_case("sqlite") {
            return Err(ConfigurationError::UnsupportedBackend {
                scheme: scheme.to_string(),
            });
        }

        if rest.is_empty() {
            return Ok(Self::memory());
        }
        let path = rest
            .strip_prefix('/')
            .ok_or_else(|| invalid("sqlite urls take no host; use `sqlite:///path`"))?;

        if path.is_empty() {
            return Err(invalid("empty database path"));
        }
        if path == MEMORY_PATH {
            return Ok(Self::memory());
        }
        if path.contains('?') {
            return Err(invalid("query parameters are not supported; use SessionOptions"));
        }

        Ok(Self::File(PathBuf::from(path)))
    }

    fn memory() -> Self {
        Self::Memory {
            name: format!("db_nexus_{}", Uuid::new_v4().simple()),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory { .. })
    }

    /// Path or URI handed to SQLite when opening a connection.
    pub(crate) fn open_path(&self) -> String {
        match self {
            Self::Memory { name } => format!("file:{name}?mode=memory&cache=shared"),
            Self::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

impl Display for ConnectionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory { name } => write!(f, "memory:{name}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionTarget;
    use crate::error::ConfigurationError;
    use std::path::PathBuf;

    #[test]
    fn empty_path_and_memory_marker_select_memory() {
        assert!(ConnectionTarget::parse("sqlite://").unwrap().is_memory());
        assert!(ConnectionTarget::parse("sqlite:///:memory:")
            .unwrap()
            .is_memory());
    }

    #[test]
    fn each_memory_target_gets_a_unique_name() {
        let first = ConnectionTarget::parse("sqlite://").unwrap();
        let second = ConnectionTarget::parse("sqlite://").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn three_slashes_is_relative_and_four_is_absolute() {
        assert_eq!(
            ConnectionTarget::parse("sqlite:///data/app.db").unwrap(),
            ConnectionTarget::File(PathBuf::from("data/app.db"))
        );
        assert_eq!(
            ConnectionTarget::parse("sqlite:////var/lib/app.db").unwrap(),
            ConnectionTarget::File(PathBuf::from("/var/lib/app.db"))
        );
    }

    #[test]
    fn other_schemes_are_unsupported() {
        let err = ConnectionTarget::parse("postgresql://user@localhost/db").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnsupportedBackend { scheme } if scheme == "postgresql"
        ));
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for url in ["", "sqlite:", "://app.db", "sqlite://host/app.db", "sqlite:///"] {
            let err = ConnectionTarget::parse(url).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidUrl { .. }),
                "{url} should be invalid, got {err}"
            );
        }
    }
}
