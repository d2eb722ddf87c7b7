//! Accessor configuration
//!
//! Where the store lives and how long engine calls may take.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default timeout for a single engine call (30 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time SQLite waits on a locked database file (5 seconds)
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Marker string for an in-memory store
pub const MEMORY_MARKER: &str = ":memory:";

/// Target location of a store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    /// Private in-memory store, discarded on close
    #[default]
    Memory,
    /// Database file, created on first open if missing
    File(PathBuf),
}

impl Location {
    /// File-backed location
    pub fn file(path: impl AsRef<Path>) -> Self {
        Location::File(path.as_ref().to_path_buf())
    }

    /// Whether the store is in memory
    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Memory => write!(f, "{}", MEMORY_MARKER),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for Location {
    type Err = std::convert::Infallible;

    /// `":memory:"` or an empty string selects memory; anything else is a path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == MEMORY_MARKER {
            Ok(Location::Memory)
        } else {
            Ok(Location::File(PathBuf::from(s)))
        }
    }
}

/// Configuration for a [`TableAccessor`](crate::core::TableAccessor)
#[derive(Debug, Clone)]
pub struct AccessorConfig {
    /// Where the store lives
    pub location: Location,
    /// Deadline for each engine call (open, execute, query, ping)
    pub operation_timeout: Duration,
    /// How long the engine waits on a locked file before failing
    pub busy_timeout: Duration,
    /// Enforce foreign-key constraints
    pub foreign_keys: bool,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            location: Location::Memory,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
        }
    }
}

impl AccessorConfig {
    /// Create a configuration for `location` with default timeouts
    pub fn new(location: Location) -> Self {
        Self {
            location,
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory store
    pub fn memory() -> Self {
        Self::new(Location::Memory)
    }

    /// Configuration for a database file
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(Location::file(path))
    }

    /// Set the per-call deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the locked-file wait
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Toggle foreign-key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}
