//! Client configuration for the query pipeline.

use std::path::PathBuf;
use std::time::Duration;

use specter_core::scope::DEFAULT_LIMIT_HINT;
use specter_core::{QueryScope, DEFAULT_PROFILE_PATH};

/// Settings shared by every pipeline invocation.
///
/// Controls where the sharing profile is read from, which dataset is queried,
/// and how long each network-bound stage may block.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the sharing profile (JSON credential record).
    pub profile_path: PathBuf,
    /// Dataset the exchange is scoped to.
    pub scope: QueryScope,
    /// Advisory row count sent with each exchange.
    pub limit_hint: u64,
    /// Timeouts for the vending exchange and the query.
    pub timeouts: TimeoutConfig,
    /// Largest signed object the executor will load into memory.
    pub max_object_bytes: u64,
}

/// Default cap on a fetched data object (1 GiB).
pub const DEFAULT_MAX_OBJECT_BYTES: u64 = 1 << 30;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
            scope: QueryScope::default(),
            limit_hint: DEFAULT_LIMIT_HINT,
            timeouts: TimeoutConfig::default(),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }
}

/// Per-stage timeouts. `None` means the stage may block indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// TCP/TLS connect timeout for every HTTP request.
    pub connect: Option<Duration>,
    /// Whole-request timeout for the vending exchange and the object fetch.
    pub request: Option<Duration>,
    /// Upper bound on fetching, planning, and executing one query.
    pub query: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(10)),
            request: Some(Duration::from_secs(60)),
            query: None,
        }
    }
}

impl TimeoutConfig {
    /// Maps a seconds value from the command line; `0` disables the timeout.
    #[must_use]
    pub fn from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}
