//! The client-side lifecycle of a deploy or undeploy: conflict resolution, upload, process start,
//! monitoring and action reattachment.
use std::time::Duration;

use tracing::warn;

pub mod action;
pub mod archive;
pub mod conflict;
pub mod monitor;
pub mod process;
pub mod query;
pub mod retry;
pub mod upload;

pub use action::ActionRunner;
pub use conflict::ConflictResolver;
pub use monitor::{ExecutionMonitor, MonitorOutcome};
pub use process::{ProcessBuilder, operation_id_from_location, start_process};
pub use query::OperationQuery;
pub use retry::RetryPolicy;
pub use upload::FileUploader;

pub const CHUNK_SIZE_ENV: &str = "MULTIAPPS_UPLOAD_CHUNK_SIZE_IN_MB";
const DEFAULT_CHUNK_SIZE_IN_MB: u64 = 45;
const MB: u64 = 1024 * 1024;

/// Tunables shared by the lifecycle components.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    /// Size of the parts large files are split into, in bytes.
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    /// Wait between two polls of a running operation.
    pub poll_interval: Duration,
    /// Polls to wait for an aborted operation to leave its active state.
    pub abort_wait_polls: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE_IN_MB * MB,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(3),
            abort_wait_polls: 20,
        }
    }
}

impl LifecycleSettings {
    pub fn from_env() -> Self {
        Self {
            chunk_size: chunk_size_from(std::env::var(CHUNK_SIZE_ENV).ok().as_deref()),
            ..Default::default()
        }
    }

    /// No waiting at all, for tests.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE_IN_MB * MB,
            retry: RetryPolicy::immediate(3),
            poll_interval: Duration::ZERO,
            abort_wait_polls: 5,
        }
    }
}

fn chunk_size_from(value: Option<&str>) -> u64 {
    let Some(value) = value else {
        return DEFAULT_CHUNK_SIZE_IN_MB * MB;
    };

    match value.trim().parse::<u64>() {
        Ok(megabytes) if megabytes > 0 => megabytes * MB,
        _ => {
            warn!(value, "invalid {CHUNK_SIZE_ENV}, using the default chunk size");
            DEFAULT_CHUNK_SIZE_IN_MB * MB
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_from_env_value() {
        assert_eq!(chunk_size_from(None), 45 * MB);
        assert_eq!(chunk_size_from(Some("10")), 10 * MB);
        assert_eq!(chunk_size_from(Some("0")), 45 * MB);
        assert_eq!(chunk_size_from(Some("lots")), 45 * MB);
    }
}
