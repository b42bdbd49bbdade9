use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the mod registry and its entries.
///
/// `ManifestMissing` and `ManifestInvalid` are recorded on the affected mod
/// and never abort a scan. The allocation and readiness variants mean a mod or
/// the caller used the API wrongly and the operation must stop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModError {
    #[error("no info file in {}", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("error parsing info file {}: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("{mod_title} tried to double-allocate internal ID {local_id}")]
    DuplicateAllocation { mod_title: String, local_id: u32 },

    #[error(
        "{mod_title} requested an ID outside of the auto-ID allocation limit ({local_id} limit {limit})"
    )]
    AllocationOutOfRange {
        mod_title: String,
        local_id: u32,
        limit: u32,
    },

    #[error("mod database not ready: locate the game first")]
    RegistryNotReady,

    #[error("cannot do that while a task is running")]
    TaskRunning,
}
