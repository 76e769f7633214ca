//! Maintenance task names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// A single vault housekeeping job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTask {
    /// Delete notes below the size threshold
    Empty,
    /// Report wikilinks pointing at missing notes
    Dangling,
    /// Delete attachments no note references
    Orphans,
    /// Bring the index in line with the files on disk
    Stale,
    /// Drop the index and embed the whole vault again
    Reindex,
}

impl MaintenanceTask {
    /// Tasks run when the caller does not name any.
    pub const DEFAULT: &'static [MaintenanceTask] = &[
        MaintenanceTask::Empty,
        MaintenanceTask::Dangling,
        MaintenanceTask::Orphans,
        MaintenanceTask::Stale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceTask::Empty => "empty",
            MaintenanceTask::Dangling => "dangling",
            MaintenanceTask::Orphans => "orphans",
            MaintenanceTask::Stale => "stale",
            MaintenanceTask::Reindex => "reindex",
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceTask {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(MaintenanceTask::Empty),
            "dangling" => Ok(MaintenanceTask::Dangling),
            "orphans" => Ok(MaintenanceTask::Orphans),
            "stale" => Ok(MaintenanceTask::Stale),
            "reindex" => Ok(MaintenanceTask::Reindex),
            other => Err(VaultError::InvalidInput(format!(
                "Unknown maintenance task: {}",
                other
            ))),
        }
    }
}
