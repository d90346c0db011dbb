use serde::{Deserialize, Serialize};

/// Observable state of the catalog sync pipeline.
///
/// Within one session the status only moves forward:
/// `Queued -> Starting -> InProgress* -> Success | Error | Cancelled`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Queued,
    Starting {
        message: String,
    },
    InProgress {
        synced: u32,
        message: String,
    },
    Success {
        total_exercises: u32,
        message: String,
    },
    Error {
        message: String,
    },
    Cancelled,
}

impl SyncStatus {
    pub fn starting() -> Self {
        SyncStatus::Starting {
            message: "Starting exercise sync...".to_string(),
        }
    }

    pub fn in_progress(synced: u32) -> Self {
        SyncStatus::InProgress {
            synced,
            message: format!("Synced {synced} exercises..."),
        }
    }

    pub fn success(total_exercises: u32) -> Self {
        SyncStatus::Success {
            total_exercises,
            message: format!("Successfully synced {total_exercises} exercises"),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SyncStatus::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Success { .. } | SyncStatus::Error { .. } | SyncStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncStatus::Queued | SyncStatus::Starting { .. } | SyncStatus::InProgress { .. }
        )
    }

    /// Ordinal position within a session.
    pub fn phase(&self) -> u8 {
        match self {
            SyncStatus::Idle => 0,
            SyncStatus::Queued => 1,
            SyncStatus::Starting { .. } => 2,
            SyncStatus::InProgress { .. } => 3,
            SyncStatus::Success { .. } | SyncStatus::Error { .. } | SyncStatus::Cancelled => 4,
        }
    }

    /// Whether `next` is a legal successor of `self` inside the same session.
    pub fn advances_to(&self, next: &SyncStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (SyncStatus::InProgress { synced: a, .. }, SyncStatus::InProgress { synced: b, .. }) => {
                b >= a
            }
            _ => next.phase() > self.phase(),
        }
    }

    pub fn synced(&self) -> Option<u32> {
        match self {
            SyncStatus::InProgress { synced, .. } => Some(*synced),
            SyncStatus::Success {
                total_exercises, ..
            } => Some(*total_exercises),
            _ => None,
        }
    }
}
