use std::fmt;
use std::path::{Path, PathBuf};

use crate::generation::ProjectId;

/// Identifier of a queue item, unique for the lifetime of a queue
pub type ItemId = u64;

/// Lifecycle of one queue item
///
/// ```text
/// Pending --(process)--> Processing --(success)--> Done
/// Processing --(failure)--> Error
/// Error --(retry)--> Pending
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Done { output_path: PathBuf },
    Error { message: String },
}

impl ItemStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One document waiting for, undergoing or finished with generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: ItemId,

    /// Display name of the source document, unique within the queue
    pub name: String,

    pub source_path: PathBuf,

    pub status: ItemStatus,

    /// Assigned by the generation service once a project exists
    pub job_handle: Option<ProjectId>,
}

impl QueueItem {
    pub(crate) fn new(id: ItemId, name: String, source_path: PathBuf) -> Self {
        Self {
            id,
            name,
            source_path,
            status: ItemStatus::Pending,
            job_handle: None,
        }
    }

    /// Set only when the item is done
    pub fn output_path(&self) -> Option<&Path> {
        match &self.status {
            ItemStatus::Done { output_path } => Some(output_path),
            _ => None,
        }
    }

    /// Set only when the item failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ItemStatus::Error { message } => Some(message),
            _ => None,
        }
    }
}
