//! Progress reporting hooks injected into the composition engine, the job
//! runner and the batch queue.

use tracing::info;

use crate::generation::ProjectId;

/// Receives human-readable stage messages from a single job or composition
pub trait ProgressObserver: Send + Sync {
    fn on_message(&self, message: &str);

    /// Called once the generation service has assigned a project id
    fn on_project_created(&self, project_id: &ProjectId) {
        let _ = project_id;
    }
}

impl<F> ProgressObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_message(&self, message: &str) {
        self(message)
    }
}

/// Discards all progress
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_message(&self, _message: &str) {}
}

/// Forwards progress into the tracing log
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_message(&self, message: &str) {
        info!("⏳ {}", message);
    }

    fn on_project_created(&self, project_id: &ProjectId) {
        info!("📚 Project: {}", project_id);
    }
}
