use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    config::BatchConfig,
    error::QueueError,
    generation::{display_title, runner::file_stem_slug, JobRequest, JobRunner, ProjectId},
    progress::ProgressObserver,
    queue::item::{ItemId, ItemStatus, QueueItem},
};

/// Progress notifications emitted during a sweep
#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    Started {
        total: usize,
    },
    ItemStarted {
        id: ItemId,
        name: String,
        position: usize,
        total: usize,
    },
    ItemProgress {
        id: ItemId,
        name: String,
        message: String,
    },
    ItemFinished {
        id: ItemId,
        name: String,
        status: ItemStatus,
        completed: usize,
        total: usize,
    },
    Finished {
        summary: SweepSummary,
    },
}

/// Receives sweep progress
pub trait SweepObserver: Send + Sync {
    fn on_event(&self, event: &SweepEvent);
}

impl<F> SweepObserver for F
where
    F: Fn(&SweepEvent) + Send + Sync,
{
    fn on_event(&self, event: &SweepEvent) {
        self(event)
    }
}

/// Outcome counts of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Pending items captured when the sweep started
    pub captured: usize,
    pub done: usize,
    pub failed: usize,
    /// Captured items left untouched (cancelled, retried away or removed)
    pub skipped: usize,
}

/// Item counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

/// Ordered collection of generation jobs
///
/// Items are owned by the queue; only the sweep task that claimed an item
/// (Pending → Processing) writes its result, and every status change happens
/// under the write lock.
pub struct BatchQueue {
    items: RwLock<Vec<QueueItem>>,
    next_id: AtomicU64,
    output_root: PathBuf,
    concurrency: usize,
    sweeping: AtomicBool,
    cancel_requested: AtomicBool,
}

/// Holds the sweep flag; released on return, on drop of the sweep future and on panic
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::SeqCst)).then_some(Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Routes one job's progress into sweep events and remembers its project id
struct ItemObserver<'a> {
    id: ItemId,
    name: &'a str,
    observer: &'a dyn SweepObserver,
    project: OnceLock<ProjectId>,
}

impl ProgressObserver for ItemObserver<'_> {
    fn on_message(&self, message: &str) {
        self.observer.on_event(&SweepEvent::ItemProgress {
            id: self.id,
            name: self.name.to_string(),
            message: message.to_string(),
        });
    }

    fn on_project_created(&self, project_id: &ProjectId) {
        let _ = self.project.set(project_id.clone());
    }
}

impl BatchQueue {
    /// Create an empty queue writing per-item output under `output_root`
    pub fn new<P: Into<PathBuf>>(output_root: P) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            output_root: output_root.into(),
            concurrency: 1,
            sweeping: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Process up to `n` items at once (minimum 1)
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Append a document; names must be unique
    pub async fn add<S: Into<String>, P: Into<PathBuf>>(
        &self,
        name: S,
        source_path: P,
    ) -> Result<ItemId, QueueError> {
        let name = name.into();
        let mut items = self.items.write().await;
        if items.iter().any(|item| item.name == name) {
            warn!("'{}' is already queued, ignoring", name);
            return Err(QueueError::Duplicate { name });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!("Queued #{} '{}'", id, name);
        items.push(QueueItem::new(id, name, source_path.into()));
        Ok(id)
    }

    /// Append a document named after its file name
    pub async fn add_document<P: AsRef<Path>>(&self, path: P) -> Result<ItemId, QueueError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add(name, path).await
    }

    /// Snapshot of all items in queue order
    pub async fn items(&self) -> Vec<QueueItem> {
        self.items.read().await.clone()
    }

    pub async fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.items.read().await.iter().find(|item| item.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn counts(&self) -> QueueCounts {
        let items = self.items.read().await;
        let mut counts = QueueCounts::default();
        for item in items.iter() {
            match item.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Done { .. } => counts.done += 1,
                ItemStatus::Error { .. } => counts.error += 1,
            }
        }
        counts
    }

    /// Error → Pending. Returns false (and changes nothing) for any other status.
    pub async fn retry(&self, id: ItemId) -> bool {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.status.is_error() => {
                item.status = ItemStatus::Pending;
                item.job_handle = None;
                info!("🔁 '{}' queued for retry", item.name);
                true
            }
            _ => false,
        }
    }

    /// Remove a Pending, Done or Error item
    pub async fn remove(&self, id: ItemId) -> Result<QueueItem, QueueError> {
        let mut items = self.items.write().await;
        let index = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::NotFound { id })?;
        if items[index].status.is_processing() {
            return Err(QueueError::Busy { id });
        }
        Ok(items.remove(index))
    }

    /// Return an item stranded in Processing by an interrupted sweep to Pending
    ///
    /// Refused while a sweep is running.
    pub async fn reset_interrupted(&self, id: ItemId) -> bool {
        if self.is_sweeping() {
            return false;
        }
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.status.is_processing() => {
                item.status = ItemStatus::Pending;
                item.job_handle = None;
                true
            }
            _ => false,
        }
    }

    /// Drop every Done item, returning how many were removed
    pub async fn clear_done(&self) -> usize {
        self.remove_where(|item| item.status.is_done()).await
    }

    /// Drop every item that is not currently being processed
    pub async fn clear_all(&self) -> usize {
        self.remove_where(|item| !item.status.is_processing()).await
    }

    async fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&QueueItem) -> bool,
    {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| !predicate(item));
        before - items.len()
    }

    /// Stop the running sweep before its next item; items not yet started stay Pending
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::SeqCst)
    }

    /// Process every item that is Pending right now
    ///
    /// Items added after the sweep starts wait for the next sweep. A failing
    /// item is recorded as Error and the sweep moves on.
    pub async fn process_all(
        &self,
        runner: &JobRunner,
        config: &BatchConfig,
        observer: &dyn SweepObserver,
    ) -> SweepSummary {
        let Some(_guard) = SweepGuard::acquire(&self.sweeping) else {
            warn!("A sweep is already running, ignoring");
            return SweepSummary::default();
        };
        self.cancel_requested.store(false, Ordering::SeqCst);

        let captured: Vec<ItemId> = self
            .items
            .read()
            .await
            .iter()
            .filter(|item| item.status.is_pending())
            .map(|item| item.id)
            .collect();
        let total = captured.len();

        info!("🚀 Processing {} pending item(s), {} at a time", total, self.concurrency);
        observer.on_event(&SweepEvent::Started { total });

        let done = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let (done, failed, skipped, completed) = (&done, &failed, &skipped, &completed);

        stream::iter(captured.into_iter().enumerate())
            .for_each_concurrent(self.concurrency, |(index, id)| async move {
                if self.cancel_requested.load(Ordering::SeqCst) {
                    skipped.fetch_add(1, Ordering::SeqCst);
                    return;
                }

                let Some((name, source)) = self.claim(id).await else {
                    skipped.fetch_add(1, Ordering::SeqCst);
                    return;
                };

                observer.on_event(&SweepEvent::ItemStarted {
                    id,
                    name: name.clone(),
                    position: index + 1,
                    total,
                });

                let title = display_title(&name);
                let output_dir = self
                    .output_root
                    .join(format!("{:03}_{}", id, file_stem_slug(&title)));
                let request = JobRequest::new(source, title, output_dir, config.clone());

                let progress = ItemObserver {
                    id,
                    name: &name,
                    observer,
                    project: OnceLock::new(),
                };
                let status = match runner.run(&request, &progress).await {
                    Ok(output_path) => {
                        done.fetch_add(1, Ordering::SeqCst);
                        ItemStatus::Done { output_path }
                    }
                    Err(e) => {
                        warn!("❌ '{}' failed: {}", name, e);
                        failed.fetch_add(1, Ordering::SeqCst);
                        ItemStatus::Error {
                            message: e.user_message(),
                        }
                    }
                };

                self.finish(id, status.clone(), progress.project.into_inner()).await;

                let completed_now = completed.fetch_add(1, Ordering::SeqCst) + 1;
                observer.on_event(&SweepEvent::ItemFinished {
                    id,
                    name,
                    status,
                    completed: completed_now,
                    total,
                });
            })
            .await;

        let summary = SweepSummary {
            captured: total,
            done: done.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
            skipped: skipped.load(Ordering::SeqCst),
        };

        info!(
            "🎉 Sweep finished: {} done, {} failed, {} skipped",
            summary.done, summary.failed, summary.skipped
        );
        observer.on_event(&SweepEvent::Finished { summary });
        summary
    }

    /// Pending → Processing, atomically. None if the item is gone or no longer pending.
    async fn claim(&self, id: ItemId) -> Option<(String, PathBuf)> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|item| item.id == id && item.status.is_pending())?;
        item.status = ItemStatus::Processing;
        Some((item.name.clone(), item.source_path.clone()))
    }

    /// Processing → Done/Error
    async fn finish(&self, id: ItemId, status: ItemStatus, project: Option<ProjectId>) {
        let mut items = self.items.write().await;
        match items
            .iter_mut()
            .find(|item| item.id == id && item.status.is_processing())
        {
            Some(item) => {
                item.status = status;
                if project.is_some() {
                    item.job_handle = project;
                }
            }
            None => warn!("Queue item #{} vanished while processing", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionEngine;
    use crate::config::Config;
    use crate::generation::testing::FakeService;
    use crate::generation::{JobStage, VideoStyle};
    use crate::video::{FrameRate, Resolution, TargetFormat};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn runner(service: Arc<FakeService>) -> JobRunner {
        JobRunner::new(
            service,
            Arc::new(CompositionEngine::new(&Config::default())),
            Duration::ZERO,
        )
    }

    fn document(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn ignore(_: &SweepEvent) {}

    /// Run a sweep that fails, leaving the item in Error
    async fn failed_item(queue: &BatchQueue, dir: &TempDir) -> ItemId {
        let id = queue.add("broken.pdf", dir.path().join("missing.pdf")).await.unwrap();
        queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &ignore)
            .await;
        id
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let queue = BatchQueue::new("out");
        queue.add("a.pdf", "/docs/a.pdf").await.unwrap();
        let err = queue.add("a.pdf", "/other/a.pdf").await.unwrap_err();

        assert_eq!(err, QueueError::Duplicate { name: "a.pdf".to_string() });
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.items().await[0].source_path, PathBuf::from("/docs/a.pdf"));
    }

    #[tokio::test]
    async fn test_add_document_uses_file_name() {
        let queue = BatchQueue::new("out");
        let id = queue.add_document("/docs/lecture_1.pdf").await.unwrap();
        assert_eq!(queue.get(id).await.unwrap().name, "lecture_1.pdf");
        assert!(queue.add_document("/elsewhere/lecture_1.pdf").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_only_from_error() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let pending = queue.add("p.pdf", "p.pdf").await.unwrap();
        assert!(!queue.retry(pending).await);
        assert!(!queue.retry(999).await);

        let failed = failed_item(&queue, &dir).await;
        let item = queue.get(failed).await.unwrap();
        assert!(item.status.is_error());
        assert!(item.error_message().is_some());

        assert!(queue.retry(failed).await);
        let item = queue.get(failed).await.unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.error_message().is_none());
    }

    #[tokio::test]
    async fn test_retry_on_done_is_noop() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let id = queue.add("a.pdf", document(&dir, "a.pdf", b"%PDF")).await.unwrap();
        queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &ignore)
            .await;

        let before = queue.get(id).await.unwrap();
        assert!(before.status.is_done());
        assert!(!queue.retry(id).await);
        assert_eq!(queue.get(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_sweep_isolates_failures() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let first = queue.add("one.pdf", document(&dir, "one.pdf", b"%PDF")).await.unwrap();
        let second = queue.add("two.pdf", dir.path().join("unreadable.pdf")).await.unwrap();
        let third = queue.add("three.pdf", document(&dir, "three.pdf", b"%PDF")).await.unwrap();

        let summary = queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &ignore)
            .await;

        assert!(queue.get(first).await.unwrap().status.is_done());
        assert!(queue.get(second).await.unwrap().status.is_error());
        assert!(queue.get(third).await.unwrap().status.is_done());
        assert_eq!(summary.captured, 3);
        assert_eq!(summary.done + summary.failed, 3);
        assert_eq!(queue.counts().await, QueueCounts { done: 2, error: 1, ..QueueCounts::default() });
    }

    #[tokio::test]
    async fn test_end_to_end_batch() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let a = queue.add("A.doc", document(&dir, "A.doc", b"valid document A")).await.unwrap();
        let b = queue.add("B.doc", document(&dir, "B.doc", b"valid document B")).await.unwrap();
        let c = queue.add("C.doc", document(&dir, "C.doc", b"")).await.unwrap();

        let config = BatchConfig {
            target: TargetFormat::new(Resolution::Hd, FrameRate::Fps30),
            style: VideoStyle::Classic,
            ..BatchConfig::default()
        };
        let service = Arc::new(FakeService::new());
        let events = Mutex::new(Vec::new());
        let observer = |event: &SweepEvent| {
            if let SweepEvent::ItemFinished { name, completed, total, .. } = event {
                events.lock().unwrap().push(format!("{} {}/{}", name, completed, total));
            }
        };
        queue.process_all(&runner(service.clone()), &config, &observer).await;

        for id in [a, b] {
            let item = queue.get(id).await.unwrap();
            let output = item.output_path().unwrap();
            assert!(output.exists());
            assert!(item.error_message().is_none());
            assert!(item.job_handle.is_some());
        }
        let failed = queue.get(c).await.unwrap();
        assert!(failed.status.is_error());
        assert!(failed.error_message().unwrap().contains("attach source"));
        assert!(failed.output_path().is_none());
        assert_eq!(failed.job_handle.map(|p| p.to_string()).as_deref(), Some("project-c"));

        assert_eq!(queue.len().await, 3);
        assert_eq!(*events.lock().unwrap(), vec!["A.doc 1/3", "B.doc 2/3", "C.doc 3/3"]);
        assert!(service.calls().contains(&"generate:classic:-".to_string()));
    }

    #[tokio::test]
    async fn test_items_added_mid_sweep_wait() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        queue.add("slow.pdf", document(&dir, "slow.pdf", b"%PDF")).await.unwrap();

        let service = Arc::new(FakeService::new().with_generate_delay(Duration::from_millis(200)));
        let job_runner = runner(service);
        let config = BatchConfig::default();
        let late_doc = document(&dir, "late.pdf", b"%PDF");

        let (summary, late) = tokio::join!(
            queue.process_all(&job_runner, &config, &ignore),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                queue.add("late.pdf", late_doc.clone()).await.unwrap()
            }
        );

        assert_eq!(summary.captured, 1);
        assert_eq!(queue.get(late).await.unwrap().status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out")).with_concurrency(2);
        for i in 0..5 {
            let name = format!("doc{}.pdf", i);
            queue.add(name.clone(), document(&dir, &name, b"%PDF")).await.unwrap();
        }

        let service = Arc::new(FakeService::new().with_generate_delay(Duration::from_millis(30)));
        let summary = queue
            .process_all(&runner(service.clone()), &BatchConfig::default(), &ignore)
            .await;

        assert_eq!(summary.done, 5);
        assert!(service.max_in_flight() <= 2);
        assert!(service.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_default_sweep_is_sequential() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        for name in ["x.pdf", "y.pdf", "z.pdf"] {
            queue.add(name, document(&dir, name, b"%PDF")).await.unwrap();
        }
        let service = Arc::new(FakeService::new().with_generate_delay(Duration::from_millis(10)));
        queue
            .process_all(&runner(service.clone()), &BatchConfig::default(), &ignore)
            .await;
        assert_eq!(service.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_cancel_leaves_rest_pending() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        for name in ["1.pdf", "2.pdf", "3.pdf"] {
            queue.add(name, document(&dir, name, b"%PDF")).await.unwrap();
        }

        let observer = |event: &SweepEvent| {
            if let SweepEvent::ItemFinished { .. } = event {
                queue.cancel();
            }
        };
        let summary = queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &observer)
            .await;

        assert_eq!(summary, SweepSummary { captured: 3, done: 1, failed: 0, skipped: 2 });
        assert_eq!(queue.counts().await, QueueCounts { pending: 2, done: 1, ..QueueCounts::default() });
    }

    #[tokio::test]
    async fn test_dropped_sweep_releases_queue() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let id = queue.add("slow.pdf", document(&dir, "slow.pdf", b"%PDF")).await.unwrap();

        let slow = runner(Arc::new(FakeService::new().with_generate_delay(Duration::from_secs(5))));
        let interrupted = tokio::time::timeout(
            Duration::from_millis(100),
            queue.process_all(&slow, &BatchConfig::default(), &ignore),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(queue.get(id).await.unwrap().status, ItemStatus::Processing);
        assert!(!queue.is_sweeping());

        assert!(queue.reset_interrupted(id).await);
        let late = queue.add("late.pdf", document(&dir, "late.pdf", b"%PDF")).await.unwrap();
        let summary = queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &ignore)
            .await;

        assert_eq!(summary.captured, 2);
        assert_eq!(summary.done, 2);
        assert!(queue.get(id).await.unwrap().status.is_done());
        assert!(queue.get(late).await.unwrap().status.is_done());
    }

    #[tokio::test]
    async fn test_processing_item_cannot_be_removed() {
        let queue = BatchQueue::new("out");
        let id = queue.add("a.pdf", "a.pdf").await.unwrap();
        queue.claim(id).await.unwrap();

        assert_eq!(queue.remove(id).await.unwrap_err(), QueueError::Busy { id });
        assert_eq!(queue.clear_all().await, 0);
        assert!(!queue.retry(id).await);

        assert!(queue.reset_interrupted(id).await);
        assert_eq!(queue.get(id).await.unwrap().status, ItemStatus::Pending);
        assert!(queue.remove(id).await.is_ok());
        assert_eq!(queue.remove(id).await.unwrap_err(), QueueError::NotFound { id });
    }

    #[tokio::test]
    async fn test_clear_done_and_all() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        queue.add("ok.pdf", document(&dir, "ok.pdf", b"%PDF")).await.unwrap();
        queue.add("bad.pdf", dir.path().join("nope.pdf")).await.unwrap();
        queue
            .process_all(&runner(Arc::new(FakeService::new())), &BatchConfig::default(), &ignore)
            .await;
        queue.add("new.pdf", "new.pdf").await.unwrap();

        assert_eq!(queue.clear_done().await, 1);
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.clear_all().await, 2);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_generation_records_handle() {
        let dir = tempdir().unwrap();
        let queue = BatchQueue::new(dir.path().join("out"));
        let id = queue.add("doc.pdf", document(&dir, "doc.pdf", b"%PDF")).await.unwrap();

        let service = Arc::new(FakeService::failing_at(JobStage::Generate));
        queue.process_all(&runner(service), &BatchConfig::default(), &ignore).await;

        let item = queue.get(id).await.unwrap();
        assert!(item.error_message().unwrap().contains("simulated failure"));
        assert!(item.job_handle.is_some());

        assert!(queue.retry(id).await);
        assert!(queue.get(id).await.unwrap().job_handle.is_none());
    }
}
