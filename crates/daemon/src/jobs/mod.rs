use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::render::RenderHandle;

const EVENT_CAPACITY: usize = 256;
const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub status: JobStatus,
    pub progress: f64,
    pub output: PathBuf,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: i64,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
}

struct Entry {
    job: Job,
    cancel: Option<CancellationToken>,
}

/// In-memory registry of render jobs. Every change is broadcast as a `JobEvent`.
///
/// Finished jobs are evicted once they have been terminal for longer than the retention window.
pub struct JobManager {
    jobs: Mutex<HashMap<i64, Entry>>,
    next_id: AtomicI64,
    events: broadcast::Sender<JobEvent>,
    retention: Duration,
}

impl JobManager {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        JobManager {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            events,
            retention,
        }
    }

    /// Drop terminal jobs older than the retention window. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let retention = self.retention;
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, entry| {
            let expired = (now - entry.job.updated_at)
                .to_std()
                .map(|age| age >= retention)
                .unwrap_or(false);
            !(entry.job.status.is_terminal() && expired)
        });
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, "evicted finished jobs");
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Entry>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create_job(&self, output: PathBuf) -> i64 {
        self.prune();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let job = Job {
            id,
            status: JobStatus::Pending,
            progress: 0.0,
            output,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().insert(id, Entry { job, cancel: None });
        info!(job_id = id, "created render job");
        id
    }

    pub fn get_job(&self, id: i64) -> Option<Job> {
        self.lock().get(&id).map(|e| e.job.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Apply `change` to a non-terminal job and broadcast the result.
    fn update(&self, id: i64, change: impl FnOnce(&mut Job)) -> bool {
        let event = {
            let mut jobs = self.lock();
            let Some(entry) = jobs.get_mut(&id) else {
                return false;
            };
            if entry.job.status.is_terminal() {
                return false;
            }
            change(&mut entry.job);
            entry.job.updated_at = Utc::now();
            if entry.job.status.is_terminal() {
                entry.cancel = None;
            }
            JobEvent {
                job_id: id,
                status: entry.job.status,
                progress: entry.job.progress,
                error: entry.job.error.clone(),
            }
        };
        let _ = self.events.send(event);
        true
    }

    pub fn update_job_status(&self, id: i64, status: JobStatus, progress: Option<f64>) -> bool {
        self.update(id, |job| {
            job.status = status;
            if let Some(progress) = progress {
                job.progress = job.progress.max(progress);
            }
        })
    }

    pub fn fail_job(&self, id: i64, error: String) -> bool {
        warn!(job_id = id, error = %error, "render job failed");
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
    }

    /// Request cancellation. The job turns `Cancelled` once its render has torn down.
    pub fn cancel_job(&self, id: i64) -> bool {
        let token = {
            let jobs = self.lock();
            let Some(entry) = jobs.get(&id) else {
                return false;
            };
            if entry.job.status.is_terminal() {
                return false;
            }
            entry.cancel.clone()
        };
        match token {
            Some(token) => {
                info!(job_id = id, "cancellation requested");
                token.cancel();
                true
            }
            None => self.update(id, |job| job.status = JobStatus::Cancelled),
        }
    }

    pub fn cancel_all(&self) -> usize {
        let ids: Vec<i64> = self
            .lock()
            .values()
            .filter(|e| !e.job.status.is_terminal())
            .map(|e| e.job.id)
            .collect();
        ids.into_iter().filter(|id| self.cancel_job(*id)).count()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| !e.job.status.is_terminal())
            .count()
    }

    /// Wait until no job is running, or `timeout` passes.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Track `handle` as the render of job `id` until it finishes.
    pub fn attach(self: &Arc<Self>, id: i64, handle: RenderHandle) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.cancel = Some(handle.cancel_token());
        }
        self.update_job_status(id, JobStatus::Running, None);

        let mut progress = handle.progress();
        let manager = self.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let value = *progress.borrow_and_update();
                manager.update_job_status(id, JobStatus::Running, Some(value));
            }
        });

        let manager = self.clone();
        tokio::spawn(async move {
            match handle.wait().await {
                Ok(path) => {
                    info!(job_id = id, output = %path.display(), "render job completed");
                    manager.update_job_status(id, JobStatus::Completed, Some(1.0));
                }
                Err(err) if err.is_cancelled() => {
                    manager.update_job_status(id, JobStatus::Cancelled, None);
                }
                Err(err) => {
                    manager.fail_job(id, err.report());
                }
            }
        });
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::FakeTool;
    use crate::render::Renderer;
    use engine::{ProjectSettings, Scene, Timeline};

    #[test]
    fn jobs_move_through_states_once() {
        let manager = JobManager::new();
        let mut events = manager.subscribe();
        let id = manager.create_job("out.mp4".into());
        assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Pending);

        assert!(manager.update_job_status(id, JobStatus::Running, Some(0.4)));
        assert!(manager.update_job_status(id, JobStatus::Running, Some(0.2)));
        assert_eq!(manager.get_job(id).unwrap().progress, 0.4);
        assert!(manager.update_job_status(id, JobStatus::Completed, Some(1.0)));
        assert!(!manager.fail_job(id, "late".into()));

        let first = events.try_recv().unwrap();
        assert_eq!(first.status, JobStatus::Running);
        assert!(manager.get_job(999).is_none());
    }

    #[test]
    fn cancel_without_a_render_is_immediate() {
        let manager = JobManager::new();
        let id = manager.create_job("out.mp4".into());
        assert!(manager.cancel_job(id));
        assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Cancelled);
        assert!(!manager.cancel_job(id));
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn finished_jobs_are_evicted_after_retention() {
        let manager = JobManager::with_retention(Duration::ZERO);
        let done = manager.create_job("done.mp4".into());
        let running = manager.create_job("running.mp4".into());
        manager.update_job_status(done, JobStatus::Completed, Some(1.0));
        manager.update_job_status(running, JobStatus::Running, Some(0.5));

        assert_eq!(manager.prune(), 1);
        assert!(manager.get_job(done).is_none());
        assert!(manager.get_job(running).is_some());

        let kept = JobManager::new();
        let id = kept.create_job("kept.mp4".into());
        kept.update_job_status(id, JobStatus::Failed, None);
        kept.create_job("next.mp4".into());
        assert!(kept.get_job(id).is_some());
    }

    #[tokio::test]
    async fn attached_renders_complete_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(JobManager::new());
        let renderer = Renderer::new(Arc::new(FakeTool::default()), dir.path().join("cache"), false);
        let mut timeline = Timeline::new(ProjectSettings::new(320, 180, 10));
        timeline.add_scene(Scene::new(1.0));
        let output = dir.path().join("done.mp4");

        let id = manager.create_job(output.clone());
        manager.attach(id, renderer.render("job", timeline, &output, false));
        assert!(manager.drain(Duration::from_secs(5)).await);

        let job = manager.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 1.0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn cancel_all_stops_running_renders() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(JobManager::new());
        let tool = FakeTool {
            hang: true,
            ..Default::default()
        };
        let renderer = Renderer::new(Arc::new(tool), dir.path().join("cache"), false);
        let mut timeline = Timeline::new(ProjectSettings::new(320, 180, 10));
        timeline.add_scene(Scene::new(1.0));

        let id = manager.create_job(dir.path().join("x.mp4"));
        manager.attach(id, renderer.render("hang", timeline, dir.path().join("x.mp4"), false));
        assert_eq!(manager.cancel_all(), 1);
        assert!(manager.drain(Duration::from_secs(5)).await);
        assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Cancelled);
    }
}
