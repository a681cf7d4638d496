//! Deferred job execution
//!
//! Submission watchers and dependent submissions are handed to a
//! [`JobExecutor`] as boxed futures, either to run now or after a delay.

use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A unit of background work
pub type Job = BoxFuture<'static, ()>;

/// Submit-now and submit-after-delay capability
pub trait JobExecutor: Send + Sync {
    fn submit(&self, name: &str, job: Job);

    fn submit_after(&self, name: &str, delay: Duration, job: Job);
}

/// Runs jobs as tokio tasks
#[derive(Default)]
pub struct TokioJobExecutor {
    handles: DashMap<u64, JoinHandle<()>>,
    next_id: AtomicU64,
}

impl TokioJobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, name: &str, delay: Option<Duration>, job: Job) {
        self.handles.retain(|_, handle| !handle.is_finished());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = name.to_string();
        let handle = tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            debug!(job = %name, "Running job");
            job.await;
        });

        self.handles.insert(id, handle);
    }

    /// Number of jobs not yet finished
    pub fn in_flight(&self) -> usize {
        self.handles.retain(|_, handle| !handle.is_finished());
        self.handles.len()
    }

    /// Abort all outstanding jobs
    pub fn stop(&self) {
        let outstanding = self.in_flight();
        for entry in self.handles.iter() {
            entry.value().abort();
        }
        self.handles.clear();
        info!(outstanding, "Job executor stopped");
    }
}

impl JobExecutor for TokioJobExecutor {
    fn submit(&self, name: &str, job: Job) {
        self.spawn(name, None, job);
    }

    fn submit_after(&self, name: &str, delay: Duration, job: Job) {
        debug!(job = name, delay_secs = delay.as_secs(), "Scheduling delayed job");
        self.spawn(name, Some(delay), job);
    }
}
