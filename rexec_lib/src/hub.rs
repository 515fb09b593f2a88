use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use tracing::{info, instrument};

use crate::{
    error::{JobError, Result},
    job::{Job, JobId},
};

/// Registry of every job started by this process.
///
/// The registry lock only guards membership and is never held across an `.await`;
/// each job guards its own fields, so a slow stop never blocks other jobs.
#[derive(Default)]
pub struct Hub {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `command` and register it. A job whose process failed to spawn is
    /// never registered. Must be called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn add_job(&self, owner: &str, command: &str, args: &[String]) -> Result<Arc<Job>> {
        let job = Job::start(owner, command, args)?;
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id(), job.clone());
        info!("registered job {}", job.id());
        Ok(job)
    }

    pub fn get_job(&self, id: JobId) -> Result<Arc<Job>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// Kill the job's process and wait up to `deadline` for it to exit.
    /// On `Timeout` the kill is still in flight and the job stops later.
    #[instrument(skip(self))]
    pub async fn stop_job(&self, id: JobId, deadline: Duration) -> Result<()> {
        let job = self.get_job(id)?;
        job.stop().await?;
        job.wait_for_completion(deadline).await?;
        info!("job stopped");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use chrono::Utc;
    use tokio::time::sleep;

    use super::Hub;
    use crate::{
        error::JobError,
        job::{JobId, JobStatus},
        test_util::{setup, RUNTIME},
        KILLED_EXIT_CODE,
    };

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_add_job_is_running() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let before = Utc::now();
            let job = hub.add_job("acme", "sleep", &args(&["1"])).unwrap();
            let after = Utc::now();
            assert_eq!(JobStatus::Running, job.status().await);
            assert!(before <= job.start_time() && job.start_time() <= after);
            assert_eq!(1, hub.len());
            job.stop().await.unwrap();
        });
    }

    #[test]
    fn test_get_job() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "sleep", &args(&["1"])).unwrap();
            let found = hub.get_job(job.id()).unwrap();
            assert!(Arc::ptr_eq(&job, &found));
            match hub.get_job(JobId::new()) {
                Err(JobError::NotFound(_)) => {}
                r => panic!("expected not found, got {:?}", r.map(|j| j.id())),
            }
        });
    }

    #[test]
    fn test_stop_job() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "sleep", &args(&["1"])).unwrap();
            hub.stop_job(job.id(), Duration::from_millis(500)).await.unwrap();
            assert_eq!(JobStatus::Stopped, job.status().await);
            assert!(job.stop_time().await.is_some());
            assert_eq!(Some(KILLED_EXIT_CODE), job.exit_code().await);

            match hub.stop_job(job.id(), Duration::from_millis(500)).await {
                Err(JobError::AlreadyStopped(id)) => assert_eq!(job.id(), id),
                r => panic!("expected already stopped, got {:?}", r),
            }
        });
    }

    // a stop arriving while the kill is in flight waits for the exit like the first one
    #[test]
    fn test_concurrent_stop_jobs_both_succeed() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "sleep", &args(&["5"])).unwrap();
            let (first, second) = tokio::join!(
                hub.stop_job(job.id(), Duration::from_secs(2)),
                hub.stop_job(job.id(), Duration::from_secs(2))
            );
            first.unwrap();
            second.unwrap();
            assert_eq!(JobStatus::Stopped, job.status().await);
            assert_eq!(Some(KILLED_EXIT_CODE), job.exit_code().await);
        });
    }

    #[test]
    fn test_stop_unknown_job() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            match hub.stop_job(JobId::new(), Duration::from_millis(100)).await {
                Err(JobError::NotFound(_)) => {}
                r => panic!("expected not found, got {:?}", r),
            }
        });
    }

    // the background sleep keeps the output pipes open for a second after the
    // killed process is gone, so the job cannot reach stopped within the deadline
    #[test]
    fn test_stop_job_timeout_then_stops() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub
                .add_job("acme", "sh", &args(&["-c", "sleep 1 & exec sleep 5"]))
                .unwrap();
            sleep(Duration::from_millis(200)).await;
            match hub.stop_job(job.id(), Duration::from_millis(200)).await {
                Err(JobError::Timeout { id, .. }) => assert_eq!(job.id(), id),
                r => panic!("expected timeout, got {:?}", r),
            }
            assert_eq!(JobStatus::Running, job.status().await);
            // retrying while the kill is still landing waits instead of failing
            hub.stop_job(job.id(), Duration::from_secs(5)).await.unwrap();
            assert_eq!(JobStatus::Stopped, job.status().await);
            assert_eq!(Some(KILLED_EXIT_CODE), job.exit_code().await);
        });
    }

    #[test]
    fn test_echo_output() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "echo", &args(&["hello"])).unwrap();
            job.wait_for_completion(Duration::from_secs(5)).await.unwrap();
            assert_eq!(b"hello\n".to_vec(), job.stdout());
            assert!(job.stderr().is_empty());
            assert_eq!(Some(0), job.exit_code().await);
        });
    }

    #[test]
    fn test_stderr_output() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "sleep", &args(&["foo"])).unwrap();
            job.wait_for_completion(Duration::from_secs(5)).await.unwrap();
            assert!(!job.stderr().is_empty());
            assert_ne!(Some(0), job.exit_code().await);
        });
    }

    #[test]
    fn test_invalid_command_is_not_registered() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            match hub.add_job("acme", "abcdfg", &[]) {
                Err(JobError::Spawn { .. }) => {}
                r => panic!("expected spawn error, got {:?}", r.map(|j| j.id())),
            }
            assert!(hub.is_empty());
        });
    }

    #[test]
    fn test_concurrent_jobs() {
        setup();
        let hub = Arc::new(Hub::new());
        RUNTIME.block_on(async {
            let tasks: Vec<_> = (0..10)
                .map(|n| {
                    let hub = hub.clone();
                    tokio::spawn(async move {
                        let job = hub.add_job("acme", "echo", &[n.to_string()]).unwrap();
                        if n % 2 == 0 {
                            let _ = hub.stop_job(job.id(), Duration::from_secs(2)).await;
                        }
                        job.wait_for_completion(Duration::from_secs(5)).await.unwrap();
                        job
                    })
                })
                .collect();
            for task in tasks {
                let job = task.await.unwrap();
                assert_eq!(JobStatus::Stopped, job.status().await);
                assert!(hub.get_job(job.id()).is_ok());
            }
            assert_eq!(10, hub.len());
        });
    }

    #[test]
    fn test_stopped_job_stays_registered() {
        setup();
        let hub = Hub::new();
        RUNTIME.block_on(async {
            let job = hub.add_job("acme", "true", &[]).unwrap();
            sleep(Duration::from_millis(100)).await;
            let found = hub.get_job(job.id()).unwrap();
            assert_eq!(JobStatus::Stopped, found.status().await);
        });
    }
}
