use std::{
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
pub use rexec_data::{JobId, JobStatus};
use tokio::{
    process::Command,
    sync::{mpsc, oneshot, watch, RwLock},
    time::timeout,
};
use tracing::{info, instrument, warn};

use crate::{
    buffer::OutputBuffer,
    error::{JobError, Result},
    process::{self, pump_output, supervise, KillOutcome, KillRequest},
};

struct JobState {
    status: JobStatus,
    stop_time: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    signal: Option<i32>,
    kill_sent: bool,
}

/// Every status field of a job, read under one acquisition of the job lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    pub owner: String,
    pub command: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout_size: usize,
    pub stderr_size: usize,
}

/// One spawned OS process and everything recorded about it.
///
/// A `Job` only exists once its process has been spawned, so it is never observed
/// before `Running`. Its supervisor task is the single writer of the transition to
/// `Stopped`; `stop` only asks the supervisor to deliver a kill signal.
pub struct Job {
    id: JobId,
    owner: String,
    command: String,
    args: Vec<String>,
    pid: Option<u32>,
    start_time: DateTime<Utc>,
    stdout: Arc<OutputBuffer>,
    stderr: Arc<OutputBuffer>,
    state: RwLock<JobState>,
    kill_tx: mpsc::Sender<KillRequest>,
    done_tx: watch::Sender<bool>,
}

impl Job {
    /// Spawn the process with both output streams piped into fresh buffers and
    /// hand it to a supervisor task. Nothing is left running if the spawn fails.
    /// Must be called from within a Tokio runtime.
    pub(crate) fn start(owner: &str, command: &str, args: &[String]) -> Result<Arc<Job>> {
        let id = JobId::new();
        info!("try to spawn process of job with id {}", id);
        let start_time = Utc::now();
        let mut process = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                info!("process could not be spawned, error: {}", source);
                JobError::Spawn {
                    command: command.to_string(),
                    source,
                }
            })?;
        let pid = process.id();
        info!("process spawned, pid: {:?}", pid);

        let stdout = Arc::new(OutputBuffer::new());
        let stderr = Arc::new(OutputBuffer::new());
        let mut pumps = Vec::with_capacity(2);
        if let Some(pipe) = process.stdout.take() {
            pumps.push(tokio::spawn(pump_output(pipe, stdout.clone())));
        }
        if let Some(pipe) = process.stderr.take() {
            pumps.push(tokio::spawn(pump_output(pipe, stderr.clone())));
        }

        // stoppers hold the job lock while they wait for a reply, so one slot is enough
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let (done_tx, _) = watch::channel(false);
        let job = Arc::new(Job {
            id,
            owner: owner.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
            pid,
            start_time,
            stdout,
            stderr,
            state: RwLock::new(JobState {
                status: JobStatus::Running,
                stop_time: None,
                exit_code: None,
                signal: None,
                kill_sent: false,
            }),
            kill_tx,
            done_tx,
        });
        tokio::spawn(supervise(job.clone(), process, kill_rx, pumps));
        Ok(job)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// program followed by its arguments
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.command.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub async fn status(&self) -> JobStatus {
        self.state.read().await.status
    }

    /// `None` while the job is running
    pub async fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.stop_time
    }

    /// `None` while the job is running. A process ended by a signal reports `Some(-1)`,
    /// see [`Job::termination_signal`] for the signal itself.
    pub async fn exit_code(&self) -> Option<i32> {
        self.state.read().await.exit_code
    }

    pub async fn termination_signal(&self) -> Option<i32> {
        self.state.read().await.signal
    }

    pub fn stdout(&self) -> Vec<u8> {
        self.stdout.snapshot()
    }

    pub fn stderr(&self) -> Vec<u8> {
        self.stderr.snapshot()
    }

    pub async fn report(&self) -> JobReport {
        let state = self.state.read().await;
        JobReport {
            id: self.id,
            owner: self.owner.clone(),
            command: self.command_string(),
            status: state.status,
            start_time: self.start_time,
            stop_time: state.stop_time,
            exit_code: state.exit_code,
            signal: state.signal,
            stdout_size: self.stdout.len(),
            stderr_size: self.stderr.len(),
        }
    }

    /// Ask the supervisor to kill the process. Returns once the signal was sent,
    /// use [`Job::wait_for_completion`] to wait for the exit.
    /// A stop while an earlier kill is still landing succeeds without signalling again.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn stop(&self) -> Result<()> {
        // held until the supervisor answered, concurrent stoppers queue up here
        let mut state = self.state.write().await;
        if state.status == JobStatus::Stopped {
            return Err(JobError::AlreadyStopped(self.id));
        }
        if state.kill_sent {
            info!("kill already sent, process has not exited yet");
            return Ok(());
        }

        info!("send kill request for process with pid {:?}", self.pid);
        let (reply_tx, reply_rx) = oneshot::channel();
        let outcome = if self.kill_tx.send(reply_tx).await.is_err() {
            KillOutcome::AlreadyExited
        } else {
            reply_rx.await.unwrap_or(KillOutcome::AlreadyExited)
        };
        state.kill_sent = matches!(outcome, KillOutcome::Sent);
        drop(state);

        match outcome {
            KillOutcome::Sent => Ok(()),
            KillOutcome::AlreadyExited => {
                info!("process already exited");
                Err(JobError::AlreadyStopped(self.id))
            }
            KillOutcome::Failed(source) => {
                warn!("kill refused: {}", source);
                Err(JobError::Kill {
                    id: self.id,
                    source,
                })
            }
        }
    }

    /// Wait up to `deadline` for the job to reach `Stopped`.
    /// Any number of callers may wait at once; a stopped job returns immediately.
    pub async fn wait_for_completion(&self, deadline: Duration) -> Result<()> {
        let mut done_rx = self.done_tx.subscribe();
        // the borrowed value must not outlive `done_rx`
        let waited = timeout(deadline, done_rx.wait_for(|stopped| *stopped))
            .await
            .map(|_| ());
        match waited {
            // the sender lives in self, so waiting can only end with `true`
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(JobError::Timeout {
                id: self.id,
                deadline,
            }),
        }
    }

    /// terminal transition, only called by the supervisor
    pub(crate) async fn finish(&self, exit_status: Option<ExitStatus>) {
        let exit_code = process::exit_code(exit_status.as_ref());
        let signal = process::termination_signal(exit_status.as_ref());
        let mut state = self.state.write().await;
        if state.status == JobStatus::Stopped {
            warn!(id = %self.id, "job finished twice");
            return;
        }
        state.status = JobStatus::Stopped;
        state.stop_time = Some(Utc::now());
        state.exit_code = Some(exit_code);
        state.signal = signal;
        info!(id = %self.id, exit_code, ?signal, "process exited");
        self.done_tx.send_replace(true);
    }
}
