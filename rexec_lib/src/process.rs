use std::{io, process::ExitStatus, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{buffer::OutputBuffer, job::Job};

const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// answer of the supervisor to a kill request
#[derive(Debug)]
pub(crate) enum KillOutcome {
    Sent,
    AlreadyExited,
    Failed(io::Error),
}

pub(crate) type KillRequest = oneshot::Sender<KillOutcome>;

/// Owns the child for its whole life: serves kill requests until the process exits,
/// waits for both output pumps to drain, then records the terminal state on the job.
pub(crate) async fn supervise(
    job: Arc<Job>,
    mut process: Child,
    mut kill_requests: mpsc::Receiver<KillRequest>,
    pumps: Vec<JoinHandle<()>>,
) {
    let exit_result = loop {
        tokio::select! {
            result = process.wait() => break result,
            Some(reply) = kill_requests.recv() => {
                let outcome = kill(&mut process);
                info!(id = %job.id(), ?outcome, "handled kill request");
                // the requester may have been cancelled, nobody to tell then
                let _ = reply.send(outcome);
            }
        }
    };

    // requests that raced with the exit are answered before the job lock is taken,
    // a stopper holds that lock while it waits for its reply
    kill_requests.close();
    while let Ok(reply) = kill_requests.try_recv() {
        let _ = reply.send(KillOutcome::AlreadyExited);
    }

    for pump in pumps {
        if let Err(join_error) = pump.await {
            warn!(id = %job.id(), "output pump failed: {}", join_error);
        }
    }

    let exit_status = match exit_result {
        Ok(exit_status) => Some(exit_status),
        Err(io_error) => {
            error!(id = %job.id(), "unexpected io error when waiting for process: {}", io_error);
            None
        }
    };
    job.finish(exit_status).await;
}

fn kill(process: &mut Child) -> KillOutcome {
    match process.try_wait() {
        Ok(Some(_exit_status)) => KillOutcome::AlreadyExited,
        Ok(None) => match process.start_kill() {
            Ok(()) => KillOutcome::Sent,
            // tokio refuses to signal a child it has already reaped
            Err(kill_error) if kill_error.kind() == io::ErrorKind::InvalidInput => {
                KillOutcome::AlreadyExited
            }
            Err(kill_error) => KillOutcome::Failed(kill_error),
        },
        Err(wait_error) => KillOutcome::Failed(wait_error),
    }
}

/// copies a process stream into its buffer until EOF
pub(crate) async fn pump_output<A: AsyncRead + Unpin>(mut stream: A, buffer: Arc<OutputBuffer>) {
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.write(&chunk[..n]),
            Err(io_error) if io_error.kind() == io::ErrorKind::Interrupted => continue,
            Err(io_error) => {
                warn!("unexpected io error when reading from stream: {}", io_error);
                break;
            }
        }
    }
}

/// exit code to record, processes ended by a signal have none and get -1
pub(crate) fn exit_code(exit_status: Option<&ExitStatus>) -> i32 {
    exit_status
        .and_then(ExitStatus::code)
        .unwrap_or(crate::KILLED_EXIT_CODE)
}

#[cfg(unix)]
pub(crate) fn termination_signal(exit_status: Option<&ExitStatus>) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;

    exit_status.and_then(ExitStatusExt::signal)
}

#[cfg(not(unix))]
pub(crate) fn termination_signal(_exit_status: Option<&ExitStatus>) -> Option<i32> {
    None
}
