use std::{io, time::Duration};

use rexec_data::JobId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job does not exist: {0}")]
    NotFound(JobId),

    #[error("job is already stopped: {0}")]
    AlreadyStopped(JobId),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to kill process of job {id}: {source}")]
    Kill {
        id: JobId,
        #[source]
        source: io::Error,
    },

    /// the kill signal may still land after this is returned
    #[error("timeout after {deadline:?} waiting for job {id} to exit")]
    Timeout { id: JobId, deadline: Duration },
}

pub type Result<T> = std::result::Result<T, JobError>;
