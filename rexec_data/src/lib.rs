use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random 128 bit identifier of a job, shown as a hyphenated UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Stopped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// body of `POST /start`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub job: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl StartRequest {
    pub fn new(job: &str, args: &[&str]) -> Self {
        Self {
            job: job.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Job description returned by `start`, `stop` and `status`.
/// Each route fills in the fields it knows about, absent ones are omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub owner: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_size: Option<usize>,
}

impl JobResponse {
    pub fn new(job_id: JobId, owner: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            job_id,
            owner: owner.to_string(),
            start_time,
            job: None,
            job_status: None,
            stop_time: None,
            exit_code: None,
            signal: None,
            stdout_size: None,
            stderr_size: None,
        }
    }
}

impl fmt::Display for JobResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id:         {}", self.job_id)?;
        writeln!(f, "owner:      {}", self.owner)?;
        if let Some(job) = &self.job {
            writeln!(f, "command:    {}", job)?;
        }
        if let Some(status) = &self.job_status {
            writeln!(f, "status:     {}", status)?;
        }
        write!(f, "started:    {}", self.start_time.to_rfc3339())?;
        if let Some(stop_time) = &self.stop_time {
            write!(f, "\nstopped:    {}", stop_time.to_rfc3339())?;
        }
        if let Some(exit_code) = self.exit_code {
            write!(f, "\nexit code:  {}", exit_code)?;
        }
        if let Some(signal) = self.signal {
            write!(f, "\nsignal:     {}", signal)?;
        }
        if let (Some(stdout), Some(stderr)) = (self.stdout_size, self.stderr_size) {
            write!(f, "\noutput:     {} bytes stdout, {} bytes stderr", stdout, stderr)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}
