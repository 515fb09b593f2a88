use std::io;

use rexec_data::ErrorResponse;
use rexec_lib::JobError;
use rocket::{
    http::Status,
    response::{self, status, Responder},
    serde::json::Json,
    Request,
};
use tracing::warn;

/// Error reply of a route: an http status plus the json error body.
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: Status::BadRequest,
            message: message.into(),
        }
    }
}

pub fn status_for(error: &JobError) -> Status {
    match error {
        JobError::NotFound(_) => Status::NotFound,
        JobError::AlreadyStopped(_) => Status::Conflict,
        JobError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            Status::BadRequest
        }
        JobError::Spawn { .. } | JobError::Kill { .. } => Status::InternalServerError,
        JobError::Timeout { .. } => Status::GatewayTimeout,
    }
}

impl From<JobError> for ApiError {
    fn from(error: JobError) -> Self {
        let status = status_for(&error);
        if status.code >= 500 {
            warn!("request failed: {}", error);
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let body = ErrorResponse::new(self.status.code, self.message);
        status::Custom(self.status, Json(body)).respond_to(request)
    }
}

#[cfg(test)]
mod test {
    use std::{io, time::Duration};

    use rexec_lib::{JobError, JobId};
    use rocket::http::Status;

    use super::{status_for, ApiError};

    #[test]
    fn test_job_errors_map_to_statuses() {
        let id = JobId::new();
        assert_eq!(Status::NotFound, status_for(&JobError::NotFound(id)));
        assert_eq!(Status::Conflict, status_for(&JobError::AlreadyStopped(id)));
        assert_eq!(
            Status::GatewayTimeout,
            status_for(&JobError::Timeout {
                id,
                deadline: Duration::from_secs(1)
            })
        );
        assert_eq!(
            Status::InternalServerError,
            status_for(&JobError::Kill {
                id,
                source: io::Error::from(io::ErrorKind::PermissionDenied)
            })
        );
    }

    #[test]
    fn test_spawn_errors() {
        let missing = JobError::Spawn {
            command: "abcdfg".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(Status::BadRequest, status_for(&missing));
        let denied = JobError::Spawn {
            command: "/etc/passwd".to_string(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(Status::InternalServerError, status_for(&denied));
    }

    #[test]
    fn test_message_is_the_job_error() {
        let id = JobId::new();
        let error = ApiError::from(JobError::NotFound(id));
        assert_eq!(format!("job does not exist: {}", id), error.message);
        assert_eq!(Status::NotFound, error.status);
    }
}
