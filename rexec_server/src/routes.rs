use rexec_data::{ErrorResponse, JobId, JobResponse, StartRequest};
use rexec_lib::{Hub, JobReport};
use rocket::{
    http::{ContentType, Status},
    response::status::Custom,
    serde::json::Json,
    Request, State,
};

use crate::{
    auth::Authorized,
    config::Settings,
    error::{ApiError, ApiResult},
};

fn parse_id(id: &str) -> ApiResult<JobId> {
    id.parse()
        .map_err(|e| ApiError::bad_request(format!("invalid job id `{}`: {}", id, e)))
}

fn full_response(report: JobReport) -> JobResponse {
    let mut response = JobResponse::new(report.id, &report.owner, report.start_time);
    response.job = Some(report.command);
    response.job_status = Some(report.status);
    response.stop_time = report.stop_time;
    response.exit_code = report.exit_code;
    response.signal = report.signal;
    response.stdout_size = Some(report.stdout_size);
    response.stderr_size = Some(report.stderr_size);
    response
}

/// the caller becomes the owner of the job
#[post("/start", format = "json", data = "<request>")]
pub async fn start(
    auth: Authorized,
    hub: &State<Hub>,
    request: Json<StartRequest>,
) -> ApiResult<Json<JobResponse>> {
    let request = request.into_inner();
    let job = hub.add_job(&auth.caller.name, &request.job, &request.args)?;
    Ok(Json(JobResponse::new(job.id(), job.owner(), job.start_time())))
}

#[post("/stop/<id>")]
pub async fn stop(
    _auth: Authorized,
    hub: &State<Hub>,
    settings: &State<Settings>,
    id: &str,
) -> ApiResult<Json<JobResponse>> {
    let id = parse_id(id)?;
    hub.stop_job(id, settings.stop_timeout).await?;
    let report = hub.get_job(id)?.report().await;
    let mut response = JobResponse::new(report.id, &report.owner, report.start_time);
    response.stop_time = report.stop_time;
    response.exit_code = report.exit_code;
    response.signal = report.signal;
    Ok(Json(response))
}

#[get("/status/<id>")]
pub async fn status(_auth: Authorized, hub: &State<Hub>, id: &str) -> ApiResult<Json<JobResponse>> {
    let job = hub.get_job(parse_id(id)?)?;
    Ok(Json(full_response(job.report().await)))
}

#[get("/stdout/<id>")]
pub async fn stdout(
    _auth: Authorized,
    hub: &State<Hub>,
    id: &str,
) -> ApiResult<(ContentType, Vec<u8>)> {
    let job = hub.get_job(parse_id(id)?)?;
    Ok((ContentType::Binary, job.stdout()))
}

#[get("/stderr/<id>")]
pub async fn stderr(
    _auth: Authorized,
    hub: &State<Hub>,
    id: &str,
) -> ApiResult<(ContentType, Vec<u8>)> {
    let job = hub.get_job(parse_id(id)?)?;
    Ok((ContentType::Binary, job.stderr()))
}

/// json body for failed guards, unknown routes and unparsable requests
#[catch(default)]
pub fn default_catcher(
    status: Status,
    _request: &Request<'_>,
) -> Custom<Json<ErrorResponse>> {
    let message = status.reason().unwrap_or("unknown error").to_lowercase();
    Custom(status, Json(ErrorResponse::new(status.code, message)))
}
