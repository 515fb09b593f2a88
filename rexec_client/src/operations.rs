use rexec_data::{ErrorResponse, JobResponse, StartRequest};
use reqwest::blocking::{Client, RequestBuilder, Response};
use tracing::debug;

/// text to print on success, error message otherwise
pub type Outcome = Result<String, String>;

pub fn start(http_client: &Client, url: &str, command: &str, args: &[String]) -> Outcome {
    let request = StartRequest {
        job: command.to_string(),
        args: args.to_vec(),
    };
    let builder = http_client.post(format!("{}/start", url)).json(&request);
    execute(http_client, builder, job_text)
}

pub fn stop(http_client: &Client, url: &str, job_id: &str) -> Outcome {
    let builder = http_client.post(format!("{}/stop/{}", url, job_id));
    execute(http_client, builder, job_text)
}

pub fn status(http_client: &Client, url: &str, job_id: &str) -> Outcome {
    let builder = http_client.get(format!("{}/status/{}", url, job_id));
    execute(http_client, builder, job_text)
}

pub fn output(http_client: &Client, url: &str, job_id: &str) -> Outcome {
    let stdout = execute(
        http_client,
        http_client.get(format!("{}/stdout/{}", url, job_id)),
        raw_text,
    )?;
    let stderr = execute(
        http_client,
        http_client.get(format!("{}/stderr/{}", url, job_id)),
        raw_text,
    )?;
    Ok(format!("___STDOUT___\n{}\n___STDERR___\n{}", stdout, stderr))
}

fn execute(
    http_client: &Client,
    builder: RequestBuilder,
    on_success: fn(Response) -> Outcome,
) -> Outcome {
    let request = builder
        .build()
        .map_err(|e| format!("error building the request: {}", e))?;
    debug!("{} {}", request.method(), request.url());
    match http_client.execute(request) {
        Ok(response) if response.status().is_success() => on_success(response),
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            Err(describe_error(status, &body))
        }
        Err(e) => Err(format!("error executing request: {}", e)),
    }
}

fn job_text(response: Response) -> Outcome {
    response
        .json::<JobResponse>()
        .map(|job| job.to_string())
        .map_err(|e| format!("unexpected response body: {}", e))
}

fn raw_text(response: Response) -> Outcome {
    response
        .bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| format!("error reading response body: {}", e))
}

/// the server answers errors with a json body, fall back to the raw text
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => format!("error {}: {}", error.status, error.error),
        Err(_) => format!("unexpected response {}: {}", status, body),
    }
}

#[cfg(test)]
mod test {
    use reqwest::blocking::Client;

    use super::{describe_error, status};

    #[test]
    fn test_describe_json_error() {
        let body = r#"{"status": 404, "error": "job does not exist: 4f1c"}"#;
        assert_eq!("error 404: job does not exist: 4f1c", describe_error(404, body));
    }

    #[test]
    fn test_describe_other_error() {
        assert_eq!(
            "unexpected response 502: bad gateway",
            describe_error(502, "bad gateway")
        );
    }

    // nothing listens on port 1, main turns the error into a non-zero exit
    #[test]
    fn test_failed_request_is_an_error() {
        let message = status(&Client::new(), "http://127.0.0.1:1", "4f1c").unwrap_err();
        assert!(message.starts_with("error executing request"), "{}", message);
    }
}
