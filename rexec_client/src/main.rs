use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process,
};

use structopt::StructOpt;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod operations;

/// Start, stop and inspect jobs on a remote rexec server
#[derive(StructOpt, Debug)]
#[structopt(name = "rexec-client")]
struct Opt {
    /// directory with ca.crt and client.pem (client key and certificate)
    #[structopt(name = "CERTIFICATES DIRECTORY", parse(from_os_str))]
    certs_dir: PathBuf,

    /// e.g. https://localhost:4430
    #[structopt(name = "SERVER_URL")]
    server_url: String,

    #[structopt(subcommand)]
    operation: Operation,
}

#[derive(Debug, StructOpt)]
enum Operation {
    /// Start a job
    Start {
        #[structopt(name = "COMMAND")]
        command: String,
        /// put `--` before arguments starting with a hyphen
        #[structopt(name = "ARGS")]
        args: Vec<String>,
    },
    /// Stop a running job
    Stop {
        #[structopt(name = "JOB_ID")]
        id: String,
    },
    /// Get the status of a running or completed job
    Status {
        #[structopt(name = "JOB_ID")]
        id: String,
    },
    /// Get the stdout and stderr of a job
    Output {
        #[structopt(name = "JOB_ID")]
        id: String,
    },
}

const CA_CERT_NAME: &str = "ca.crt";
const CLIENT_IDENTITY_NAME: &str = "client.pem";

#[derive(Debug, Error)]
enum ClientError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not set up tls: {0}")]
    Tls(#[from] reqwest::Error),
}

fn read(path: PathBuf) -> Result<Vec<u8>, ClientError> {
    fs::read(&path).map_err(|source| ClientError::Read { path, source })
}

fn http_client(certs_dir: &Path) -> Result<reqwest::blocking::Client, ClientError> {
    let ca_cert = read(certs_dir.join(CA_CERT_NAME))?;
    let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
    let client_identity = read(certs_dir.join(CLIENT_IDENTITY_NAME))?;
    let client_identity = reqwest::Identity::from_pem(&client_identity)?;

    let client = reqwest::blocking::Client::builder()
        .add_root_certificate(ca_cert)
        .identity(client_identity)
        .use_rustls_tls()
        .build()?;
    Ok(client)
}

fn main() {
    if env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    let opt = Opt::from_args();
    let client = match http_client(&opt.certs_dir) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let url = opt.server_url.trim_end_matches('/');

    let outcome = match &opt.operation {
        Operation::Start { command, args } => operations::start(&client, url, command, args),
        Operation::Stop { id } => operations::stop(&client, url, id),
        Operation::Status { id } => operations::status(&client, url, id),
        Operation::Output { id } => operations::output(&client, url, id),
    };
    match outcome {
        Ok(text) => println!("{}", text),
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    }
}
