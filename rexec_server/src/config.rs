use std::{net::IpAddr, path::PathBuf, time::Duration};

use rocket::{
    config::{CipherSuite, MutualTls, TlsConfig},
    Config,
};
use structopt::StructOpt;

const SERVER_CERT_NAME: &str = "server.crt";
const SERVER_KEY_NAME: &str = "server.key";
const CA_CERT_NAME: &str = "ca.crt";

/// Remote job execution server, clients authenticate with mutual TLS.
#[derive(StructOpt, Debug)]
#[structopt(name = "rexec-server")]
pub struct Opt {
    /// directory with server.crt, server.key (PKCS#8) and ca.crt
    #[structopt(long, parse(from_os_str))]
    pub tls_dir: PathBuf,

    /// json file mapping path patterns to allowed organizations
    #[structopt(long, parse(from_os_str))]
    pub acl: PathBuf,

    #[structopt(long, default_value = "127.0.0.1")]
    pub address: IpAddr,

    #[structopt(long, default_value = "4430")]
    pub port: u16,

    /// how long a stop request waits for the process to exit
    #[structopt(long, default_value = "1000")]
    pub stop_timeout_ms: u64,
}

/// settings the routes read from managed state
#[derive(Clone, Debug)]
pub struct Settings {
    pub stop_timeout: Duration,
}

impl Opt {
    pub fn settings(&self) -> Settings {
        Settings {
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        }
    }

    pub fn rocket_config(&self) -> Config {
        let tls_config = TlsConfig::from_paths(
            self.tls_dir.join(SERVER_CERT_NAME),
            self.tls_dir.join(SERVER_KEY_NAME),
        )
        .with_ciphers(CipherSuite::TLS_V13_SET)
        .with_mutual(MutualTls::from_path(self.tls_dir.join(CA_CERT_NAME)).mandatory(true));

        Config {
            address: self.address,
            port: self.port,
            tls: Some(tls_config),
            ..Default::default()
        }
    }
}
