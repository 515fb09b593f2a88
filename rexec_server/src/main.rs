use rexec_lib::Hub;
use rocket::{Build, Config, Rocket};
use structopt::StructOpt;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    acl::{Acl, AclError},
    config::{Opt, Settings},
};

#[macro_use]
extern crate rocket;

mod acl;
mod auth;
mod config;
mod error;
mod routes;

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Acl(#[from] AclError),

    #[error("server failed: {0}")]
    Rocket(#[from] rocket::Error),
}

pub(crate) fn build(config: Config, hub: Hub, acl: Acl, settings: Settings) -> Rocket<Build> {
    rocket::custom(config)
        .manage(hub)
        .manage(acl)
        .manage(settings)
        .mount(
            "/",
            routes![
                routes::start,
                routes::stop,
                routes::status,
                routes::stdout,
                routes::stderr
            ],
        )
        .register("/", catchers![routes::default_catcher])
}

#[rocket::main]
async fn main() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opt = Opt::from_args();
    let acl = Acl::load(&opt.acl)?;
    if acl.is_empty() {
        warn!("acl {:?} has no rules, every request will be denied", opt.acl);
    }
    info!(address = %opt.address, port = opt.port, rules = acl.len(), "starting server");

    build(opt.rocket_config(), Hub::new(), acl, opt.settings())
        .launch()
        .await?;
    Ok(())
}
