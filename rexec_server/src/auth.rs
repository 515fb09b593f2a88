use rocket::{
    http::Status,
    mtls::{self, Certificate},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::acl::Acl;

/// Identity of the peer, taken from its verified client certificate.
pub struct Caller {
    pub name: String,
}

impl Caller {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized: invalid client certificate: {0}")]
    Certificate(mtls::Error),

    #[error("unauthorized: no organization in client certificate")]
    MissingOrganization,

    #[error("unauthorized: {caller} is not allowed to access {path}")]
    Forbidden { caller: String, path: String },

    #[error("access control list is not configured")]
    MissingAcl,
}

impl From<mtls::Error> for AuthError {
    fn from(e: mtls::Error) -> Self {
        Self::Certificate(e)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let client_cert = try_outcome!(request
            .guard::<Certificate<'r>>()
            .await
            .map_error(|(status, err)| (status, AuthError::from(err))));
        let organization = client_cert
            .subject()
            .iter_organization()
            .next()
            .and_then(|org| org.as_str().ok())
            .map(str::to_string);
        match organization {
            Some(name) => Outcome::Success(Caller::new(name)),
            None => Outcome::Error((Status::Unauthorized, AuthError::MissingOrganization)),
        }
    }
}

/// A [`Caller`] the access control list allows on the requested path.
/// Every route takes this guard, so nothing reaches the hub unchecked.
pub struct Authorized {
    pub caller: Caller,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authorized {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let caller = try_outcome!(request.guard::<Caller>().await);
        let acl = match request.rocket().state::<Acl>() {
            Some(acl) => acl,
            None => return Outcome::Error((Status::InternalServerError, AuthError::MissingAcl)),
        };
        let path = request.uri().path().to_string();
        if acl.is_allowed(&path, &caller.name) {
            info!(caller = %caller.name, path = %path, "authorized");
            Outcome::Success(Authorized { caller })
        } else {
            warn!(caller = %caller.name, path = %path, "denied");
            Outcome::Error((
                Status::Unauthorized,
                AuthError::Forbidden {
                    caller: caller.name,
                    path,
                },
            ))
        }
    }
}
