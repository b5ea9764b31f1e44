use std::future::{ready, Ready};

use actix_web::{FromRequest, HttpRequest};
use async_graphql::Context;

use crate::{
    auth::Role,
    errors::{AppError, AppResult},
};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Identity forwarded by the upstream gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn from_headers(req: &HttpRequest) -> AppResult<Self> {
        let user_id = header(req, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing caller identity".to_string()))?;
        let role = match header(req, USER_ROLE_HEADER) {
            Some(role) => role.parse()?,
            None => Role::Learner,
        };

        Ok(Caller {
            user_id: user_id.to_string(),
            role,
        })
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Caller::from_headers(req))
    }
}

pub fn caller_from_context(ctx: &Context<'_>) -> AppResult<Caller> {
    ctx.data::<Caller>()
        .cloned()
        .map_err(|_| AppError::Unauthorized("Authentication required".to_string()))
}
