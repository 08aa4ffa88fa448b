use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::error::ServiceError;

/// Pulls the token out of `Token <jwt>` or `Bearer <jwt>`.
pub fn extract_token(header: &str) -> Option<&str> {
    let header = header.trim();
    header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn session_from_header(header: &str, secret: &str) -> Option<SessionData> {
    extract_token(header).and_then(|token| verify_jwt_session(token, secret).ok())
}

pub fn with_session(
    secret: Arc<String>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let secret = secret.clone();
        async move {
            match session_from_header(&header, &secret) {
                Some(session) => Ok(session),
                None => Err(warp::reject::custom(ServiceError::Unauthorized)),
            }
        }
    })
}

/// Anonymous callers pass through as `None`.
pub fn with_possible_session(
    secret: Arc<String>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header.and_then(|header| session_from_header(&header, &secret))
    })
}
