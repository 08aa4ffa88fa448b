use std::fmt::{self, Display};

use potion::Error;
use serde_json::{json, Value};
use warp::{http::StatusCode, reject::Reject, Reply};

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

/// Failure taxonomy shared by every action in the crate.
///
/// Each variant maps to one HTTP status and a JSON body the front can send
/// back unchanged.
#[derive(Debug)]
pub enum ServiceError {
    Validation { field: String, message: String },
    NotFound(String),
    Conflict(String),
    Permission(String),
    Unauthorized,
    Query(QueryError),
}

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn permission_denied() -> Self {
        Self::Permission(String::from(
            "You don't have permission to perform this action",
        ))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } | ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Permission(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ServiceError::Validation { field, message } => json!({ field: [message] }),
            ServiceError::Conflict(message) => json!({ "errors": message }),
            ServiceError::NotFound(message) | ServiceError::Permission(message) => {
                json!({ "detail": message })
            }
            ServiceError::Unauthorized => {
                json!({ "detail": "Authentication credentials were not provided" })
            }
            ServiceError::Query(_) => json!({ "detail": "Internal server error" }),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation { field, message } => write!(f, "{field}: {message}"),
            ServiceError::NotFound(message)
            | ServiceError::Conflict(message)
            | ServiceError::Permission(message) => write!(f, "{message}"),
            ServiceError::Unauthorized => write!(f, "Unauthorized"),
            ServiceError::Query(e) => write!(f, "Query failed: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl Reject for ServiceError {}

impl ServiceError {
    pub fn into_reply(self) -> impl Reply {
        warp::reply::with_status(warp::reply::json(&self.body()), self.status_code())
    }
}

impl From<QueryError> for ServiceError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<TypeError> for ServiceError {
    fn from(value: TypeError) -> Self {
        Self::validation("non_field_errors", value.info)
    }
}

// Constraint violations coming back from the store are user-facing outcomes,
// everything else stays an internal query failure.
impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            if e.is_unique_violation() {
                return Self::conflict("Record already exists");
            }
            if e.is_check_violation() {
                return Self::validation("non_field_errors", e.message().to_string());
            }
            if e.is_foreign_key_violation() {
                return Self::not_found("Referenced object doesn't exist");
            }
        }

        if let sqlx::Error::RowNotFound = value {
            return Self::not_found("Not found");
        }

        log::error!("Query failed: {value}");
        Self::Query(QueryError::from(value))
    }
}

impl From<ServiceError> for Error {
    fn from(value: ServiceError) -> Self {
        let code = match value {
            ServiceError::Validation { .. } | ServiceError::Conflict(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::Permission(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Query(_) => 500,
        };

        Error {
            code,
            info: Some(value.body().to_string()),
            redirect: None,
        }
    }
}
