// HTTP request error kinds
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Every way a request can be refused by this service.
///
/// The variants are kinds, not messages: the response body for each one is
/// fixed so clients can branch on `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    // 401 Unauthorized
    #[error("the request carried no scope information")]
    UnauthorizedRequest,

    // 403 Forbidden
    #[error("the caller is missing the required scope")]
    MissingScope,

    // 400 Bad Request
    #[error("a required query parameter is missing")]
    MissingQueryParameter,

    // 500 Internal Server Error
    #[error("the database query could not be completed")]
    DatabaseQueryError,
}

impl RequestError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::UnauthorizedRequest => StatusCode::UNAUTHORIZED,
            RequestError::MissingScope => StatusCode::FORBIDDEN,
            RequestError::MissingQueryParameter => StatusCode::BAD_REQUEST,
            RequestError::DatabaseQueryError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::UnauthorizedRequest => "UNAUTHORIZED_REQUEST",
            RequestError::MissingScope => "MISSING_SCOPE",
            RequestError::MissingQueryParameter => "MISSING_QUERY_PARAMETER",
            RequestError::DatabaseQueryError => "DATABASE_QUERY_ERROR",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RequestError::UnauthorizedRequest => "Unauthorized Request",
            RequestError::MissingScope => "Missing Scope",
            RequestError::MissingQueryParameter => "Missing Query Parameter",
            RequestError::DatabaseQueryError => "Database Query Error",
        }
    }

    /// Client-safe description
    pub fn message(&self) -> &'static str {
        match self {
            RequestError::UnauthorizedRequest => {
                "The request did not contain the authorization information set by the API gateway"
            }
            RequestError::MissingScope => {
                "The authenticated scopes of this request do not grant access to this service"
            }
            RequestError::MissingQueryParameter => {
                "The request must contain the query parameters 'modelID' and 'instanceID'"
            }
            RequestError::DatabaseQueryError => {
                "The stored instances could not be read from the database"
            }
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let status = self.status_code();
        json!({
            "error": true,
            "code": self.error_code(),
            "title": self.title(),
            "message": self.message(),
            "httpCode": status.as_u16(),
            "httpError": status.canonical_reason().unwrap_or_default(),
        })
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
