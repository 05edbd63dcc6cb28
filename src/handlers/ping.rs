use axum::http::StatusCode;

/// ANY /ping - liveness probe for the container runtime; never touches the database
pub async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}
