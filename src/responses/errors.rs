use crate::errors::AppError;
use astra::{Body, Response, ResponseBuilder};
use serde_json::json;

pub type ResultResp = Result<Response, AppError>;

/// Convert an AppError into a JSON error response
pub fn error_to_response(err: AppError) -> Response {
    match err {
        AppError::NotFound => json_error_response(404, "Not Found"),
        AppError::BadRequest(msg) => json_error_response(400, &msg),
        AppError::DbError(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error_response(500, "Database Error")
        }
        AppError::InternalError => json_error_response(500, "Internal Server Error"),
    }
}

pub fn json_error_response(status: u16, message: &str) -> Response {
    let body = json!({ "error": message }).to_string();

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
}
