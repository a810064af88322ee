//! Response classification and error reading.
//!
//! Success is decided by status code alone; the body is never consulted.
//! On failure, `read_api_error` picks between a structured service error
//! and a raw general error based on `has_json_content`.

use serde_json::Value;

use crate::body::{read_body, read_json_body};
use crate::error::ApiError;
use crate::http::RawResponse;

pub const HTTP_OK: u16 = 200;
pub const HTTP_ACCEPTED: u16 = 202;
pub const HTTP_NO_CONTENT: u16 = 204;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// True iff the status is exactly 200, 202 or 204.
pub fn is_success(response: &RawResponse) -> bool {
    matches!(response.status(), HTTP_OK | HTTP_ACCEPTED | HTTP_NO_CONTENT)
}

/// True iff the response announces a JSON body that is not explicitly empty.
///
/// The content type must be exactly `application/json`; a value carrying
/// parameters such as `; charset=utf-8` does not count.
pub fn has_json_content(response: &RawResponse) -> bool {
    response.header("content-type").map(str::trim) == Some(CONTENT_TYPE_JSON)
        && response.header("content-length").map(str::trim) != Some("0")
}

/// Build the error for a failed response, consuming its body.
pub async fn read_api_error(response: RawResponse) -> ApiError {
    if has_json_content(&response) {
        match read_json_body(response).await {
            Ok(body) => service_error(&body),
            Err(err) => err,
        }
    } else {
        let code = response.status();
        match read_body(response).await {
            Ok(message) => ApiError::General { message, code },
            Err(err) => err,
        }
    }
}

fn service_error(body: &Value) -> ApiError {
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    ApiError::Service {
        message: text("message"),
        code: body.get("code").and_then(Value::as_i64),
        reason: text("reason"),
    }
}
