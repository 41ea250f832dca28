//! Response builders shared by the webhook handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

/// What a webhook handler answers: a status and an optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Returns a 200 OK response with no body.
#[must_use]
pub fn ok_empty() -> WebhookResponse {
    WebhookResponse {
        status: StatusCode::OK,
        body: None,
    }
}

/// Returns a 200 OK response with the given JSON body.
#[must_use]
pub fn ok_json(body: Value) -> WebhookResponse {
    WebhookResponse {
        status: StatusCode::OK,
        body: Some(body),
    }
}

/// Returns an error response with the given status code and message.
#[must_use]
pub fn err_response(status: StatusCode, message: &str) -> WebhookResponse {
    WebhookResponse {
        status,
        body: Some(json!({ "error": message })),
    }
}

#[must_use]
pub fn method_not_allowed() -> WebhookResponse {
    err_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

#[must_use]
pub fn forbidden() -> WebhookResponse {
    err_response(StatusCode::FORBIDDEN, "forbidden")
}

#[must_use]
pub fn bad_request() -> WebhookResponse {
    err_response(StatusCode::BAD_REQUEST, "bad request")
}

#[must_use]
pub fn unprocessable() -> WebhookResponse {
    err_response(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable")
}
