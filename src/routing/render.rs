//! Turning action results into HTTP responses
//!
//! Actions return an [`Outcome`] instead of writing to the response
//! themselves. The mapping is:
//!
//! | Outcome | Response |
//! |---|---|
//! | `NotFound` | 404, empty body |
//! | `Empty` | 200, empty body |
//! | `Json { status, body }` | `status`, JSON body |
//! | `Text { status, body }` | `status`, `text/plain` body |
//! | `Raw(response)` | `response` untouched |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::core::error::AppError;

/// What an action produced
#[derive(Debug)]
pub enum Outcome {
    /// The addressed resource does not exist
    NotFound,
    /// Success without a body
    Empty,
    /// Structured payload
    Json { status: StatusCode, body: Value },
    /// Plain text payload
    Text { status: StatusCode, body: String },
    /// The action built the response itself
    Raw(Response),
}

impl Outcome {
    /// 200 with `value` serialized as JSON
    pub fn json<T: Serialize>(value: &T) -> Result<Self, AppError> {
        let body = serde_json::to_value(value)
            .map_err(|e| AppError::internal(format!("failed to serialize response: {}", e)))?;
        Ok(Outcome::Json {
            status: StatusCode::OK,
            body,
        })
    }

    /// 201 with `value` serialized as JSON
    pub fn created<T: Serialize>(value: &T) -> Result<Self, AppError> {
        Ok(Self::json(value)?.with_status(StatusCode::CREATED))
    }

    /// 200 with `value` as JSON, or 404 when absent
    pub fn found<T: Serialize>(value: Option<T>) -> Result<Self, AppError> {
        match value {
            Some(value) => Self::json(&value),
            None => Ok(Outcome::NotFound),
        }
    }

    /// 200 with a plain text body
    pub fn text(body: impl Into<String>) -> Self {
        Outcome::Text {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// Override the status of a JSON or text outcome
    pub fn with_status(self, status: StatusCode) -> Self {
        match self {
            Outcome::Json { body, .. } => Outcome::Json { status, body },
            Outcome::Text { body, .. } => Outcome::Text { status, body },
            other => other,
        }
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Raw(response)
    }
}

/// Build the HTTP response for `outcome`
pub fn render(outcome: Outcome) -> Response {
    match outcome {
        Outcome::NotFound => StatusCode::NOT_FOUND.into_response(),
        Outcome::Empty => StatusCode::OK.into_response(),
        Outcome::Json { status, body } => (status, Json(body)).into_response(),
        Outcome::Text { status, body } => (status, body).into_response(),
        Outcome::Raw(response) => response,
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_TYPE;
    use serde_json::json;

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_is_empty_404() {
        let response = render(Outcome::found::<Value>(None).unwrap());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_empty_is_200_without_body() {
        let response = render(Outcome::Empty);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_json_keeps_status() {
        let response = render(Outcome::created(&json!({"id": "1"})).unwrap());
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"id":"1"}"#);
    }

    #[tokio::test]
    async fn test_arrays_are_json() {
        let response = render(Outcome::json(&vec![1, 2, 3]).unwrap());
        assert_eq!(body_string(response).await, "[1,2,3]");
    }

    #[tokio::test]
    async fn test_text_is_plain() {
        let response = render(Outcome::text("pong"));
        assert!(
            response.headers()[CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(body_string(response).await, "pong");
    }

    #[tokio::test]
    async fn test_raw_is_passed_through() {
        let raw = (StatusCode::ACCEPTED, "already written").into_response();
        let response = render(Outcome::from(raw));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, "already written");
    }
}
