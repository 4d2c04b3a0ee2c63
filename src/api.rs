//! Shared HTTP plumbing: the JSON error envelope and form-field parsing.

use std::collections::HashMap;
use std::str::FromStr;

use axum::Json;
use axum::extract::{Form, FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{DatabaseError, OnboardingError, ValidationError};

/// Generic message for unexpected failures. Details only go to the log.
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

/// Error returned from a request handler.
///
/// Every variant renders as `{"success": false, "error": ...}`; validation
/// failures also carry `validationErrors`.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    BadRequest(String),
    NotFound(String),
    /// Logged when created; the client sees `message` only.
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// An unexpected failure reported with the generic message.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(context, error = %err, "Request failed");
        Self::Internal(GENERIC_ERROR.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(err) => json!({
                "success": false,
                "error": err.message,
                "validationErrors": err.errors,
            }),
            Self::BadRequest(message) | Self::NotFound(message) | Self::Internal(message) => {
                json!({"success": false, "error": message})
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, .. } => {
                Self::NotFound(format!("{} not found", title_case(&entity)))
            }
            other => Self::internal("database", other),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::NotFound { .. } => Self::not_found("Application not found"),
            OnboardingError::InvalidStep { .. } | OnboardingError::Closed { .. } => {
                Self::bad_request(err.to_string())
            }
            OnboardingError::InvalidData(message) => Self::BadRequest(message),
            OnboardingError::Validation(err) => Self::Validation(err),
            OnboardingError::Database(err) => err.into(),
        }
    }
}

/// Reply for a POST body that cannot be read as a form.
pub const INVALID_FORM: &str = "Invalid form submission";

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<HashMap<String, String>>::from_request(req, state).await {
            Ok(Form(fields)) => Ok(Self(fields)),
            Err(rejection) => {
                tracing::warn!(
                    status = %rejection.status(),
                    error = %rejection,
                    "Rejected form body"
                );
                Err(ApiError::bad_request(INVALID_FORM))
            }
        }
    }
}

/// `onboarding_application` → `Onboarding application`.
fn title_case(entity: &str) -> String {
    let spaced = entity.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

/// Submitted `application/x-www-form-urlencoded` fields.
///
/// Blank values are treated as absent throughout. As an extractor, a body
/// that is not a urlencoded form is answered with the JSON error envelope.
#[derive(Debug, Clone, Default)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }

    /// Trimmed, non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// The action selector.
    pub fn intent(&self) -> Option<&str> {
        self.get("intent")
    }

    /// Parse a required value, failing with `Invalid {key}`.
    pub fn required<T: FromStr>(&self, key: &str) -> Result<T, ApiError> {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {key}")))
    }

    /// Parse an optional value. Absent is `None`; present but unparsable is
    /// `Invalid {key}`.
    pub fn optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid {key}"))),
        }
    }

    /// Parse a JSON-encoded value, failing with `Invalid {key}`.
    pub fn json(&self, key: &str) -> Result<serde_json::Value, ApiError> {
        self.get(key)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {key}")))
    }
}

impl From<HashMap<String, String>> for FormFields {
    fn from(fields: HashMap<String, String>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn blank_fields_are_absent() {
        let f = form(&[("name", "  "), ("email", " a@b.co ")]);
        assert_eq!(f.get("name"), None);
        assert_eq!(f.get("email"), Some("a@b.co"));
        assert_eq!(f.get("missing"), None);
    }

    #[test]
    fn numeric_parsing() {
        let f = form(&[("clientId", "12"), ("hoursWorked", "abc"), ("projectId", "x")]);
        assert_eq!(f.required::<i64>("clientId").unwrap(), 12);
        assert!(matches!(
            f.required::<i64>("stepNumber"),
            Err(ApiError::BadRequest(msg)) if msg == "Invalid stepNumber"
        ));
        assert_eq!(f.optional::<i64>("missing").unwrap(), None);
        assert!(f.optional::<i64>("projectId").is_err());
    }

    #[test]
    fn json_field() {
        let f = form(&[("stepData", r#"{"firstName":"Ana"}"#), ("bad", "{")]);
        assert_eq!(f.json("stepData").unwrap()["firstName"], "Ana");
        assert!(f.json("bad").is_err());
    }

    #[tokio::test]
    async fn validation_envelope() {
        let (status, body) =
            body_json(ValidationError::field("email", "Please enter a valid email address").into())
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please enter a valid email address");
        assert_eq!(body["validationErrors"]["email"][0], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn database_errors_map_to_status() {
        let (status, body) = body_json(
            DatabaseError::NotFound {
                entity: "client".into(),
                id: "4".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Client not found");

        let (status, body) = body_json(DatabaseError::Query("disk I/O".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], GENERIC_ERROR);
    }

    #[tokio::test]
    async fn onboarding_errors_map_to_status() {
        let (status, body) = body_json(OnboardingError::NotFound { id: 9 }.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Application not found");

        let (status, _) = body_json(OnboardingError::InvalidStep { step: 7 }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn form_extractor_reads_urlencoded_body() {
        let req = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from("intent=contact&name=Priya+Patel"))
            .unwrap();
        let form = FormFields::from_request(req, &()).await.unwrap();
        assert_eq!(form.intent(), Some("contact"));
        assert_eq!(form.get("name"), Some("Priya Patel"));
    }

    #[tokio::test]
    async fn form_extractor_rejects_other_bodies_as_json() {
        for content_type in [None, Some("application/json")] {
            let mut builder = axum::http::Request::builder().method("POST");
            if let Some(content_type) = content_type {
                builder = builder.header("content-type", content_type);
            }
            let req = builder.body(axum::body::Body::from(r#"{"intent":"contact"}"#)).unwrap();
            let err = FormFields::from_request(req, &()).await.unwrap_err();
            let (status, body) = body_json(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], INVALID_FORM);
        }
    }
}
