//! REST endpoints for the onboarding wizard.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::error;

use crate::api::{ApiError, FormFields};
use crate::error::OnboardingError;

use super::service::OnboardingService;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub service: Arc<OnboardingService>,
}

/// GET /api/onboarding?applicationId | ?sessionId
///
/// Fetch by application id or by session. With neither, issue a new session
/// id. An unknown session is `application: null`, not an error.
async fn load(
    State(state): State<OnboardingRouteState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let form = FormFields::new(params);

    if form.get("applicationId").is_some() {
        let result = match form.required::<i64>("applicationId") {
            Ok(id) => state.service.get(id).await.map_err(ApiError::from),
            Err(e) => Err(e),
        };
        return match result {
            Ok(application) => {
                Json(json!({"application": application, "success": true})).into_response()
            }
            Err(ApiError::Internal(_)) => load_failed(),
            Err(e) => e.into_response(),
        };
    }

    if let Some(session_id) = form.get("sessionId") {
        return match state.service.get_by_session(session_id).await {
            Ok(application) => {
                Json(json!({"application": application, "success": true})).into_response()
            }
            Err(e) => {
                error!(error = %e, "Error loading onboarding data");
                load_failed()
            }
        };
    }

    Json(json!({
        "sessionId": OnboardingService::generate_session_id(),
        "success": true,
    }))
    .into_response()
}

/// Loader failure: the client still gets a session id to work with.
fn load_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Failed to load onboarding data",
            "sessionId": OnboardingService::fallback_session_id(),
        })),
    )
        .into_response()
}

/// POST /api/onboarding
///
/// Form-encoded; the `intent` field selects the action. `stepData` and
/// `formData` are JSON strings.
async fn action(
    State(state): State<OnboardingRouteState>,
    form: FormFields,
) -> Result<Response, ApiError> {
    let service = state.service.as_ref();

    match form.intent() {
        Some("start_onboarding") => {
            let app = service.start(form.get("sessionId")).await?;
            Ok(Json(json!({
                "success": true,
                "applicationId": app.id,
                "sessionId": app.session_id,
                "application": app.into_view(),
            }))
            .into_response())
        }
        Some("save_onboarding_step") => {
            let application_id: i64 = form.required("applicationId")?;
            let step_number: i64 = form.required("stepNumber")?;
            let step_data = form.json("stepData")?;
            let application = service
                .save_step(application_id, step_number, &step_data)
                .await?;
            Ok(Json(json!({
                "success": true,
                "application": application,
                "message": "Step saved successfully!",
            }))
            .into_response())
        }
        Some("auto_save_onboarding") => {
            let application_id: i64 = form.required("applicationId")?;
            let step_number: i64 = form.required("stepNumber")?;
            let form_data = form.json("formData")?;
            Ok(auto_save(service, application_id, step_number, &form_data).await)
        }
        Some("abandon_onboarding") => {
            let application_id: i64 = form.required("applicationId")?;
            let application = service.abandon(application_id).await?;
            Ok(Json(json!({"success": true, "application": application})).into_response())
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}

/// Auto-save reports client mistakes as usual; anything else is "Auto-save failed".
async fn auto_save(
    service: &OnboardingService,
    application_id: i64,
    step_number: i64,
    form_data: &Value,
) -> Response {
    match service
        .auto_save(application_id, step_number, form_data)
        .await
    {
        Ok(record) => Json(json!({
            "success": true,
            "message": "Auto-saved",
            "savedAt": record.saved_at,
        }))
        .into_response(),
        Err(OnboardingError::Database(e)) => {
            error!(application_id, error = %e, "Auto-save error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Auto-save failed"})),
            )
                .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding", get(load).post(action))
        .with_state(state)
}
