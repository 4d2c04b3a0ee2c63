//! REST endpoints for the public site: landing content and the contact form.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::api::{ApiError, FormFields, INVALID_FORM};
use crate::store::Database;
use crate::validation::is_valid_email;

use super::content;
use super::model::NewContactLead;

pub const CONTACT_THANKS: &str =
    "Thank you for your inquiry! We'll get back to you within 24 hours.";

/// Shared state for site routes.
#[derive(Clone)]
pub struct SiteRouteState {
    pub db: Arc<dyn Database>,
}

/// GET /api/site
async fn landing() -> impl IntoResponse {
    Json(content::landing())
}

/// Check a contact submission. Only the first problem is reported.
fn contact_lead(form: &FormFields) -> Result<NewContactLead, ApiError> {
    let (Some(name), Some(email), Some(message)) =
        (form.text("name"), form.text("email"), form.text("message"))
    else {
        return Err(ApiError::bad_request("Please fill in all required fields"));
    };
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Please enter a valid email address"));
    }
    Ok(NewContactLead {
        name,
        email,
        company: form.text("company"),
        country: form.text("country"),
        message,
    })
}

/// POST /api/contact
async fn contact(
    State(state): State<SiteRouteState>,
    form: FormFields,
) -> Result<Json<Value>, ApiError> {
    if form.intent() != Some("contact") {
        return Err(ApiError::bad_request(INVALID_FORM));
    }

    let lead = contact_lead(&form)?;
    let lead = state.db.insert_contact_lead(&lead).await?;
    info!(
        lead_id = lead.id,
        email = %lead.email,
        country = lead.country.as_deref().unwrap_or("-"),
        "Contact form submission"
    );

    Ok(Json(json!({"success": true, "message": CONTACT_THANKS})))
}

/// Build the site REST routes.
pub fn site_routes(state: SiteRouteState) -> Router {
    Router::new()
        .route("/api/site", get(landing))
        .route("/api/contact", post(contact))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[test]
    fn contact_requires_name_email_message() {
        let err = contact_lead(&form(&[("name", "Li"), ("email", "li@example.cn")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Please fill in all required fields"));
    }

    #[test]
    fn contact_checks_email_format() {
        let err = contact_lead(&form(&[
            ("name", "Li"),
            ("email", "li@example"),
            ("message", "Hello"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Please enter a valid email address"));
    }

    #[test]
    fn contact_keeps_optional_fields() {
        let lead = contact_lead(&form(&[
            ("name", "Li Wei"),
            ("email", "li@example.cn"),
            ("message", "Do you support Delaware C-corps?"),
            ("country", "China"),
        ]))
        .unwrap();
        assert_eq!(lead.country.as_deref(), Some("China"));
        assert!(lead.company.is_none());
    }
}
