//! REST endpoints for the CRM.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::api::{ApiError, FormFields};
use crate::config::ServerConfig;
use crate::error::ValidationError;
use crate::store::Database;

use super::model::{
    Client, ClientProject, ClientWithDetails, DashboardStats, NewProgressUpdate, UpdateType,
};
use super::validate;

/// Progress updates shown on the dashboard.
const DASHBOARD_RECENT_UPDATES: u32 = 5;
/// Progress updates included in a client's detail view.
const DETAIL_RECENT_UPDATES: u32 = 10;

/// Shared state for CRM routes.
#[derive(Clone)]
pub struct ClientRouteState {
    pub db: Arc<dyn Database>,
    pub config: Arc<ServerConfig>,
}

/// Resolve `limit`/`offset` query values. Missing or malformed values fall
/// back to defaults; `limit` is capped at the configured maximum.
fn page(params: &HashMap<String, String>, config: &ServerConfig) -> (u32, u32) {
    let limit = params
        .get("limit")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(config.default_page_size)
        .min(config.max_page_size);
    let offset = params
        .get("offset")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);
    (limit, offset)
}

/// GET /api/clients?limit&offset&search
///
/// A page of clients (or search hits) together with dashboard stats.
async fn list_clients(
    State(state): State<ClientRouteState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (limit, offset) = page(&params, &state.config);
    let search = params.get("search").map(|s| s.trim()).unwrap_or("");

    let clients = if search.is_empty() {
        state.db.list_clients(limit, offset).await
    } else {
        state.db.search_clients(search, limit).await
    };
    let loaded = match clients {
        Ok(clients) => state
            .db
            .dashboard_stats(DASHBOARD_RECENT_UPDATES)
            .await
            .map(|stats| (clients, stats)),
        Err(e) => Err(e),
    };

    match loaded {
        Ok((clients, dashboard_stats)) => Json(json!({
            "clients": clients,
            "dashboardStats": dashboard_stats,
            "success": true,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Error loading clients");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "clients": [],
                    "dashboardStats": DashboardStats::default(),
                    "success": false,
                    "error": "Failed to load clients",
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/clients/{id}
///
/// The client with its projects, documents, recent updates and communications.
async fn get_client(
    State(state): State<ClientRouteState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid client ID"))?;
    let client = require_client(state.db.as_ref(), id).await?;

    let details = ClientWithDetails {
        projects: state.db.list_projects(id).await?,
        documents: state.db.list_documents(id).await?,
        recent_updates: state
            .db
            .list_progress_updates(id, DETAIL_RECENT_UPDATES)
            .await?,
        communications: state.db.list_communications(id).await?,
        client,
    };

    Ok(Json(json!({"success": true, "client": details})))
}

/// POST /api/clients
///
/// Form-encoded; the `intent` field selects the action.
async fn client_action(
    State(state): State<ClientRouteState>,
    form: FormFields,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.as_ref();
    let author = state.config.default_author;

    match form.intent() {
        Some("create_client") => create_client(db, &form, state.config.default_assignee).await,
        Some("update_client_status") => {
            let client_id: i64 = form.required("clientId")?;
            let status = validate::client_status(&form)?;
            let client = db
                .update_client_status(client_id, status)
                .await?
                .ok_or_else(|| ApiError::not_found("Client not found"))?;
            info!(client_id, status = %status, "Client status updated");
            Ok(Json(json!({"success": true, "client": client})))
        }
        Some("add_progress_update") => {
            let client_id: i64 = form.required("clientId")?;
            let project_id: Option<i64> = form.optional("projectId")?;
            require_client(db, client_id).await?;
            if let Some(project_id) = project_id {
                require_project_of(db, client_id, project_id).await?;
            }
            let update = validate::new_progress_update(&form, client_id, project_id, author)?;
            let update = db.insert_progress_update(&update).await?;
            info!(client_id, update_id = update.id, "Progress update added");
            Ok(Json(json!({"success": true, "update": update})))
        }
        Some("create_project") => {
            let client_id: i64 = form.required("clientId")?;
            require_client(db, client_id).await?;
            let project = validate::new_project(&form, client_id)?;
            let project = db.insert_project(&project).await?;
            info!(client_id, project_id = project.id, "Project created");
            Ok(Json(json!({"success": true, "project": project})))
        }
        Some("update_project_progress") => update_project_progress(db, &form, author).await,
        Some("add_document") => {
            let client_id: i64 = form.required("clientId")?;
            let project_id: Option<i64> = form.optional("projectId")?;
            require_client(db, client_id).await?;
            if let Some(project_id) = project_id {
                require_project_of(db, client_id, project_id).await?;
            }
            let document = validate::new_document(&form, client_id, project_id, author)?;
            let document = db.insert_document(&document).await?;
            info!(client_id, document_id = document.id, "Document recorded");
            Ok(Json(json!({"success": true, "document": document})))
        }
        Some("review_document") => {
            let document_id: i64 = form.required("documentId")?;
            let reviewer = form.optional("reviewedBy")?.unwrap_or(author);
            let review = validate::document_review(&form, reviewer)?;
            let document = db
                .review_document(document_id, &review)
                .await?
                .ok_or_else(|| ApiError::not_found("Document not found"))?;
            info!(document_id, status = %document.status, "Document reviewed");
            Ok(Json(json!({"success": true, "document": document})))
        }
        Some("log_communication") => {
            let client_id: i64 = form.required("clientId")?;
            let project_id: Option<i64> = form.optional("projectId")?;
            require_client(db, client_id).await?;
            if let Some(project_id) = project_id {
                require_project_of(db, client_id, project_id).await?;
            }
            let communication = validate::new_communication(&form, client_id, project_id, author)?;
            let communication = db.insert_communication(&communication).await?;
            info!(client_id, communication_id = communication.id, "Communication logged");
            Ok(Json(json!({"success": true, "communication": communication})))
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}

async fn create_client(
    db: &dyn Database,
    form: &FormFields,
    assignee: i64,
) -> Result<Json<Value>, ApiError> {
    let new_client = validate::new_client(form, assignee)?;

    if db.get_client_by_email(&new_client.email).await?.is_some() {
        return Err(ValidationError::field("email", validate::DUPLICATE_EMAIL).into());
    }

    let client = match db.insert_client(&new_client).await {
        Ok(client) => client,
        // Lost a race with a concurrent insert of the same email.
        Err(e) if e.is_unique_violation("clients.email") => {
            return Err(ValidationError::field("email", validate::DUPLICATE_EMAIL).into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(client_id = client.id, "Client created");
    Ok(Json(json!({"success": true, "client": client})))
}

/// Set progress (and optionally status). A status change is also written to
/// the client's progress log.
async fn update_project_progress(
    db: &dyn Database,
    form: &FormFields,
    author: i64,
) -> Result<Json<Value>, ApiError> {
    let project_id: i64 = form.required("projectId")?;
    let (progress, status) = validate::project_progress(form)?;

    let before = db
        .get_project(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    let project = db
        .update_project_progress(project_id, progress, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let update = if project.status != before.status {
        let logged = db
            .insert_progress_update(&NewProgressUpdate {
                client_id: project.client_id,
                project_id: Some(project.id),
                title: format!("{} status changed", project.title),
                description: format!(
                    "Status changed from {} to {}",
                    before.status, project.status
                ),
                update_type: UpdateType::StatusChange,
                previous_status: Some(before.status.to_string()),
                new_status: Some(project.status.to_string()),
                hours_worked: 0,
                created_by: author,
                metadata: None,
            })
            .await?;
        Some(logged)
    } else {
        None
    };

    info!(project_id, progress, status = %project.status, "Project progress updated");
    Ok(Json(json!({"success": true, "project": project, "update": update})))
}

async fn require_client(db: &dyn Database, id: i64) -> Result<Client, ApiError> {
    db.get_client(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))
}

/// The project must exist and belong to `client_id`. Another client's
/// project is reported exactly like a missing one.
async fn require_project_of(
    db: &dyn Database,
    client_id: i64,
    project_id: i64,
) -> Result<ClientProject, ApiError> {
    db.get_project(project_id)
        .await?
        .filter(|project| project.client_id == client_id)
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

/// Build the CRM REST routes.
pub fn client_routes(state: ClientRouteState) -> Router {
    Router::new()
        .route("/api/clients", get(list_clients).post(client_action))
        .route("/api/clients/{id}", get(get_client))
        .with_state(state)
}
