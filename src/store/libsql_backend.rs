//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Rows are returned with
//! `INSERT ... RETURNING` / `UPDATE ... RETURNING` so callers always get the
//! stored representation back.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::clients::model::{
    Client, ClientCommunication, ClientDocument, ClientProject, ClientStatus, DashboardStats,
    DocumentReview, NewClient, NewCommunication, NewDocument, NewProgressUpdate, NewProject,
    ProgressUpdate, ProjectStatus,
};
use crate::error::DatabaseError;
use crate::onboarding::model::{
    AutoSaveRecord, FieldCheck, OnboardingApplication, OnboardingStatus, StepValidationRecord,
    auto_save_key,
};
use crate::site::model::{ContactLead, NewContactLead};
use crate::store::migrations;
use crate::store::traits::Database;
use crate::validation::FieldErrors;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Open(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        // Foreign keys are per-connection in SQLite.
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Open(format!("PRAGMA foreign_keys: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a query and map the first row, if any.
    async fn fetch_optional<T>(
        &self,
        context: &str,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Option<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::from_write(context, e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(map(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::from_write(context, e)),
        }
    }

    /// Run a query and map every row.
    async fn fetch_all<T>(
        &self,
        context: &str,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::from_write(context, e))?;

        let mut out = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => out.push(map(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::from_write(context, e)),
            }
        }
        Ok(out)
    }

    /// Run an `INSERT ... RETURNING` and map the inserted row.
    async fn insert_returning<T>(
        &self,
        context: &str,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        self.fetch_optional(context, sql, params, map)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("{context}: no row returned")))
    }

    async fn count(&self, context: &str, sql: &str) -> Result<i64, DatabaseError> {
        Ok(self
            .fetch_optional(context, sql, (), |row| get_i64(row, 0, "count"))
            .await?
            .unwrap_or(0))
    }

    async fn recent_updates(&self, limit: u32) -> Result<Vec<ProgressUpdate>, DatabaseError> {
        self.fetch_all(
            "recent_updates",
            &format!(
                "SELECT {UPDATE_COLUMNS} FROM progress_updates ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            params![limit as i64],
            row_to_update,
        )
        .await
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format for timestamps. Fixed width so TEXT ordering is
/// chronological.
fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e} in {s:?}")))
}

/// Nullable timestamp column; an empty string counts as NULL.
fn opt_datetime(
    row: &libsql::Row,
    idx: i32,
    column: &str,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    opt_string(row, idx)
        .filter(|s| !s.is_empty())
        .map(|s| parse_datetime(&s, column))
        .transpose()
}

fn get_i64(row: &libsql::Row, idx: i32, column: &str) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx)
        .map_err(|e| DatabaseError::Query(format!("{column}: {e}")))
}

fn get_string(row: &libsql::Row, idx: i32, column: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{column}: {e}")))
}

/// NULL (or a type mismatch) reads as `None`.
fn opt_string(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

fn opt_i64(row: &libsql::Row, idx: i32) -> Option<i64> {
    row.get::<i64>(idx).ok()
}

fn get_datetime(row: &libsql::Row, idx: i32, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    parse_datetime(&get_string(row, idx, column)?, column)
}

/// Parse a TEXT enum column.
fn get_enum<T>(row: &libsql::Row, idx: i32, column: &str) -> Result<T, DatabaseError>
where
    T: FromStr<Err = String>,
{
    get_string(row, idx, column)?
        .parse()
        .map_err(|e: String| DatabaseError::Serialization(format!("{column}: {e}")))
}

/// Lenient JSON column read: NULL, empty or malformed JSON reads as `None`.
fn opt_json<T: DeserializeOwned>(row: &libsql::Row, idx: i32) -> Option<T> {
    opt_string(row, idx)
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(&s).ok())
}

fn json_value<T: Serialize>(value: Option<&T>) -> Result<Value, DatabaseError> {
    match value {
        Some(v) => serde_json::to_string(v)
            .map(Value::Text)
            .map_err(|e| DatabaseError::Serialization(e.to_string())),
        None => Ok(Value::Null),
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_int(n: Option<i64>) -> Value {
    match n {
        Some(n) => Value::Integer(n),
        None => Value::Null,
    }
}

fn opt_ts(dt: Option<&DateTime<Utc>>) -> Value {
    match dt {
        Some(dt) => Value::Text(ts(dt)),
        None => Value::Null,
    }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ── Row mappers ─────────────────────────────────────────────────────

const CLIENT_COLUMNS: &str = "id, first_name, last_name, email, phone, company, status, notes, assigned_to, created_at, updated_at, metadata";

fn row_to_client(row: &libsql::Row) -> Result<Client, DatabaseError> {
    Ok(Client {
        id: get_i64(row, 0, "client.id")?,
        first_name: get_string(row, 1, "client.first_name")?,
        last_name: get_string(row, 2, "client.last_name")?,
        email: get_string(row, 3, "client.email")?,
        phone: opt_string(row, 4),
        company: opt_string(row, 5),
        status: get_enum(row, 6, "client.status")?,
        notes: opt_string(row, 7),
        assigned_to: opt_i64(row, 8),
        created_at: get_datetime(row, 9, "client.created_at")?,
        updated_at: get_datetime(row, 10, "client.updated_at")?,
        metadata: opt_json(row, 11),
    })
}

const PROJECT_COLUMNS: &str = "id, client_id, title, description, status, progress, start_date, end_date, estimated_hours, actual_hours, budget, created_at, updated_at";

fn row_to_project(row: &libsql::Row) -> Result<ClientProject, DatabaseError> {
    let budget = match opt_string(row, 10).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            Decimal::from_str(&raw)
                .map_err(|e| DatabaseError::Serialization(format!("project.budget: {e}")))?,
        ),
        None => None,
    };

    Ok(ClientProject {
        id: get_i64(row, 0, "project.id")?,
        client_id: get_i64(row, 1, "project.client_id")?,
        title: get_string(row, 2, "project.title")?,
        description: opt_string(row, 3),
        status: get_enum(row, 4, "project.status")?,
        progress: get_i64(row, 5, "project.progress")?,
        start_date: opt_datetime(row, 6, "project.start_date")?,
        end_date: opt_datetime(row, 7, "project.end_date")?,
        estimated_hours: opt_i64(row, 8),
        actual_hours: opt_i64(row, 9).unwrap_or(0),
        budget,
        created_at: get_datetime(row, 11, "project.created_at")?,
        updated_at: get_datetime(row, 12, "project.updated_at")?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, client_id, project_id, title, description, file_name, file_path, file_size, mime_type, status, uploaded_by, reviewed_by, review_notes, created_at, updated_at";

fn row_to_document(row: &libsql::Row) -> Result<ClientDocument, DatabaseError> {
    Ok(ClientDocument {
        id: get_i64(row, 0, "document.id")?,
        client_id: get_i64(row, 1, "document.client_id")?,
        project_id: opt_i64(row, 2),
        title: get_string(row, 3, "document.title")?,
        description: opt_string(row, 4),
        file_name: get_string(row, 5, "document.file_name")?,
        file_path: get_string(row, 6, "document.file_path")?,
        file_size: get_i64(row, 7, "document.file_size")?,
        mime_type: get_string(row, 8, "document.mime_type")?,
        status: get_enum(row, 9, "document.status")?,
        uploaded_by: opt_i64(row, 10),
        reviewed_by: opt_i64(row, 11),
        review_notes: opt_string(row, 12),
        created_at: get_datetime(row, 13, "document.created_at")?,
        updated_at: get_datetime(row, 14, "document.updated_at")?,
    })
}

const UPDATE_COLUMNS: &str = "id, client_id, project_id, title, description, update_type, previous_status, new_status, hours_worked, created_by, created_at, metadata";

fn row_to_update(row: &libsql::Row) -> Result<ProgressUpdate, DatabaseError> {
    Ok(ProgressUpdate {
        id: get_i64(row, 0, "update.id")?,
        client_id: get_i64(row, 1, "update.client_id")?,
        project_id: opt_i64(row, 2),
        title: get_string(row, 3, "update.title")?,
        description: get_string(row, 4, "update.description")?,
        update_type: get_enum(row, 5, "update.update_type")?,
        previous_status: opt_string(row, 6),
        new_status: opt_string(row, 7),
        hours_worked: opt_i64(row, 8).unwrap_or(0),
        created_by: get_i64(row, 9, "update.created_by")?,
        created_at: get_datetime(row, 10, "update.created_at")?,
        metadata: opt_json(row, 11),
    })
}

const COMMUNICATION_COLUMNS: &str = "id, client_id, project_id, type, subject, content, direction, created_by, created_at, scheduled_for, completed_at, metadata";

fn row_to_communication(row: &libsql::Row) -> Result<ClientCommunication, DatabaseError> {
    Ok(ClientCommunication {
        id: get_i64(row, 0, "communication.id")?,
        client_id: get_i64(row, 1, "communication.client_id")?,
        project_id: opt_i64(row, 2),
        kind: get_enum(row, 3, "communication.type")?,
        subject: get_string(row, 4, "communication.subject")?,
        content: get_string(row, 5, "communication.content")?,
        direction: get_enum(row, 6, "communication.direction")?,
        created_by: get_i64(row, 7, "communication.created_by")?,
        created_at: get_datetime(row, 8, "communication.created_at")?,
        scheduled_for: opt_datetime(row, 9, "communication.scheduled_for")?,
        completed_at: opt_datetime(row, 10, "communication.completed_at")?,
        metadata: opt_json(row, 11),
    })
}

const APPLICATION_COLUMNS: &str = "id, user_id, session_id, status, current_step, total_steps, \
    first_name, last_name, email, phone, \
    passport_number, passport_country, passport_expiry_date, passport_image_url, \
    street_address, city, state, zip_code, country, \
    business_name, business_type, business_description, business_industry, estimated_revenue, \
    completed_steps, validation_errors, auto_save_data, \
    created_at, updated_at, completed_at, last_saved_at";

fn row_to_application(row: &libsql::Row) -> Result<OnboardingApplication, DatabaseError> {
    let passport_expiry_date = opt_string(row, 12)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

    let business_type = match opt_string(row, 20).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse().map_err(|e: String| {
            DatabaseError::Serialization(format!("application.business_type: {e}"))
        })?),
        None => None,
    };

    Ok(OnboardingApplication {
        id: get_i64(row, 0, "application.id")?,
        user_id: opt_i64(row, 1),
        session_id: get_string(row, 2, "application.session_id")?,
        status: get_enum(row, 3, "application.status")?,
        current_step: get_i64(row, 4, "application.current_step")?,
        total_steps: get_i64(row, 5, "application.total_steps")?,
        first_name: opt_string(row, 6),
        last_name: opt_string(row, 7),
        email: opt_string(row, 8),
        phone: opt_string(row, 9),
        passport_number: opt_string(row, 10),
        passport_country: opt_string(row, 11),
        passport_expiry_date,
        passport_image_url: opt_string(row, 13),
        street_address: opt_string(row, 14),
        city: opt_string(row, 15),
        state: opt_string(row, 16),
        zip_code: opt_string(row, 17),
        country: opt_string(row, 18),
        business_name: opt_string(row, 19),
        business_type,
        business_description: opt_string(row, 21),
        business_industry: opt_string(row, 22),
        estimated_revenue: opt_string(row, 23),
        completed_steps: opt_json(row, 24).unwrap_or_default(),
        validation_errors: opt_json(row, 25),
        auto_save_data: opt_json(row, 26),
        created_at: get_datetime(row, 27, "application.created_at")?,
        updated_at: get_datetime(row, 28, "application.updated_at")?,
        completed_at: opt_datetime(row, 29, "application.completed_at")?,
        last_saved_at: get_datetime(row, 30, "application.last_saved_at")?,
    })
}

const VALIDATION_COLUMNS: &str =
    "id, application_id, step_number, field_name, is_valid, error_message, validated_at";

fn row_to_step_validation(row: &libsql::Row) -> Result<StepValidationRecord, DatabaseError> {
    Ok(StepValidationRecord {
        id: get_i64(row, 0, "validation.id")?,
        application_id: get_i64(row, 1, "validation.application_id")?,
        step_number: get_i64(row, 2, "validation.step_number")?,
        field_name: get_string(row, 3, "validation.field_name")?,
        is_valid: get_i64(row, 4, "validation.is_valid")? != 0,
        error_message: opt_string(row, 5),
        validated_at: get_datetime(row, 6, "validation.validated_at")?,
    })
}

const AUTO_SAVE_COLUMNS: &str = "id, application_id, step_number, form_data, saved_at";

fn row_to_auto_save(row: &libsql::Row) -> Result<AutoSaveRecord, DatabaseError> {
    let raw = get_string(row, 3, "auto_save.form_data")?;
    let form_data = serde_json::from_str(&raw)
        .map_err(|e| DatabaseError::Serialization(format!("auto_save.form_data: {e}")))?;
    Ok(AutoSaveRecord {
        id: get_i64(row, 0, "auto_save.id")?,
        application_id: get_i64(row, 1, "auto_save.application_id")?,
        step_number: get_i64(row, 2, "auto_save.step_number")?,
        form_data,
        saved_at: get_datetime(row, 4, "auto_save.saved_at")?,
    })
}

const LEAD_COLUMNS: &str = "id, name, email, company, country, message, created_at";

fn row_to_lead(row: &libsql::Row) -> Result<ContactLead, DatabaseError> {
    Ok(ContactLead {
        id: get_i64(row, 0, "lead.id")?,
        name: get_string(row, 1, "lead.name")?,
        email: get_string(row, 2, "lead.email")?,
        company: opt_string(row, 3),
        country: opt_string(row, 4),
        message: get_string(row, 5, "lead.message")?,
        created_at: get_datetime(row, 6, "lead.created_at")?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Clients ─────────────────────────────────────────────────────

    async fn insert_client(&self, client: &NewClient) -> Result<Client, DatabaseError> {
        let now = now_str();
        let created = self
            .insert_returning(
                "insert_client",
                &format!(
                    "INSERT INTO clients (first_name, last_name, email, phone, company, status, notes, assigned_to, created_at, updated_at, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)
                     RETURNING {CLIENT_COLUMNS}"
                ),
                params![
                    client.first_name.as_str(),
                    client.last_name.as_str(),
                    client.email.as_str(),
                    opt_text(client.phone.as_deref()),
                    opt_text(client.company.as_deref()),
                    client.status.as_str(),
                    opt_text(client.notes.as_deref()),
                    opt_int(client.assigned_to),
                    now,
                    json_value(client.metadata.as_ref())?,
                ],
                row_to_client,
            )
            .await?;
        debug!(id = created.id, email = %created.email, "Client created");
        Ok(created)
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, DatabaseError> {
        self.fetch_optional(
            "get_client",
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
            params![id],
            row_to_client,
        )
        .await
    }

    async fn get_client_by_email(&self, email: &str) -> Result<Option<Client>, DatabaseError> {
        self.fetch_optional(
            "get_client_by_email",
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE email = ?1"),
            params![email],
            row_to_client,
        )
        .await
    }

    async fn list_clients(&self, limit: u32, offset: u32) -> Result<Vec<Client>, DatabaseError> {
        self.fetch_all(
            "list_clients",
            &format!(
                "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
            ),
            params![limit as i64, offset as i64],
            row_to_client,
        )
        .await
    }

    async fn search_clients(&self, query: &str, limit: u32) -> Result<Vec<Client>, DatabaseError> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        self.fetch_all(
            "search_clients",
            &format!(
                "SELECT {CLIENT_COLUMNS} FROM clients
                 WHERE lower(first_name) LIKE ?1 ESCAPE '\\'
                    OR lower(last_name) LIKE ?1 ESCAPE '\\'
                    OR lower(first_name || ' ' || last_name) LIKE ?1 ESCAPE '\\'
                    OR lower(email) LIKE ?1 ESCAPE '\\'
                    OR lower(COALESCE(company, '')) LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ),
            params![pattern, limit as i64],
            row_to_client,
        )
        .await
    }

    async fn update_client_status(
        &self,
        id: i64,
        status: ClientStatus,
    ) -> Result<Option<Client>, DatabaseError> {
        let updated = self
            .fetch_optional(
                "update_client_status",
                &format!(
                    "UPDATE clients SET status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {CLIENT_COLUMNS}"
                ),
                params![status.as_str(), now_str(), id],
                row_to_client,
            )
            .await?;
        if updated.is_some() {
            debug!(id, status = %status, "Client status updated");
        }
        Ok(updated)
    }

    async fn dashboard_stats(&self, recent_limit: u32) -> Result<DashboardStats, DatabaseError> {
        let total_clients = self
            .count("dashboard_stats.clients", "SELECT COUNT(*) FROM clients")
            .await?;
        let active_projects = self
            .count(
                "dashboard_stats.projects",
                "SELECT COUNT(*) FROM client_projects WHERE status = 'in_progress'",
            )
            .await?;
        let pending_documents = self
            .count(
                "dashboard_stats.documents",
                "SELECT COUNT(*) FROM client_documents WHERE status IN ('pending', 'uploaded')",
            )
            .await?;
        let recent_updates = self.recent_updates(recent_limit).await?;

        Ok(DashboardStats {
            total_clients,
            active_projects,
            pending_documents,
            recent_updates,
        })
    }

    // ── Projects ────────────────────────────────────────────────────

    async fn insert_project(&self, project: &NewProject) -> Result<ClientProject, DatabaseError> {
        let now = now_str();
        let created = self
            .insert_returning(
                "insert_project",
                &format!(
                    "INSERT INTO client_projects (client_id, title, description, status, progress, start_date, end_date, estimated_hours, actual_hours, budget, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?10)
                     RETURNING {PROJECT_COLUMNS}"
                ),
                params![
                    project.client_id,
                    project.title.as_str(),
                    opt_text(project.description.as_deref()),
                    project.status.as_str(),
                    project.progress,
                    opt_ts(project.start_date.as_ref()),
                    opt_ts(project.end_date.as_ref()),
                    opt_int(project.estimated_hours),
                    opt_text(project.budget.map(|b| b.round_dp(2).to_string()).as_deref()),
                    now,
                ],
                row_to_project,
            )
            .await?;
        debug!(id = created.id, client_id = created.client_id, "Project created");
        Ok(created)
    }

    async fn get_project(&self, id: i64) -> Result<Option<ClientProject>, DatabaseError> {
        self.fetch_optional(
            "get_project",
            &format!("SELECT {PROJECT_COLUMNS} FROM client_projects WHERE id = ?1"),
            params![id],
            row_to_project,
        )
        .await
    }

    async fn list_projects(&self, client_id: i64) -> Result<Vec<ClientProject>, DatabaseError> {
        self.fetch_all(
            "list_projects",
            &format!(
                "SELECT {PROJECT_COLUMNS} FROM client_projects WHERE client_id = ?1 ORDER BY created_at DESC, id DESC"
            ),
            params![client_id],
            row_to_project,
        )
        .await
    }

    async fn update_project_progress(
        &self,
        id: i64,
        progress: i64,
        status: Option<ProjectStatus>,
    ) -> Result<Option<ClientProject>, DatabaseError> {
        self.fetch_optional(
            "update_project_progress",
            &format!(
                "UPDATE client_projects SET progress = ?1, status = COALESCE(?2, status), updated_at = ?3
                 WHERE id = ?4 RETURNING {PROJECT_COLUMNS}"
            ),
            params![
                progress,
                opt_text(status.as_ref().map(ProjectStatus::as_str)),
                now_str(),
                id
            ],
            row_to_project,
        )
        .await
    }

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(
        &self,
        document: &NewDocument,
    ) -> Result<ClientDocument, DatabaseError> {
        let now = now_str();
        self.insert_returning(
            "insert_document",
            &format!(
                "INSERT INTO client_documents (client_id, project_id, title, description, file_name, file_path, file_size, mime_type, status, uploaded_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 RETURNING {DOCUMENT_COLUMNS}"
            ),
            params![
                document.client_id,
                opt_int(document.project_id),
                document.title.as_str(),
                opt_text(document.description.as_deref()),
                document.file_name.as_str(),
                document.file_path.as_str(),
                document.file_size,
                document.mime_type.as_str(),
                document.status.as_str(),
                opt_int(document.uploaded_by),
                now,
            ],
            row_to_document,
        )
        .await
    }

    async fn list_documents(&self, client_id: i64) -> Result<Vec<ClientDocument>, DatabaseError> {
        self.fetch_all(
            "list_documents",
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM client_documents WHERE client_id = ?1 ORDER BY created_at DESC, id DESC"
            ),
            params![client_id],
            row_to_document,
        )
        .await
    }

    async fn review_document(
        &self,
        id: i64,
        review: &DocumentReview,
    ) -> Result<Option<ClientDocument>, DatabaseError> {
        self.fetch_optional(
            "review_document",
            &format!(
                "UPDATE client_documents SET status = ?1, reviewed_by = ?2, review_notes = ?3, updated_at = ?4
                 WHERE id = ?5 RETURNING {DOCUMENT_COLUMNS}"
            ),
            params![
                review.status.as_str(),
                review.reviewed_by,
                opt_text(review.review_notes.as_deref()),
                now_str(),
                id
            ],
            row_to_document,
        )
        .await
    }

    // ── Progress updates ────────────────────────────────────────────

    async fn insert_progress_update(
        &self,
        update: &NewProgressUpdate,
    ) -> Result<ProgressUpdate, DatabaseError> {
        self.insert_returning(
            "insert_progress_update",
            &format!(
                "INSERT INTO progress_updates (client_id, project_id, title, description, update_type, previous_status, new_status, hours_worked, created_by, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING {UPDATE_COLUMNS}"
            ),
            params![
                update.client_id,
                opt_int(update.project_id),
                update.title.as_str(),
                update.description.as_str(),
                update.update_type.as_str(),
                opt_text(update.previous_status.as_deref()),
                opt_text(update.new_status.as_deref()),
                update.hours_worked,
                update.created_by,
                now_str(),
                json_value(update.metadata.as_ref())?,
            ],
            row_to_update,
        )
        .await
    }

    async fn list_progress_updates(
        &self,
        client_id: i64,
        limit: u32,
    ) -> Result<Vec<ProgressUpdate>, DatabaseError> {
        self.fetch_all(
            "list_progress_updates",
            &format!(
                "SELECT {UPDATE_COLUMNS} FROM progress_updates WHERE client_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ),
            params![client_id, limit as i64],
            row_to_update,
        )
        .await
    }

    // ── Communications ──────────────────────────────────────────────

    async fn insert_communication(
        &self,
        communication: &NewCommunication,
    ) -> Result<ClientCommunication, DatabaseError> {
        self.insert_returning(
            "insert_communication",
            &format!(
                "INSERT INTO client_communications (client_id, project_id, type, subject, content, direction, created_by, created_at, scheduled_for, completed_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING {COMMUNICATION_COLUMNS}"
            ),
            params![
                communication.client_id,
                opt_int(communication.project_id),
                communication.kind.as_str(),
                communication.subject.as_str(),
                communication.content.as_str(),
                communication.direction.as_str(),
                communication.created_by,
                now_str(),
                opt_ts(communication.scheduled_for.as_ref()),
                opt_ts(communication.completed_at.as_ref()),
                json_value(communication.metadata.as_ref())?,
            ],
            row_to_communication,
        )
        .await
    }

    async fn list_communications(
        &self,
        client_id: i64,
    ) -> Result<Vec<ClientCommunication>, DatabaseError> {
        self.fetch_all(
            "list_communications",
            &format!(
                "SELECT {COMMUNICATION_COLUMNS} FROM client_communications WHERE client_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            params![client_id],
            row_to_communication,
        )
        .await
    }

    // ── Onboarding ──────────────────────────────────────────────────

    async fn insert_application(
        &self,
        session_id: &str,
    ) -> Result<OnboardingApplication, DatabaseError> {
        let app = OnboardingApplication::new(session_id);
        let created = self
            .insert_returning(
                "insert_application",
                &format!(
                    "INSERT INTO onboarding_applications (session_id, status, current_step, total_steps, completed_steps, created_at, updated_at, last_saved_at)
                     VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?5, ?5)
                     RETURNING {APPLICATION_COLUMNS}"
                ),
                params![
                    app.session_id.as_str(),
                    app.status.as_str(),
                    app.current_step,
                    app.total_steps,
                    ts(&app.created_at),
                ],
                row_to_application,
            )
            .await?;
        debug!(id = created.id, session_id, "Onboarding application created");
        Ok(created)
    }

    async fn get_application(
        &self,
        id: i64,
    ) -> Result<Option<OnboardingApplication>, DatabaseError> {
        self.fetch_optional(
            "get_application",
            &format!("SELECT {APPLICATION_COLUMNS} FROM onboarding_applications WHERE id = ?1"),
            params![id],
            row_to_application,
        )
        .await
    }

    async fn get_application_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OnboardingApplication>, DatabaseError> {
        self.fetch_optional(
            "get_application_by_session",
            &format!(
                "SELECT {APPLICATION_COLUMNS} FROM onboarding_applications WHERE session_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ),
            params![session_id],
            row_to_application,
        )
        .await
    }

    async fn update_application(&self, app: &OnboardingApplication) -> Result<(), DatabaseError> {
        let expiry = app
            .passport_expiry_date
            .map(|d| d.format("%Y-%m-%d").to_string());

        let count = self
            .conn()
            .execute(
                "UPDATE onboarding_applications SET
                    user_id = ?1, status = ?2, current_step = ?3, total_steps = ?4,
                    first_name = ?5, last_name = ?6, email = ?7, phone = ?8,
                    passport_number = ?9, passport_country = ?10, passport_expiry_date = ?11, passport_image_url = ?12,
                    street_address = ?13, city = ?14, state = ?15, zip_code = ?16, country = ?17,
                    business_name = ?18, business_type = ?19, business_description = ?20,
                    business_industry = ?21, estimated_revenue = ?22,
                    completed_steps = ?23, validation_errors = ?24, auto_save_data = ?25,
                    updated_at = ?26, completed_at = ?27, last_saved_at = ?28
                 WHERE id = ?29",
                params![
                    opt_int(app.user_id),
                    app.status.as_str(),
                    app.current_step,
                    app.total_steps,
                    opt_text(app.first_name.as_deref()),
                    opt_text(app.last_name.as_deref()),
                    opt_text(app.email.as_deref()),
                    opt_text(app.phone.as_deref()),
                    opt_text(app.passport_number.as_deref()),
                    opt_text(app.passport_country.as_deref()),
                    opt_text(expiry.as_deref()),
                    opt_text(app.passport_image_url.as_deref()),
                    opt_text(app.street_address.as_deref()),
                    opt_text(app.city.as_deref()),
                    opt_text(app.state.as_deref()),
                    opt_text(app.zip_code.as_deref()),
                    opt_text(app.country.as_deref()),
                    opt_text(app.business_name.as_deref()),
                    opt_text(app.business_type.as_ref().map(|t| t.as_str())),
                    opt_text(app.business_description.as_deref()),
                    opt_text(app.business_industry.as_deref()),
                    opt_text(app.estimated_revenue.as_deref()),
                    json_value(Some(&app.completed_steps))?,
                    json_value(app.validation_errors.as_ref())?,
                    json_value(app.auto_save_data.as_ref())?,
                    now_str(),
                    opt_ts(app.completed_at.as_ref()),
                    ts(&app.last_saved_at),
                    app.id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("update_application", e))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "onboarding_application".into(),
                id: app.id.to_string(),
            });
        }
        Ok(())
    }

    async fn auto_save(
        &self,
        application_id: i64,
        step_number: i64,
        form_data: &serde_json::Value,
    ) -> Result<AutoSaveRecord, DatabaseError> {
        let now = now_str();
        let form_json = serde_json::to_string(form_data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let json_path = format!("$.{}", auto_save_key(step_number));

        // json_set merges this step's snapshot without touching other steps.
        let count = self
            .conn()
            .execute(
                "UPDATE onboarding_applications SET
                    auto_save_data = json_set(COALESCE(auto_save_data, '{}'), ?1, json(?2)),
                    status = CASE WHEN status = 'not_started' THEN 'in_progress' ELSE status END,
                    last_saved_at = ?3,
                    updated_at = ?3
                 WHERE id = ?4",
                params![json_path, form_json.as_str(), now.as_str(), application_id],
            )
            .await
            .map_err(|e| DatabaseError::from_write("auto_save.snapshot", e))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "onboarding_application".into(),
                id: application_id.to_string(),
            });
        }

        let record = self
            .insert_returning(
                "auto_save.history",
                &format!(
                    "INSERT INTO onboarding_auto_saves (application_id, step_number, form_data, saved_at)
                     VALUES (?1, ?2, ?3, ?4)
                     RETURNING {AUTO_SAVE_COLUMNS}"
                ),
                params![application_id, step_number, form_json, now],
                row_to_auto_save,
            )
            .await?;
        debug!(application_id, step_number, "Onboarding auto-saved");
        Ok(record)
    }

    async fn list_auto_saves(
        &self,
        application_id: i64,
    ) -> Result<Vec<AutoSaveRecord>, DatabaseError> {
        self.fetch_all(
            "list_auto_saves",
            &format!(
                "SELECT {AUTO_SAVE_COLUMNS} FROM onboarding_auto_saves WHERE application_id = ?1 ORDER BY id ASC"
            ),
            params![application_id],
            row_to_auto_save,
        )
        .await
    }

    async fn record_step_validations(
        &self,
        application_id: i64,
        step_number: i64,
        checks: &[FieldCheck],
    ) -> Result<(), DatabaseError> {
        let now = now_str();
        for check in checks {
            self.conn()
                .execute(
                    "INSERT INTO onboarding_step_validations (application_id, step_number, field_name, is_valid, error_message, validated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        application_id,
                        step_number,
                        check.field_name.as_str(),
                        check.is_valid as i64,
                        opt_text(check.error_message.as_deref()),
                        now.as_str(),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::from_write("record_step_validations", e))?;
        }
        Ok(())
    }

    async fn list_step_validations(
        &self,
        application_id: i64,
    ) -> Result<Vec<StepValidationRecord>, DatabaseError> {
        self.fetch_all(
            "list_step_validations",
            &format!(
                "SELECT {VALIDATION_COLUMNS} FROM onboarding_step_validations WHERE application_id = ?1 ORDER BY id ASC"
            ),
            params![application_id],
            row_to_step_validation,
        )
        .await
    }

    async fn set_validation_errors(
        &self,
        application_id: i64,
        errors: Option<&FieldErrors>,
    ) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE onboarding_applications SET validation_errors = ?1, updated_at = ?2 WHERE id = ?3",
                params![json_value(errors)?, now_str(), application_id],
            )
            .await
            .map_err(|e| DatabaseError::from_write("set_validation_errors", e))?;
        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "onboarding_application".into(),
                id: application_id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_application_status(
        &self,
        application_id: i64,
        status: OnboardingStatus,
    ) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE onboarding_applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now_str(), application_id],
            )
            .await
            .map_err(|e| DatabaseError::from_write("set_application_status", e))?;
        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "onboarding_application".into(),
                id: application_id.to_string(),
            });
        }
        Ok(())
    }

    // ── Contact leads ───────────────────────────────────────────────

    async fn insert_contact_lead(
        &self,
        lead: &NewContactLead,
    ) -> Result<ContactLead, DatabaseError> {
        self.insert_returning(
            "insert_contact_lead",
            &format!(
                "INSERT INTO contact_leads (name, email, company, country, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING {LEAD_COLUMNS}"
            ),
            params![
                lead.name.as_str(),
                lead.email.as_str(),
                opt_text(lead.company.as_deref()),
                opt_text(lead.country.as_deref()),
                lead.message.as_str(),
                now_str(),
            ],
            row_to_lead,
        )
        .await
    }

    async fn list_contact_leads(&self, limit: u32) -> Result<Vec<ContactLead>, DatabaseError> {
        self.fetch_all(
            "list_contact_leads",
            &format!(
                "SELECT {LEAD_COLUMNS} FROM contact_leads ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            params![limit as i64],
            row_to_lead,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::clients::model::{
        ClientMetadata, CommunicationType, Direction, DocumentStatus, Priority, UpdateType,
    };

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn new_client(email: &str) -> NewClient {
        NewClient {
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            email: email.into(),
            phone: Some("+5511987654321".into()),
            company: Some("Silva Imports".into()),
            status: ClientStatus::Active,
            notes: None,
            assigned_to: Some(1),
            metadata: Some(ClientMetadata {
                industry: Some("Retail".into()),
                source: Some("website".into()),
                priority: Some(Priority::Medium),
                tags: vec![],
            }),
        }
    }

    fn new_project(client_id: i64, progress: i64) -> NewProject {
        NewProject {
            client_id,
            title: "Delaware LLC filing".into(),
            description: None,
            status: ProjectStatus::InProgress,
            progress,
            start_date: None,
            end_date: None,
            estimated_hours: Some(6),
            budget: Some(dec!(299.00)),
        }
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = ts(&DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc));
        assert_eq!(a, "2026-01-01T00:00:00.000000Z");
        assert_eq!(
            parse_datetime(&a, "t").unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_datetime("2026-01-01 08:30:00", "t").unwrap().to_rfc3339(),
            "2026-01-01T08:30:00+00:00"
        );
    }

    #[tokio::test]
    async fn corrupt_timestamp_is_an_error() {
        let db = backend().await;
        let created = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        db.conn()
            .execute(
                "UPDATE clients SET created_at = 'yesterday' WHERE id = ?1",
                libsql::params![created.id],
            )
            .await
            .unwrap();

        let err = db.get_client(created.id).await.unwrap_err();
        assert!(
            matches!(&err, DatabaseError::Serialization(msg) if msg.contains("client.created_at")),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn client_insert_and_fetch() {
        let db = backend().await;
        let created = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.status, ClientStatus::Active);
        assert_eq!(
            created.metadata.as_ref().and_then(|m| m.industry.as_deref()),
            Some("Retail")
        );

        let fetched = db.get_client(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        let by_email = db.get_client_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(db.get_client(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_constraint_violation() {
        let db = backend().await;
        db.insert_client(&new_client("dup@example.com")).await.unwrap();
        let err = db.insert_client(&new_client("dup@example.com")).await.unwrap_err();
        assert!(err.is_unique_violation("clients.email"), "got {err:?}");
    }

    #[tokio::test]
    async fn list_and_search_clients() {
        let db = backend().await;
        let mut a = new_client("ana@example.com");
        a.company = Some("Tropical Fruit Co".into());
        db.insert_client(&a).await.unwrap();
        let mut b = new_client("li@example.cn");
        b.first_name = "Li".into();
        b.last_name = "Wei".into();
        b.company = None;
        db.insert_client(&b).await.unwrap();

        let all = db.list_clients(20, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].email, "li@example.cn", "newest first");

        let page = db.list_clients(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].email, "ana@example.com");

        let hits = db.search_clients("FRUIT", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].email, "ana@example.com");

        let hits = db.search_clients("li wei", 20).await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(db.search_clients("%", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_client_status_returns_none_for_missing() {
        let db = backend().await;
        let client = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        let updated = db
            .update_client_status(client.id, ClientStatus::OnHold)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ClientStatus::OnHold);
        assert!(updated.updated_at >= client.updated_at);

        assert!(db.update_client_status(404, ClientStatus::Inactive).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn project_progress_bounds_and_budget() {
        let db = backend().await;
        let client = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        let project = db.insert_project(&new_project(client.id, 10)).await.unwrap();
        assert_eq!(project.budget, Some(dec!(299.00)));
        assert_eq!(project.actual_hours, 0);

        let updated = db
            .update_project_progress(project.id, 100, Some(ProjectStatus::Completed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.progress, 100);
        assert_eq!(updated.status, ProjectStatus::Completed);

        let keep_status = db
            .update_project_progress(project.id, 90, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(keep_status.status, ProjectStatus::Completed);

        let err = db.update_project_progress(project.id, 101, None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
        assert!(db.insert_project(&new_project(client.id, -1)).await.is_err());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = backend().await;
        let err = db.insert_project(&new_project(777, 0)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn documents_and_review() {
        let db = backend().await;
        let client = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        let doc = db
            .insert_document(&NewDocument {
                client_id: client.id,
                project_id: None,
                title: "Passport scan".into(),
                description: None,
                file_name: "passport.pdf".into(),
                file_path: "clients/1/passport.pdf".into(),
                file_size: 204_800,
                mime_type: "application/pdf".into(),
                status: DocumentStatus::Uploaded,
                uploaded_by: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);

        let reviewed = db
            .review_document(
                doc.id,
                &DocumentReview {
                    status: DocumentStatus::Approved,
                    reviewed_by: 2,
                    review_notes: Some("Legible".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reviewed.status, DocumentStatus::Approved);
        assert_eq!(reviewed.reviewed_by, Some(2));
        assert_eq!(db.list_documents(client.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dashboard_stats_counts() {
        let db = backend().await;
        let client = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        db.insert_project(&new_project(client.id, 20)).await.unwrap();
        let mut idle = new_project(client.id, 0);
        idle.status = ProjectStatus::NotStarted;
        db.insert_project(&idle).await.unwrap();
        db.insert_document(&NewDocument {
            client_id: client.id,
            project_id: None,
            title: "Articles".into(),
            description: None,
            file_name: "articles.pdf".into(),
            file_path: "clients/1/articles.pdf".into(),
            file_size: 1,
            mime_type: "application/pdf".into(),
            status: DocumentStatus::Pending,
            uploaded_by: None,
        })
        .await
        .unwrap();
        for n in 0..7 {
            db.insert_progress_update(&NewProgressUpdate {
                client_id: client.id,
                project_id: None,
                title: format!("Update {n}"),
                description: "Filed with the state".into(),
                update_type: UpdateType::General,
                previous_status: None,
                new_status: None,
                hours_worked: 1,
                created_by: 1,
                metadata: None,
            })
            .await
            .unwrap();
        }

        let stats = db.dashboard_stats(5).await.unwrap();
        assert_eq!(stats.total_clients, 1);
        assert_eq!(stats.active_projects, 1);
        assert_eq!(stats.pending_documents, 1);
        assert_eq!(stats.recent_updates.len(), 5);
        assert_eq!(stats.recent_updates[0].title, "Update 6");
    }

    #[tokio::test]
    async fn communications_round_trip() {
        let db = backend().await;
        let client = db.insert_client(&new_client("ana@example.com")).await.unwrap();
        let comm = db
            .insert_communication(&NewCommunication {
                client_id: client.id,
                project_id: None,
                kind: CommunicationType::Meeting,
                subject: "EIN walkthrough".into(),
                content: "Reviewed SS-4 form".into(),
                direction: Direction::Outbound,
                created_by: 1,
                scheduled_for: None,
                completed_at: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(comm.kind, CommunicationType::Meeting);
        let listed = db.list_communications(client.id).await.unwrap();
        assert_eq!(listed, vec![comm]);
    }

    #[tokio::test]
    async fn application_lifecycle() {
        let db = backend().await;
        let app = db.insert_application("session_1").await.unwrap();
        assert_eq!(app.status, OnboardingStatus::NotStarted);
        assert_eq!(app.current_step, 1);
        assert!(app.completed_steps.is_empty());

        let mut app = db.get_application_by_session("session_1").await.unwrap().unwrap();
        app.first_name = Some("Ana".into());
        app.passport_expiry_date = NaiveDate::from_ymd_opt(2031, 1, 31);
        app.business_type = Some(crate::onboarding::model::BusinessType::Llc);
        app.mark_step_completed(1);
        db.update_application(&app).await.unwrap();

        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name.as_deref(), Some("Ana"));
        assert_eq!(stored.passport_expiry_date, NaiveDate::from_ymd_opt(2031, 1, 31));
        assert_eq!(stored.completed_steps, vec![1]);
        assert_eq!(stored.current_step, 2);

        let mut ghost = stored.clone();
        ghost.id = 999;
        assert!(matches!(
            db.update_application(&ghost).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn auto_save_merges_per_step() {
        let db = backend().await;
        let app = db.insert_application("session_2").await.unwrap();

        db.auto_save(app.id, 1, &json!({"firstName": "An"})).await.unwrap();
        db.auto_save(app.id, 2, &json!({"passportNumber": "X1"})).await.unwrap();
        db.auto_save(app.id, 1, &json!({"firstName": "Ana"})).await.unwrap();

        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OnboardingStatus::InProgress);
        let data = stored.auto_save_data.unwrap();
        assert_eq!(data["step1"], json!({"firstName": "Ana"}));
        assert_eq!(data["step2"], json!({"passportNumber": "X1"}));

        let history = db.list_auto_saves(app.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].form_data, json!({"firstName": "An"}));

        assert!(matches!(
            db.auto_save(4242, 1, &json!({})).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn step_validations_and_errors() {
        let db = backend().await;
        let app = db.insert_application("session_3").await.unwrap();
        db.record_step_validations(
            app.id,
            1,
            &[
                FieldCheck {
                    field_name: "firstName".into(),
                    is_valid: true,
                    error_message: None,
                },
                FieldCheck {
                    field_name: "email".into(),
                    is_valid: false,
                    error_message: Some("Please enter a valid email address".into()),
                },
            ],
        )
        .await
        .unwrap();
        let records = db.list_step_validations(app.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_valid);
        assert!(!records[1].is_valid);

        let mut errors = FieldErrors::new();
        errors.insert("email".into(), vec!["Please enter a valid email address".into()]);
        db.set_validation_errors(app.id, Some(&errors)).await.unwrap();
        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.validation_errors, Some(errors));

        db.set_validation_errors(app.id, None).await.unwrap();
        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert!(stored.validation_errors.is_none());
    }

    #[tokio::test]
    async fn contact_leads_newest_first() {
        let db = backend().await;
        for name in ["First", "Second"] {
            db.insert_contact_lead(&NewContactLead {
                name: name.into(),
                email: "lead@example.com".into(),
                company: None,
                country: Some("Kenya".into()),
                message: "How long does an LLC take?".into(),
            })
            .await
            .unwrap();
        }
        let leads = db.list_contact_leads(10).await.unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].name, "Second");
    }

    #[tokio::test]
    async fn open_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("desk.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        db.insert_application("s").await.unwrap();
    }
}
