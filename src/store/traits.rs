//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::model::{
    Client, ClientCommunication, ClientDocument, ClientProject, ClientStatus, DashboardStats,
    DocumentReview, NewClient, NewCommunication, NewDocument, NewProgressUpdate, NewProject,
    ProgressUpdate, ProjectStatus,
};
use crate::error::DatabaseError;
use crate::onboarding::model::{
    AutoSaveRecord, FieldCheck, OnboardingApplication, OnboardingStatus, StepValidationRecord,
};
use crate::site::model::{ContactLead, NewContactLead};
use crate::validation::FieldErrors;

/// Backend-agnostic database trait covering the CRM, onboarding and leads.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Clients ─────────────────────────────────────────────────────

    /// Insert a client. A duplicate email is a `Constraint` error.
    async fn insert_client(&self, client: &NewClient) -> Result<Client, DatabaseError>;

    async fn get_client(&self, id: i64) -> Result<Option<Client>, DatabaseError>;

    async fn get_client_by_email(&self, email: &str) -> Result<Option<Client>, DatabaseError>;

    /// Clients, newest first.
    async fn list_clients(&self, limit: u32, offset: u32) -> Result<Vec<Client>, DatabaseError>;

    /// Case-insensitive substring match over name, email and company.
    async fn search_clients(&self, query: &str, limit: u32) -> Result<Vec<Client>, DatabaseError>;

    /// Set a client's status. Returns `None` if the client does not exist.
    async fn update_client_status(
        &self,
        id: i64,
        status: ClientStatus,
    ) -> Result<Option<Client>, DatabaseError>;

    async fn dashboard_stats(&self, recent_limit: u32) -> Result<DashboardStats, DatabaseError>;

    // ── Projects ────────────────────────────────────────────────────

    async fn insert_project(&self, project: &NewProject) -> Result<ClientProject, DatabaseError>;

    async fn get_project(&self, id: i64) -> Result<Option<ClientProject>, DatabaseError>;

    async fn list_projects(&self, client_id: i64) -> Result<Vec<ClientProject>, DatabaseError>;

    /// Set progress and optionally status. Returns `None` if the project does not exist.
    async fn update_project_progress(
        &self,
        id: i64,
        progress: i64,
        status: Option<ProjectStatus>,
    ) -> Result<Option<ClientProject>, DatabaseError>;

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, document: &NewDocument)
    -> Result<ClientDocument, DatabaseError>;

    async fn list_documents(&self, client_id: i64) -> Result<Vec<ClientDocument>, DatabaseError>;

    /// Record a reviewer decision. Returns `None` if the document does not exist.
    async fn review_document(
        &self,
        id: i64,
        review: &DocumentReview,
    ) -> Result<Option<ClientDocument>, DatabaseError>;

    // ── Progress updates ────────────────────────────────────────────

    async fn insert_progress_update(
        &self,
        update: &NewProgressUpdate,
    ) -> Result<ProgressUpdate, DatabaseError>;

    /// A client's updates, newest first.
    async fn list_progress_updates(
        &self,
        client_id: i64,
        limit: u32,
    ) -> Result<Vec<ProgressUpdate>, DatabaseError>;

    // ── Communications ──────────────────────────────────────────────

    async fn insert_communication(
        &self,
        communication: &NewCommunication,
    ) -> Result<ClientCommunication, DatabaseError>;

    /// A client's communications, newest first.
    async fn list_communications(
        &self,
        client_id: i64,
    ) -> Result<Vec<ClientCommunication>, DatabaseError>;

    // ── Onboarding ──────────────────────────────────────────────────

    /// Persist a new application for `session_id` with default counters.
    async fn insert_application(
        &self,
        session_id: &str,
    ) -> Result<OnboardingApplication, DatabaseError>;

    async fn get_application(&self, id: i64)
    -> Result<Option<OnboardingApplication>, DatabaseError>;

    /// The most recent application for a session.
    async fn get_application_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OnboardingApplication>, DatabaseError>;

    /// Write every mutable column of `app` back to its row.
    async fn update_application(&self, app: &OnboardingApplication) -> Result<(), DatabaseError>;

    /// Record an unvalidated snapshot: a history row, `autoSaveData["step{n}"]`
    /// and `lastSavedAt`. A `not_started` application becomes `in_progress`.
    async fn auto_save(
        &self,
        application_id: i64,
        step_number: i64,
        form_data: &Value,
    ) -> Result<AutoSaveRecord, DatabaseError>;

    /// Auto-save history for an application, oldest first.
    async fn list_auto_saves(
        &self,
        application_id: i64,
    ) -> Result<Vec<AutoSaveRecord>, DatabaseError>;

    /// Append field-level validation outcomes for one step submission.
    async fn record_step_validations(
        &self,
        application_id: i64,
        step_number: i64,
        checks: &[FieldCheck],
    ) -> Result<(), DatabaseError>;

    async fn list_step_validations(
        &self,
        application_id: i64,
    ) -> Result<Vec<StepValidationRecord>, DatabaseError>;

    /// Replace the application's accumulated validation errors.
    async fn set_validation_errors(
        &self,
        application_id: i64,
        errors: Option<&FieldErrors>,
    ) -> Result<(), DatabaseError>;

    async fn set_application_status(
        &self,
        application_id: i64,
        status: OnboardingStatus,
    ) -> Result<(), DatabaseError>;

    // ── Contact leads ───────────────────────────────────────────────

    async fn insert_contact_lead(&self, lead: &NewContactLead)
    -> Result<ContactLead, DatabaseError>;

    /// Leads, newest first.
    async fn list_contact_leads(&self, limit: u32) -> Result<Vec<ContactLead>, DatabaseError>;
}
