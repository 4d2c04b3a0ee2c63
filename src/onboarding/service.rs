//! OnboardingService: session lookup, auto-save and step commits.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OnboardingError;
use crate::store::Database;

use super::model::{ApplicationView, AutoSaveRecord, OnboardingApplication, OnboardingStatus};
use super::steps::{OnboardingStep, StepData, StepRejection};

/// Coordinates the onboarding wizard over the database.
///
/// A step submission is a two-phase write: the raw data is always recorded
/// as an auto-save snapshot first, and the application's canonical fields
/// change only when the step validates.
pub struct OnboardingService {
    db: Arc<dyn Database>,
}

impl OnboardingService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// A fresh session identifier: `session_<uuid>`.
    pub fn generate_session_id() -> String {
        format!("session_{}", Uuid::new_v4().simple())
    }

    /// Session identifier handed out when the loader itself fails.
    pub fn fallback_session_id() -> String {
        format!("fallback_{}", Utc::now().timestamp_millis())
    }

    /// Resume the open application for `session_id`, or create one.
    ///
    /// Completed and abandoned applications are never resumed.
    pub async fn start(
        &self,
        session_id: Option<&str>,
    ) -> Result<OnboardingApplication, OnboardingError> {
        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => Self::generate_session_id(),
        };

        if let Some(existing) = self.db.get_application_by_session(&session_id).await? {
            if !existing.is_closed() {
                debug!(application_id = existing.id, "Resuming onboarding application");
                return Ok(existing);
            }
        }

        let app = self.db.insert_application(&session_id).await?;
        info!(application_id = app.id, session_id = %app.session_id, "Onboarding started");
        Ok(app)
    }

    pub async fn get(&self, application_id: i64) -> Result<ApplicationView, OnboardingError> {
        Ok(self.load(application_id).await?.into_view())
    }

    pub async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ApplicationView>, OnboardingError> {
        Ok(self
            .db
            .get_application_by_session(session_id)
            .await?
            .map(OnboardingApplication::into_view))
    }

    /// Record an unvalidated snapshot of a step's form data.
    pub async fn auto_save(
        &self,
        application_id: i64,
        step_number: i64,
        form_data: &Value,
    ) -> Result<AutoSaveRecord, OnboardingError> {
        OnboardingStep::from_number(step_number)
            .ok_or(OnboardingError::InvalidStep { step: step_number })?;
        self.load_open(application_id).await?;
        Ok(self
            .db
            .auto_save(application_id, step_number, form_data)
            .await?)
    }

    /// Submit a step, validating against today's date.
    pub async fn save_step(
        &self,
        application_id: i64,
        step_number: i64,
        step_data: &Value,
    ) -> Result<ApplicationView, OnboardingError> {
        self.save_step_on(application_id, step_number, step_data, Utc::now().date_naive())
            .await
    }

    /// Submit a step: snapshot, validate, then commit on success.
    ///
    /// On rejection the snapshot and the per-field audit rows remain, the
    /// application's `validationErrors` is replaced and the error returned.
    pub async fn save_step_on(
        &self,
        application_id: i64,
        step_number: i64,
        step_data: &Value,
        today: NaiveDate,
    ) -> Result<ApplicationView, OnboardingError> {
        let step = OnboardingStep::from_number(step_number)
            .ok_or(OnboardingError::InvalidStep { step: step_number })?;
        self.load_open(application_id).await?;
        let fields = step_data.as_object().ok_or_else(|| {
            OnboardingError::InvalidData("Step data must be a JSON object".to_string())
        })?;

        // Phase 1: draft.
        self.db
            .auto_save(application_id, step_number, step_data)
            .await?;

        // Phase 2: validate.
        match step.validate(fields, today) {
            Ok(StepData { checks, data }) => {
                self.db
                    .record_step_validations(application_id, step_number, &checks)
                    .await?;

                // Phase 3: commit.
                let mut app = self.load(application_id).await?;
                data.apply(&mut app);
                app.validation_errors = None;
                app.mark_step_completed(step_number);
                if app.all_steps_completed() {
                    app.status = OnboardingStatus::Completed;
                    app.completed_at.get_or_insert_with(Utc::now);
                } else if app.status == OnboardingStatus::NotStarted {
                    app.status = OnboardingStatus::InProgress;
                }
                self.db.update_application(&app).await?;

                info!(
                    application_id,
                    step = step_number,
                    status = %app.status,
                    "Onboarding step saved"
                );
                Ok(self.load(application_id).await?.into_view())
            }
            Err(StepRejection { checks, error }) => {
                self.db
                    .record_step_validations(application_id, step_number, &checks)
                    .await?;
                self.db
                    .set_validation_errors(application_id, Some(&error.errors))
                    .await?;
                debug!(
                    application_id,
                    step = step_number,
                    fields = error.errors.len(),
                    "Onboarding step rejected"
                );
                Err(error.into())
            }
        }
    }

    /// Mark an application abandoned. Completed applications cannot be.
    pub async fn abandon(&self, application_id: i64) -> Result<ApplicationView, OnboardingError> {
        let app = self.load(application_id).await?;
        if app.status == OnboardingStatus::Completed {
            return Err(OnboardingError::Closed {
                id: app.id,
                status: app.status.to_string(),
            });
        }
        self.db
            .set_application_status(application_id, OnboardingStatus::Abandoned)
            .await?;
        info!(application_id, "Onboarding abandoned");
        self.get(application_id).await
    }

    async fn load(&self, application_id: i64) -> Result<OnboardingApplication, OnboardingError> {
        self.db
            .get_application(application_id)
            .await?
            .ok_or(OnboardingError::NotFound { id: application_id })
    }

    /// Load an application that still accepts writes.
    async fn load_open(
        &self,
        application_id: i64,
    ) -> Result<OnboardingApplication, OnboardingError> {
        let app = self.load(application_id).await?;
        if app.is_closed() {
            return Err(OnboardingError::Closed {
                id: app.id,
                status: app.status.to_string(),
            });
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::onboarding::model::BusinessType;
    use crate::store::LibSqlBackend;

    async fn service() -> (OnboardingService, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        (OnboardingService::new(Arc::clone(&db)), db)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn step_payload(step: i64) -> Value {
        match step {
            1 => json!({
                "firstName": "Ana",
                "lastName": "Silva",
                "email": "ana@example.com",
                "phone": "+5511987654321"
            }),
            2 => json!({
                "passportNumber": "FA123456",
                "passportCountry": "Brazil",
                "passportExpiryDate": "2031-01-31"
            }),
            3 => json!({
                "streetAddress": "Rua Augusta 1500",
                "city": "Sao Paulo",
                "state": "SP",
                "zipCode": "01304-001",
                "country": "Brazil"
            }),
            _ => json!({
                "businessName": "Silva Imports",
                "businessType": "llc",
                "businessDescription": "Importing specialty coffee into the US",
                "businessIndustry": "Food & Beverage",
                "estimatedRevenue": "100k-500k"
            }),
        }
    }

    #[test]
    fn session_ids_have_prefixes() {
        let id = OnboardingService::generate_session_id();
        assert!(id.starts_with("session_"));
        assert_eq!(id.len(), "session_".len() + 32);
        assert_ne!(id, OnboardingService::generate_session_id());
        assert!(OnboardingService::fallback_session_id().starts_with("fallback_"));
    }

    #[tokio::test]
    async fn start_resumes_open_application() {
        let (svc, _) = service().await;
        let first = svc.start(Some("session_a")).await.unwrap();
        let again = svc.start(Some("session_a")).await.unwrap();
        assert_eq!(first.id, again.id);

        let generated = svc.start(None).await.unwrap();
        assert!(generated.session_id.starts_with("session_"));
        assert_ne!(generated.id, first.id);
    }

    #[tokio::test]
    async fn start_after_abandon_creates_new_application() {
        let (svc, _) = service().await;
        let first = svc.start(Some("session_b")).await.unwrap();
        svc.abandon(first.id).await.unwrap();
        let second = svc.start(Some("session_b")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.status, OnboardingStatus::NotStarted);
    }

    #[tokio::test]
    async fn valid_step_commits_fields() {
        let (svc, db) = service().await;
        let app = svc.start(Some("s")).await.unwrap();

        let view = svc
            .save_step_on(app.id, 1, &step_payload(1), today())
            .await
            .unwrap();
        assert_eq!(view.application.first_name.as_deref(), Some("Ana"));
        assert_eq!(view.application.completed_steps, vec![1]);
        assert_eq!(view.application.current_step, 2);
        assert_eq!(view.application.status, OnboardingStatus::InProgress);
        assert!(view.application.validation_errors.is_none());
        assert_eq!(view.progress.progress_percentage, 25);
        assert_eq!(view.progress.next_step, 2);

        let audit = db.list_step_validations(app.id).await.unwrap();
        assert_eq!(audit.len(), 4);
        assert!(audit.iter().all(|r| r.is_valid));
    }

    #[tokio::test]
    async fn failed_step_keeps_snapshot_and_records_errors() {
        let (svc, db) = service().await;
        let app = svc.start(Some("s")).await.unwrap();

        let bad = json!({
            "passportNumber": "FA1",
            "passportCountry": "Brazil",
            "passportExpiryDate": "2020-01-01"
        });
        let err = svc.save_step_on(app.id, 2, &bad, today()).await.unwrap_err();
        let OnboardingError::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(
            err.errors["passportExpiryDate"],
            vec!["Passport must not be expired"]
        );

        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert!(stored.passport_number.is_none());
        assert!(stored.completed_steps.is_empty());
        assert_eq!(stored.current_step, 1);
        assert_eq!(stored.status, OnboardingStatus::InProgress);
        assert_eq!(stored.auto_save_data.unwrap()["step2"], bad);
        assert_eq!(
            stored.validation_errors.unwrap()["passportNumber"],
            vec!["Passport number must be at least 6 characters"]
        );

        let audit = db.list_step_validations(app.id).await.unwrap();
        assert_eq!(audit.len(), 3);
        assert!(audit.iter().all(|r| r.step_number == 2));
        assert_eq!(audit.iter().filter(|r| !r.is_valid).count(), 2);
        assert_eq!(db.list_auto_saves(app.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_clears_previous_errors() {
        let (svc, db) = service().await;
        let app = svc.start(Some("s")).await.unwrap();
        assert!(svc.save_step_on(app.id, 1, &json!({}), today()).await.is_err());
        assert!(db.get_application(app.id).await.unwrap().unwrap().validation_errors.is_some());

        let view = svc
            .save_step_on(app.id, 1, &step_payload(1), today())
            .await
            .unwrap();
        assert!(view.application.validation_errors.is_none());
    }

    #[tokio::test]
    async fn completing_all_steps_completes_application() {
        let (svc, _) = service().await;
        let app = svc.start(Some("s")).await.unwrap();

        // Out of order: the cursor never moves backwards.
        for step in [1, 3, 2, 4] {
            svc.save_step_on(app.id, step, &step_payload(step), today())
                .await
                .unwrap();
        }
        let view = svc.get(app.id).await.unwrap();
        let done = &view.application;
        assert_eq!(done.status, OnboardingStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.completed_steps, vec![1, 2, 3, 4]);
        assert_eq!(done.current_step, 4);
        assert_eq!(done.business_type, Some(BusinessType::Llc));
        assert_eq!(view.progress.progress_percentage, 100);

        let err = svc
            .save_step_on(app.id, 1, &step_payload(1), today())
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Closed { .. }));
        assert!(matches!(
            svc.abandon(app.id).await,
            Err(OnboardingError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_bad_step_and_payload() {
        let (svc, _) = service().await;
        let app = svc.start(Some("s")).await.unwrap();
        assert!(matches!(
            svc.save_step_on(app.id, 5, &step_payload(1), today()).await,
            Err(OnboardingError::InvalidStep { step: 5 })
        ));
        assert!(matches!(
            svc.save_step_on(app.id, 1, &json!(["not", "an", "object"]), today()).await,
            Err(OnboardingError::InvalidData(_))
        ));
        assert!(matches!(
            svc.auto_save(app.id, 0, &json!({})).await,
            Err(OnboardingError::InvalidStep { step: 0 })
        ));
        assert!(matches!(
            svc.get(9999).await,
            Err(OnboardingError::NotFound { id: 9999 })
        ));
    }

    #[tokio::test]
    async fn auto_save_only_drafts() {
        let (svc, db) = service().await;
        let app = svc.start(Some("s")).await.unwrap();
        let record = svc
            .auto_save(app.id, 3, &json!({"city": "Lagos"}))
            .await
            .unwrap();
        assert_eq!(record.step_number, 3);

        let stored = db.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OnboardingStatus::InProgress);
        assert!(stored.city.is_none());
        assert!(stored.completed_steps.is_empty());
        assert!(db.list_step_validations(app.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_by_session() {
        let (svc, _) = service().await;
        assert!(svc.get_by_session("nobody").await.unwrap().is_none());
        let app = svc.start(Some("session_x")).await.unwrap();
        let view = svc.get_by_session("session_x").await.unwrap().unwrap();
        assert_eq!(view.application.id, app.id);
        assert_eq!(view.progress.missing_fields.len(), 4);
    }
}
