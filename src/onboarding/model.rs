//! Onboarding application data model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text_enum::text_enum;
use crate::validation::FieldErrors;

use super::steps::OnboardingStep;

text_enum! {
    #[derive(Default)]
    pub enum OnboardingStatus {
        #[default]
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
        Abandoned => "abandoned",
    }
}

text_enum! {
    /// Legal form of the business being registered.
    pub enum BusinessType {
        Llc => "llc",
        Corporation => "corporation",
        Partnership => "partnership",
        SoleProprietorship => "sole_proprietorship",
        Other => "other",
    }
}

/// A wizard submission tracked by session.
///
/// Holds the canonical (validated) fields of all four steps plus the
/// progress counters and the latest unvalidated auto-save snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingApplication {
    pub id: i64,
    /// Set once an anonymous session is linked to an account.
    pub user_id: Option<i64>,
    pub session_id: String,
    pub status: OnboardingStatus,
    pub current_step: i64,
    pub total_steps: i64,

    // Step 1: personal information
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    // Step 2: passport
    pub passport_number: Option<String>,
    pub passport_country: Option<String>,
    pub passport_expiry_date: Option<NaiveDate>,
    pub passport_image_url: Option<String>,

    // Step 3: address
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,

    // Step 4: business
    pub business_name: Option<String>,
    pub business_type: Option<BusinessType>,
    pub business_description: Option<String>,
    pub business_industry: Option<String>,
    pub estimated_revenue: Option<String>,

    /// Sorted, without duplicates.
    pub completed_steps: Vec<i64>,
    pub validation_errors: Option<FieldErrors>,
    /// Latest snapshot per step, keyed `step{n}`.
    pub auto_save_data: Option<Map<String, Value>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_saved_at: DateTime<Utc>,
}

impl OnboardingApplication {
    /// A fresh application for `session_id`, not yet persisted (`id == 0`).
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id: None,
            session_id: session_id.into(),
            status: OnboardingStatus::NotStarted,
            current_step: 1,
            total_steps: OnboardingStep::COUNT,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            passport_number: None,
            passport_country: None,
            passport_expiry_date: None,
            passport_image_url: None,
            street_address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            business_name: None,
            business_type: None,
            business_description: None,
            business_industry: None,
            estimated_revenue: None,
            completed_steps: Vec::new(),
            validation_errors: None,
            auto_save_data: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_saved_at: now,
        }
    }

    pub fn is_step_completed(&self, step: i64) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Record `step` as complete and move the cursor forward (never back).
    pub fn mark_step_completed(&mut self, step: i64) {
        if let Err(pos) = self.completed_steps.binary_search(&step) {
            self.completed_steps.insert(pos, step);
        }
        let next = (step + 1).min(self.total_steps);
        if next > self.current_step {
            self.current_step = next;
        }
    }

    /// Every step from 1 to `total_steps` has been completed.
    pub fn all_steps_completed(&self) -> bool {
        (1..=self.total_steps).all(|s| self.is_step_completed(s))
    }

    /// Completed and abandoned applications no longer accept writes.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.status,
            OnboardingStatus::Completed | OnboardingStatus::Abandoned
        )
    }

    /// Derived progress figures for display.
    pub fn progress(&self) -> ApplicationProgress {
        let total = self.total_steps.max(1);
        let done = self
            .completed_steps
            .iter()
            .filter(|s| (1..=total).contains(*s))
            .count() as i64;
        let progress_percentage = (done * 100 + total / 2) / total;

        let next_step = (1..=total)
            .find(|s| !self.is_step_completed(*s))
            .unwrap_or(total);

        let missing_fields = OnboardingStep::from_number(self.current_step)
            .map(|step| step.missing_fields(self))
            .unwrap_or_default();

        ApplicationProgress {
            progress_percentage,
            next_step,
            can_proceed: self.is_step_completed(self.current_step),
            missing_fields,
        }
    }

    /// The application together with its derived progress.
    pub fn into_view(self) -> ApplicationView {
        let progress = self.progress();
        ApplicationView {
            application: self,
            progress,
        }
    }
}

/// Derived progress of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProgress {
    /// 0–100, rounded.
    pub progress_percentage: i64,
    pub next_step: i64,
    /// The current step has already been saved successfully.
    pub can_proceed: bool,
    /// Fields of the current step still empty on the canonical row.
    pub missing_fields: Vec<String>,
}

/// Wire shape: application fields with progress fields alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: OnboardingApplication,
    #[serde(flatten)]
    pub progress: ApplicationProgress,
}

/// One field-level validation outcome, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidationRecord {
    pub id: i64,
    pub application_id: i64,
    pub step_number: i64,
    pub field_name: String,
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub validated_at: DateTime<Utc>,
}

/// Field outcome before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub field_name: String,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

/// Unvalidated snapshot of step form data, kept for recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveRecord {
    pub id: i64,
    pub application_id: i64,
    pub step_number: i64,
    pub form_data: Value,
    pub saved_at: DateTime<Utc>,
}

/// Key under which a step's latest snapshot lives in `autoSaveData`.
pub fn auto_save_key(step: i64) -> String {
    format!("step{step}")
}
