//! Turn submitted CRM forms into typed insert payloads.
//!
//! Identifiers (`clientId`, `projectId`, ...) are parsed by the routes; the
//! functions here check the remaining fields and report every problem at once.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::api::FormFields;
use crate::error::ValidationError;
use crate::validation::{Rule, Validator};

use super::model::{
    ClientMetadata, ClientStatus, CommunicationMetadata, CommunicationType, Direction,
    DocumentReview, DocumentStatus, NewClient, NewCommunication, NewDocument, NewProgressUpdate,
    NewProject, Priority, ProjectStatus, UpdateMetadata, UpdateType,
};

/// Summary message for a rejected CRM form.
pub const INVALID_INPUT: &str = "Please correct the highlighted fields";
pub const DUPLICATE_EMAIL: &str = "A client with this email already exists";
pub const PROGRESS_RANGE: &str = "Progress must be between 0 and 100";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Parse an optional choice, recording `message` when the value is unknown.
fn choice<T: FromStr>(
    v: &mut Validator,
    field: &str,
    raw: Option<&str>,
    default: T,
    message: &str,
) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add(field, message);
            default
        }),
    }
}

/// Parse a required choice; missing and unknown values share `message`.
fn required_choice<T: FromStr>(
    v: &mut Validator,
    field: &str,
    raw: Option<&str>,
    message: &str,
) -> Option<T> {
    let parsed = raw.and_then(|r| r.parse().ok());
    if parsed.is_none() {
        v.add(field, message);
    }
    parsed
}

/// The optionally signed run of digits at the start of `raw`.
fn leading_integer(raw: &str) -> Option<i64> {
    let sign = usize::from(raw.starts_with(['-', '+']));
    let end = raw[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw.len(), |i| sign + i);
    raw[..end].parse().ok()
}

/// Optional non-negative integer.
fn non_negative(v: &mut Validator, field: &str, raw: Option<&str>, message: &str) -> Option<i64> {
    let raw = raw?;
    match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Some(n),
        _ => {
            v.add(field, message);
            None
        }
    }
}

/// Accept `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

fn timestamp(v: &mut Validator, field: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        v.add(field, "Please enter a valid date");
    }
    parsed
}

/// Comma-separated list, blanks dropped.
fn list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// `create_client` form. Emails are stored lowercase.
pub fn new_client(form: &FormFields, assigned_to: i64) -> Result<NewClient, ValidationError> {
    let mut v = Validator::new();

    let first_name = v.form_text(
        "firstName",
        form.get("firstName"),
        "First name is required",
        &[Rule::MaxLen(50, "First name too long")],
    );
    let last_name = v.form_text(
        "lastName",
        form.get("lastName"),
        "Last name is required",
        &[Rule::MaxLen(50, "Last name too long")],
    );
    let email = v.form_text(
        "email",
        form.get("email"),
        "Email is required",
        &[Rule::Email("Please enter a valid email address")],
    );
    let phone = form.text("phone");
    if let Some(phone) = &phone {
        v.check("phone", phone, &[Rule::Phone("Invalid phone format")]);
    }
    let status = choice(
        &mut v,
        "status",
        form.get("status"),
        ClientStatus::default(),
        "Please select a valid status",
    );
    let priority = choice(
        &mut v,
        "priority",
        form.get("priority"),
        Priority::default(),
        "Please select a valid priority",
    );

    v.finish(INVALID_INPUT)?;

    Ok(NewClient {
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        email: email.unwrap_or_default().to_lowercase(),
        phone,
        company: form.text("company"),
        status,
        notes: form.text("notes"),
        assigned_to: Some(assigned_to),
        metadata: Some(ClientMetadata {
            industry: form.text("industry"),
            source: form.text("source"),
            priority: Some(priority),
            tags: list(form.get("tags")),
        }),
    })
}

/// `update_client_status` form: the new status.
pub fn client_status(form: &FormFields) -> Result<ClientStatus, ValidationError> {
    let mut v = Validator::new();
    let status = required_choice(&mut v, "status", form.get("status"), "Please select a valid status");
    v.finish(INVALID_INPUT)?;
    Ok(status.unwrap_or_default())
}

/// `add_progress_update` form.
pub fn new_progress_update(
    form: &FormFields,
    client_id: i64,
    project_id: Option<i64>,
    created_by: i64,
) -> Result<NewProgressUpdate, ValidationError> {
    let mut v = Validator::new();

    let title = v.form_text(
        "title",
        form.get("title"),
        "Title is required",
        &[Rule::MaxLen(200, "Title too long")],
    );
    let description = v.form_text(
        "description",
        form.get("description"),
        "Description is required",
        &[],
    );
    let update_type = choice(
        &mut v,
        "updateType",
        form.get("updateType"),
        UpdateType::default(),
        "Please select a valid update type",
    );
    let priority = choice(
        &mut v,
        "priority",
        form.get("priority"),
        Priority::default(),
        "Please select a valid priority",
    );
    // Only the leading integer counts ("2.5" is 2); anything else is zero.
    let hours_worked = form.get("hoursWorked").and_then(leading_integer).unwrap_or(0);
    if hours_worked < 0 {
        v.add("hoursWorked", "Hours worked cannot be negative");
    }

    v.finish(INVALID_INPUT)?;

    Ok(NewProgressUpdate {
        client_id,
        project_id,
        title: title.unwrap_or_default(),
        description: description.unwrap_or_default(),
        update_type,
        previous_status: None,
        new_status: None,
        hours_worked,
        created_by,
        metadata: Some(UpdateMetadata {
            attachments: Vec::new(),
            tags: list(form.get("tags")),
            priority: Some(priority),
        }),
    })
}

/// `create_project` form.
pub fn new_project(form: &FormFields, client_id: i64) -> Result<NewProject, ValidationError> {
    let mut v = Validator::new();

    let title = v.form_text(
        "title",
        form.get("title"),
        "Project title is required",
        &[Rule::MaxLen(200, "Project title too long")],
    );
    let status = choice(
        &mut v,
        "status",
        form.get("status"),
        ProjectStatus::default(),
        "Please select a valid project status",
    );
    let progress = match form.get("progress") {
        None => 0,
        Some(raw) => progress_value(&mut v, raw),
    };
    let start_date = timestamp(&mut v, "startDate", form.get("startDate"));
    let end_date = timestamp(&mut v, "endDate", form.get("endDate"));
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            v.add("endDate", "End date must be after start date");
        }
    }
    let estimated_hours = non_negative(
        &mut v,
        "estimatedHours",
        form.get("estimatedHours"),
        "Estimated hours must be a non-negative whole number",
    );
    let budget = match form.get("budget") {
        None => None,
        Some(raw) => match Decimal::from_str(raw) {
            Ok(b) if !b.is_sign_negative() => Some(b.round_dp(2)),
            _ => {
                v.add("budget", "Budget must be a positive amount");
                None
            }
        },
    };

    v.finish(INVALID_INPUT)?;

    Ok(NewProject {
        client_id,
        title: title.unwrap_or_default(),
        description: form.text("description"),
        status,
        progress,
        start_date,
        end_date,
        estimated_hours,
        budget,
    })
}

fn progress_value(v: &mut Validator, raw: &str) -> i64 {
    match raw.parse::<i64>() {
        Ok(p) if (0..=100).contains(&p) => p,
        _ => {
            v.add("progress", PROGRESS_RANGE);
            0
        }
    }
}

/// `update_project_progress` form: new progress and an optional new status.
pub fn project_progress(
    form: &FormFields,
) -> Result<(i64, Option<ProjectStatus>), ValidationError> {
    let mut v = Validator::new();
    let progress = match form.get("progress") {
        None => {
            v.add("progress", PROGRESS_RANGE);
            0
        }
        Some(raw) => progress_value(&mut v, raw),
    };
    let status = match form.get("status") {
        None => None,
        Some(raw) => {
            let parsed = raw.parse::<ProjectStatus>().ok();
            if parsed.is_none() {
                v.add("status", "Please select a valid project status");
            }
            parsed
        }
    };
    v.finish(INVALID_INPUT)?;
    Ok((progress, status))
}

/// `add_document` form. Only metadata is recorded; no file is stored.
pub fn new_document(
    form: &FormFields,
    client_id: i64,
    project_id: Option<i64>,
    uploaded_by: i64,
) -> Result<NewDocument, ValidationError> {
    let mut v = Validator::new();

    let title = v.form_text(
        "title",
        form.get("title"),
        "Document title is required",
        &[Rule::MaxLen(200, "Document title too long")],
    );
    let file_name = v.form_text("fileName", form.get("fileName"), "File name is required", &[]);
    let file_path = v.form_text("filePath", form.get("filePath"), "File path is required", &[]);
    let file_size = match form.get("fileSize") {
        None => {
            v.add("fileSize", "File size is required");
            None
        }
        some => non_negative(
            &mut v,
            "fileSize",
            some,
            "File size must be a non-negative whole number",
        ),
    };
    let status = choice(
        &mut v,
        "status",
        form.get("status"),
        DocumentStatus::default(),
        "Please select a valid document status",
    );

    v.finish(INVALID_INPUT)?;

    Ok(NewDocument {
        client_id,
        project_id,
        title: title.unwrap_or_default(),
        description: form.text("description"),
        file_name: file_name.unwrap_or_default(),
        file_path: file_path.unwrap_or_default(),
        file_size: file_size.unwrap_or_default(),
        mime_type: form
            .text("mimeType")
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        status,
        uploaded_by: Some(uploaded_by),
    })
}

/// `review_document` form. A review must land on a terminal or reviewed status.
pub fn document_review(
    form: &FormFields,
    reviewed_by: i64,
) -> Result<DocumentReview, ValidationError> {
    const DECISIONS: &[&str] = &[
        DocumentStatus::Reviewed.as_str(),
        DocumentStatus::Approved.as_str(),
        DocumentStatus::Rejected.as_str(),
    ];
    const MESSAGE: &str = "Please select a review decision";

    let mut v = Validator::new();
    let decision = v.form_text(
        "status",
        form.get("status"),
        MESSAGE,
        &[Rule::OneOf(DECISIONS, MESSAGE)],
    );
    v.finish(INVALID_INPUT)?;

    Ok(DocumentReview {
        status: decision
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DocumentStatus::Reviewed),
        reviewed_by,
        review_notes: form.text("reviewNotes"),
    })
}

/// `log_communication` form. Direction defaults to outbound.
pub fn new_communication(
    form: &FormFields,
    client_id: i64,
    project_id: Option<i64>,
    created_by: i64,
) -> Result<NewCommunication, ValidationError> {
    let mut v = Validator::new();

    let kind: Option<CommunicationType> = required_choice(
        &mut v,
        "type",
        form.get("type"),
        "Please select a communication type",
    );
    let subject = v.form_text(
        "subject",
        form.get("subject"),
        "Subject is required",
        &[Rule::MaxLen(200, "Subject too long")],
    );
    let content = v.form_text("content", form.get("content"), "Content is required", &[]);
    let direction = choice(
        &mut v,
        "direction",
        form.get("direction"),
        Direction::Outbound,
        "Please select a valid direction",
    );
    let scheduled_for = timestamp(&mut v, "scheduledFor", form.get("scheduledFor"));
    let completed_at = timestamp(&mut v, "completedAt", form.get("completedAt"));
    let duration = non_negative(
        &mut v,
        "duration",
        form.get("duration"),
        "Duration must be a non-negative number of minutes",
    );

    v.finish(INVALID_INPUT)?;

    let attendees = list(form.get("attendees"));
    let outcome = form.text("outcome");
    let metadata = (!attendees.is_empty() || duration.is_some() || outcome.is_some()).then(|| {
        CommunicationMetadata {
            attendees,
            duration,
            outcome,
        }
    });

    Ok(NewCommunication {
        client_id,
        project_id,
        kind: kind.unwrap_or(CommunicationType::Note),
        subject: subject.unwrap_or_default(),
        content: content.unwrap_or_default(),
        direction,
        created_by,
        scheduled_for,
        completed_at,
        metadata,
    })
}
