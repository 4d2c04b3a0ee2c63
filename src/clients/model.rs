//! CRM data model: clients, projects, documents, progress log, communications.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text_enum::text_enum;

text_enum! {
    /// Lifecycle status of a client relationship.
    #[derive(Default)]
    pub enum ClientStatus {
        #[default]
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
        Completed => "completed",
        OnHold => "on_hold",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum ProjectStatus {
        #[default]
        NotStarted => "not_started",
        InProgress => "in_progress",
        Review => "review",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Review workflow of an uploaded client document.
    #[derive(Default)]
    pub enum DocumentStatus {
        #[default]
        Pending => "pending",
        Uploaded => "uploaded",
        Reviewed => "reviewed",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum UpdateType {
        Milestone => "milestone",
        StatusChange => "status_change",
        #[default]
        General => "general",
    }
}

text_enum! {
    pub enum CommunicationType {
        Email => "email",
        Call => "call",
        Meeting => "meeting",
        Note => "note",
    }
}

text_enum! {
    pub enum Direction {
        Inbound => "inbound",
        Outbound => "outbound",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum Priority {
        Low => "low",
        #[default]
        Medium => "medium",
        High => "high",
    }
}

/// Free-form attributes attached to a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A client of the formation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Unique across all clients.
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    /// Team member responsible for this client.
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<ClientMetadata>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Insert payload for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    pub assigned_to: Option<i64>,
    pub metadata: Option<ClientMetadata>,
}

/// A unit of work for a client, e.g. an LLC filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProject {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    /// Percent complete, 0–100.
    pub progress: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<i64>,
    pub actual_hours: i64,
    pub budget: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub progress: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<i64>,
    pub budget: Option<Decimal>,
}

/// File metadata for a document a client provided or received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDocument {
    pub id: i64,
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_path: String,
    /// Size in bytes.
    pub file_size: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub uploaded_by: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub uploaded_by: Option<i64>,
}

/// Reviewer decision on a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReview {
    pub status: DocumentStatus,
    pub reviewed_by: i64,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMetadata {
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Timestamped narrative entry in a client's progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub id: i64,
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub update_type: UpdateType,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub hours_worked: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub metadata: Option<UpdateMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProgressUpdate {
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub update_type: UpdateType,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub hours_worked: i64,
    pub created_by: i64,
    pub metadata: Option<UpdateMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationMetadata {
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// A logged interaction with a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCommunication {
    pub id: i64,
    pub client_id: i64,
    pub project_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: CommunicationType,
    pub subject: String,
    pub content: String,
    pub direction: Direction,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<CommunicationMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCommunication {
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub kind: CommunicationType,
    pub subject: String,
    pub content: String,
    pub direction: Direction,
    pub created_by: i64,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<CommunicationMetadata>,
}

/// Headline numbers for the CRM dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_clients: i64,
    /// Projects currently `in_progress`.
    pub active_projects: i64,
    /// Documents still awaiting review (`pending` or `uploaded`).
    pub pending_documents: i64,
    pub recent_updates: Vec<ProgressUpdate>,
}

/// A client with everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWithDetails {
    #[serde(flatten)]
    pub client: Client,
    pub projects: Vec<ClientProject>,
    pub documents: Vec<ClientDocument>,
    pub recent_updates: Vec<ProgressUpdate>,
    pub communications: Vec<ClientCommunication>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_text() {
        assert_eq!(ClientStatus::OnHold.as_str(), "on_hold");
        assert_eq!("on_hold".parse::<ClientStatus>(), Ok(ClientStatus::OnHold));
        assert!("archived".parse::<ClientStatus>().is_err());
        assert_eq!(ClientStatus::default(), ClientStatus::Active);
        assert_eq!(ProjectStatus::default(), ProjectStatus::NotStarted);
        assert_eq!(DocumentStatus::default(), DocumentStatus::Pending);
        assert_eq!(UpdateType::default(), UpdateType::General);
    }

    #[test]
    fn communication_serializes_kind_as_type() {
        let comm = ClientCommunication {
            id: 1,
            client_id: 2,
            project_id: None,
            kind: CommunicationType::Call,
            subject: "Kickoff".into(),
            content: "Discussed EIN timeline".into(),
            direction: Direction::Outbound,
            created_by: 1,
            created_at: Utc::now(),
            scheduled_for: None,
            completed_at: None,
            metadata: None,
        };
        let json = serde_json::to_value(&comm).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["direction"], "outbound");
        assert_eq!(json["clientId"], 2);
    }

    #[test]
    fn client_metadata_defaults_tags() {
        let meta: ClientMetadata = serde_json::from_str(r#"{"priority":"high"}"#).unwrap();
        assert_eq!(meta.priority, Some(Priority::High));
        assert!(meta.tags.is_empty());
    }
}
