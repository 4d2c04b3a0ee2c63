//! Landing-page content and contact leads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A formation package offered on the landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub price: &'static str,
    pub features: &'static [&'static str],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub popular: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Testimonial {
    pub id: &'static str,
    pub name: &'static str,
    pub company: &'static str,
    pub country: &'static str,
    pub content: &'static str,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub companies_formed: &'static str,
    pub countries: &'static str,
    pub avg_time: &'static str,
    pub success_rate: &'static str,
}

/// Everything the landing page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingContent {
    pub services: &'static [Service],
    pub testimonials: &'static [Testimonial],
    pub stats: SiteStats,
}

/// A contact-form inquiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLead {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub country: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewContactLead {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub country: Option<String>,
    pub message: String,
}
