//! Formation Desk: US company formation site, onboarding wizard and CRM backend.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod server;
pub mod site;
pub mod store;
mod text_enum;
pub mod validation;
