//! Onboarding wizard: a four-step application tracked by session.
//!
//! Each step is auto-saved as an unvalidated snapshot and committed to the
//! application only once it passes its schema. Progress (completed steps,
//! current step, validation errors) lives on the application row.

pub mod model;
pub mod routes;
pub mod service;
pub mod steps;

pub use model::{ApplicationView, OnboardingApplication, OnboardingStatus};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use service::OnboardingService;
pub use steps::OnboardingStep;
