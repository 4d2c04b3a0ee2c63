//! Public site: landing content and contact-lead capture.

pub mod content;
pub mod model;
pub mod routes;

pub use routes::{SiteRouteState, site_routes};
