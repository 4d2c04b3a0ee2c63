//! CRM: clients, their projects, documents, progress log and communications.

pub mod model;
pub mod routes;
pub mod validate;

pub use model::{Client, ClientStatus, ClientWithDetails, DashboardStats};
pub use routes::{ClientRouteState, client_routes};
