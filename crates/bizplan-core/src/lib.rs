//! Domain layer: credentials, the content-generation collaborator, the
//! notification dispatcher, the project lifecycle and the plan generation
//! engine, plus thin per-resource services used by the HTTP handlers.

pub mod credentials;
pub mod error;
pub mod generation;
pub mod generator;
pub mod lifecycle;
pub mod notify;
pub mod services;

pub use error::ServiceError;
