pub mod handlers;
pub mod models;
pub mod service;

pub use models::{BoundaryPolygon, BoundarySnapshot, Provenance};
pub use service::BoundaryService;
