pub mod client;
pub mod handlers;
pub mod models;
pub mod service;

pub use client::HttpPredictionBackend;
pub use service::PredictionService;
