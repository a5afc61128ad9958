pub mod handlers;
pub mod models;
pub mod service;
pub mod simulated;

pub use models::{WeatherOutlook, WeatherSnapshot};
pub use service::{WeatherService, WeatherSettings};
