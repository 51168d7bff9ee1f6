pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod predict;
pub mod server;
pub mod types;

pub use config::{ConfigError, ServerConfig};
pub use error::PredictError;
pub use predict::{Dispatcher, DrivingAssessment};
pub use server::{app, AppState};
