pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{IntelError, IntelResult};
pub use types::{Alert, AlertSeverity, CustomerView, HealthLabel, HealthScore, Order, PopulationStats};
