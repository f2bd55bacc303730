pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;

pub use models::*;
pub use router::*;
pub use services::*;

pub struct PatientCellState {
    pub config: Arc<AppConfig>,
    pub patients: Arc<dyn PatientRepository>,
}

impl PatientCellState {
    pub fn new(config: Arc<AppConfig>, patients: Arc<dyn PatientRepository>) -> Self {
        Self { config, patients }
    }
}
