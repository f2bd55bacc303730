pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use chrono::FixedOffset;

use shared_config::AppConfig;
use shared_utils::clock::Clock;

pub use models::*;
pub use services::*;

/// Shared handles for every doctor-cell handler.
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub slots: Arc<dyn SlotRepository>,
    pub clock: Arc<dyn Clock>,
}

impl DoctorCellState {
    pub fn new(
        config: Arc<AppConfig>,
        doctors: Arc<dyn DoctorRepository>,
        slots: Arc<dyn SlotRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            doctors,
            slots,
            clock,
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        self.config.scheduling.timezone()
    }
}
