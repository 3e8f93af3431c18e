//! Read-only status publication for the dashboard.

use crate::domain::error::TraderError;
use crate::domain::status::EngineStatus;

pub trait StatusPort {
    fn publish(&self, status: &EngineStatus) -> Result<(), TraderError>;
}
