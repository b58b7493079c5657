use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use orgchart_core::types::{Compensation, NewCompensation};
use orgchart_storage::{CompensationError, Database};

/// Create/read access to compensation records, keyed by employee id.
///
/// Creation does not verify that the employee exists; compensation may be
/// recorded ahead of the employee record.
#[derive(Clone)]
pub struct CompensationService {
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl CompensationService {
    pub fn new(database: Database, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        Self { database, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Persists a new compensation record for the given employee id.
    pub async fn create(
        &self,
        employee_id: &str,
        input: NewCompensation,
    ) -> Result<Compensation, CompensationServiceError> {
        let compensation = input.for_employee(employee_id.to_string());
        self.database
            .compensations()
            .insert(&compensation, self.now())
            .await?;

        counter!("compensation_requests_total", "op" => "create").increment(1);
        debug!(stage = "compensation", employee_id = %employee_id, "recorded compensation");
        Ok(compensation)
    }

    /// Fetches the compensation record for the given employee id.
    pub async fn read(&self, employee_id: &str) -> Result<Compensation, CompensationServiceError> {
        counter!("compensation_requests_total", "op" => "read").increment(1);
        self.database
            .compensations()
            .find_by_employee_id(employee_id)
            .await?
            .ok_or_else(|| CompensationServiceError::NotFound(employee_id.to_string()))
    }
}

/// Errors surfaced by the compensation service.
#[derive(Debug, Error)]
pub enum CompensationServiceError {
    #[error("no compensation record for employee {0}")]
    NotFound(String),
    #[error("compensation already recorded for employee {0}")]
    AlreadyExists(String),
    #[error("compensation store error: {0}")]
    Store(CompensationError),
}

impl From<CompensationError> for CompensationServiceError {
    fn from(err: CompensationError) -> Self {
        match err {
            CompensationError::AlreadyExists(employee_id) => Self::AlreadyExists(employee_id),
            other => Self::Store(other),
        }
    }
}
