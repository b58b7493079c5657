use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use orgchart_core::hierarchy::ReportWalk;
use orgchart_core::types::{Employee, NewEmployee, ReportingStructure};
use orgchart_storage::{Database, EmployeeError};

/// Owns employee CRUD and the reporting structure computation.
#[derive(Clone)]
pub struct DirectoryService {
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl DirectoryService {
    pub fn new(database: Database, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        Self { database, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Assigns a fresh identifier to the payload and persists the record.
    pub async fn create(&self, input: NewEmployee) -> Result<Employee, DirectoryError> {
        let employee = input.into_employee(Uuid::new_v4().to_string());
        self.database
            .employees()
            .insert(&employee, self.now())
            .await?;

        counter!("directory_requests_total", "op" => "create").increment(1);
        debug!(stage = "directory", employee_id = %employee.id, "created employee record");
        Ok(employee)
    }

    /// Fetches an employee by identifier.
    pub async fn read(&self, id: &str) -> Result<Employee, DirectoryError> {
        counter!("directory_requests_total", "op" => "read").increment(1);
        self.database
            .employees()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    /// Fully replaces the record stored under the given identifier.
    ///
    /// Keeps the store's `save` semantics: a replace of an identifier with
    /// no existing row writes the record rather than failing.
    pub async fn update(&self, id: &str, input: NewEmployee) -> Result<Employee, DirectoryError> {
        let employee = input.into_employee(id.to_string());
        self.database
            .employees()
            .save(&employee, self.now())
            .await?;

        counter!("directory_requests_total", "op" => "update").increment(1);
        debug!(stage = "directory", employee_id = %employee.id, "replaced employee record");
        Ok(employee)
    }

    /// Computes the transitive count of the employee's direct and indirect
    /// reports.
    ///
    /// The root lookup propagates [`DirectoryError::NotFound`]. Subordinate
    /// references the store cannot resolve are dropped without aborting the
    /// computation; their descendants stay unreachable and uncounted. Each
    /// distinct identifier contributes exactly once regardless of how many
    /// reporting paths lead to it.
    pub async fn reporting_structure(
        &self,
        id: &str,
    ) -> Result<ReportingStructure, DirectoryError> {
        let employee = self.read(id).await?;
        counter!("directory_requests_total", "op" => "reporting_structure").increment(1);

        let repository = self.database.employees();
        let mut walk = ReportWalk::new(&employee);
        let mut lookups: u64 = 0;
        while let Some(subordinate_id) = walk.next_unresolved() {
            lookups += 1;
            match repository.find_by_id(&subordinate_id).await? {
                Some(subordinate) => walk.admit(&subordinate),
                None => {
                    debug!(
                        stage = "directory",
                        employee_id = %id,
                        subordinate_id = %subordinate_id,
                        "skipping dangling subordinate reference"
                    );
                    counter!("reporting_structure_dangling_total").increment(1);
                }
            }
        }
        histogram!("reporting_structure_lookups").record(lookups as f64);

        debug!(
            stage = "directory",
            employee_id = %id,
            number_of_reports = walk.count(),
            "computed reporting structure"
        );
        Ok(ReportingStructure {
            number_of_reports: walk.count(),
            employee,
        })
    }
}

/// Errors surfaced by the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no employee record for id {0}")]
    NotFound(String),
    #[error("employee store error: {0}")]
    Store(#[from] EmployeeError),
}
