use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use orgchart_core::types::Employee;
use orgchart_storage::{Database, EmployeeError};

/// Loads a JSON array of employee records into the store.
///
/// Records are written with replace semantics so the loader can run on every
/// startup without duplicating rows. Returns the number of records written.
pub async fn load_from_file(database: &Database, path: &str) -> Result<usize, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_string(),
        source,
    })?;
    let employees: Vec<Employee> =
        serde_json::from_str(&raw).map_err(|source| SeedError::Decode {
            path: path.to_string(),
            source,
        })?;

    let repository = database.employees();
    let now = Utc::now();
    for employee in &employees {
        repository.save(employee, now).await?;
        debug!(stage = "seed", employee_id = %employee.id, "seeded employee record");
    }

    Ok(employees.len())
}

/// Errors that can occur while seeding the store.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse seed file {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("employee store error: {0}")]
    Store(#[from] EmployeeError),
}
