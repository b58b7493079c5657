use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;

use orgchart_core::types::{Compensation, Employee, SubordinateRef};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on employee records.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle to operate on compensation records.
    pub fn compensations(&self) -> CompensationRepository {
        CompensationRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for employee records.
///
/// The subordinate list is stored as a JSON document column so stub and
/// fully populated entries survive round-trips unchanged.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts a new employee record. The identifier must be unused.
    pub async fn insert(
        &self,
        employee: &Employee,
        now: DateTime<Utc>,
    ) -> Result<(), EmployeeError> {
        let reports_json = serde_json::to_string(&employee.direct_reports)?;
        let stamp = to_rfc3339(now);
        sqlx::query(
            "INSERT INTO employees \
             (id, first_name, last_name, position, department, direct_reports_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&employee.id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(&reports_json)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes the record under its identifier, replacing any existing row.
    ///
    /// The replace is idempotent; `created_at` of an existing row is kept.
    pub async fn save(&self, employee: &Employee, now: DateTime<Utc>) -> Result<(), EmployeeError> {
        let reports_json = serde_json::to_string(&employee.direct_reports)?;
        let stamp = to_rfc3339(now);
        sqlx::query(
            "INSERT INTO employees \
             (id, first_name, last_name, position, department, direct_reports_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name, \
                 position = excluded.position, \
                 department = excluded.department, \
                 direct_reports_json = excluded.direct_reports_json, \
                 updated_at = excluded.updated_at",
        )
        .bind(&employee.id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(&reports_json)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches an employee by identifier; `None` when no record exists.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Employee>, EmployeeError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, position, department, direct_reports_json \
             FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reports_json: String = row.get("direct_reports_json");
        let direct_reports: Vec<SubordinateRef> = serde_json::from_str(&reports_json)?;

        Ok(Some(Employee {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            position: row.get("position"),
            department: row.get("department"),
            direct_reports,
        }))
    }
}

/// Errors that can occur while operating on employee records.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("failed to decode subordinate list: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for compensation records, keyed by the referenced employee id.
#[derive(Clone)]
pub struct CompensationRepository {
    pool: SqlitePool,
}

impl CompensationRepository {
    /// Inserts a new compensation record.
    ///
    /// The table key enforces one record per employee; a conflicting insert
    /// surfaces as [`CompensationError::AlreadyExists`].
    pub async fn insert(
        &self,
        compensation: &Compensation,
        now: DateTime<Utc>,
    ) -> Result<(), CompensationError> {
        let result = sqlx::query(
            "INSERT INTO compensations (employee_id, salary, effective_date, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&compensation.employee_id)
        .bind(compensation.salary as i64)
        .bind(compensation.effective_date)
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) => {
                if matches!(db_err.code().as_deref(), Some("1555") | Some("2067")) {
                    return Err(CompensationError::AlreadyExists(
                        compensation.employee_id.clone(),
                    ));
                }
                Err(CompensationError::Database(sqlx::Error::Database(db_err)))
            }
            Err(err) => Err(CompensationError::Database(err)),
        }
    }

    /// Fetches the compensation record for the given employee id.
    pub async fn find_by_employee_id(
        &self,
        employee_id: &str,
    ) -> Result<Option<Compensation>, CompensationError> {
        let row = sqlx::query(
            "SELECT employee_id, salary, effective_date FROM compensations WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let salary: i64 = row.get("salary");
        let effective_date: NaiveDate = row.get("effective_date");

        Ok(Some(Compensation {
            employee_id: row.get("employee_id"),
            salary: salary as u64,
            effective_date,
        }))
    }
}

/// Errors that can occur while operating on compensation records.
#[derive(Debug, Error)]
pub enum CompensationError {
    #[error("compensation already recorded for employee {0}")]
    AlreadyExists(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for CompensationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    fn employee(id: &str, reports: Vec<SubordinateRef>) -> Employee {
        Employee {
            id: id.to_string(),
            first_name: "George".to_string(),
            last_name: "Harrison".to_string(),
            position: "Developer III".to_string(),
            department: "Engineering".to_string(),
            direct_reports: reports,
        }
    }

    #[tokio::test]
    async fn migrations_apply() {
        let db = setup_db().await;

        let tables: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
             AND name IN ('employees', 'compensations')",
        )
        .fetch_one(db.pool())
        .await
        .expect("fetch tables");
        assert_eq!(tables.0, 2);
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_subordinates() {
        let db = setup_db().await;
        let repo = db.employees();
        let record = employee(
            "store-round-trip",
            vec![
                SubordinateRef::stub("store-round-trip-child"),
                SubordinateRef::Missing,
            ],
        );

        repo.insert(&record, Utc::now()).await.expect("insert");
        let found = repo
            .find_by_id("store-round-trip")
            .await
            .expect("find")
            .expect("record present");

        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let db = setup_db().await;
        let found = db
            .employees()
            .find_by_id("store-absent")
            .await
            .expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let db = setup_db().await;
        let repo = db.employees();
        let mut record = employee("store-replace", vec![SubordinateRef::stub("x")]);
        repo.insert(&record, Utc::now()).await.expect("insert");

        record.position = "Principal Engineer".to_string();
        record.direct_reports.clear();
        repo.save(&record, Utc::now()).await.expect("save");

        let found = repo
            .find_by_id("store-replace")
            .await
            .expect("find")
            .expect("record present");
        assert_eq!(found.position, "Principal Engineer");
        assert!(found.direct_reports.is_empty());
    }

    #[tokio::test]
    async fn save_writes_new_record_when_absent() {
        let db = setup_db().await;
        let repo = db.employees();
        let record = employee("store-upsert", vec![]);

        repo.save(&record, Utc::now()).await.expect("save");
        let found = repo.find_by_id("store-upsert").await.expect("find");
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn compensation_round_trips_by_employee_id() {
        let db = setup_db().await;
        let repo = db.compensations();
        let record = Compensation {
            employee_id: "store-comp".to_string(),
            salary: 125_000,
            effective_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        };

        repo.insert(&record, Utc::now()).await.expect("insert");
        let found = repo
            .find_by_employee_id("store-comp")
            .await
            .expect("find")
            .expect("record present");
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn compensation_missing_returns_none() {
        let db = setup_db().await;
        let found = db
            .compensations()
            .find_by_employee_id("store-comp-absent")
            .await
            .expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn second_compensation_for_employee_is_rejected() {
        let db = setup_db().await;
        let repo = db.compensations();
        let record = Compensation {
            employee_id: "store-comp-dup".to_string(),
            salary: 90_000,
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };

        repo.insert(&record, Utc::now()).await.expect("insert");
        let err = repo.insert(&record, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CompensationError::AlreadyExists(id) if id == "store-comp-dup"));
    }
}
