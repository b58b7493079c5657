use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A person record held in the employee directory.
///
/// The identifier is assigned by the directory at creation time and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub direct_reports: Vec<SubordinateRef>,
}

/// Entry in an employee's subordinate list.
///
/// The record store keeps nested subordinates as identifier-only stubs, so a
/// list entry is either a fully populated record, a bare identifier, or a
/// `null` the source never filled in. Only the identifier may be trusted
/// before the entry has been resolved against the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubordinateRef {
    Full(Box<Employee>),
    Stub(StubRef),
    Missing,
}

/// Identifier-only subordinate entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubRef {
    #[serde(default)]
    pub id: String,
}

impl SubordinateRef {
    /// Identifier of the referenced employee; empty when the source supplied none.
    pub fn id(&self) -> &str {
        match self {
            Self::Full(employee) => &employee.id,
            Self::Stub(stub) => &stub.id,
            Self::Missing => "",
        }
    }

    pub fn stub(id: impl Into<String>) -> Self {
        Self::Stub(StubRef { id: id.into() })
    }
}

/// Payload for creating or fully replacing an employee record.
///
/// Field presence is the only validation applied; the directory assigns the
/// identifier itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub department: String,
    #[serde(default)]
    pub direct_reports: Vec<SubordinateRef>,
}

impl NewEmployee {
    /// Materializes the payload into a record carrying the given identifier.
    pub fn into_employee(self, id: String) -> Employee {
        Employee {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            position: self.position,
            department: self.department,
            direct_reports: self.direct_reports,
        }
    }
}

/// Salary record tied to one employee, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    pub employee_id: String,
    pub salary: u64,
    pub effective_date: NaiveDate,
}

/// Payload for recording an employee's compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompensation {
    pub salary: u64,
    pub effective_date: NaiveDate,
}

impl NewCompensation {
    pub fn for_employee(self, employee_id: String) -> Compensation {
        Compensation {
            employee_id,
            salary: self.salary,
            effective_date: self.effective_date,
        }
    }
}

/// Computed view pairing an employee with the number of transitive reports.
///
/// Built fresh on every query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingStructure {
    pub employee: Employee,
    pub number_of_reports: u64,
}
