//! Record types
//!
//! Every record is owned by one user (`userId`) and stored both as a
//! document in a remote collection and inside a whole-list JSON snapshot
//! under `<prefix>_<userId>` in local storage.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ownership field shared by every collection
pub const OWNER_FIELD: &str = "userId";

/// A storable record kind
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human name used in errors and logs
    const KIND: &'static str;
    /// Remote collection name
    const COLLECTION: &'static str;
    /// Local snapshot key prefix
    const KEY_PREFIX: &'static str;

    fn id(&self) -> &str;

    fn owner(&self) -> &str;

    fn set_owner(&mut self, owner: &str);

    /// Recompute derived fields after decoding
    fn normalize(&mut self) {}

    /// Checks applied whenever a record crosses the storage boundary
    fn validate(&self) -> Result<(), String>;
}

/// Case-insensitive name match, Unicode aware ("Logística" = "LOGÍSTICA")
pub fn same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(())
    }
}

fn require_amount(value: f64, field: &str) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a non-negative amount", field))
    }
}

/// Employment status
///
/// Stored as a plain string. Values other than the three known ones (e.g.
/// "vacaciones" in older data) are kept as they are; only "active" counts
/// as active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    Suspended,
    Other(String),
}

impl From<String> for EmployeeStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => EmployeeStatus::Active,
            "inactive" => EmployeeStatus::Inactive,
            "suspended" => EmployeeStatus::Suspended,
            _ => EmployeeStatus::Other(value),
        }
    }
}

impl From<EmployeeStatus> for String {
    fn from(status: EmployeeStatus) -> Self {
        match status {
            EmployeeStatus::Other(value) => value,
            known => known.to_string(),
        }
    }
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmployeeStatus::Active => write!(f, "active"),
            EmployeeStatus::Inactive => write!(f, "inactive"),
            EmployeeStatus::Suspended => write!(f, "suspended"),
            EmployeeStatus::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Parses user input; only the known statuses are accepted
impl std::str::FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(EmployeeStatus::Active),
            "inactive" => Ok(EmployeeStatus::Inactive),
            "suspended" => Ok(EmployeeStatus::Suspended),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

/// An employee
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    /// National id, unique per owner
    pub cedula: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub position: String,
    /// Department name
    #[serde(default)]
    pub department: String,
    /// Monthly salary
    #[serde(default)]
    pub salary: f64,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
}

impl Employee {
    pub fn new(
        cedula: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        hire_date: NaiveDate,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: String::new(),
            cedula: cedula.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            phone: String::new(),
            position: String::new(),
            department: String::new(),
            salary: 0.0,
            hire_date,
            status: EmployeeStatus::Active,
        }
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = position.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn salary(mut self, salary: f64) -> Self {
        self.salary = salary;
        self
    }

    pub fn status(mut self, status: EmployeeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    /// Whether this employee belongs to the named department
    pub fn in_department(&self, name: &str) -> bool {
        !self.department.trim().is_empty() && same_label(&self.department, name)
    }
}

impl Record for Employee {
    const KIND: &'static str = "employee";
    const COLLECTION: &'static str = "employees";
    const KEY_PREFIX: &'static str = "employees";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.user_id
    }

    fn set_owner(&mut self, owner: &str) {
        self.user_id = owner.to_string();
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.id, "id")?;
        require(&self.cedula, "cedula")?;
        require(&self.first_name, "first name")?;
        require_amount(self.salary, "salary")
    }
}

/// One timesheet line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourEntry {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    /// "HH:MM"
    pub entry_time: String,
    /// "HH:MM"; earlier than `entry_time` means the next day
    pub exit_time: String,
    /// Derived from the two times
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub notes: String,
}

impl HourEntry {
    pub fn new(
        employee_id: impl Into<String>,
        date: NaiveDate,
        entry_time: impl Into<String>,
        exit_time: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: String::new(),
            employee_id: employee_id.into(),
            date,
            entry_time: entry_time.into(),
            exit_time: exit_time.into(),
            hours: 0.0,
            notes: String::new(),
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl Record for HourEntry {
    const KIND: &'static str = "hour entry";
    const COLLECTION: &'static str = "hours";
    const KEY_PREFIX: &'static str = "hours";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.user_id
    }

    fn set_owner(&mut self, owner: &str) {
        self.user_id = owner.to_string();
    }

    fn normalize(&mut self) {
        if let Ok(hours) = crate::domain::hours::compute_hours(&self.entry_time, &self.exit_time) {
            self.hours = hours;
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.id, "id")?;
        require(&self.employee_id, "employee")?;
        crate::domain::hours::parse_time(&self.entry_time).map_err(|e| e.to_string())?;
        crate::domain::hours::parse_time(&self.exit_time).map_err(|e| e.to_string())?;
        require_amount(self.hours, "hours")
    }
}

/// One payroll line for an employee and period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayrollEntry {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub employee_id: String,
    /// Two-digit month, "01".."12"
    pub month: String,
    /// Four-digit year
    pub year: String,
    #[serde(default)]
    pub base_salary: f64,
    #[serde(default)]
    pub overtime: f64,
    #[serde(default)]
    pub bonuses: f64,
    #[serde(default)]
    pub deductions: f64,
    pub total: f64,
}

impl PayrollEntry {
    /// New entry; `total` is filled in when the entry is added
    pub fn new(employee_id: impl Into<String>, month: u32, year: i32, base_salary: f64) -> Self {
        Self {
            id: new_id(),
            user_id: String::new(),
            employee_id: employee_id.into(),
            month: format!("{:02}", month),
            year: year.to_string(),
            base_salary,
            overtime: 0.0,
            bonuses: 0.0,
            deductions: 0.0,
            total: 0.0,
        }
    }

    pub fn overtime(mut self, amount: f64) -> Self {
        self.overtime = amount;
        self
    }

    pub fn bonuses(mut self, amount: f64) -> Self {
        self.bonuses = amount;
        self
    }

    pub fn deductions(mut self, amount: f64) -> Self {
        self.deductions = amount;
        self
    }

    /// "MM/YYYY"
    pub fn period(&self) -> String {
        format!("{}/{}", self.month, self.year)
    }

    pub fn is_period(&self, month: &str, year: &str) -> bool {
        self.month == month && self.year == year
    }
}

impl Record for PayrollEntry {
    const KIND: &'static str = "payroll entry";
    const COLLECTION: &'static str = "payroll";
    const KEY_PREFIX: &'static str = "payroll";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.user_id
    }

    fn set_owner(&mut self, owner: &str) {
        self.user_id = owner.to_string();
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.id, "id")?;
        require(&self.employee_id, "employee")?;
        let month_ok = self.month.len() == 2
            && self
                .month
                .parse::<u32>()
                .map(|m| (1..=12).contains(&m))
                .unwrap_or(false);
        if !month_ok {
            return Err(format!("month '{}' must be 01-12", self.month));
        }
        if self.year.len() != 4 || !self.year.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("year '{}' must have four digits", self.year));
        }
        for (amount, field) in [
            (self.base_salary, "base salary"),
            (self.overtime, "overtime"),
            (self.bonuses, "bonuses"),
            (self.deductions, "deductions"),
        ] {
            require_amount(amount, field)?;
        }
        if self.total.is_finite() {
            Ok(())
        } else {
            Err("total must be a number".to_string())
        }
    }
}

/// A department
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    /// Unique per owner, compared case-insensitively
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manager: Option<String>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: String::new(),
            name: name.into(),
            description: String::new(),
            manager: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }

    pub fn same_name(&self, name: &str) -> bool {
        same_label(&self.name, name)
    }
}

impl Record for Department {
    const KIND: &'static str = "department";
    const COLLECTION: &'static str = "departments";
    const KEY_PREFIX: &'static str = "departments";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.user_id
    }

    fn set_owner(&mut self, owner: &str) {
        self.user_id = owner.to_string();
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.id, "id")?;
        require(&self.name, "name")
    }
}
