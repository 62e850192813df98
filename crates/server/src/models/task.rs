use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Bill, BillKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: i64,
    pub company_id: i64,
    pub description: String,
    pub job_code: String,
    pub administrative: bool,
    pub active: bool,
    pub assignments: Vec<Assignment>,
    /// Bills not tied to one of `assignments`.
    pub bills: Vec<Bill>,
}

impl Task {
    pub fn assignment(&self, id: i64) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub fn assignment_mut(&mut self, id: i64) -> Option<&mut Assignment> {
        self.assignments.iter_mut().find(|a| a.id == id)
    }

    pub fn bill(&self, key: &BillKey) -> Option<&Bill> {
        self.bills.iter().find(|b| b.key() == *key)
    }

    pub fn clear_bills(&mut self) {
        self.bills.clear();
        for assignment in &mut self.assignments {
            assignment.bills.clear();
        }
    }
}

/// Binds a user to a task, optionally within a validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub company_id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub labor_cat: String,
    pub item_name: String,
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub bills: Vec<Bill>,
}

impl Assignment {
    /// A missing bound leaves that side of the window open.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.begin.map_or(true, |begin| begin <= day) && self.end.map_or(true, |end| day <= end)
    }

    pub fn bill(&self, key: &BillKey) -> Option<&Bill> {
        self.bills.iter().find(|b| b.key() == *key)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub description: String,
    pub job_code: String,
    #[serde(default)]
    pub administrative: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignment {
    pub task_id: i64,
    pub user_id: i64,
    pub labor_cat: String,
    pub item_name: String,
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Narrows assignment listings. Without a day every window matches;
/// inactive tasks and users are left out unless asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub day: Option<NaiveDate>,
    pub include_inactive: bool,
}
