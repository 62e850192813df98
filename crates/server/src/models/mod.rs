pub mod bill;
pub mod holiday;
pub mod pay_period;
pub mod task;
pub mod timesheet;
pub mod user;

pub use bill::{Bill, BillEntry, BillKey};
pub use holiday::Holiday;
pub use pay_period::{PayPeriod, PayPeriodType};
pub use task::{Assignment, Task};
pub use timesheet::{AuditLog, Enrichment, LifecycleFlag, Timesheet};
pub use user::{Role, Supervisor, User};
