//! Domain model (tasks, categories, run ids, outcomes, errors).
//!
//! I/O を持たない純粋な型だけを置く。外部システムとのやり取りは `ports` 経由。

pub mod category;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;

pub use self::category::{Category, UnknownCategory, label};
pub use self::errors::{
    BrowserError, ErrorKind, ExtractionError, NotReadyReason, NotifyError, PageError, RunError,
    StorageError,
};
pub use self::ids::{ParseIdError, RunId};
pub use self::outcome::{InsertOutcome, RecordOutcome, RunCounts, RunReport, Sent};
pub use self::state::RunState;
pub use self::task::{RawTaskRow, StoredTask, Task, TaskNumber};
