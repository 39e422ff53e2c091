//! Record extraction: `RawTaskRow` → `Task`.

use tracing::warn;

use crate::domain::{Category, ExtractionError, RawTaskRow, Task, TaskNumber};

/// Build a typed task from one raw row.
///
/// Only `number` and `category` are mandatory; the other cells are carried
/// through as-is, including `None`.
pub fn extract(row: &RawTaskRow) -> Result<Task, ExtractionError> {
    let raw_number = row
        .number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ExtractionError::MissingNumber)?;
    let number: TaskNumber = raw_number
        .parse()
        .map_err(|_| ExtractionError::InvalidNumber(raw_number.to_string()))?;

    let code = row
        .category
        .as_deref()
        .ok_or(ExtractionError::MissingCategory)?;
    let category = Category::from_code(code)?;

    Ok(Task {
        number,
        name: row.name.clone(),
        pdf_path: row.pdf_path.clone(),
        category,
        published_at: row.published_at.clone(),
    })
}

/// Extract every row, setting aside the ones that fail.
pub fn extract_all(rows: Vec<RawTaskRow>) -> (Vec<Task>, Vec<(RawTaskRow, ExtractionError)>) {
    let mut tasks = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for row in rows {
        match extract(&row) {
            Ok(task) => tasks.push(task),
            Err(error) => {
                warn!(number = ?row.number, category = ?row.category, %error, "skipping row");
                rejected.push((row, error));
            }
        }
    }
    (tasks, rejected)
}
