//! Question store: looks up an assignment's questions by activity code.
//!
//! The backing store is a table whose first row is a header. Columns are
//! found by header name, so the sheet's column order does not matter.

pub mod memory;
pub mod sheets;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sheets::{GoogleSheetsStore, ServiceAccountKey, DEFAULT_SHEETS_API_BASE};

/// Every worksheet has exactly this many question slots.
pub const QUESTION_COUNT: usize = 3;

pub const ACTIVITY_CODE_COLUMN: &str = "Activity_Code";
pub const QUESTION_COLUMNS: [&str; QUESTION_COUNT] = ["Question1", "Question2", "Question3"];
pub const IMAGE_COLUMNS: [&str; QUESTION_COUNT] = ["Image1_URL", "Image2_URL", "Image3_URL"];
pub const EMAIL_COLUMN: &str = "Email";

/// One assignment as stored in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub activity_code: String,
    /// Question text, empty when the cell is blank
    pub questions: [String; QUESTION_COUNT],
    /// Raw image cells; usually a JPEG data URI
    pub images: [Option<String>; QUESTION_COUNT],
    pub teacher_email: Option<String>,
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Read the whole store and return the first row whose activity code
    /// equals `code`. `Ok(None)` means no row matched.
    async fn find_by_code(&self, code: &str) -> Result<Option<QuestionRecord>, StoreError>;
}

/// Header positions of the columns this app reads.
#[derive(Debug)]
struct ColumnMap {
    activity_code: usize,
    questions: [Option<usize>; QUESTION_COUNT],
    images: [Option<usize>; QUESTION_COUNT],
    email: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self, StoreError> {
        let position = |name: &str| header.iter().position(|h| h.trim() == name);

        Ok(Self {
            activity_code: position(ACTIVITY_CODE_COLUMN)
                .ok_or(StoreError::MissingColumn(ACTIVITY_CODE_COLUMN))?,
            questions: QUESTION_COLUMNS.map(position),
            images: IMAGE_COLUMNS.map(position),
            email: position(EMAIL_COLUMN),
        })
    }

    fn record(&self, row: &[String]) -> QuestionRecord {
        QuestionRecord {
            activity_code: cell(row, Some(self.activity_code)).to_string(),
            questions: self.questions.map(|idx| cell(row, idx).to_string()),
            images: self.images.map(|idx| non_blank(cell(row, idx))),
            teacher_email: non_blank(cell(row, self.email)),
        }
    }
}

/// Short rows are padded with blanks.
fn cell(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("")
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Scan `rows` (header first) in storage order for the first match.
pub fn find_first_match(
    rows: &[Vec<String>],
    code: &str,
) -> Result<Option<QuestionRecord>, StoreError> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(None);
    };
    let columns = ColumnMap::from_header(header)?;

    Ok(body
        .iter()
        .find(|row| cell(row, Some(columns.activity_code)) == code)
        .map(|row| columns.record(row)))
}
