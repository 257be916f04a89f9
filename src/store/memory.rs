//! In-process question table for tests.

use async_trait::async_trait;

use super::{
    find_first_match, QuestionRecord, QuestionStore, ACTIVITY_CODE_COLUMN, EMAIL_COLUMN,
    IMAGE_COLUMNS, QUESTION_COLUMNS,
};
use crate::error::StoreError;

/// Rows kept in memory, header first, matched exactly like the sheet.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    rows: Vec<Vec<String>>,
}

impl MemoryStore {
    /// Empty table with the standard header row.
    pub fn new() -> Self {
        let header = std::iter::once(ACTIVITY_CODE_COLUMN)
            .chain(QUESTION_COLUMNS)
            .chain(IMAGE_COLUMNS)
            .chain(std::iter::once(EMAIL_COLUMN))
            .map(String::from)
            .collect();
        Self { rows: vec![header] }
    }

    /// Append a row in standard column order.
    pub fn with_record(mut self, record: &QuestionRecord) -> Self {
        let mut row = vec![record.activity_code.clone()];
        row.extend(record.questions.iter().cloned());
        row.extend(record.images.iter().map(|i| i.clone().unwrap_or_default()));
        row.push(record.teacher_email.clone().unwrap_or_default());
        self.rows.push(row);
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<QuestionRecord>, StoreError> {
        find_first_match(&self.rows, code)
    }
}
