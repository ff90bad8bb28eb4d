//! Import outcome types.

use serde::Serialize;
use uuid::Uuid;

/// Stage at which a row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    /// Rejected by the file-level rules before anything was written.
    Structural,
    /// Rejected while resolving references or writing to the store.
    Apply,
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based data row number.
    pub row: usize,
    pub name: String,
    pub message: String,
    pub phase: ImportPhase,
}

/// A row that produced a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedRow {
    pub row: usize,
    pub name: String,
    pub id: Uuid,
}

/// Per-row result carried by progress updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Created { id: Uuid },
    Failed { message: String },
}

/// Snapshot of a running import, sent after every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub import_id: Uuid,
    /// Rows handled so far, including rows rejected before the apply phase.
    pub processed: usize,
    pub total: usize,
    pub row: usize,
    pub outcome: RowOutcome,
    pub succeeded: usize,
    pub failed: usize,
}

impl ImportProgress {
    /// Completion percentage, 0-100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed * 100) / self.total).min(100) as u8
    }
}

/// Final result of an import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub import_id: Uuid,
    /// Data rows in the file, including malformed ones.
    pub total: usize,
    pub created: Vec<ImportedRow>,
    pub errors: Vec<RowError>,
    pub cancelled: bool,
}

impl ImportReport {
    pub fn new(import_id: Uuid, total: usize) -> Self {
        Self {
            import_id,
            total,
            created: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.created.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// True when every row was imported and the run was not cancelled.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    /// Errors sorted by row number.
    pub fn sorted_errors(&self) -> Vec<&RowError> {
        let mut errors: Vec<&RowError> = self.errors.iter().collect();
        errors.sort_by_key(|e| e.row);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let progress = ImportProgress {
            import_id: Uuid::nil(),
            processed: 1,
            total: 3,
            row: 1,
            outcome: RowOutcome::Failed {
                message: "x".to_string(),
            },
            succeeded: 0,
            failed: 1,
        };
        assert_eq!(progress.percent(), 33);
        let empty = ImportProgress {
            total: 0,
            processed: 0,
            ..progress
        };
        assert_eq!(empty.percent(), 100);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ImportReport::new(Uuid::nil(), 2);
        report.created.push(ImportedRow {
            row: 1,
            name: "A".to_string(),
            id: Uuid::nil(),
        });
        assert!(report.is_clean());
        report.errors.push(RowError {
            row: 2,
            name: "B".to_string(),
            message: "bad".to_string(),
            phase: ImportPhase::Apply,
        });
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());

        let json = serde_json::to_value(&report.errors[0]).unwrap();
        assert_eq!(json["phase"], "apply");
    }
}
