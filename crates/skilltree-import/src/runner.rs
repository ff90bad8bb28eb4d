//! Sequential CSV import with progress reporting and cancellation.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use skilltree_core::{
    new_v7, CreateMappingRequest, CreateNodeRequest, Error, EventBus, NodeKind, Placement,
    ProficiencyRepository, Result, SkilltreeConfig, TaxonomyEvent, TaxonomyNode,
    TaxonomyRepository,
};

use crate::codec::{parse_mapping_csv, parse_taxonomy_csv, MappingRow};
use crate::report::{ImportPhase, ImportProgress, ImportReport, ImportedRow, RowError, RowOutcome};
use crate::rules::{check_mapping_rows, check_taxonomy_rows, CheckedRow};

/// Callback invoked after every processed row.
pub type ProgressCallback = Box<dyn Fn(&ImportProgress) + Send + Sync>;

/// Cooperative cancellation flag, checked between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Work item for the apply loop: either a row to write or a row already
/// rejected before the apply phase.
enum Step<T> {
    Apply(T),
    Rejected(RowError),
}

impl<T: HasRow> Step<T> {
    fn row(&self) -> usize {
        match self {
            Step::Apply(item) => item.row(),
            Step::Rejected(e) => e.row,
        }
    }
}

trait HasRow {
    fn row(&self) -> usize;
}

impl HasRow for CheckedRow {
    fn row(&self) -> usize {
        self.row
    }
}

impl HasRow for MappingRow {
    fn row(&self) -> usize {
        self.row
    }
}

fn ordered_steps<T: HasRow>(accepted: Vec<T>, rejected: Vec<RowError>) -> Vec<Step<T>> {
    let mut steps: Vec<Step<T>> = accepted
        .into_iter()
        .map(Step::Apply)
        .chain(rejected.into_iter().map(Step::Rejected))
        .collect();
    steps.sort_by_key(Step::row);
    steps
}

/// Turn a store error into a row message.
fn apply_message(err: &Error) -> String {
    match err.violations() {
        Some(violations) => violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        None => err.to_string(),
    }
}

fn single_match(
    mut matches: Vec<TaxonomyNode>,
    label: &str,
    name: &str,
) -> std::result::Result<TaxonomyNode, String> {
    match matches.len() {
        0 => Err(format!("{} '{}' not found", label, name)),
        1 => Ok(matches.remove(0)),
        n => Err(format!("{} '{}' is ambiguous ({} matches)", label, name, n)),
    }
}

/// Runs imports against a repository, one row at a time.
pub struct ImportRunner<R> {
    repo: R,
    events: Option<Arc<EventBus>>,
    row_delay: Duration,
    progress: Option<ProgressCallback>,
}

impl<R> ImportRunner<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            events: None,
            row_delay: Duration::ZERO,
            progress: None,
        }
    }

    /// Runner configured from `[import]` settings.
    pub fn from_config(repo: R, config: &SkilltreeConfig) -> Self {
        Self::new(repo).with_row_delay(Duration::from_millis(config.import.row_delay_ms))
    }

    /// Publish `ImportProgress` and `ImportCompleted` on this bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Pause between rows so progress can be followed.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn report_progress(&self, report: &ImportReport, row: usize, outcome: RowOutcome) {
        let progress = ImportProgress {
            import_id: report.import_id,
            processed: report.succeeded() + report.failed(),
            total: report.total,
            row,
            outcome,
            succeeded: report.succeeded(),
            failed: report.failed(),
        };
        trace!(row, processed = progress.processed, "Import row processed");
        if let Some(ref callback) = self.progress {
            callback(&progress);
        }
        if let Some(ref events) = self.events {
            events.emit(TaxonomyEvent::ImportProgress {
                import_id: progress.import_id,
                processed: progress.processed,
                total: progress.total,
                succeeded: progress.succeeded,
                failed: progress.failed,
            });
        }
    }

    fn finish(&self, report: &ImportReport, start: Instant) {
        if let Some(ref events) = self.events {
            events.emit(TaxonomyEvent::ImportCompleted {
                import_id: report.import_id,
                created: report.succeeded(),
                failed: report.failed(),
                cancelled: report.cancelled,
            });
        }
        info!(
            import_id = %report.import_id,
            total = report.total,
            created = report.succeeded(),
            error_count = report.failed(),
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "Import finished"
        );
    }

    fn record(
        &self,
        report: &mut ImportReport,
        row: usize,
        result: std::result::Result<(String, Uuid), RowError>,
    ) {
        let outcome = match result {
            Ok((name, id)) => {
                report.created.push(ImportedRow { row, name, id });
                RowOutcome::Created { id }
            }
            Err(err) => {
                debug!(row, error = %err.message, "Import row rejected");
                let message = err.message.clone();
                report.errors.push(err);
                RowOutcome::Failed { message }
            }
        };
        self.report_progress(report, row, outcome);
    }

    async fn pause(&self) {
        if !self.row_delay.is_zero() {
            tokio::time::sleep(self.row_delay).await;
        }
    }
}

impl<R: TaxonomyRepository> ImportRunner<R> {
    /// Import taxonomy nodes from CSV.
    ///
    /// A missing column fails the whole file. Everything else is reported per
    /// row and the rows that can be created are created, in file order, so a
    /// row may name a parent defined earlier in the same file.
    #[instrument(skip(self, reader, cancel), fields(subsystem = "import", op = "import_taxonomy"))]
    pub async fn import_taxonomy<Rd: Read>(
        &self,
        reader: Rd,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        let start = Instant::now();
        let parsed = parse_taxonomy_csv(reader)?;
        let total = parsed.rows.len() + parsed.errors.len();
        let (checked, mut rejected) = check_taxonomy_rows(&parsed.rows);
        rejected.extend(parsed.errors);

        let mut report = ImportReport::new(new_v7(), total);
        info!(import_id = %report.import_id, total, "Taxonomy import started");

        for step in ordered_steps(checked, rejected) {
            if cancel.is_cancelled() {
                warn!(import_id = %report.import_id, "Taxonomy import cancelled");
                report.cancelled = true;
                break;
            }
            let row = step.row();
            let result = match step {
                Step::Rejected(err) => Err(err),
                Step::Apply(checked) => self.apply_node(checked).await,
            };
            self.record(&mut report, row, result);
            self.pause().await;
        }

        self.finish(&report, start);
        Ok(report)
    }

    async fn apply_node(&self, row: CheckedRow) -> std::result::Result<(String, Uuid), RowError> {
        let fail = |message: String| RowError {
            row: row.row,
            name: row.name.clone(),
            message,
            phase: ImportPhase::Apply,
        };

        let placement = match (row.kind, row.parent.as_deref()) {
            (NodeKind::Cluster, _) => Placement::Cluster,
            (kind, Some(parent_name)) => {
                let parent_kind = match kind {
                    NodeKind::Skill => NodeKind::Group,
                    _ => NodeKind::Cluster,
                };
                let matches = self
                    .repo
                    .find_by_name(parent_kind, parent_name)
                    .await
                    .map_err(|e| fail(apply_message(&e)))?;
                let parent = single_match(matches, "Parent", parent_name).map_err(fail)?;
                match kind {
                    NodeKind::Skill => Placement::skill(parent.id),
                    _ => Placement::group(parent.id),
                }
            }
            (_, None) => return Err(fail("Parent is required".to_string())),
        };

        let req = CreateNodeRequest {
            name: row.name.clone(),
            description: row.description.clone(),
            rank: None,
            placement,
        };
        match self.repo.create(req).await {
            Ok(node) => Ok((node.name, node.id)),
            Err(e) => Err(fail(apply_message(&e))),
        }
    }
}

impl<R: TaxonomyRepository + ProficiencyRepository> ImportRunner<R> {
    /// Import skill proficiency mappings from CSV.
    #[instrument(skip(self, reader, cancel), fields(subsystem = "import", op = "import_mappings"))]
    pub async fn import_mappings<Rd: Read>(
        &self,
        reader: Rd,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        let start = Instant::now();
        let parsed = parse_mapping_csv(reader)?;
        let total = parsed.rows.len() + parsed.errors.len();
        let (checked, mut rejected) = check_mapping_rows(&parsed.rows);
        rejected.extend(parsed.errors);

        let mut report = ImportReport::new(new_v7(), total);
        info!(import_id = %report.import_id, total, "Mapping import started");

        for step in ordered_steps(checked, rejected) {
            if cancel.is_cancelled() {
                warn!(import_id = %report.import_id, "Mapping import cancelled");
                report.cancelled = true;
                break;
            }
            let row = step.row();
            let result = match step {
                Step::Rejected(err) => Err(err),
                Step::Apply(mapping) => self.apply_mapping(mapping).await,
            };
            self.record(&mut report, row, result);
            self.pause().await;
        }

        self.finish(&report, start);
        Ok(report)
    }

    async fn apply_mapping(&self, row: MappingRow) -> std::result::Result<(String, Uuid), RowError> {
        let fail = |message: String| RowError {
            row: row.row,
            name: row.skill_name.clone(),
            message,
            phase: ImportPhase::Apply,
        };

        let matches = self
            .repo
            .find_by_name(NodeKind::Skill, &row.skill_name)
            .await
            .map_err(|e| fail(apply_message(&e)))?;
        let skill = single_match(matches, "Skill", &row.skill_name).map_err(fail)?;

        let level = self
            .repo
            .find_level_by_title(&row.level_title)
            .await
            .map_err(|e| fail(apply_message(&e)))?
            .ok_or_else(|| fail(format!("Proficiency level '{}' not found", row.level_title)))?;

        let req = CreateMappingRequest {
            skill_id: skill.id,
            proficiency_description: row.description.clone(),
            proficiency_level_id: level.id,
        };
        match self.repo.create_mapping(req).await {
            Ok(mapping) => Ok((mapping.skill_name, mapping.id)),
            Err(e) => Err(fail(apply_message(&e))),
        }
    }
}
