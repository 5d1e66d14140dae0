//! HUD export view generation
//!
//! Materializes per-entity CSV row sets from the operational store,
//! applying the CoC operating-year window, VAWA suppression, and (in
//! hashed mode) one-way hashing of direct identifiers. A generation
//! failure for any entity table aborts the whole job - a partial bundle
//! could be mistaken for a complete one.

pub mod csv;
pub mod entities;
pub mod vawa;

pub use entities::{CsvVersion, EntityKind, EntityRow, EntitySection};
pub use vawa::{RowDisposition, VawaProtection, VawaProtectionIndex, REDACTION_MARKER};

use crate::adapters::source::{OperationalDataSource, SourceRow};
use crate::domain::ids::ProjectId;
use crate::domain::period::ExportPeriod;
use crate::domain::result::Result;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything the downstream pipeline needs from materialization
#[derive(Debug)]
pub struct GeneratedViews {
    pub sections: Vec<EntitySection>,
    /// Rows withheld entirely under VAWA SUPPRESS
    pub suppressed_count: u64,
    /// Rows counted for aggregates only under VAWA AGGREGATE_ONLY
    pub aggregate_only_count: u64,
    /// SHA-256 hashes of distinct data-subject keys, for ledger reporting
    pub hashed_subject_keys: BTreeSet<String>,
    /// The reporting window actually applied (period ∩ operating year)
    pub effective_window: ExportPeriod,
}

impl GeneratedViews {
    pub fn subject_count(&self) -> u64 {
        self.hashed_subject_keys.len() as u64
    }

    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

/// Materializes entity row sets for one export job
pub struct HudExportViewGenerator {
    source: Arc<dyn OperationalDataSource>,
    csv_version: CsvVersion,
}

impl HudExportViewGenerator {
    pub fn new(source: Arc<dyn OperationalDataSource>, csv_version: CsvVersion) -> Self {
        Self {
            source,
            csv_version,
        }
    }

    pub fn csv_version(&self) -> CsvVersion {
        self.csv_version
    }

    /// Generates all entity sections for the job.
    ///
    /// The caller-specified period is intersected with the CoC operating
    /// year (Oct 1 - Sep 30) before any row is admitted. VAWA protection
    /// is applied per-row as rows are built, and direct identifiers are
    /// hashed in place when `hashed` is set.
    pub async fn generate(
        &self,
        period: &ExportPeriod,
        project_ids: &[ProjectId],
        coc_code: &str,
        hashed: bool,
    ) -> Result<GeneratedViews> {
        // The operating year containing the period end always overlaps the
        // period, so the intersection cannot be empty
        let window = period.operating_window().unwrap_or(*period);
        let project_filter: BTreeSet<String> =
            project_ids.iter().map(|p| p.to_string()).collect();
        let vawa = self.source.vawa_protections().await?;

        tracing::info!(
            window = %window,
            projects = project_ids.len(),
            coc_code = %coc_code,
            hashed = hashed,
            vawa_protected_subjects = vawa.len(),
            "Starting view generation"
        );

        let mut sections = Vec::with_capacity(EntityKind::ALL.len());
        let mut suppressed_count = 0u64;
        let mut aggregate_only_count = 0u64;
        let mut hashed_subject_keys = BTreeSet::new();

        for kind in EntityKind::ALL {
            let source_rows = self.source.fetch_rows(kind, project_ids, coc_code).await?;
            let candidate_count = source_rows.len();

            let mut section = EntitySection::new(kind);
            for source_row in source_rows {
                if !row_in_project_scope(&source_row, &project_filter) {
                    continue;
                }
                if !row_in_window(kind, &source_row, &window) {
                    continue;
                }

                let mut row =
                    EntityRow::new(kind, section.rows.len() + 1, source_row.fields.clone());

                match vawa.apply(&mut row, &source_row.subject_key) {
                    RowDisposition::Suppressed => {
                        suppressed_count += 1;
                        continue;
                    }
                    RowDisposition::AggregateCounted => {
                        aggregate_only_count += 1;
                        continue;
                    }
                    RowDisposition::Emit => {}
                }

                if hashed {
                    for column in kind.direct_identifier_columns() {
                        if let Some(value) = row.field(column) {
                            let digest = hash_identifier(value);
                            row.set_field(column, Some(digest));
                        }
                    }
                }

                hashed_subject_keys.insert(hash_identifier(&source_row.subject_key));
                section.rows.push(row);
            }

            tracing::debug!(
                entity = %kind,
                candidates = candidate_count,
                emitted = section.rows.len(),
                "Entity section generated"
            );
            sections.push(section);
        }

        tracing::info!(
            rows = sections.iter().map(|s| s.rows.len()).sum::<usize>(),
            suppressed = suppressed_count,
            aggregate_only = aggregate_only_count,
            subjects = hashed_subject_keys.len(),
            "View generation complete"
        );

        Ok(GeneratedViews {
            sections,
            suppressed_count,
            aggregate_only_count,
            hashed_subject_keys,
            effective_window: window,
        })
    }
}

/// One-way hash for direct identifiers and data-subject keys
pub fn hash_identifier(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Project-scope admission rule.
///
/// An empty filter means the whole CoC. Otherwise a row carrying a
/// `ProjectID` must match one of the requested projects; rows without the
/// field (Client rows) are admitted, since client records are scoped
/// through their enrollments.
fn row_in_project_scope(row: &SourceRow, project_filter: &BTreeSet<String>) -> bool {
    if project_filter.is_empty() {
        return true;
    }
    match row.fields.get("ProjectID").and_then(|v| v.as_deref()) {
        Some(project_id) => project_filter.contains(project_id.trim()),
        None => true,
    }
}

/// Reporting-window admission rule per entity table.
///
/// Enrollments are admitted when they overlap the window (entry on or
/// before the window end, exit absent or on/after the window start);
/// dated records are admitted when their primary date falls inside it.
/// Rows whose filter date is missing or unparseable are admitted and left
/// to validation to flag.
fn row_in_window(kind: EntityKind, row: &SourceRow, window: &ExportPeriod) -> bool {
    let field_date = |name: &str| -> Option<NaiveDate> {
        row.fields
            .get(name)
            .and_then(|v| v.as_deref())
            .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
    };

    match kind {
        EntityKind::Client => true,
        EntityKind::Enrollment => {
            let entry_ok = field_date("EntryDate")
                .map(|d| d <= window.end())
                .unwrap_or(true);
            let exit_ok = field_date("ExitDate")
                .map(|d| d >= window.start())
                .unwrap_or(true);
            entry_ok && exit_ok
        }
        EntityKind::Exit => field_date("ExitDate")
            .map(|d| window.contains(d))
            .unwrap_or(true),
        EntityKind::Services => field_date("DateProvided")
            .map(|d| window.contains(d))
            .unwrap_or(true),
        EntityKind::CurrentLivingSituation
        | EntityKind::IncomeBenefits
        | EntityKind::HealthAndDv
        | EntityKind::Disabilities => field_date("InformationDate")
            .map(|d| window.contains(d))
            .unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::InMemoryDataSource;
    use std::collections::BTreeMap;

    fn source_row(subject: &str, fields: &[(&str, &str)]) -> SourceRow {
        SourceRow {
            subject_key: subject.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        }
    }

    fn period() -> ExportPeriod {
        ExportPeriod::between(
            NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generation_hashes_direct_identifiers() {
        let source = InMemoryDataSource::new().with_rows(
            EntityKind::Client,
            vec![source_row(
                "subject-1",
                &[("PersonalID", "p-1"), ("FirstName", "Ada"), ("SSN", "123456789")],
            )],
        );
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", true).await.unwrap();

        let client_section = &views.sections[0];
        let row = &client_section.rows[0];
        assert_eq!(row.field("FirstName"), Some(hash_identifier("Ada").as_str()));
        assert_eq!(row.field("SSN"), Some(hash_identifier("123456789").as_str()));
        // Non-identifier fields untouched
        assert_eq!(row.field("PersonalID"), Some("p-1"));
    }

    #[tokio::test]
    async fn test_unhashed_mode_leaves_identifiers() {
        let source = InMemoryDataSource::new().with_rows(
            EntityKind::Client,
            vec![source_row("subject-1", &[("FirstName", "Ada")])],
        );
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", false).await.unwrap();
        assert_eq!(views.sections[0].rows[0].field("FirstName"), Some("Ada"));
    }

    #[tokio::test]
    async fn test_vawa_suppression_counted() {
        let mut vawa = VawaProtectionIndex::new();
        vawa.protect("subject-dv", VawaProtection::Suppress);
        let source = InMemoryDataSource::new()
            .with_rows(
                EntityKind::Services,
                vec![
                    source_row("subject-dv", &[("ServicesID", "s-1"), ("DateProvided", "2024-02-01")]),
                    source_row("subject-ok", &[("ServicesID", "s-2"), ("DateProvided", "2024-02-02")]),
                ],
            )
            .with_vawa(vawa);
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", true).await.unwrap();

        assert_eq!(views.suppressed_count, 1);
        let services = views
            .sections
            .iter()
            .find(|s| s.kind == EntityKind::Services)
            .unwrap();
        assert_eq!(services.rows.len(), 1);
        assert_eq!(services.rows[0].field("ServicesID"), Some("s-2"));
        // Only the emitted subject is counted
        assert_eq!(views.subject_count(), 1);
    }

    #[tokio::test]
    async fn test_window_filters_out_of_period_services() {
        let source = InMemoryDataSource::new().with_rows(
            EntityKind::Services,
            vec![
                source_row("s1", &[("ServicesID", "in"), ("DateProvided", "2024-02-01")]),
                source_row("s2", &[("ServicesID", "out"), ("DateProvided", "2021-02-01")]),
            ],
        );
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", true).await.unwrap();
        let services = views
            .sections
            .iter()
            .find(|s| s.kind == EntityKind::Services)
            .unwrap();
        assert_eq!(services.rows.len(), 1);
        assert_eq!(services.rows[0].field("ServicesID"), Some("in"));
    }

    #[tokio::test]
    async fn test_project_filter_drops_other_projects() {
        let requested = ProjectId::of(uuid::Uuid::new_v4());
        let other = ProjectId::of(uuid::Uuid::new_v4());
        let source = InMemoryDataSource::new().with_rows(
            EntityKind::Services,
            vec![
                source_row(
                    "s1",
                    &[
                        ("ServicesID", "in-scope"),
                        ("ProjectID", &requested.to_string()),
                        ("DateProvided", "2024-02-01"),
                    ],
                ),
                source_row(
                    "s2",
                    &[
                        ("ServicesID", "out-of-scope"),
                        ("ProjectID", &other.to_string()),
                        ("DateProvided", "2024-02-01"),
                    ],
                ),
            ],
        );
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator
            .generate(&period(), &[requested], "CA-600", true)
            .await
            .unwrap();
        let services = views
            .sections
            .iter()
            .find(|s| s.kind == EntityKind::Services)
            .unwrap();
        assert_eq!(services.rows.len(), 1);
        assert_eq!(services.rows[0].field("ServicesID"), Some("in-scope"));
    }

    #[tokio::test]
    async fn test_empty_project_filter_admits_all_projects() {
        let source = InMemoryDataSource::new().with_rows(
            EntityKind::Services,
            vec![source_row(
                "s1",
                &[
                    ("ServicesID", "s-1"),
                    ("ProjectID", &uuid::Uuid::new_v4().to_string()),
                    ("DateProvided", "2024-02-01"),
                ],
            )],
        );
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", true).await.unwrap();
        let services = views
            .sections
            .iter()
            .find(|s| s.kind == EntityKind::Services)
            .unwrap();
        assert_eq!(services.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_enrollment_overlap_rule() {
        // Entered before the window, never exited: still active, admitted
        let open_enrollment = source_row(
            "s1",
            &[("EnrollmentID", "e-open"), ("EntryDate", "2022-01-01")],
        );
        // Entered and exited before the window: excluded
        let closed_early = source_row(
            "s2",
            &[
                ("EnrollmentID", "e-closed"),
                ("EntryDate", "2022-01-01"),
                ("ExitDate", "2022-06-01"),
            ],
        );
        let source = InMemoryDataSource::new()
            .with_rows(EntityKind::Enrollment, vec![open_enrollment, closed_early]);
        let generator =
            HudExportViewGenerator::new(Arc::new(source), CsvVersion::Fy2024);
        let views = generator.generate(&period(), &[], "CA-600", true).await.unwrap();
        let enrollments = views
            .sections
            .iter()
            .find(|s| s.kind == EntityKind::Enrollment)
            .unwrap();
        assert_eq!(enrollments.rows.len(), 1);
        assert_eq!(enrollments.rows[0].field("EnrollmentID"), Some("e-open"));
    }

    #[test]
    fn test_hash_identifier_stable() {
        assert_eq!(hash_identifier("abc"), hash_identifier("abc"));
        assert_ne!(hash_identifier("abc"), hash_identifier("abd"));
        assert_eq!(hash_identifier("abc").len(), 64);
    }
}
