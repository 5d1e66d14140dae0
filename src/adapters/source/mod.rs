//! Operational data source adapters
//!
//! The view generator reads client/enrollment/service data through the
//! [`OperationalDataSource`] trait. The production deployment backs this
//! with the operational database; this crate ships a JSON-file adapter used
//! by the CLI and an in-memory adapter for tests.

use crate::core::generate::entities::EntityKind;
use crate::core::generate::vawa::VawaProtectionIndex;
use crate::domain::ids::ProjectId;
use crate::domain::result::Result;
use crate::domain::HavenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One source record before materialization
///
/// `subject_key` is the data subject's internal identifier; it drives VAWA
/// protection lookup and (hashed) ledger reporting, and never appears in
/// the export verbatim unless it is also a catalog field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRow {
    pub subject_key: String,
    pub fields: BTreeMap<String, Option<String>>,
}

/// Read access to the operational store for one tenant
#[async_trait]
pub trait OperationalDataSource: Send + Sync {
    /// Fetches candidate rows for one entity table. Project-scope and
    /// reporting-window filtering happen in the generator; sources may
    /// pre-filter on the given projects and CoC but are not required to.
    async fn fetch_rows(
        &self,
        entity: EntityKind,
        project_ids: &[ProjectId],
        coc_code: &str,
    ) -> Result<Vec<SourceRow>>;

    /// VAWA protection decisions for the tenant's data subjects.
    async fn vawa_protections(&self) -> Result<VawaProtectionIndex>;
}

/// JSON-file-backed data source
///
/// Reads `<dir>/<Section>.json` (an array of [`SourceRow`]) per entity and
/// `<dir>/vawa.json` for the protection index. Missing files mean empty
/// tables, so a partial fixture directory is usable.
pub struct JsonFileDataSource {
    dir: PathBuf,
}

impl JsonFileDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl OperationalDataSource for JsonFileDataSource {
    async fn fetch_rows(
        &self,
        entity: EntityKind,
        _project_ids: &[ProjectId],
        _coc_code: &str,
    ) -> Result<Vec<SourceRow>> {
        let path = self.dir.join(format!("{}.json", entity.section_name()));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HavenError::Generation(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let rows: Vec<SourceRow> = serde_json::from_str(&contents).map_err(|e| {
            HavenError::Generation(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(rows)
    }

    async fn vawa_protections(&self) -> Result<VawaProtectionIndex> {
        let path = self.dir.join("vawa.json");
        if !path.exists() {
            return Ok(VawaProtectionIndex::new());
        }
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HavenError::Generation(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let index: VawaProtectionIndex = serde_json::from_str(&contents).map_err(|e| {
            HavenError::Generation(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(index)
    }
}

/// In-memory data source for tests and dry runs
#[derive(Default)]
pub struct InMemoryDataSource {
    rows: BTreeMap<EntityKind, Vec<SourceRow>>,
    vawa: VawaProtectionIndex,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, entity: EntityKind, rows: Vec<SourceRow>) -> Self {
        self.rows.insert(entity, rows);
        self
    }

    pub fn with_vawa(mut self, vawa: VawaProtectionIndex) -> Self {
        self.vawa = vawa;
        self
    }
}

#[async_trait]
impl OperationalDataSource for InMemoryDataSource {
    async fn fetch_rows(
        &self,
        entity: EntityKind,
        _project_ids: &[ProjectId],
        _coc_code: &str,
    ) -> Result<Vec<SourceRow>> {
        Ok(self.rows.get(&entity).cloned().unwrap_or_default())
    }

    async fn vawa_protections(&self) -> Result<VawaProtectionIndex> {
        Ok(self.vawa.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_files_mean_empty_tables() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileDataSource::new(dir.path());
        let rows = source
            .fetch_rows(EntityKind::Client, &[], "CA-600")
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(source.vawa_protections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_section_file() {
        let dir = TempDir::new().unwrap();
        let rows = vec![SourceRow {
            subject_key: "subject-1".to_string(),
            fields: BTreeMap::from([
                ("PersonalID".to_string(), Some("p-1".to_string())),
                ("FirstName".to_string(), Some("Ada".to_string())),
            ]),
        }];
        tokio::fs::write(
            dir.path().join("Client.json"),
            serde_json::to_vec(&rows).unwrap(),
        )
        .await
        .unwrap();

        let source = JsonFileDataSource::new(dir.path());
        let loaded = source
            .fetch_rows(EntityKind::Client, &[], "CA-600")
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].subject_key, "subject-1");
    }

    #[tokio::test]
    async fn test_malformed_file_is_generation_error() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("Client.json"), b"not json")
            .await
            .unwrap();
        let source = JsonFileDataSource::new(dir.path());
        let result = source.fetch_rows(EntityKind::Client, &[], "CA-600").await;
        assert!(result.is_err());
    }
}
