//! ZIP bundling of generated export views
//!
//! The outbound artifact is a ZIP archive holding one CSV file per HUD
//! entity table, a `manifest.json` describing the bundle, and a
//! `manifest.sha256` checksum file. The manifest carries per-file SHA-256
//! hashes and is signed with HMAC-SHA256 so a receiver can detect
//! tampering after decryption.

use crate::config::secret::SecretString;
use crate::core::crypto::{decode_key_hex, sha256_hex};
use crate::core::generate::csv::encode_section;
use crate::core::generate::{CsvVersion, GeneratedViews};
use crate::domain::ids::ExportJobId;
use crate::domain::period::ExportPeriod;
use crate::domain::result::Result;
use crate::domain::HavenError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_NAME: &str = "manifest.json";
const CHECKSUM_NAME: &str = "manifest.sha256";

type HmacSha256 = Hmac<Sha256>;

/// One CSV file recorded in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub name: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub row_count: u64,
}

/// Bundle manifest written into the archive as `manifest.json`
///
/// The `signature` field is the hex HMAC-SHA256 over the manifest JSON
/// serialized without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub job_id: ExportJobId,
    pub csv_version: String,
    pub coc_code: String,
    pub hashed: bool,
    pub period_start: String,
    pub period_end: String,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<ManifestFile>,
    pub suppressed_record_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// The finished, still-unencrypted ZIP bundle
#[derive(Debug)]
pub struct PackagedArtifact {
    pub bytes: Vec<u8>,
    /// SHA-256 of the ZIP bytes, reported to the consent ledger
    pub sha256_hex: String,
    pub manifest: BundleManifest,
}

impl PackagedArtifact {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Packages generated views into a signed ZIP bundle
pub struct ExportPackagingService {
    signing_key: [u8; 32],
    csv_version: CsvVersion,
}

impl ExportPackagingService {
    pub fn new(signing_key_hex: &SecretString, csv_version: CsvVersion) -> Result<Self> {
        let signing_key = decode_key_hex(signing_key_hex.expose_secret().as_ref())
            .map_err(|e| HavenError::Packaging(format!("Bad signing key: {e}")))?;
        Ok(Self {
            signing_key,
            csv_version,
        })
    }

    /// Builds the ZIP bundle for one job.
    pub fn package(
        &self,
        job_id: ExportJobId,
        views: &GeneratedViews,
        period: &ExportPeriod,
        coc_code: &str,
        hashed: bool,
    ) -> Result<PackagedArtifact> {
        let mut files = Vec::with_capacity(views.sections.len());
        let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(views.sections.len() + 2);

        for section in &views.sections {
            let body = encode_section(section, self.csv_version);
            let name = section.kind.file_name().to_string();
            files.push(ManifestFile {
                name: name.clone(),
                sha256: sha256_hex(&body),
                size_bytes: body.len() as u64,
                row_count: section.rows.len() as u64,
            });
            entries.push((name, body));
        }

        let mut manifest = BundleManifest {
            job_id,
            csv_version: self.csv_version.as_str().to_string(),
            coc_code: coc_code.to_string(),
            hashed,
            period_start: period.start().to_string(),
            period_end: period.end().to_string(),
            generated_at: Utc::now(),
            files,
            suppressed_record_count: views.suppressed_count,
            signature: None,
        };
        manifest.signature = Some(self.sign(&manifest)?);

        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| HavenError::Packaging(format!("Manifest serialization failed: {e}")))?;
        let checksum_line = format!("{}  {}\n", sha256_hex(&manifest_bytes), MANIFEST_NAME);
        entries.push((MANIFEST_NAME.to_string(), manifest_bytes));
        entries.push((CHECKSUM_NAME.to_string(), checksum_line.into_bytes()));

        let bytes = write_zip(&entries)?;
        let sha256 = sha256_hex(&bytes);

        tracing::info!(
            job_id = %job_id,
            files = manifest.files.len(),
            bundle_bytes = bytes.len(),
            sha256 = %sha256,
            "Export bundle packaged"
        );

        Ok(PackagedArtifact {
            bytes,
            sha256_hex: sha256,
            manifest,
        })
    }

    /// HMAC-SHA256 over the manifest serialized without its signature field
    fn sign(&self, manifest: &BundleManifest) -> Result<String> {
        let mut unsigned = manifest.clone();
        unsigned.signature = None;
        let payload = serde_json::to_vec(&unsigned)
            .map_err(|e| HavenError::Packaging(format!("Manifest serialization failed: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| HavenError::Packaging(format!("Bad signing key: {e}")))?;
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();
        Ok(format!("{tag:x}"))
    }

    /// Recomputes the signature and compares it to the one recorded in the
    /// manifest. Used by the receiving side after decryption.
    pub fn verify(&self, manifest: &BundleManifest) -> Result<bool> {
        let recorded = match &manifest.signature {
            Some(signature) => signature,
            None => return Ok(false),
        };
        let expected = self.sign(manifest)?;
        Ok(*recorded == expected)
    }
}

fn write_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, body) in entries {
        writer
            .start_file(name, options)
            .map_err(|e| HavenError::Packaging(format!("Failed to add {name}: {e}")))?;
        writer
            .write_all(body)
            .map_err(|e| HavenError::Packaging(format!("Failed to write {name}: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| HavenError::Packaging(format!("Failed to finalize archive: {e}")))?;
    Ok(cursor.into_inner())
}
