use crate::record::Record;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const ROSTER_ENTRY: &str = "roster/students.json";
pub const BUNDLE_FORMAT_V1: &str = "roster-bundle-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub student_count: usize,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct ImportedRoster {
    pub bundle_format: String,
    pub students: Vec<Record>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn export_roster_bundle(records: &[Record], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let payload = serde_json::to_vec_pretty(&json!({
        "students": records.iter().map(Record::to_json).collect::<Vec<_>>(),
    }))
    .context("failed to serialize roster")?;
    let checksum = sha256_hex(&payload);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "studentCount": records.len(),
        "sha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(ROSTER_ENTRY, opts)
        .context("failed to start roster entry")?;
    zip.write_all(&payload)
        .context("failed to write roster entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        student_count: records.len(),
        checksum,
    })
}

/// Reads and verifies a bundle. Nothing is written; the caller decides
/// whether to replace its roster with the result.
pub fn read_roster_bundle(in_path: &Path) -> anyhow::Result<ImportedRoster> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut payload = Vec::new();
    archive
        .by_name(ROSTER_ENTRY)
        .context("bundle missing roster/students.json")?
        .read_to_end(&mut payload)
        .context("failed to read roster entry")?;

    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = sha256_hex(&payload);
    if expected != actual {
        return Err(anyhow!(
            "roster checksum mismatch: manifest {}, payload {}",
            expected,
            actual
        ));
    }

    let body: serde_json::Value =
        serde_json::from_slice(&payload).context("roster entry is invalid JSON")?;
    let students: Vec<Record> = serde_json::from_value(
        body.get("students")
            .cloned()
            .ok_or_else(|| anyhow!("roster entry missing students"))?,
    )
    .context("roster entry has malformed students")?;

    Ok(ImportedRoster {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        students,
    })
}
