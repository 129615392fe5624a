use crate::config::{Config, MultiMatchPolicy, ParseErrorPolicy};
use crate::error::{Result, TraceError};
use crate::extractor::batch::ExtractionProgress;
use crate::extractor::trace_extractor::ExtractionOutcome;
use crate::scanner::TraceFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Extracted,
    NoTraceData,
    WriteFailed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub source: PathBuf,
    pub relative_path: PathBuf,
    pub size: u64,
    pub blocks_found: usize,
    pub outputs: Vec<PathBuf>,
    pub status: FileStatus,
}

impl FileEntry {
    pub fn from_outcome(file: &TraceFile, outcome: &ExtractionOutcome) -> Self {
        let status = if !outcome.is_clean() {
            FileStatus::WriteFailed
        } else if outcome.has_trace_data() {
            FileStatus::Extracted
        } else {
            FileStatus::NoTraceData
        };

        Self {
            source: file.source_path.clone(),
            relative_path: file.relative_path.clone(),
            size: file.size,
            blocks_found: outcome.blocks_found,
            outputs: outcome.outputs.iter().map(|o| o.path.clone()).collect(),
            status,
        }
    }

    pub fn skipped(file: &TraceFile) -> Self {
        Self {
            source: file.source_path.clone(),
            relative_path: file.relative_path.clone(),
            size: file.size,
            blocks_found: 0,
            outputs: Vec::new(),
            status: FileStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub files_scanned: usize,
    pub files_with_trace_data: usize,
    pub files_without_trace_data: usize,
    pub files_skipped: usize,
    pub outputs_written: usize,
    pub bytes_written: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub extension: String,
    pub marker_class: String,
    pub multi_match: MultiMatchPolicy,
    pub on_parse_error: ParseErrorPolicy,
}

impl From<&Config> for ConfigSnapshot {
    fn from(config: &Config) -> Self {
        Self {
            extension: config.scan.extension.clone(),
            marker_class: config.extract.marker_class.clone(),
            multi_match: config.extract.multi_match,
            on_parse_error: config.extract.on_parse_error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub summary: ExtractionSummary,
    pub files: Vec<FileEntry>,
    pub extraction_time: DateTime<Utc>,
    pub errors: Vec<String>,
    pub config_used: ConfigSnapshot,
}

impl ExtractionReport {
    pub fn new(
        input_dir: &Path,
        output_dir: &Path,
        progress: &ExtractionProgress,
        config: ConfigSnapshot,
    ) -> Self {
        let files_skipped = progress
            .entries
            .iter()
            .filter(|e| e.status == FileStatus::Skipped)
            .count();

        let summary = ExtractionSummary {
            files_scanned: progress.total_files,
            files_with_trace_data: progress.files_with_trace_data,
            files_without_trace_data: progress.files_without_trace_data(),
            files_skipped,
            outputs_written: progress.outputs_written,
            bytes_written: progress.bytes_written,
            duration_ms: progress.elapsed().as_millis() as u64,
        };

        Self {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            summary,
            files: progress.entries.clone(),
            extraction_time: Utc::now(),
            errors: progress.errors.clone(),
            config_used: config,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json_content = serde_json::to_string_pretty(self).map_err(|e| TraceError::Config {
            message: format!("Failed to serialize report to JSON: {}", e),
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, json_content)?;

        Ok(())
    }
}
