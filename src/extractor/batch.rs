use crate::config::ParseErrorPolicy;
use crate::error::{Result, TraceError};
use crate::extractor::report::{FileEntry, FileStatus};
use crate::extractor::trace_extractor::{ExtractionOutcome, TraceExtractor, WrittenPaths};
use crate::mapper::PathMapper;
use crate::scanner::TraceFile;
use crate::ui::GracefulShutdown;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub files_with_trace_data: usize,
    pub outputs_written: usize,
    pub bytes_written: u64,
    pub current_file: Option<String>,
    pub start_time: Instant,
    pub entries: Vec<FileEntry>,
    pub errors: Vec<String>,
}

impl ExtractionProgress {
    pub fn new(total_files: usize) -> Self {
        Self {
            files_processed: 0,
            total_files,
            files_with_trace_data: 0,
            outputs_written: 0,
            bytes_written: 0,
            current_file: None,
            start_time: Instant::now(),
            entries: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_outcome(&mut self, file: &TraceFile, outcome: &ExtractionOutcome) {
        self.files_processed += 1;
        self.current_file = Some(file.display_path());

        if outcome.has_trace_data() {
            self.files_with_trace_data += 1;
        }
        self.outputs_written += outcome.outputs.len();
        self.bytes_written += outcome.bytes_written();
        self.errors.extend(outcome.write_errors.iter().cloned());
        self.entries.push(FileEntry::from_outcome(file, outcome));
    }

    pub fn record_skipped(&mut self, file: &TraceFile, error: &TraceError) {
        self.files_processed += 1;
        self.current_file = Some(file.display_path());
        self.add_error(format!("Skipped {}: {}", file.source_path.display(), error));
        self.entries.push(FileEntry::skipped(file));
    }

    pub fn add_error<S: Into<String>>(&mut self, error: S) {
        self.errors.push(error.into());
    }

    pub fn files_without_trace_data(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == FileStatus::NoTraceData)
            .count()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Runs the extractor over a list of discovered files, one at a time.
pub struct BatchRunner<'a> {
    extractor: &'a TraceExtractor,
    mapper: &'a PathMapper,
    on_parse_error: ParseErrorPolicy,
    shutdown: Option<&'a GracefulShutdown>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(extractor: &'a TraceExtractor, mapper: &'a PathMapper) -> Self {
        Self {
            extractor,
            mapper,
            on_parse_error: ParseErrorPolicy::Abort,
            shutdown: None,
        }
    }

    pub fn with_parse_error_policy(mut self, policy: ParseErrorPolicy) -> Self {
        self.on_parse_error = policy;
        self
    }

    pub fn with_shutdown(mut self, shutdown: &'a GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Write failures are collected in the progress and never stop the run.
    /// Unreadable sources stop it unless the policy says to skip. No output
    /// path is written twice in one run; the later write is recorded as a
    /// failure instead.
    pub fn run(
        &self,
        files: &[TraceFile],
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<ExtractionProgress> {
        let mut progress = ExtractionProgress::new(files.len());
        let mut written = WrittenPaths::default();

        for file in files {
            if let Some(shutdown) = self.shutdown {
                shutdown.check_shutdown()?;
            }

            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            let destination = self.mapper.map(&file.source_path)?;

            let result = self.extractor.extract_file_tracked(
                &file.source_path,
                Some(destination.as_path()),
                &mut written,
            );

            match result {
                Ok(outcome) => progress.record_outcome(file, &outcome),
                Err(e @ TraceError::ReadSource { .. })
                    if self.on_parse_error == ParseErrorPolicy::Skip =>
                {
                    warn!(src = %file.source_path.display(), error = %e, "skipping unreadable trace file");
                    progress.record_skipped(file, &e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        Ok(progress)
    }
}
