pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod mapper;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, MultiMatchArg, OutputFormat};
pub use config::{
    CliOverrides, Config, ExtractConfig, MultiMatchPolicy, OutputConfig, ParseErrorPolicy,
    ScanConfig,
};
pub use error::{Result, TraceError, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    BatchRunner, ConfigSnapshot, ExtractionOutcome, ExtractionProgress, ExtractionReport,
    FileEntry, FileStatus, TraceDataBlock, TraceExtractor, WrittenOutput,
};
pub use mapper::{output_filename, PathMapper};
pub use scanner::{traverse_dir, DirectoryWalker, ExtensionFilter, ScanStatistics, TraceFile};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};

/// Main library interface tying configuration, extraction and console output together
pub struct SystraceParser {
    config: Config,
    extractor: TraceExtractor,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl SystraceParser {
    /// Create an instance and install the Ctrl+C handler
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Self::with_shutdown(config, output_mode, verbose, quiet, shutdown)
    }

    /// Create an instance around an existing shutdown flag
    pub fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Result<Self> {
        let extractor = TraceExtractor::new(&config.extract)?;
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Ok(Self {
            config,
            extractor,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Create an instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            output_mode_for(&cli_args.output_format),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    /// Extract the trace data of one report.
    ///
    /// With no destination, output goes next to the source with the
    /// configured suffix appended.
    pub fn extract_single(
        &self,
        source: &Path,
        destination: Option<&Path>,
    ) -> Result<ExtractionOutcome> {
        self.shutdown.check_shutdown()?;
        self.output_formatter
            .start_operation(&format!("Extracting trace data from {}", source.display()));

        let outcome = self.extractor.extract_file(source, destination)?;
        self.output_formatter.print_file_outcome(&outcome);

        Ok(outcome)
    }

    /// Extract every matching report below `input_dir` into a mirrored tree
    pub fn extract_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<ExtractionReport> {
        self.shutdown.check_shutdown()?;

        let files = self.scan_directory(input_dir)?;
        self.shutdown.check_shutdown()?;

        let mapper = self.path_mapper(input_dir, output_dir);
        let progress = self.extract_files(&files, &mapper)?;

        let report = ExtractionReport::new(
            mapper.input_root(),
            mapper.output_root(),
            &progress,
            ConfigSnapshot::from(&self.config),
        );

        if let Some(ref report_path) = self.config.output.report_path {
            report.save_json(report_path)?;
            self.output_formatter
                .info(&format!("Saved extraction report to {}", report_path.display()));
        }

        Ok(report)
    }

    /// Source and primary destination pairs a directory run would produce
    pub fn plan_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let walker = DirectoryWalker::new(&self.config.scan)?;
        let mapper = self.path_mapper(input_dir, output_dir);

        walker
            .walk(input_dir)?
            .into_iter()
            .map(|file| {
                let destination = mapper.map(&file.source_path)?;
                Ok((file.source_path, destination))
            })
            .collect()
    }

    /// Destination a single-file run would write its first block to
    pub fn plan_single(&self, source: &Path, destination: Option<&Path>) -> PathBuf {
        match destination {
            Some(dest) if !dest.as_os_str().is_empty() => dest.to_path_buf(),
            _ => self.extractor.default_destination(source),
        }
    }

    fn scan_directory(&self, input_dir: &Path) -> Result<Vec<TraceFile>> {
        self.output_formatter
            .start_operation(&format!("Scanning {} for trace reports", input_dir.display()));

        let spinner = self.progress_manager.create_spinner("Scanning directory...");
        let walker = DirectoryWalker::new(&self.config.scan)?;
        let files = match walker.walk(input_dir) {
            Ok(files) => files,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e);
            }
        };
        spinner.finish_and_clear();

        let stats = walker.get_statistics(&files);
        self.output_formatter.debug(&stats.display_summary());
        self.output_formatter.info(&format!(
            "Found {} {} files",
            files.len(),
            self.config.scan.extension
        ));

        Ok(files)
    }

    fn extract_files(&self, files: &[TraceFile], mapper: &PathMapper) -> Result<ExtractionProgress> {
        self.output_formatter.start_operation("Extracting trace data");

        let file_progress = self.progress_manager.create_file_progress(files.len() as u64);
        let progress_callback = {
            let pb = file_progress.clone();
            move |progress: &ExtractionProgress| {
                ui::progress::update_file_progress(&pb, progress);
            }
        };

        let runner = BatchRunner::new(&self.extractor, mapper)
            .with_parse_error_policy(self.config.extract.on_parse_error)
            .with_shutdown(&self.shutdown);

        let progress = match runner.run(files, Some(&progress_callback)) {
            Ok(progress) => progress,
            Err(e) => {
                file_progress.abandon();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &file_progress,
            &format!(
                "Processed {} files, wrote {} outputs",
                progress.files_processed, progress.outputs_written
            ),
            progress.elapsed(),
        );

        Ok(progress)
    }

    fn path_mapper(&self, input_dir: &Path, output_dir: Option<&Path>) -> PathMapper {
        PathMapper::new(input_dir, output_dir.map(Path::to_path_buf))
            .with_extension(self.config.extract.output_extension.clone())
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &TraceError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn output_mode_for(format: &OutputFormat) -> OutputMode {
    match format {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Plain => OutputMode::Plain,
    }
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "systrace-parser {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}
