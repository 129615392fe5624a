use crate::config::{CliOverrides, Config, MultiMatchPolicy};
use crate::error::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "systrace-parser")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract raw trace data from systrace HTML reports")]
#[command(
    long_about = "systrace-parser pulls the payload embedded in the trace-data element of \
                  systrace / trace-viewer HTML reports and writes it out as plain text, \
                  either for a single file or for every report below a directory."
)]
#[command(after_help = "EXAMPLES:\n  \
    systrace-parser -f trace.html\n  \
    systrace-parser -f trace.html --output trace.txt\n  \
    systrace-parser -i captures/ -o extracted/ --skip-invalid\n  \
    systrace-parser -i captures/ --multi-match concatenate --report report.json\n  \
    systrace-parser --generate-config --config systrace-parser.toml")]
#[command(arg_required_else_help = true)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(true)
        .args(["filename", "input_dir", "generate_config"])
))]
pub struct Cli {
    /// Source HTML file for single-file mode
    #[arg(short = 'f', long)]
    pub filename: Option<PathBuf>,

    /// Destination for single-file mode (defaults to <filename>.out)
    #[arg(long, requires = "filename")]
    pub output: Option<PathBuf>,

    /// Directory scanned recursively for HTML reports
    #[arg(short = 'i', long = "input_dir", visible_alias = "input-dir")]
    pub input_dir: Option<PathBuf>,

    /// Root of the mirrored output tree (defaults to the input directory)
    #[arg(
        short = 'o',
        long = "output_dir",
        visible_alias = "output-dir",
        requires = "input_dir"
    )]
    pub output_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// How several trace-data blocks in one report are written
    #[arg(long, value_enum)]
    pub multi_match: Option<MultiMatchArg>,

    /// Skip unreadable reports in directory mode
    #[arg(long)]
    pub skip_invalid: bool,

    /// CSS class marking the embedded trace payload
    #[arg(long, value_name = "CLASS")]
    pub marker_class: Option<String>,

    /// Write a JSON extraction report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show which files would be written without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MultiMatchArg {
    /// First block at the destination, later blocks at <stem>.N.<ext>
    Indexed,
    /// All blocks joined into one file
    Concatenate,
    /// Only the final block is kept
    Last,
}

impl From<MultiMatchArg> for MultiMatchPolicy {
    fn from(arg: MultiMatchArg) -> Self {
        match arg {
            MultiMatchArg::Indexed => MultiMatchPolicy::Indexed,
            MultiMatchArg::Concatenate => MultiMatchPolicy::Concatenate,
            MultiMatchArg::Last => MultiMatchPolicy::Last,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::default()
            .with_marker_class(self.marker_class.clone())
            .with_multi_match(self.multi_match.map(MultiMatchPolicy::from))
            .with_skip_invalid(self.skip_invalid)
            .with_report_path(self.report.clone())
    }

    pub fn has_work(&self) -> bool {
        self.filename.is_some() || self.input_dir.is_some()
    }
}
