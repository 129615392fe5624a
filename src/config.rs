use crate::error::{Result, TraceError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extension filter for directory mode, leading dot included
    pub extension: String,
    pub follow_links: bool,
    /// Regular expressions matched against file paths; matches are skipped
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub marker_class: String,
    pub output_extension: String,
    /// Appended to the source path when no destination is given
    pub default_suffix: String,
    pub multi_match: MultiMatchPolicy,
    pub on_parse_error: ParseErrorPolicy,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: Option<PathBuf>,
}

/// How several marker elements in one document are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiMatchPolicy {
    /// First block at the destination, block N at `<stem>.N.<ext>`
    #[default]
    Indexed,
    /// All blocks joined with a newline into the destination
    Concatenate,
    /// Every block overwrites the destination
    Last,
}

/// What a parse failure does to a directory run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    #[default]
    Abort,
    Skip,
}

impl fmt::Display for MultiMatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MultiMatchPolicy::Indexed => "indexed",
            MultiMatchPolicy::Concatenate => "concatenate",
            MultiMatchPolicy::Last => "last",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ParseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorPolicy::Abort => f.write_str("abort"),
            ParseErrorPolicy::Skip => f.write_str("skip"),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: ".html".to_string(),
            follow_links: false,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            marker_class: "trace-data".to_string(),
            output_extension: "txt".to_string(),
            default_suffix: ".out".to_string(),
            multi_match: MultiMatchPolicy::default(),
            on_parse_error: ParseErrorPolicy::default(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TraceError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TraceError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| TraceError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["systrace-parser.toml", ".systrace-parser.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref marker_class) = cli_args.marker_class {
            self.extract.marker_class = marker_class.clone();
        }

        if let Some(multi_match) = cli_args.multi_match {
            self.extract.multi_match = multi_match;
        }

        if cli_args.skip_invalid {
            self.extract.on_parse_error = ParseErrorPolicy::Skip;
        }

        if let Some(ref report_path) = cli_args.report_path {
            self.output.report_path = Some(report_path.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.extension.len() < 2 || !self.scan.extension.starts_with('.') {
            return Err(TraceError::Config {
                message: format!(
                    "Scan extension must start with a dot, got '{}'",
                    self.scan.extension
                ),
            });
        }

        for pattern in &self.scan.exclude_patterns {
            Regex::new(pattern).map_err(|e| TraceError::Config {
                message: format!("Invalid exclude pattern '{}': {}", pattern, e),
            })?;
        }

        let marker = self.extract.marker_class.trim();
        if marker.is_empty() || marker.chars().any(char::is_whitespace) {
            return Err(TraceError::Config {
                message: "Marker class must be a single non-empty class name".to_string(),
            });
        }

        let output_extension = &self.extract.output_extension;
        if output_extension.is_empty() || output_extension.starts_with('.') {
            return Err(TraceError::Config {
                message: format!(
                    "Output extension must be non-empty and given without a dot, got '{}'",
                    output_extension
                ),
            });
        }

        if self.extract.default_suffix.is_empty() {
            return Err(TraceError::Config {
                message: "Default output suffix must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub marker_class: Option<String>,
    pub multi_match: Option<MultiMatchPolicy>,
    pub skip_invalid: bool,
    pub report_path: Option<PathBuf>,
}

impl CliOverrides {
    pub fn with_marker_class(mut self, marker_class: Option<String>) -> Self {
        self.marker_class = marker_class;
        self
    }

    pub fn with_multi_match(mut self, multi_match: Option<MultiMatchPolicy>) -> Self {
        self.multi_match = multi_match;
        self
    }

    pub fn with_skip_invalid(mut self, skip: bool) -> Self {
        self.skip_invalid = skip;
        self
    }

    pub fn with_report_path(mut self, report_path: Option<PathBuf>) -> Self {
        self.report_path = report_path;
        self
    }
}
