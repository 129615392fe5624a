use crate::config::ScanConfig;
use crate::error::{Result, TraceError};
use regex::Regex;
use std::path::Path;

pub struct ExtensionFilter {
    extension: String,
    exclude_patterns: Vec<Regex>,
}

impl ExtensionFilter {
    pub fn new<S: Into<String>>(extension: S) -> Self {
        Self {
            extension: extension.into(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| TraceError::Config {
                    message: format!("Invalid exclude pattern '{}': {}", pattern, e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            extension: config.extension.clone(),
            exclude_patterns,
        })
    }

    /// Exact, case-sensitive comparison of the bytes from the last dot of the
    /// file name onwards. The rest of the name need not be valid UTF-8.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name() else {
            return false;
        };

        let name = file_name.as_encoded_bytes();
        match name.iter().rposition(|&b| b == b'.') {
            Some(dot) => &name[dot..] == self.extension.as_bytes(),
            None => false,
        }
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(&path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_extension_match() {
        let filter = ExtensionFilter::new(".html");

        assert!(filter.matches(Path::new("trace.html")));
        assert!(filter.matches(Path::new("dir/sub/trace.html")));
        assert!(filter.matches(Path::new("archive.tar.html")));

        assert!(!filter.matches(Path::new("trace.htm")));
        assert!(!filter.matches(Path::new("trace.html.bak")));
        assert!(!filter.matches(Path::new("notes.txt")));
        assert!(!filter.matches(Path::new("html")));
    }

    #[test]
    fn test_case_sensitive() {
        let filter = ExtensionFilter::new(".html");
        assert!(!filter.matches(Path::new("TRACE.HTML")));
        assert!(!filter.matches(Path::new("trace.Html")));
    }

    #[test]
    fn test_filter_without_dot_never_matches() {
        let filter = ExtensionFilter::new("html");
        assert!(!filter.matches(Path::new("trace.html")));
    }

    #[test]
    fn test_exclude_patterns() {
        let config = ScanConfig {
            exclude_patterns: vec![r".*_backup\.html$".to_string()],
            ..ScanConfig::default()
        };
        let filter = ExtensionFilter::from_config(&config).unwrap();

        assert!(!filter.is_excluded(Path::new("run/trace.html")));
        assert!(filter.is_excluded(Path::new("run/trace_backup.html")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_name_matches() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let filter = ExtensionFilter::new(".html");
        assert!(filter.matches(Path::new(OsStr::from_bytes(b"caf\xe9.html"))));
        assert!(!filter.matches(Path::new(OsStr::from_bytes(b"trace.htm\xff"))));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let config = ScanConfig {
            exclude_patterns: vec!["[".to_string()],
            ..ScanConfig::default()
        };
        assert!(ExtensionFilter::from_config(&config).is_err());
    }
}
