use crate::config::{ExtractConfig, MultiMatchPolicy};
use crate::error::{Result, TraceError};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Permission bits for directories created in front of an output file,
/// applied regardless of the process umask.
#[cfg(unix)]
const OUTPUT_DIR_MODE: u32 = 0o755;

/// Text content of one marker element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceDataBlock {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub bytes: u64,
}

/// What happened to a single source document.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub source: PathBuf,
    pub blocks_found: usize,
    pub outputs: Vec<WrittenOutput>,
    pub write_errors: Vec<String>,
}

impl ExtractionOutcome {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.outputs.iter().map(|o| o.bytes).sum()
    }

    pub fn has_trace_data(&self) -> bool {
        self.blocks_found > 0
    }

    pub fn is_clean(&self) -> bool {
        self.write_errors.is_empty()
    }
}

/// Output files already written during one run.
///
/// A later source never replaces a file an earlier source produced.
#[derive(Debug, Default)]
pub struct WrittenPaths(HashSet<PathBuf>);

impl WrittenPaths {
    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    fn insert(&mut self, path: PathBuf) {
        self.0.insert(path);
    }
}

pub struct TraceExtractor {
    selector: Selector,
    marker_class: String,
    multi_match: MultiMatchPolicy,
    default_suffix: String,
}

impl TraceExtractor {
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let marker_class = config.marker_class.trim().to_string();
        let selector = marker_selector(&marker_class)?;

        Ok(Self {
            selector,
            marker_class,
            multi_match: config.multi_match,
            default_suffix: config.default_suffix.clone(),
        })
    }

    /// Destination used when the caller does not name one.
    pub fn default_destination(&self, source: &Path) -> PathBuf {
        let mut destination = source.as_os_str().to_os_string();
        destination.push(&self.default_suffix);
        PathBuf::from(destination)
    }

    /// Collects the text of every marker element, one leading newline removed.
    pub fn extract_blocks(&self, html: &str) -> Vec<TraceDataBlock> {
        let document = Html::parse_document(html);
        if !document.errors.is_empty() {
            debug!(count = document.errors.len(), "html parser recovered from errors");
        }

        document
            .select(&self.selector)
            .enumerate()
            .map(|(index, element)| {
                let raw: String = element.text().collect();
                TraceDataBlock {
                    index,
                    text: strip_leading_newline(&raw).to_string(),
                }
            })
            .collect()
    }

    /// Reads a source document. Invalid UTF-8 is replaced, never rejected.
    pub fn read_document(&self, source: &Path) -> Result<String> {
        let bytes = fs::read(source).map_err(|e| TraceError::ReadSource {
            path: source.display().to_string(),
            source: e,
        })?;

        match String::from_utf8(bytes) {
            Ok(html) => Ok(html),
            Err(e) => {
                warn!(
                    src = %source.display(),
                    error = %e.utf8_error(),
                    "source is not valid UTF-8, decoding lossily"
                );
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }

    /// Extracts the marker blocks of `source` and writes them out.
    ///
    /// Reading failures are returned as errors. Failures while writing are
    /// logged, recorded in the outcome and otherwise ignored.
    pub fn extract_file(
        &self,
        source: &Path,
        destination: Option<&Path>,
    ) -> Result<ExtractionOutcome> {
        self.extract_file_tracked(source, destination, &mut WrittenPaths::default())
    }

    /// Like [`extract_file`](Self::extract_file), but refuses to write any
    /// path already present in `written` and records every file it writes.
    pub fn extract_file_tracked(
        &self,
        source: &Path,
        destination: Option<&Path>,
        written: &mut WrittenPaths,
    ) -> Result<ExtractionOutcome> {
        let explicit = destination.filter(|d| !d.as_os_str().is_empty());
        let destination = match explicit {
            Some(dest) => dest.to_path_buf(),
            None => self.default_destination(source),
        };

        debug!(src = %source.display(), dest = %destination.display(), "extracting trace data");

        let html = self.read_document(source)?;
        let blocks = self.extract_blocks(&html);

        let mut outcome = ExtractionOutcome::new(source);
        outcome.blocks_found = blocks.len();

        if blocks.is_empty() {
            debug!(src = %source.display(), marker = %self.marker_class, "no marker element found");
            return Ok(outcome);
        }

        for block in &blocks {
            debug!(src = %source.display(), index = block.index, size = block.text.len(), "found trace data");
        }

        if explicit.is_some() {
            if let Err(e) = create_parent_dirs(&destination) {
                let message = format!(
                    "Failed to create output directory for {}: {}",
                    destination.display(),
                    e
                );
                warn!("{}", message);
                outcome.write_errors.push(message);
                return Ok(outcome);
            }
        }

        for (path, contents) in self.plan_outputs(&destination, &blocks) {
            if written.contains(&path) {
                let message = format!(
                    "Refusing to overwrite {}: already written from another source in this run",
                    path.display()
                );
                warn!("{}", message);
                outcome.write_errors.push(message);
                continue;
            }

            match write_output(&path, contents.as_bytes()) {
                Ok(bytes) => {
                    info!(dest = %path.display(), bytes, "wrote trace data");
                    written.insert(path.clone());
                    outcome.outputs.push(WrittenOutput { path, bytes });
                }
                Err(e) => {
                    let message = format!("Failed to write {}: {}", path.display(), e);
                    warn!("{}", message);
                    outcome.write_errors.push(message);
                }
            }
        }

        Ok(outcome)
    }

    fn plan_outputs(&self, destination: &Path, blocks: &[TraceDataBlock]) -> Vec<(PathBuf, String)> {
        match self.multi_match {
            MultiMatchPolicy::Indexed => blocks
                .iter()
                .map(|block| {
                    let path = if block.index == 0 {
                        destination.to_path_buf()
                    } else {
                        indexed_path(destination, block.index)
                    };
                    (path, block.text.clone())
                })
                .collect(),
            MultiMatchPolicy::Concatenate => {
                let joined = blocks
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![(destination.to_path_buf(), joined)]
            }
            // Each match would overwrite the previous one; only the final state is written
            MultiMatchPolicy::Last => blocks
                .last()
                .map(|b| vec![(destination.to_path_buf(), b.text.clone())])
                .unwrap_or_default(),
        }
    }
}

fn marker_selector(marker_class: &str) -> Result<Selector> {
    let selector = format!(".{}", marker_class);
    let parsed = Selector::parse(&selector).map_err(|e| TraceError::Selector {
        message: e.to_string(),
        selector: selector.clone(),
    });
    parsed
}

/// Removes exactly one leading line break (`\n` or `\r\n`).
pub fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

/// `out/c.txt` with index 2 becomes `out/c.2.txt`.
pub fn indexed_path(destination: &Path, index: usize) -> PathBuf {
    let Some(stem) = destination.file_stem() else {
        return destination.to_path_buf();
    };

    let mut renamed = stem.to_os_string();
    renamed.push(format!(".{}", index));
    if let Some(extension) = destination.extension() {
        renamed.push(".");
        renamed.push(extension);
    }

    destination.with_file_name(renamed)
}

fn create_parent_dirs(destination: &Path) -> io::Result<()> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }

    let missing: Vec<PathBuf> = parent
        .ancestors()
        .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
        .map(Path::to_path_buf)
        .collect();

    fs::create_dir_all(parent)?;
    for dir in &missing {
        set_output_dir_mode(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_output_dir_mode(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(OUTPUT_DIR_MODE))
}

#[cfg(not(unix))]
fn set_output_dir_mode(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn write_output(path: &Path, contents: &[u8]) -> io::Result<u64> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents)?;
    writer.flush()?;
    Ok(contents.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SINGLE_TRACE: &str = "<!DOCTYPE html>\n<html><head><title>trace</title></head><body>\n\
        <!-- BEGIN TRACE -->\n\
        <script class=\"trace-data\" type=\"application/text\">\n{\"k\":1}</script>\n\
        <!-- END TRACE -->\n</body></html>";

    const DOUBLE_TRACE: &str = "<html><body>\
        <script class=\"trace-data\" type=\"application/text\">\nfirst</script>\
        <script class=\"trace-data\" type=\"application/text\">\nsecond</script>\
        </body></html>";

    fn extractor() -> TraceExtractor {
        TraceExtractor::new(&ExtractConfig::default()).unwrap()
    }

    fn extractor_with(multi_match: MultiMatchPolicy) -> TraceExtractor {
        let config = ExtractConfig {
            multi_match,
            ..ExtractConfig::default()
        };
        TraceExtractor::new(&config).unwrap()
    }

    #[test]
    fn test_extract_blocks_strips_leading_newline() {
        let blocks = extractor().extract_blocks(SINGLE_TRACE);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "{\"k\":1}");
    }

    #[test]
    fn test_only_one_newline_is_stripped() {
        let html = "<script class=\"trace-data\">\n\n# tracer: nop\n</script>";
        let blocks = extractor().extract_blocks(html);
        assert_eq!(blocks[0].text, "\n# tracer: nop\n");
    }

    #[test]
    fn test_strip_leading_newline() {
        assert_eq!(strip_leading_newline("\nabc"), "abc");
        assert_eq!(strip_leading_newline("\r\nabc"), "abc");
        assert_eq!(strip_leading_newline("\n\nabc"), "\nabc");
        assert_eq!(strip_leading_newline("abc\n"), "abc\n");
        assert_eq!(strip_leading_newline(""), "");
    }

    #[test]
    fn test_marker_on_other_elements() {
        let html = "<div><pre class=\"log trace-data\">line one</pre><p class=\"other\">no</p></div>";
        let blocks = extractor().extract_blocks(html);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "line one");
    }

    #[test]
    fn test_custom_marker_class() {
        let config = ExtractConfig {
            marker_class: "viewer-data".to_string(),
            ..ExtractConfig::default()
        };
        let extractor = TraceExtractor::new(&config).unwrap();
        let html = "<script class=\"viewer-data\">\npayload</script><script class=\"trace-data\">x</script>";

        let blocks = extractor.extract_blocks(html);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "payload");
    }

    #[test]
    fn test_invalid_marker_class() {
        let config = ExtractConfig {
            marker_class: "1[bad".to_string(),
            ..ExtractConfig::default()
        };
        assert!(matches!(
            TraceExtractor::new(&config),
            Err(TraceError::Selector { .. })
        ));
    }

    #[test]
    fn test_extract_file_to_explicit_destination() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trace.html");
        fs::write(&source, SINGLE_TRACE).unwrap();
        let destination = temp_dir.path().join("out").join("nested").join("trace.txt");

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.blocks_found, 1);
        assert!(outcome.is_clean());
        assert_eq!(outcome.bytes_written(), 7);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "{\"k\":1}");
    }

    #[test]
    fn test_default_destination_appends_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trace.html");
        fs::write(&source, SINGLE_TRACE).unwrap();

        let outcome = extractor().extract_file(&source, None).unwrap();

        let expected = temp_dir.path().join("trace.html.out");
        assert_eq!(outcome.outputs[0].path, expected);
        assert_eq!(fs::read_to_string(expected).unwrap(), "{\"k\":1}");

        let empty = PathBuf::new();
        let outcome = extractor().extract_file(&source, Some(empty.as_path())).unwrap();
        assert_eq!(outcome.outputs[0].path, temp_dir.path().join("trace.html.out"));
    }

    #[test]
    fn test_no_marker_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("plain.html");
        fs::write(&source, "<html><body><p>nothing here</p></body></html>").unwrap();
        let destination = temp_dir.path().join("out").join("plain.txt");

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.blocks_found, 0);
        assert!(outcome.outputs.is_empty());
        assert!(outcome.is_clean());
        assert!(!destination.exists());
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = extractor().extract_file(&temp_dir.path().join("missing.html"), None);
        assert!(matches!(result, Err(TraceError::ReadSource { .. })));
    }

    #[test]
    fn test_non_utf8_source_still_extracts() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("latin1.html");
        let mut html = b"<html><head><!-- caf\xe9 --></head><body>".to_vec();
        html.extend_from_slice(b"<script class=\"trace-data\">\npayload</script></body></html>");
        fs::write(&source, html).unwrap();
        let destination = temp_dir.path().join("latin1.txt");

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.blocks_found, 1);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "payload");
    }

    #[test]
    fn test_binary_source_without_marker() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("binary.html");
        fs::write(&source, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let outcome = extractor().extract_file(&source, None).unwrap();
        assert!(!outcome.has_trace_data());
        assert!(!temp_dir.path().join("binary.html.out").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_created_directories_use_output_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trace.html");
        fs::write(&source, SINGLE_TRACE).unwrap();
        let destination = temp_dir.path().join("out").join("nested").join("trace.txt");

        extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        for dir in [temp_dir.path().join("out"), temp_dir.path().join("out").join("nested")] {
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755, "{}", dir.display());
        }
    }

    #[test]
    fn test_tracked_extraction_keeps_earlier_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let sibling = temp_dir.path().join("two.1.html");
        let source = temp_dir.path().join("two.html");
        fs::write(
            &sibling,
            "<script class=\"trace-data\">\nfrom sibling</script>",
        )
        .unwrap();
        fs::write(&source, DOUBLE_TRACE).unwrap();

        let extractor = extractor();
        let mut written = WrittenPaths::default();
        let sibling_dest = temp_dir.path().join("two.1.txt");
        extractor
            .extract_file_tracked(&sibling, Some(sibling_dest.as_path()), &mut written)
            .unwrap();
        assert!(written.contains(&sibling_dest));

        let destination = temp_dir.path().join("two.txt");
        let outcome = extractor
            .extract_file_tracked(&source, Some(destination.as_path()), &mut written)
            .unwrap();

        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(outcome.write_errors.len(), 1);
        assert!(outcome.write_errors[0].contains("two.1.txt"));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "first");
        assert_eq!(fs::read_to_string(&sibling_dest).unwrap(), "from sibling");
    }

    #[test]
    fn test_untracked_extraction_overwrites_previous_run() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trace.html");
        fs::write(&source, SINGLE_TRACE).unwrap();
        let destination = temp_dir.path().join("trace.txt");
        fs::write(&destination, "stale").unwrap();

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert!(outcome.is_clean());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "{\"k\":1}");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trace.html");
        fs::write(&source, SINGLE_TRACE).unwrap();
        // A directory where the output file should go makes the write fail
        let destination = temp_dir.path().join("blocked.txt");
        fs::create_dir(&destination).unwrap();

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.blocks_found, 1);
        assert!(outcome.outputs.is_empty());
        assert_eq!(outcome.write_errors.len(), 1);
        assert!(destination.is_dir());
    }

    #[test]
    fn test_multi_match_indexed() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("two.html");
        fs::write(&source, DOUBLE_TRACE).unwrap();
        let destination = temp_dir.path().join("two.txt");

        let outcome = extractor()
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.blocks_found, 2);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "first");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("two.1.txt")).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_multi_match_concatenate() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("two.html");
        fs::write(&source, DOUBLE_TRACE).unwrap();
        let destination = temp_dir.path().join("two.txt");

        let outcome = extractor_with(MultiMatchPolicy::Concatenate)
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_multi_match_last() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("two.html");
        fs::write(&source, DOUBLE_TRACE).unwrap();
        let destination = temp_dir.path().join("two.txt");

        extractor_with(MultiMatchPolicy::Last)
            .extract_file(&source, Some(destination.as_path()))
            .unwrap();

        assert_eq!(fs::read_to_string(&destination).unwrap(), "second");
        assert!(!temp_dir.path().join("two.1.txt").exists());
    }

    #[test]
    fn test_indexed_path() {
        assert_eq!(
            indexed_path(Path::new("out/c.txt"), 2),
            PathBuf::from("out/c.2.txt")
        );
        assert_eq!(
            indexed_path(Path::new("out/t.html.out"), 1),
            PathBuf::from("out/t.html.1.out")
        );
        assert_eq!(indexed_path(Path::new("out/plain"), 3), PathBuf::from("out/plain.3"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_indexed_path_keeps_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let destination = Path::new("out").join(OsStr::from_bytes(b"tr\xffce.txt"));
        assert_eq!(
            indexed_path(&destination, 1),
            Path::new("out").join(OsStr::from_bytes(b"tr\xffce.1.txt"))
        );
    }
}
