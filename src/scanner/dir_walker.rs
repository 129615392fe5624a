use crate::config::ScanConfig;
use crate::error::{Result, TraceError};
use crate::scanner::extension_filter::ExtensionFilter;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// An HTML trace file discovered below the scan root.
#[derive(Debug, Clone)]
pub struct TraceFile {
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    pub filename: String,
    pub size: u64,
}

impl TraceFile {
    pub fn new(source_path: PathBuf, relative_path: PathBuf, size: u64) -> Self {
        let filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            source_path,
            relative_path,
            filename,
            size,
        }
    }

    pub fn display_path(&self) -> String {
        self.relative_path.display().to_string()
    }
}

pub struct DirectoryWalker {
    filter: ExtensionFilter,
    follow_links: bool,
}

impl DirectoryWalker {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            filter: ExtensionFilter::from_config(config)?,
            follow_links: config.follow_links,
        })
    }

    pub fn with_extension<S: Into<String>>(extension: S) -> Self {
        Self {
            filter: ExtensionFilter::new(extension),
            follow_links: false,
        }
    }

    /// Depth-first listing of every regular file whose extension matches.
    ///
    /// Entries are visited in file-name order at each level. Any directory
    /// that cannot be read ends the walk with an error. A symbolic link to a
    /// file is listed even when links are not followed; a link to a directory
    /// is only descended when they are.
    pub fn walk<P: AsRef<Path>>(&self, root: P) -> Result<Vec<TraceFile>> {
        let root_path = root.as_ref();
        self.check_root(root_path)?;

        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry?;

            let path = entry.path();
            let file_type = entry.file_type();
            let linked_file = file_type.is_symlink() && path.is_file();
            if !file_type.is_file() && !linked_file {
                continue;
            }

            if !self.filter.matches(path) {
                debug!(path = %path.display(), "extension does not match, skipping");
                continue;
            }
            if self.filter.is_excluded(path) {
                debug!(path = %path.display(), "excluded by pattern, skipping");
                continue;
            }

            let metadata = if linked_file {
                std::fs::metadata(path)?
            } else {
                entry.metadata()?
            };
            let relative_path = path
                .strip_prefix(root_path)
                .map(Path::to_path_buf)
                .map_err(|_| TraceError::InvalidPath {
                    path: path.display().to_string(),
                })?;

            debug!(path = %path.display(), size = metadata.len(), "matched trace file");
            files.push(TraceFile::new(
                path.to_path_buf(),
                relative_path,
                metadata.len(),
            ));
        }

        Ok(files)
    }

    fn check_root(&self, root: &Path) -> Result<()> {
        let unreadable = |message: String| TraceError::DirectoryUnreadable {
            path: root.display().to_string(),
            message,
        };

        let metadata = std::fs::metadata(root).map_err(|e| unreadable(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(unreadable("not a directory".to_string()));
        }

        std::fs::read_dir(root).map_err(|e| unreadable(e.to_string()))?;
        Ok(())
    }

    pub fn get_statistics(&self, files: &[TraceFile]) -> ScanStatistics {
        let (largest_file_size, largest_file_path) = files
            .iter()
            .max_by_key(|f| f.size)
            .map(|f| (f.size, f.relative_path.clone()))
            .unwrap_or((0, PathBuf::new()));

        ScanStatistics {
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            largest_file_size,
            largest_file_path,
        }
    }
}

/// Returns the matching file paths below `root`, in listing order.
pub fn traverse_dir<P: AsRef<Path>>(root: P, extension: &str) -> Result<Vec<PathBuf>> {
    let files = DirectoryWalker::with_extension(extension).walk(root)?;
    Ok(files.into_iter().map(|f| f.source_path).collect())
}

#[derive(Debug, Default)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub total_size: u64,
    pub largest_file_size: u64,
    pub largest_file_path: PathBuf,
}

impl ScanStatistics {
    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "Scan Results:\n  Trace files: {}\n  Total size: {}\n",
            self.total_files,
            crate::ui::output::format_bytes(self.total_size)
        );

        if self.largest_file_size > 0 {
            summary.push_str(&format!(
                "  Largest file: {} ({})\n",
                self.largest_file_path.display(),
                crate::ui::output::format_bytes(self.largest_file_size)
            ));
        }

        summary
    }
}
