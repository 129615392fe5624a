//! Destination path computation.
//!
//! A source file found below the input root is written to the same relative
//! location below the output root, with its extension swapped for the output
//! extension.

use crate::error::{Result, TraceError};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_OUTPUT_EXTENSION: &str = "txt";

#[derive(Debug, Clone)]
pub struct PathMapper {
    input_root: PathBuf,
    output_root: PathBuf,
    extension: String,
}

impl PathMapper {
    /// An empty or absent output root mirrors into the input root itself.
    pub fn new<P: Into<PathBuf>>(input_root: P, output_root: Option<PathBuf>) -> Self {
        let input_root = input_root.into();
        let output_root = match output_root {
            Some(root) if !root.as_os_str().is_empty() => root,
            _ => input_root.clone(),
        };

        Self {
            input_root,
            output_root,
            extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn map(&self, source: &Path) -> Result<PathBuf> {
        let relative = relative_to(source, &self.input_root)?;
        let mut destination = self.output_root.join(relative);
        replace_extension(&mut destination, &self.extension)?;
        Ok(destination)
    }
}

/// Maps `source` below `input_root` to the matching `.txt` path below `output_root`.
pub fn output_filename(source: &Path, input_root: &Path, output_root: &Path) -> Result<PathBuf> {
    PathMapper::new(input_root, Some(output_root.to_path_buf())).map(source)
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> Result<&'a Path> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| TraceError::InvalidPath {
            path: format!(
                "{} is not below input directory {}",
                path.display(),
                root.display()
            ),
        })?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(TraceError::InvalidPath {
            path: format!(
                "Path contains parent directory references: {}",
                relative.display()
            ),
        });
    }

    if relative.as_os_str().is_empty() {
        return Err(TraceError::InvalidPath {
            path: format!("{} names the input directory itself", path.display()),
        });
    }

    Ok(relative)
}

/// Replaces everything after the last dot of the file name.
///
/// `trace.html` becomes `trace.txt`, `trace` becomes `trace.txt` and a bare
/// `.html` becomes `.txt`.
/// Non-UTF-8 bytes in the name are carried over unchanged.
pub(crate) fn replace_extension(path: &mut PathBuf, extension: &str) -> Result<()> {
    let file_name = path.file_name().ok_or_else(|| TraceError::InvalidPath {
        path: format!("{} has no file name", path.display()),
    })?;

    // `Path::extension` treats a leading dot as part of the stem
    if path.extension().is_none() && file_name.as_encoded_bytes().first() == Some(&b'.') {
        let mut renamed = OsString::from(".");
        renamed.push(extension);
        path.set_file_name(renamed);
    } else {
        path.set_extension(extension);
    }
    Ok(())
}
