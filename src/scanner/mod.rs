pub mod dir_walker;
pub mod extension_filter;

pub use dir_walker::{traverse_dir, DirectoryWalker, ScanStatistics, TraceFile};
pub use extension_filter::ExtensionFilter;
