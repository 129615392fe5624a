pub mod batch;
pub mod report;
pub mod trace_extractor;

pub use batch::{BatchRunner, ExtractionProgress};
pub use report::{ConfigSnapshot, ExtractionReport, FileEntry, FileStatus};
pub use trace_extractor::{
    ExtractionOutcome, TraceDataBlock, TraceExtractor, WrittenOutput, WrittenPaths,
};
