// Shared support modules

mod lazy_file_writer;
pub mod tracing;

pub use lazy_file_writer::LazyFileWriter;
pub use tracing::{TracingLevel, build_filter, get_trace_log_path, init_file_tracing};
