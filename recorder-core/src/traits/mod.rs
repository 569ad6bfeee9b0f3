pub mod callbacks;
pub mod capture_source;
pub mod export_sink;
pub mod recorder_delegate;
