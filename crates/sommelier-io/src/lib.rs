//! Delimited-text dataset loading for the sommelier pipeline.
//!
//! Turns a header-first CSV (semicolon-delimited by default, as in the UCI
//! wine-quality files) into a validated [`sommelier_rf::Dataset`].

mod error;
mod reader;

pub use error::IoError;
pub use reader::DatasetReader;
