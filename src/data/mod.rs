//! Data module - upload decoding, parsing and column roles

mod loader;
mod processor;
mod sample;

pub use loader::{is_numeric, DataLoader, DatasetSummary, FileFormat, LoaderError};
pub use processor::{ColumnRoles, ColumnStrategy, DataProcessor};
pub use sample::{sample_dataframe, SAMPLE_NAME};
