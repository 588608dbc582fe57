//! Tabular data access

mod dataset;
mod loader;

pub use dataset::{feature_matrix, ColumnRoles, Dataset, MissingValues};
pub use loader::{decode_csv, encode_csv, load_csv, save_csv};
