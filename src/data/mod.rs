//! Observation tables and the input providers that build them.

pub mod loader;
pub mod table;

pub use loader::{load_csv, LoaderOptions};
pub use table::ObservationTable;
