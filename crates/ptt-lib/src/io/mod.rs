//! File formats at the edge of the pipeline. Errors here are `anyhow` with
//! file and row context.

pub mod csv;
pub mod text;

pub use self::csv::{read_columns, read_columns_from_path, write_columns, write_markers, ColumnTable};
pub use self::text::{read_f64_series, read_samples};
