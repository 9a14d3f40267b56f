use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::signal::{Events, Signal};

/// Numeric columns pulled out of a headed CSV table.
///
/// Only the requested columns are parsed, so unrelated text columns in the
/// same file do not need to be numeric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl ColumnTable {
    pub fn from_columns(columns: BTreeMap<String, Vec<f64>>) -> Self {
        let rows = columns.values().map(Vec::len).min().unwrap_or(0);
        Self { columns, rows }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Parse the `wanted` columns from CSV text. Requested columns that are not
/// in the header are left out of the table rather than failing here.
pub fn read_columns<R: Read>(reader: R, wanted: &[&str]) -> Result<ColumnTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("reading header row")?.clone();
    let positions: Vec<(String, usize)> = wanted
        .iter()
        .filter_map(|name| {
            headers
                .iter()
                .position(|h| h == *name)
                .map(|idx| (name.to_string(), idx))
        })
        .collect();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); positions.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        for ((name, idx), out) in positions.iter().zip(values.iter_mut()) {
            let cell = record
                .get(*idx)
                .with_context(|| format!("row {} has no '{}' cell", row + 1, name))?;
            let value: f64 = cell
                .parse()
                .with_context(|| format!("row {} column '{}' is not numeric: {:?}", row + 1, name, cell))?;
            out.push(value);
        }
    }
    let columns = positions
        .into_iter()
        .map(|(name, _)| name)
        .zip(values)
        .collect();
    Ok(ColumnTable::from_columns(columns))
}

pub fn read_columns_from_path(path: &Path, wanted: &[&str]) -> Result<ColumnTable> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_columns(file, wanted).with_context(|| format!("in {}", path.display()))
}

/// Write equally long columns as a headed CSV.
pub fn write_columns<W: Write>(writer: W, columns: &[(&str, &[f64])]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(columns.iter().map(|(name, _)| *name))?;
    let rows = columns.iter().map(|(_, c)| c.len()).min().unwrap_or(0);
    for i in 0..rows {
        writer.write_record(columns.iter().map(|(_, c)| c[i].to_string()))?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

/// Time, waveform value and a 0/1 event marker per sample.
pub fn write_markers<W: Write>(writer: W, signal: &Signal, events: &Events) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["time_s", "value", "marker"])?;
    let markers = events.to_markers(signal.len());
    for (i, (value, marker)) in signal.data.iter().zip(markers).enumerate() {
        let t = i as f64 / signal.fs as f64;
        writer.write_record([
            format!("{t:.6}"),
            value.to_string(),
            u8::from(marker).to_string(),
        ])?;
    }
    writer.flush().context("flushing marker output")?;
    Ok(())
}
