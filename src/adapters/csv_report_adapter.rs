//! CSV result table writer.

use crate::domain::error::LineflowError;
use crate::domain::program::ResultTable;
use crate::ports::report_port::ReportPort;
use std::fs::File;
use std::io::{self, Write};

/// Writes a `date` column followed by one column per output line. Sentinel
/// samples are written as empty cells.
pub struct CsvReportAdapter {
    precision: usize,
}

impl CsvReportAdapter {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    fn cell(&self, value: f64) -> String {
        if value.is_nan() {
            String::new()
        } else {
            format!("{:.*}", self.precision, value)
        }
    }

    pub fn write_to<W: Write>(&self, table: &ResultTable, writer: W) -> Result<(), LineflowError> {
        let mut wtr = csv::Writer::from_writer(writer);
        let header = std::iter::once("date").chain(table.columns.iter().map(String::as_str));
        wtr.write_record(header).map_err(io::Error::from)?;

        for (date, row) in table.dates.iter().zip(&table.rows) {
            let record = std::iter::once(date.format("%Y-%m-%d").to_string())
                .chain(row.iter().map(|&v| self.cell(v)));
            wtr.write_record(record).map_err(io::Error::from)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, table: &ResultTable, output_path: Option<&str>) -> Result<(), LineflowError> {
        match output_path {
            Some(path) => self.write_to(table, File::create(path)?),
            None => self.write_to(table, io::stdout().lock()),
        }
    }
}
