//! Result table sink port trait.

use crate::domain::error::LineflowError;
use crate::domain::program::ResultTable;

/// Port for writing evaluated indicator lines.
pub trait ReportPort {
    /// Write `table` to `output_path`, or to stdout when it is `None`.
    fn write(&self, table: &ResultTable, output_path: Option<&str>) -> Result<(), LineflowError>;
}
