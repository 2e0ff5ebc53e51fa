//! Bar data access port trait.

use crate::domain::error::LineflowError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` in date order, limited to the inclusive range when
    /// bounds are given.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LineflowError>;

    fn list_symbols(&self) -> Result<Vec<String>, LineflowError>;
}
