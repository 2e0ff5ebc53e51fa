//! Configuration validation.
//!
//! Checks every `[run]`, `[data]` and `[indicators]` value before any bars
//! are loaded, and exposes the parsed values to the caller.

use crate::domain::error::LineflowError;
use crate::domain::graph::EvalMode;
use crate::domain::program::SECTION as INDICATORS;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DEFAULT_PRECISION: usize = 6;
const MAX_PRECISION: i64 = 17;

/// Checks that apply whether or not bars are loaded.
pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), LineflowError> {
    eval_mode(config)?;
    precision(config)?;
    date_range(config)?;
    validate_indicators(config)?;
    Ok(())
}

/// `[data]` keys needed to load bars from disk.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), LineflowError> {
    require(config, "data", "directory")?;
    require(config, "data", "symbol")?;
    Ok(())
}

pub fn eval_mode(config: &dyn ConfigPort) -> Result<EvalMode, LineflowError> {
    match config.get_string("run", "mode") {
        None => Ok(EvalMode::default()),
        Some(s) => EvalMode::from_str(&s).map_err(|reason| LineflowError::ConfigInvalid {
            section: "run".to_string(),
            key: "mode".to_string(),
            reason,
        }),
    }
}

pub fn precision(config: &dyn ConfigPort) -> Result<usize, LineflowError> {
    let Some(raw) = config.get_string("run", "precision") else {
        return Ok(DEFAULT_PRECISION);
    };
    match raw.trim().parse::<i64>() {
        Ok(p) if (0..=MAX_PRECISION).contains(&p) => Ok(p as usize),
        _ => Err(LineflowError::ConfigInvalid {
            section: "run".to_string(),
            key: "precision".to_string(),
            reason: format!("precision must be an integer between 0 and {}", MAX_PRECISION),
        }),
    }
}

/// Optional inclusive bounds from `[data] start_date` / `end_date`.
pub fn date_range(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), LineflowError> {
    let start_date = parse_date(config.get_string("data", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("data", "end_date").as_deref(), "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(LineflowError::ConfigInvalid {
                section: "data".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok((start_date, end_date))
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, LineflowError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| LineflowError::ConfigInvalid {
                section: "data".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }),
    }
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), LineflowError> {
    let keys = config.keys(INDICATORS);
    if keys.is_empty() {
        return Err(LineflowError::ConfigMissing {
            section: INDICATORS.to_string(),
            key: "<any>".to_string(),
        });
    }
    for key in keys {
        match config.get_string(INDICATORS, &key) {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(LineflowError::ConfigInvalid {
                    section: INDICATORS.to_string(),
                    key,
                    reason: "expression must not be empty".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, LineflowError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(LineflowError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}
