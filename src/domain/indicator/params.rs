//! Parameter sets.
//!
//! Each catalog entry declares its parameters with defaults. Overrides are
//! checked once, when the indicator is constructed: unknown names, wrong
//! types and non-positive periods are rejected with the indicator and
//! parameter named in the error.

use crate::domain::error::LineflowError;
use crate::domain::indicator::movav::MovAvKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Int(i64),
    Float(f64),
    Bool(bool),
    MovAv(MovAvKind),
    List(&'static [f64]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamDefault,
}

impl ParamSpec {
    pub const fn int(name: &'static str, v: i64) -> Self {
        Self {
            name,
            default: ParamDefault::Int(v),
        }
    }

    pub const fn float(name: &'static str, v: f64) -> Self {
        Self {
            name,
            default: ParamDefault::Float(v),
        }
    }

    pub const fn flag(name: &'static str, v: bool) -> Self {
        Self {
            name,
            default: ParamDefault::Bool(v),
        }
    }

    pub const fn movav(name: &'static str, v: MovAvKind) -> Self {
        Self {
            name,
            default: ParamDefault::MovAv(v),
        }
    }

    pub const fn list(name: &'static str, v: &'static [f64]) -> Self {
        Self {
            name,
            default: ParamDefault::List(v),
        }
    }
}

/// An override value as supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    MovAv(MovAvKind),
    List(Vec<f64>),
}

impl ParamValue {
    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "number",
            ParamValue::Bool(_) => "boolean",
            ParamValue::MovAv(_) => "moving average",
            ParamValue::List(_) => "list",
        }
    }
}

impl From<ParamDefault> for ParamValue {
    fn from(d: ParamDefault) -> Self {
        match d {
            ParamDefault::Int(v) => ParamValue::Int(v),
            ParamDefault::Float(v) => ParamValue::Float(v),
            ParamDefault::Bool(v) => ParamValue::Bool(v),
            ParamDefault::MovAv(v) => ParamValue::MovAv(v),
            ParamDefault::List(v) => ParamValue::List(v.to_vec()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::MovAv(k) => write!(f, "{}", k.name()),
            ParamValue::List(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// Resolved, immutable parameters of one indicator instance.
#[derive(Debug, Clone)]
pub struct Params {
    indicator: String,
    values: Vec<(&'static str, ParamValue)>,
}

impl Params {
    /// Apply `overrides` on top of the defaults in `specs`.
    pub fn resolve(
        indicator: &str,
        specs: &[ParamSpec],
        overrides: &[(String, ParamValue)],
    ) -> Result<Self, LineflowError> {
        let mut values: Vec<(&'static str, ParamValue)> =
            specs.iter().map(|s| (s.name, s.default.into())).collect();

        for (name, value) in overrides {
            let Some(pos) = specs.iter().position(|s| s.name.eq_ignore_ascii_case(name)) else {
                return Err(LineflowError::param(indicator, name, "unknown parameter"));
            };
            let checked = coerce(indicator, &specs[pos], value.clone())?;
            values[pos].1 = checked;
        }

        Ok(Self {
            indicator: indicator.to_string(),
            values,
        })
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    fn get(&self, name: &str) -> Result<&ParamValue, LineflowError> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| LineflowError::param(&self.indicator, name, "not declared"))
    }

    fn mismatch(&self, name: &str, want: &str, got: &ParamValue) -> LineflowError {
        LineflowError::param(
            &self.indicator,
            name,
            format!("expected {want}, found {}", got.kind()),
        )
    }

    pub fn int(&self, name: &str) -> Result<i64, LineflowError> {
        match self.get(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(self.mismatch(name, "integer", other)),
        }
    }

    /// An integer that must be at least 1.
    pub fn period(&self, name: &str) -> Result<usize, LineflowError> {
        let v = self.int(name)?;
        if v < 1 {
            return Err(LineflowError::param(
                &self.indicator,
                name,
                format!("must be at least 1, got {v}"),
            ));
        }
        usize::try_from(v).map_err(|_| LineflowError::param(&self.indicator, name, "out of range"))
    }

    /// An integer that may be zero.
    pub fn count(&self, name: &str) -> Result<usize, LineflowError> {
        let v = self.int(name)?;
        usize::try_from(v).map_err(|_| {
            LineflowError::param(&self.indicator, name, format!("must not be negative, got {v}"))
        })
    }

    pub fn float(&self, name: &str) -> Result<f64, LineflowError> {
        match self.get(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(self.mismatch(name, "number", other)),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, LineflowError> {
        match self.get(name)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(self.mismatch(name, "boolean", other)),
        }
    }

    pub fn movav(&self, name: &str) -> Result<MovAvKind, LineflowError> {
        match self.get(name)? {
            ParamValue::MovAv(v) => Ok(*v),
            other => Err(self.mismatch(name, "moving average", other)),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[f64], LineflowError> {
        match self.get(name)? {
            ParamValue::List(v) => Ok(v),
            other => Err(self.mismatch(name, "list", other)),
        }
    }
}

fn coerce(indicator: &str, spec: &ParamSpec, value: ParamValue) -> Result<ParamValue, LineflowError> {
    let ok = match (&spec.default, &value) {
        (ParamDefault::Int(_), ParamValue::Int(_)) => true,
        (ParamDefault::Float(_), ParamValue::Float(_)) => true,
        (ParamDefault::Float(_), ParamValue::Int(v)) => return Ok(ParamValue::Float(*v as f64)),
        (ParamDefault::Bool(_), ParamValue::Bool(_)) => true,
        (ParamDefault::MovAv(_), ParamValue::MovAv(_)) => true,
        (ParamDefault::List(_), ParamValue::List(_)) => true,
        _ => false,
    };
    if ok {
        return Ok(value);
    }
    let want = match spec.default {
        ParamDefault::Int(_) => "integer",
        ParamDefault::Float(_) => "number",
        ParamDefault::Bool(_) => "boolean",
        ParamDefault::MovAv(_) => "moving average",
        ParamDefault::List(_) => "list",
    };
    Err(LineflowError::param(
        indicator,
        spec.name,
        format!("expected {want}, found {}", value.kind()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::int("period", 14),
        ParamSpec::float("safehigh", 100.0),
        ParamSpec::flag("safediv", false),
        ParamSpec::movav("movav", MovAvKind::Smoothed),
        ParamSpec::list("factors", &[1.0, 2.0]),
    ];

    fn over(pairs: &[(&str, ParamValue)]) -> Vec<(String, ParamValue)> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    }

    #[test]
    fn defaults_apply() {
        let p = Params::resolve("RSI", SPECS, &[]).unwrap();
        assert_eq!(p.period("period").unwrap(), 14);
        assert_eq!(p.float("safehigh").unwrap(), 100.0);
        assert!(!p.flag("safediv").unwrap());
        assert_eq!(p.movav("movav").unwrap(), MovAvKind::Smoothed);
        assert_eq!(p.list("factors").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn overrides_replace_defaults_and_ints_widen() {
        let p = Params::resolve(
            "RSI",
            SPECS,
            &over(&[("period", ParamValue::Int(5)), ("safehigh", ParamValue::Int(90))]),
        )
        .unwrap();
        assert_eq!(p.period("period").unwrap(), 5);
        assert_eq!(p.float("safehigh").unwrap(), 90.0);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = Params::resolve("RSI", SPECS, &over(&[("perod", ParamValue::Int(5))])).unwrap_err();
        assert_eq!(err.to_string(), "RSI: invalid parameter 'perod': unknown parameter");
    }

    #[test]
    fn floats_never_truncate_to_ints() {
        let err = Params::resolve("RSI", SPECS, &over(&[("period", ParamValue::Float(5.5))])).unwrap_err();
        assert!(matches!(err, LineflowError::Param { ref param, .. } if param == "period"));
    }

    #[test]
    fn non_positive_period_fails_on_use() {
        let p = Params::resolve("RSI", SPECS, &over(&[("period", ParamValue::Int(0))])).unwrap();
        assert!(p.period("period").is_err());
        assert_eq!(p.count("period").unwrap(), 0);
    }

    #[test]
    fn display_values() {
        assert_eq!(ParamValue::List(vec![1.0, 2.5]).to_string(), "[1,2.5]");
        assert_eq!(ParamValue::MovAv(MovAvKind::Exponential).to_string(), "EMA");
    }
}
