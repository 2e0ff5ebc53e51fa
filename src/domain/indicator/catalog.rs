//! The indicator catalog.
//!
//! Plain entries are static [`IndicatorDef`] tables, one per family module.
//! Envelope and oscillator flavours of the moving averages are not spelled
//! out one by one: [`Entry::Variant`] wraps a `(MovAvKind, Variant)` pair
//! from [`MOVAV_VARIANTS`] and derives its lines and parameters from it.

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::indicator::movav::{self, MOVAV_VARIANTS, MovAvKind, Variant};
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::{
    Source, basic, momentum, moving_average, oscillators, price, trend, volatility,
};
use crate::domain::line::LineId;

pub type BuildFn = fn(&mut GraphBuilder, &Source, &Params) -> Result<Vec<LineId>, LineflowError>;

/// Input shape an indicator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// One data line (bar data contributes its close).
    Single,
    /// Open, high, low and close.
    Bar,
    /// Two data lines.
    Pair,
}

impl InputKind {
    pub fn describe(self) -> &'static str {
        match self {
            InputKind::Single => "line",
            InputKind::Bar => "bars",
            InputKind::Pair => "line, line",
        }
    }
}

pub struct IndicatorDef {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub inputs: InputKind,
    pub lines: &'static [&'static str],
    pub params: &'static [ParamSpec],
    pub build: BuildFn,
}

impl std::fmt::Debug for IndicatorDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorDef")
            .field("name", &self.name)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl IndicatorDef {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

fn tables() -> [&'static [IndicatorDef]; 7] {
    [
        moving_average::DEFS,
        basic::DEFS,
        volatility::DEFS,
        momentum::DEFS,
        oscillators::DEFS,
        trend::DEFS,
        price::DEFS,
    ]
}

/// Every plain catalog definition.
pub fn defs() -> impl Iterator<Item = &'static IndicatorDef> {
    tables().into_iter().flatten()
}

/// A resolved catalog entry.
#[derive(Debug, Clone, Copy)]
pub enum Entry {
    Def(&'static IndicatorDef),
    Variant(MovAvKind, Variant),
}

const ENVELOPE_PARAMS: [ParamSpec; 1] = [ParamSpec::float("perc", 2.5)];

impl Entry {
    pub fn name(&self) -> String {
        match self {
            Entry::Def(def) => def.name.to_string(),
            Entry::Variant(kind, variant) => movav::variant_name(*kind, *variant),
        }
    }

    pub fn aliases(&self) -> Vec<String> {
        match self {
            Entry::Def(def) => def.aliases.iter().map(|a| a.to_string()).collect(),
            Entry::Variant(kind, Variant::Envelope) => std::iter::once(kind.long_name())
                .chain(kind.aliases().iter().copied())
                .map(|n| format!("{n}Envelope"))
                .collect(),
            Entry::Variant(kind, Variant::Oscillator) => {
                let mut out = vec![format!("{}Osc", kind.name())];
                for n in std::iter::once(kind.long_name()).chain(kind.aliases().iter().copied()) {
                    out.push(format!("{n}Oscillator"));
                    out.push(format!("{n}Osc"));
                }
                out
            }
        }
    }

    pub fn inputs(&self) -> InputKind {
        match self {
            Entry::Def(def) => def.inputs,
            Entry::Variant(..) => InputKind::Single,
        }
    }

    pub fn lines(&self) -> Vec<&'static str> {
        match self {
            Entry::Def(def) => def.lines.to_vec(),
            Entry::Variant(kind, Variant::Envelope) => vec![kind.line(), "top", "bottom"],
            Entry::Variant(kind, Variant::Oscillator) => vec![kind.line()],
        }
    }

    pub fn params(&self) -> Vec<ParamSpec> {
        match self {
            Entry::Def(def) => def.params.to_vec(),
            Entry::Variant(kind, variant) => {
                let mut specs = vec![ParamSpec::int("period", kind.default_period())];
                if *variant == Variant::Envelope {
                    specs.extend(ENVELOPE_PARAMS);
                }
                specs
            }
        }
    }

    pub fn build(
        &self,
        g: &mut GraphBuilder,
        source: &Source,
        p: &Params,
    ) -> Result<Vec<LineId>, LineflowError> {
        match self {
            Entry::Def(def) => (def.build)(g, source, p),
            Entry::Variant(kind, variant) => {
                let data = source.single(p.indicator())?;
                let period = p.period("period")?;
                let avg = kind.build(g, data, period)?;
                match variant {
                    Variant::Envelope => {
                        let (top, bottom) = price::envelope_bands(g, avg, p.float("perc")?)?;
                        Ok(vec![avg, top, bottom])
                    }
                    Variant::Oscillator => Ok(vec![g.sub(data, avg)?]),
                }
            }
        }
    }
}

/// Resolve a catalog name or alias, ignoring case.
pub fn lookup(name: &str) -> Result<Entry, LineflowError> {
    if let Some(def) = defs().find(|d| d.matches(name)) {
        return Ok(Entry::Def(def));
    }
    if let Some((kind, variant)) = movav::find_variant(name) {
        return Ok(Entry::Variant(kind, variant));
    }
    Err(LineflowError::UnknownIndicator {
        name: name.to_string(),
    })
}

/// Every entry, plain definitions first.
pub fn entries() -> Vec<Entry> {
    defs()
        .map(Entry::Def)
        .chain(MOVAV_VARIANTS.iter().map(|&(k, v)| Entry::Variant(k, v)))
        .collect()
}
