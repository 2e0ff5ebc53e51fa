//! The moving-average capability and its variant table.
//!
//! Indicators that smooth something take a [`MovAvKind`] parameter and call
//! [`MovAvKind::build`] instead of hard-wiring one average. Envelope and
//! oscillator flavours of every average are listed in [`MOVAV_VARIANTS`].

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::indicator::moving_average as ma;
use crate::domain::line::LineId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovAvKind {
    Simple,
    Exponential,
    Smoothed,
    Weighted,
    DoubleExponential,
    TripleExponential,
    Hull,
    Adaptive,
    ZeroLagEma,
    Triangular,
    Dickson,
}

impl MovAvKind {
    pub const ALL: [MovAvKind; 11] = [
        MovAvKind::Simple,
        MovAvKind::Exponential,
        MovAvKind::Smoothed,
        MovAvKind::Weighted,
        MovAvKind::DoubleExponential,
        MovAvKind::TripleExponential,
        MovAvKind::Hull,
        MovAvKind::Adaptive,
        MovAvKind::ZeroLagEma,
        MovAvKind::Triangular,
        MovAvKind::Dickson,
    ];

    /// Short catalog name.
    pub fn name(self) -> &'static str {
        match self {
            MovAvKind::Simple => "SMA",
            MovAvKind::Exponential => "EMA",
            MovAvKind::Smoothed => "SMMA",
            MovAvKind::Weighted => "WMA",
            MovAvKind::DoubleExponential => "DEMA",
            MovAvKind::TripleExponential => "TEMA",
            MovAvKind::Hull => "HMA",
            MovAvKind::Adaptive => "KAMA",
            MovAvKind::ZeroLagEma => "ZLEMA",
            MovAvKind::Triangular => "TMA",
            MovAvKind::Dickson => "DMA",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            MovAvKind::Simple => "SimpleMovingAverage",
            MovAvKind::Exponential => "ExponentialMovingAverage",
            MovAvKind::Smoothed => "SmoothedMovingAverage",
            MovAvKind::Weighted => "WeightedMovingAverage",
            MovAvKind::DoubleExponential => "DoubleExponentialMovingAverage",
            MovAvKind::TripleExponential => "TripleExponentialMovingAverage",
            MovAvKind::Hull => "HullMovingAverage",
            MovAvKind::Adaptive => "AdaptiveMovingAverage",
            MovAvKind::ZeroLagEma => "ZeroLagExponentialMovingAverage",
            MovAvKind::Triangular => "TriangularMovingAverage",
            MovAvKind::Dickson => "DicksonMovingAverage",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            MovAvKind::Simple => &["MovingAverageSimple"],
            MovAvKind::Exponential => &["MovingAverageExponential"],
            MovAvKind::Smoothed => &[
                "WilderMA",
                "MovingAverageSmoothed",
                "MovingAverageWilder",
                "ModifiedMovingAverage",
            ],
            MovAvKind::Weighted => &["MovingAverageWeighted"],
            MovAvKind::DoubleExponential => &["DoubleEMA", "MovingAverageDoubleExponential"],
            MovAvKind::TripleExponential => &["TripleEMA", "MovingAverageTripleExponential"],
            MovAvKind::Hull => &["HullMA"],
            MovAvKind::Adaptive => &["MovingAverageAdaptive"],
            MovAvKind::ZeroLagEma => &["ZeroLagEma"],
            MovAvKind::Triangular => &["MovingAverageTriangular"],
            MovAvKind::Dickson => &["DicksonMA"],
        }
    }

    /// Name of the output line.
    pub fn line(self) -> &'static str {
        match self {
            MovAvKind::Simple => "sma",
            MovAvKind::Exponential => "ema",
            MovAvKind::Smoothed => "smma",
            MovAvKind::Weighted => "wma",
            MovAvKind::DoubleExponential => "double_ema",
            MovAvKind::TripleExponential => "triple_ema",
            MovAvKind::Hull => "hma",
            MovAvKind::Adaptive => "kama",
            MovAvKind::ZeroLagEma => "zero_lag_ema",
            MovAvKind::Triangular => "tma",
            MovAvKind::Dickson => "dma",
        }
    }

    pub fn default_period(self) -> i64 {
        match self {
            MovAvKind::Simple => 50,
            MovAvKind::Smoothed => 28,
            MovAvKind::Hull => 16,
            MovAvKind::Adaptive => 10,
            MovAvKind::Triangular => 14,
            MovAvKind::Exponential
            | MovAvKind::Weighted
            | MovAvKind::DoubleExponential
            | MovAvKind::TripleExponential
            | MovAvKind::ZeroLagEma
            | MovAvKind::Dickson => 20,
        }
    }

    /// Resolve a name or alias, ignoring case.
    pub fn from_name(name: &str) -> Option<MovAvKind> {
        Self::ALL.into_iter().find(|k| k.matches(name))
    }

    pub fn matches(self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
            || self.long_name().eq_ignore_ascii_case(name)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Wire this average of `data` over `period` bars, with every other
    /// setting at its default.
    pub fn build(self, g: &mut GraphBuilder, data: LineId, period: usize) -> Result<LineId, LineflowError> {
        match self {
            MovAvKind::Simple => g.average(data, period),
            MovAvKind::Exponential => ma::ema(g, data, period),
            MovAvKind::Smoothed => ma::smma(g, data, period),
            MovAvKind::Weighted => ma::wma(g, data, period),
            MovAvKind::DoubleExponential => ma::dema(g, data, period, MovAvKind::Exponential),
            MovAvKind::TripleExponential => ma::tema(g, data, period, MovAvKind::Exponential),
            MovAvKind::Hull => ma::hma(g, data, period, MovAvKind::Weighted),
            MovAvKind::Adaptive => ma::kama(g, data, period, ma::KAMA_FAST, ma::KAMA_SLOW),
            MovAvKind::ZeroLagEma => ma::zlema(g, data, period, MovAvKind::Exponential),
            MovAvKind::Triangular => ma::tma(g, data, period, MovAvKind::Simple),
            MovAvKind::Dickson => ma::dma(
                g,
                data,
                ma::DmaSettings {
                    period,
                    gainlimit: ma::EC_GAINLIMIT,
                    hull_period: ma::DMA_HULL_PERIOD,
                    movav: MovAvKind::Exponential,
                    hull: MovAvKind::Hull,
                },
            ),
        }
    }
}

/// Derived indicator flavour of a moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The average plus bands `perc` percent above and below it.
    Envelope,
    /// Distance of the data from its average.
    Oscillator,
}

impl Variant {
    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Variant::Envelope => &["Envelope"],
            Variant::Oscillator => &["Oscillator", "Osc"],
        }
    }
}

const fn pair(kind: MovAvKind, variant: Variant) -> (MovAvKind, Variant) {
    (kind, variant)
}

/// Every (average, variant) combination the catalog exposes.
pub static MOVAV_VARIANTS: [(MovAvKind, Variant); 22] = [
    pair(MovAvKind::Simple, Variant::Envelope),
    pair(MovAvKind::Exponential, Variant::Envelope),
    pair(MovAvKind::Smoothed, Variant::Envelope),
    pair(MovAvKind::Weighted, Variant::Envelope),
    pair(MovAvKind::DoubleExponential, Variant::Envelope),
    pair(MovAvKind::TripleExponential, Variant::Envelope),
    pair(MovAvKind::Hull, Variant::Envelope),
    pair(MovAvKind::Adaptive, Variant::Envelope),
    pair(MovAvKind::ZeroLagEma, Variant::Envelope),
    pair(MovAvKind::Triangular, Variant::Envelope),
    pair(MovAvKind::Dickson, Variant::Envelope),
    pair(MovAvKind::Simple, Variant::Oscillator),
    pair(MovAvKind::Exponential, Variant::Oscillator),
    pair(MovAvKind::Smoothed, Variant::Oscillator),
    pair(MovAvKind::Weighted, Variant::Oscillator),
    pair(MovAvKind::DoubleExponential, Variant::Oscillator),
    pair(MovAvKind::TripleExponential, Variant::Oscillator),
    pair(MovAvKind::Hull, Variant::Oscillator),
    pair(MovAvKind::Adaptive, Variant::Oscillator),
    pair(MovAvKind::ZeroLagEma, Variant::Oscillator),
    pair(MovAvKind::Triangular, Variant::Oscillator),
    pair(MovAvKind::Dickson, Variant::Oscillator),
];

/// Find the variant a name like `SMAEnvelope` or `EMAOsc` refers to.
pub fn find_variant(name: &str) -> Option<(MovAvKind, Variant)> {
    MOVAV_VARIANTS.iter().copied().find(|&(kind, variant)| {
        variant.suffixes().iter().any(|suffix| {
            name.len() > suffix.len()
                && name.is_char_boundary(name.len() - suffix.len())
                && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
                && kind.matches(&name[..name.len() - suffix.len()])
        })
    })
}

/// Canonical catalog name of a variant.
pub fn variant_name(kind: MovAvKind, variant: Variant) -> String {
    format!("{}{}", kind.name(), variant.suffixes()[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_aliases_resolve() {
        assert_eq!(MovAvKind::from_name("sma"), Some(MovAvKind::Simple));
        assert_eq!(MovAvKind::from_name("WilderMA"), Some(MovAvKind::Smoothed));
        assert_eq!(
            MovAvKind::from_name("ExponentialMovingAverage"),
            Some(MovAvKind::Exponential)
        );
        assert_eq!(MovAvKind::from_name("nope"), None);
    }

    #[test]
    fn table_covers_every_pair_once() {
        for kind in MovAvKind::ALL {
            for variant in [Variant::Envelope, Variant::Oscillator] {
                let count = MOVAV_VARIANTS
                    .iter()
                    .filter(|&&p| p == (kind, variant))
                    .count();
                assert_eq!(count, 1, "{kind:?} {variant:?}");
            }
        }
    }

    #[test]
    fn variant_names() {
        assert_eq!(
            find_variant("SMAEnvelope"),
            Some((MovAvKind::Simple, Variant::Envelope))
        );
        assert_eq!(
            find_variant("emaosc"),
            Some((MovAvKind::Exponential, Variant::Oscillator))
        );
        assert_eq!(
            find_variant("WilderMAOscillator"),
            Some((MovAvKind::Smoothed, Variant::Oscillator))
        );
        assert_eq!(find_variant("Envelope"), None);
        assert_eq!(find_variant("RSIOscillator"), None);
        assert_eq!(variant_name(MovAvKind::Hull, Variant::Oscillator), "HMAOscillator");
    }
}
