//! Numeric helpers shared by the operators.

/// Sum of `values` without intermediate rounding loss (Shewchuk's algorithm).
///
/// Window averages use this so a sum never depends on the order in which
/// partial sums were accumulated. Non-finite inputs fall back to the plain
/// sum, which yields the same inf/NaN the naive loop would.
pub fn fsum(values: &[f64]) -> f64 {
    let mut partials: Vec<f64> = Vec::with_capacity(8);
    for &v in values {
        if !v.is_finite() {
            return values.iter().sum();
        }
        let mut x = v;
        let mut i = 0;
        for j in 0..partials.len() {
            let mut y = partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                partials[i] = lo;
                i += 1;
            }
            x = hi;
        }
        partials.truncate(i);
        partials.push(x);
    }
    partials.iter().rev().fold(0.0, |acc, p| acc + p)
}

/// Arithmetic mean of a window; NaN for an empty one.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    fsum(values) / values.len() as f64
}

/// What a division does when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DivPolicy {
    /// IEEE division: ±inf or NaN propagate.
    #[default]
    Raw,
    /// `zero` whenever the denominator is zero.
    ByZero { zero: f64 },
    /// Denominator zero: `dual` when the numerator is zero too, `single`
    /// otherwise.
    ZeroByZero { single: f64, dual: f64 },
}

impl DivPolicy {
    pub fn divide(self, num: f64, den: f64) -> f64 {
        if den != 0.0 {
            return num / den;
        }
        match self {
            DivPolicy::Raw => num / den,
            DivPolicy::ByZero { zero } => zero,
            DivPolicy::ZeroByZero { single, dual } => {
                if num == 0.0 {
                    dual
                } else {
                    single
                }
            }
        }
    }
}

/// Truth flag as a sample: 1.0 or 0.0.
pub fn flag(x: bool) -> f64 {
    if x { 1.0 } else { 0.0 }
}

pub fn truthy(x: f64) -> bool {
    x != 0.0 && !x.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsum_is_exact_where_naive_sum_drifts() {
        let values = [1e16, 1.0, -1e16];
        assert_eq!(fsum(&values), 1.0);
        let tenths = [0.1; 10];
        assert_eq!(fsum(&tenths), 1.0);
    }

    #[test]
    fn fsum_propagates_non_finite() {
        assert!(fsum(&[1.0, f64::NAN]).is_nan());
        assert_eq!(fsum(&[1.0, f64::INFINITY]), f64::INFINITY);
        assert_eq!(fsum(&[]), 0.0);
    }

    #[test]
    fn mean_of_window() {
        assert_eq!(mean(&[10.0, 11.0, 12.0]), 11.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn raw_division_propagates() {
        assert_eq!(DivPolicy::Raw.divide(1.0, 0.0), f64::INFINITY);
        assert!(DivPolicy::Raw.divide(0.0, 0.0).is_nan());
        assert_eq!(DivPolicy::Raw.divide(6.0, 3.0), 2.0);
    }

    #[test]
    fn by_zero_substitutes() {
        let p = DivPolicy::ByZero { zero: 0.5 };
        assert_eq!(p.divide(3.0, 0.0), 0.5);
        assert_eq!(p.divide(0.0, 0.0), 0.5);
        assert_eq!(p.divide(3.0, 2.0), 1.5);
    }

    #[test]
    fn zero_by_zero_distinguishes_numerator() {
        let p = DivPolicy::ZeroByZero {
            single: f64::INFINITY,
            dual: 1.0,
        };
        assert_eq!(p.divide(2.0, 0.0), f64::INFINITY);
        assert_eq!(p.divide(0.0, 0.0), 1.0);
        assert_eq!(p.divide(2.0, 4.0), 0.5);
    }

    #[test]
    fn truth_flags() {
        assert_eq!(flag(true), 1.0);
        assert!(truthy(-2.0));
        assert!(!truthy(0.0));
        assert!(!truthy(f64::NAN));
    }
}
