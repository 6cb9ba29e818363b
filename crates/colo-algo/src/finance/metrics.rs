//! Discounted cash-flow metrics.
//!
//! Cash-flow series are indexed by year with `flows[0]` the year-zero
//! (construction) flow. Metrics that can fail to exist return `None`
//! instead of a sentinel.

/// IRR search bracket: -99 % to 1000 %.
pub const IRR_BRACKET: (f64, f64) = (-0.99, 10.0);
pub const IRR_TOLERANCE: f64 = 1e-6;
pub const IRR_MAX_ITERATIONS: usize = 100;

/// Net present value, discounting year `t` by `(1 + rate)^t`.
pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

/// Internal rate of return by bisection over [`IRR_BRACKET`].
///
/// `None` when the NPV does not change sign across the bracket or the
/// bisection does not converge within [`IRR_MAX_ITERATIONS`].
pub fn irr(flows: &[f64]) -> Option<f64> {
    let (mut lo, mut hi) = IRR_BRACKET;
    let mut f_lo = npv(lo, flows);
    let f_hi = npv(hi, flows);
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo * f_hi > 0.0 {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }

    for _ in 0..IRR_MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv(mid, flows);
        if f_mid == 0.0 || (hi - lo) * 0.5 < IRR_TOLERANCE {
            return Some(mid);
        }
        if f_lo * f_mid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    None
}

/// First year whose cumulative undiscounted cash flow is non-negative.
///
/// Year zero does not count: a project with no upfront outflow pays back in
/// year one at the earliest.
pub fn payback_year(flows: &[f64]) -> Option<u32> {
    let mut cumulative = flows.first().copied().unwrap_or(0.0);
    for (year, cf) in flows.iter().enumerate().skip(1) {
        cumulative += cf;
        if cumulative >= 0.0 {
            return Some(year as u32);
        }
    }
    None
}

/// Capital recovery factor: annual payment per unit of principal.
pub fn capital_recovery_factor(years: u32, rate: f64) -> f64 {
    if years == 0 {
        return 0.0;
    }
    if rate == 0.0 {
        return 1.0 / years as f64;
    }
    let factor = (1.0 + rate).powi(years as i32);
    rate * factor / (factor - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(capex: f64, annual: f64, years: usize) -> Vec<f64> {
        std::iter::once(-capex)
            .chain(std::iter::repeat(annual).take(years))
            .collect()
    }

    #[test]
    fn irr_recovers_known_root() {
        let flows = flat(1_000_000.0, 150_000.0, 10);
        let rate = irr(&flows).unwrap();
        assert!((rate - 0.081_441_656).abs() < 1e-4, "irr = {rate}");
        assert!(npv(rate, &flows).abs() < 10.0);
    }

    #[test]
    fn irr_undefined_without_sign_change() {
        assert_eq!(irr(&[-100.0, -10.0, -10.0]), None);
        assert_eq!(irr(&[100.0, 10.0]), None);
    }

    #[test]
    fn npv_includes_year_zero() {
        assert_eq!(npv(0.1, &[-100.0]), -100.0);
        assert!((npv(0.1, &[-100.0, 110.0])).abs() < 1e-9);
    }

    #[test]
    fn payback_counts_from_year_one() {
        assert_eq!(payback_year(&flat(1_000.0, 300.0, 5)), Some(4));
        assert_eq!(payback_year(&flat(1_000.0, 100.0, 5)), None);
        assert_eq!(payback_year(&[-100.0, 100.0]), Some(1));
    }

    #[test]
    fn crf_matches_annuity_formula() {
        assert!((capital_recovery_factor(10, 0.0) - 0.1).abs() < 1e-12);
        // 5 % over 20 years
        assert!((capital_recovery_factor(20, 0.05) - 0.080_242_587_2).abs() < 1e-9);
        assert_eq!(capital_recovery_factor(0, 0.05), 0.0);
    }
}
