//! Standard unit-hydrograph shapes.
//!
//! Both shapes follow the GR4J convention: a cumulative S-curve of the time
//! offset `t` scaled by the routing delay parameter `lag`, clamped at one
//! past the delay. The half hydrograph stops at `lag`; the full hydrograph
//! runs to `2 * lag` with a mirrored tail.

use hydrokernel_core::compile::UnitHydrograph;
use hydrokernel_core::errors::KernelResult;
use hydrokernel_core::expr::Expr;

/// Rising-limb hydrograph: `(t / lag)^2.5` up to `lag`, then one.
pub fn uh_half() -> KernelResult<UnitHydrograph> {
    let rising = (Expr::var("t") / Expr::var("lag")).pow(Expr::lit(2.5));
    UnitHydrograph::build(vec![(Expr::var("lag"), rising)], Expr::var("lag"))
}

/// Two-sided hydrograph over `[0, 2 * lag]`.
///
/// `0.5 * (t / lag)^2.5` on the rising limb, `1 - 0.5 * (2 - t / lag)^2.5`
/// on the falling limb, then one.
pub fn uh_full() -> KernelResult<UnitHydrograph> {
    let ratio = Expr::var("t") / Expr::var("lag");
    let rising = Expr::lit(0.5) * ratio.clone().pow(Expr::lit(2.5));
    let falling =
        Expr::lit(1.0) - Expr::lit(0.5) * (Expr::lit(2.0) - ratio).pow(Expr::lit(2.5));
    UnitHydrograph::build(
        vec![
            (Expr::var("lag"), rising),
            (Expr::lit(2.0) * Expr::var("lag"), falling),
        ],
        Expr::lit(2.0) * Expr::var("lag"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrokernel_core::kernel::ParamBag;
    use hydrokernel_core::value::Value;
    use is_close::is_close;

    fn lag(value: f64) -> ParamBag {
        [("lag".to_string(), Value::Scalar(value))].into_iter().collect()
    }

    #[test]
    fn test_half_hydrograph_saturates_at_lag() {
        let uh = uh_half().unwrap();
        let p = lag(2.0);
        assert!(is_close!(uh.weight(1.0, &p).unwrap(), 0.5f64.powf(2.5)));
        assert!(is_close!(uh.weight(2.0, &p).unwrap(), 1.0));
        assert!(is_close!(uh.weight(5.0, &p).unwrap(), 1.0));
        assert!(is_close!(uh.max_lag(&p).unwrap(), 2.0));
    }

    #[test]
    fn test_full_hydrograph_limbs_meet_at_half_weight() {
        let uh = uh_full().unwrap();
        let p = lag(2.0);
        // At t = lag both limb formulas give 0.5; the rising limb wins the
        // inclusive boundary.
        assert!(is_close!(uh.weight(2.0, &p).unwrap(), 0.5));
        assert!(is_close!(uh.weight(1.0, &p).unwrap(), 0.5 * 0.5f64.powf(2.5)));
        assert!(is_close!(
            uh.weight(3.0, &p).unwrap(),
            1.0 - 0.5 * 0.5f64.powf(2.5)
        ));
        assert!(is_close!(uh.weight(4.0, &p).unwrap(), 1.0));
        assert!(is_close!(uh.weight(9.0, &p).unwrap(), 1.0));
    }

    #[test]
    fn test_max_lag_rounds_up_fractional_delays() {
        let uh = uh_full().unwrap();
        let p = lag(1.3);
        assert!(is_close!(uh.max_lag(&p).unwrap(), 3.0));
    }
}
