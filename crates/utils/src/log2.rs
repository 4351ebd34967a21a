//! Fixed-point approximation of `log2(1 + x)` for `x` in `[0, 1)`, scaled by 1024.
//!
//! The approximation divides the argument by a short table of square roots of two, then
//! finishes with a linear term. It only uses integer multiplications and divisions, which
//! is what the congestion controller can afford on its fast path.

/// Fixed-point representation of 1.0.
pub const ONE: u32 = 1024;

/// `1024 / ln(2)`, the slope of `log2` at 1.
const DERIV: u32 = 1477;

/// `1024 * 2^(1/2^k)` for k = 1..=5.
pub const STEPS: [u32; 5] = [1449, 1218, 1117, 1070, 1047];

/// `1024 * log2(STEPS[k] / 1024)`.
pub const LOGS: [u32; 5] = [512, 256, 128, 64, 32];

/// Approximates `1024 * log2(1 + i / 1024)` for `i` in `0..1024`.
pub fn log2_frac(i: u32) -> u32 {
    let mut x = i + ONE;
    let mut l = 0;
    for (&step, &log) in STEPS.iter().zip(LOGS.iter()) {
        if x >= step {
            l += log;
            x = x * ONE / step;
        }
    }
    l + (x - ONE) * DERIV / ONE
}

/// How far the approximation strays from the exact value.
#[derive(Debug, Clone, PartialEq)]
pub struct Log2Report {
    /// Most negative error (approximation below the exact value), with its argument.
    pub min_err: (u32, f64),
    /// Most positive error, with its argument.
    pub max_err: (u32, f64),
    /// Arguments where the approximation decreased compared to the previous one.
    pub non_monotonic: Vec<u32>,
}

/// Evaluates the approximation against `f64::log2` over `1..1024`.
pub fn check() -> Log2Report {
    let mut report = Log2Report {
        min_err: (0, 0.0),
        max_err: (0, 0.0),
        non_monotonic: Vec::new(),
    };
    let mut previous = 0;
    for i in 1..ONE {
        let approx = log2_frac(i);
        let exact = (1.0 + i as f64 / ONE as f64).log2();
        let err = approx as f64 / ONE as f64 - exact;
        if approx < previous {
            report.non_monotonic.push(i);
        }
        previous = approx;
        if err < report.min_err.1 {
            report.min_err = (i, err);
        }
        if err > report.max_err.1 {
            report.max_err = (i, err);
        }
    }
    report
}

/// The exact fixed-point log of a table step, for comparing against [`LOGS`].
pub fn exact_step_log(step: u32) -> u32 {
    ((step as f64 / ONE as f64).log2() * ONE as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_points() {
        assert_eq!(log2_frac(0), 0);
        assert_eq!(log2_frac(425), 512);
        assert_eq!(log2_frac(512), 596);
        assert_eq!(log2_frac(1023), 1016);
    }

    #[test]
    fn error_is_bounded_and_monotonic() {
        let report = check();
        assert!(report.non_monotonic.is_empty());
        assert!(report.min_err.1 > -0.01, "{:?}", report.min_err);
        assert!(report.max_err.1 < 0.001, "{:?}", report.max_err);
    }

    #[test]
    fn table_matches_exact_logs() {
        for (&step, &log) in STEPS.iter().zip(LOGS.iter()) {
            assert_eq!(exact_step_log(step), log);
        }
    }
}
