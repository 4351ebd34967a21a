pub mod log2;

/// A Pareto distribution fitted by maximum likelihood with a fixed scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParetoFit {
    /// Number of positive samples used in the fit.
    pub n: usize,
    /// The scale parameter, usually the smallest observed value.
    pub x_m: f64,
    /// The estimated shape parameter.
    pub alpha: f64,
    /// Log-likelihood of the samples under the fitted distribution.
    pub log_likelihood: f64,
}

impl ParetoFit {
    /// Fits the shape of a Pareto distribution with scale `x_m` to the positive values in
    /// `samples`. Non-positive samples are ignored.
    pub fn from_samples(samples: &[f64], x_m: f64) -> Result<Self, ParetoError> {
        if x_m <= 0.0 || !x_m.is_finite() {
            return Err(ParetoError::InvalidScale(x_m));
        }
        let (n, sigma_log) = samples
            .iter()
            .filter(|&&x| x > 0.0)
            .fold((0_usize, 0.0_f64), |(n, s), &x| (n + 1, s + x.ln()));
        if n == 0 {
            return Err(ParetoError::NoSamples);
        }
        let n_f = n as f64;
        let n_log_xm = n_f * x_m.ln();
        let denom = sigma_log - n_log_xm;
        if denom <= 0.0 {
            return Err(ParetoError::Degenerate);
        }
        let alpha = n_f / denom;
        let log_likelihood = n_f * alpha.ln() - alpha * n_log_xm - (alpha + 1.0) * sigma_log;
        Ok(Self {
            n,
            x_m,
            alpha,
            log_likelihood,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParetoError {
    #[error("Pareto scale must be positive (got {0})")]
    InvalidScale(f64),

    #[error("No positive samples provided")]
    NoSamples,

    #[error("All samples equal the scale")]
    Degenerate,
}

/// `log10` of a bucket count, with empty buckets mapped to zero.
pub fn log10_count(count: usize) -> f64 {
    match count {
        0 => 0.0,
        c => (c as f64).log10(),
    }
}
