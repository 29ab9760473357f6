//! Numeric helpers shared by the statistical analyzers

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

/// Ordinary least squares fit of `y` on `x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Residual standard error with n - 2 degrees of freedom
    pub residual_std: f64,
    pub n: usize,
    pub x_mean: f64,
    /// Sum of squared deviations of `x`
    pub sxx: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Standard error of a new observation at `x`
    pub fn prediction_std(&self, x: f64) -> f64 {
        let n = self.n as f64;
        let leverage = if self.sxx > 0.0 {
            (x - self.x_mean).powi(2) / self.sxx
        } else {
            0.0
        };
        self.residual_std * (1.0 + 1.0 / n + leverage).sqrt()
    }
}

/// Fit `y = intercept + slope * x`; `None` for fewer than three points or
/// constant `x`
pub fn ols(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let sxx: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - x_mean) * (b - y_mean))
        .sum();
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - (intercept + slope * a)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|b| (b - y_mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
        residual_std: (ss_res / (nf - 2.0)).sqrt(),
        n,
        x_mean,
        sxx,
    })
}

/// Inverse of the standard normal CDF
///
/// Rational approximation (Abramowitz and Stegun 26.2.23), absolute error
/// below 4.5e-4. `p` is clamped into the open unit interval.
pub fn normal_quantile(p: f64) -> f64 {
    let p = p.clamp(1e-10, 1.0 - 1e-10);
    let (q, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * q.ln()).sqrt();
    let num = 2.515_517 + 0.802_853 * t + 0.010_328 * t * t;
    let den = 1.0 + 1.432_788 * t + 0.189_269 * t * t + 0.001_308 * t * t * t;
    sign * (t - num / den)
}

/// Two-sided z value for a confidence level such as 0.95
pub fn z_for_confidence(level: f64) -> f64 {
    normal_quantile(0.5 + level / 2.0)
}

/// Linear-interpolated quantile of an ascending slice
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// The next `count` weekdays after `from`, as RFC 3339 dates
pub fn business_days_after(from: DateTime<Utc>, count: usize) -> Vec<String> {
    let mut days = Vec::with_capacity(count);
    let mut current = from;
    while days.len() < count {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(current.date_naive().to_string());
        }
    }
    days
}
