//! Numeric kernels for the analysis runners.
//!
//! Descriptive statistics follow the usual sample conventions: standard
//! deviation with one delta degree of freedom and quantiles by linear
//! interpolation. The regression p-value is a two-sided Student's t
//! probability evaluated through the regularized incomplete beta
//! function.

#![allow(clippy::suboptimal_flops)]
#![allow(clippy::cast_precision_loss)]

/// Guards the t statistic against division by zero when `|r|` is 1.
const TINY: f64 = 1e-20;

const MAX_ITERATIONS: usize = 200;
const EPSILON: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with one delta degree of freedom. `None`
/// when fewer than two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let center = mean(values)?;
    let sum_squares: f64 = values.iter().map(|value| (value - center).powi(2)).sum();
    Some((sum_squares / (values.len() - 1) as f64).sqrt())
}

/// Quantile of an ascending slice by linear interpolation between the
/// two nearest order statistics.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let fraction = position - position.floor();
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Pearson correlation of two equal-length samples. `None` when fewer
/// than two points or when either side has zero variance.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
        sxy += (x - mx) * (y - my);
    }
    let denominator = (sxx * syy).sqrt();
    if denominator <= 0.0 {
        return None;
    }
    Some((sxy / denominator).clamp(-1.0, 1.0))
}

/// Least-squares line fit: slope, intercept, correlation coefficient,
/// two-sided p-value and the standard error of the slope.
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub std_err: f64,
}

/// Fits a least-squares line through the points. `None` when fewer than
/// two points are given or all x values are identical.
#[must_use]
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut ssxm = 0.0;
    let mut ssym = 0.0;
    let mut ssxym = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        ssxm += (x - mx).powi(2);
        ssym += (y - my).powi(2);
        ssxym += (x - mx) * (y - my);
    }
    ssxm /= n;
    ssym /= n;
    ssxym /= n;
    if ssxm <= 0.0 {
        return None;
    }
    let slope = ssxym / ssxm;
    let intercept = my - slope * mx;
    let r_den = (ssxm * ssym).sqrt();
    let r_value = if r_den <= 0.0 {
        0.0
    } else {
        (ssxym / r_den).clamp(-1.0, 1.0)
    };
    let (p_value, std_err) = if xs.len() == 2 {
        // With zero residual degrees of freedom the test degenerates.
        let p = if (ys[0] - ys[1]).abs() > 0.0 { 0.0 } else { 1.0 };
        (p, 0.0)
    } else {
        let df = n - 2.0;
        let t = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
        let p = 2.0 * student_t_sf(t.abs(), df);
        let std_err = ((1.0 - r_value.powi(2)) * ssym / ssxm / df).sqrt();
        (p, std_err)
    };
    Some(LinearFit {
        slope,
        intercept,
        r_value,
        p_value,
        std_err,
    })
}

/// Survival function of Student's t distribution with `df` degrees of
/// freedom, evaluated at `t >= 0`.
fn student_t_sf(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    0.5 * incomplete_beta(0.5 * df, 0.5, x)
}

/// Regularized incomplete beta function `I_x(a, b)`.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cf(a, b, x) / a
    } else {
        1.0 - front * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta function, evaluated with
/// the modified Lentz method.
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut lentz_c = 1.0;
    let mut lentz_d = 1.0 - qab * x / qap;
    if lentz_d.abs() < FPMIN {
        lentz_d = FPMIN;
    }
    lentz_d = 1.0 / lentz_d;
    let mut value = lentz_d;
    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;
        let mut coefficient = m * (b - m) * x / ((qam + m2) * (a + m2));
        lentz_d = 1.0 + coefficient * lentz_d;
        if lentz_d.abs() < FPMIN {
            lentz_d = FPMIN;
        }
        lentz_c = 1.0 + coefficient / lentz_c;
        if lentz_c.abs() < FPMIN {
            lentz_c = FPMIN;
        }
        lentz_d = 1.0 / lentz_d;
        value *= lentz_d * lentz_c;
        coefficient = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        lentz_d = 1.0 + coefficient * lentz_d;
        if lentz_d.abs() < FPMIN {
            lentz_d = FPMIN;
        }
        lentz_c = 1.0 + coefficient / lentz_c;
        if lentz_c.abs() < FPMIN {
            lentz_c = FPMIN;
        }
        lentz_d = 1.0 / lentz_d;
        let delta = lentz_d * lentz_c;
        value *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    value
}

/// Natural log of the gamma function by the Lanczos approximation.
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];
    let mut denominator = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    for coefficient in COEFFICIENTS {
        denominator += 1.0;
        series += coefficient / denominator;
    }
    (2.506_628_274_631_000_5 * series / x).ln() - tmp
}
