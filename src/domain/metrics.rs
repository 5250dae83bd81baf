//! Risk-adjusted statistics over realized position results.

/// Maximum peak-to-trough decline of an equity series, as a fraction of the peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Mean over population standard deviation of per-position returns.
///
/// `None` with fewer than two samples or no dispersion beyond rounding noise.
pub fn sharpe_ratio(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev > 1e-12 * mean.abs().max(1.0) {
        Some(mean / stddev)
    } else {
        None
    }
}

/// Equity after each realized result, starting from `initial`.
pub fn equity_curve(initial: f64, realized: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(realized.len() + 1);
    let mut equity = initial;
    curve.push(equity);
    for pnl in realized {
        equity += pnl;
        curve.push(equity);
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn drawdown_of_empty_or_rising_series_is_zero() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0]), 0.0);
    }

    #[test]
    fn drawdown_measures_from_running_peak() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert_relative_eq!(dd, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn sharpe_needs_two_samples_and_dispersion() {
        assert_eq!(sharpe_ratio(&[]), None);
        assert_eq!(sharpe_ratio(&[0.1]), None);
        assert_eq!(sharpe_ratio(&[0.1, 0.1, 0.1]), None);
    }

    #[test]
    fn sharpe_sign_follows_mean() {
        let positive = sharpe_ratio(&[0.2, 0.1, -0.05, 0.15]).unwrap();
        assert!(positive > 0.0);
        let negative = sharpe_ratio(&[-0.2, -0.1, 0.05]).unwrap();
        assert!(negative < 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        // mean 0.1, population stddev 0.1
        assert_relative_eq!(sharpe_ratio(&[0.0, 0.2]).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn equity_curve_accumulates() {
        assert_eq!(equity_curve(100.0, &[10.0, -5.0]), vec![100.0, 110.0, 105.0]);
    }
}
