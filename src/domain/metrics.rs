//! Performance metrics over an equity curve and closed-trade results.

use serde::Serialize;

/// Summary statistics for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub volatility_pct: f64,
    pub max_drawdown_pct: f64,
    /// Longest stretch of periods spent below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
}

fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Worst peak-to-trough decline (percent) and the longest run of periods
/// below a prior peak.
pub fn max_drawdown(equity: &[f64]) -> (f64, usize) {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    let mut below = 0usize;
    let mut longest = 0usize;

    for &value in equity {
        if value >= peak {
            peak = value;
            below = 0;
        } else {
            below += 1;
            longest = longest.max(below);
            if peak > 0.0 {
                let dd = (peak - value) / peak * 100.0;
                worst = worst.max(dd);
            }
        }
    }
    (worst, longest)
}

/// Compute all metrics. `periods_per_year` converts per-period statistics to
/// annual figures (252 for daily bars). `trade_pnls` is one realized profit
/// or loss per closed trade.
pub fn compute(
    equity: &[f64],
    trade_pnls: &[f64],
    periods_per_year: f64,
    risk_free_rate: f64,
) -> PerformanceMetrics {
    let returns = period_returns(equity);

    let total_return_pct = match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last / first - 1.0) * 100.0,
        _ => 0.0,
    };

    let periods = returns.len() as f64;
    let annualized_return_pct = if periods > 0.0 && total_return_pct > -100.0 {
        let growth = 1.0 + total_return_pct / 100.0;
        (growth.powf(periods_per_year / periods) - 1.0) * 100.0
    } else {
        0.0
    };

    let per_period_vol = std_dev(&returns);
    let volatility_pct = per_period_vol * periods_per_year.sqrt() * 100.0;

    let (max_drawdown_pct, max_drawdown_duration) = max_drawdown(equity);

    let rf_per_period = risk_free_rate / periods_per_year;
    let excess_mean = mean(&returns) - rf_per_period;
    let sharpe_ratio = if per_period_vol > 0.0 {
        excess_mean / per_period_vol * periods_per_year.sqrt()
    } else {
        0.0
    };

    let downside: Vec<f64> = returns
        .iter()
        .filter(|&&r| r < rf_per_period)
        .map(|&r| r - rf_per_period)
        .collect();
    let downside_dev = std_dev(&downside);
    let sortino_ratio = if downside_dev > 0.0 {
        excess_mean / downside_dev * periods_per_year.sqrt()
    } else {
        0.0
    };

    let calmar_ratio = if max_drawdown_pct > 0.0 {
        annualized_return_pct / max_drawdown_pct
    } else {
        0.0
    };

    let wins = trade_pnls.iter().filter(|&&p| p > 0.0).count();
    let win_rate_pct = if trade_pnls.is_empty() {
        0.0
    } else {
        wins as f64 / trade_pnls.len() as f64 * 100.0
    };

    let gross_profit: f64 = trade_pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = -trade_pnls.iter().filter(|&&p| p < 0.0).sum::<f64>();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    PerformanceMetrics {
        total_return_pct,
        annualized_return_pct,
        volatility_pct,
        max_drawdown_pct,
        max_drawdown_duration,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        win_rate_pct,
        profit_factor,
        trade_count: trade_pnls.len(),
    }
}
