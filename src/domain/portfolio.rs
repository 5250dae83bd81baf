//! Portfolio aggregation over stored positions and trades.
//!
//! Statistics are recomputed on every call; nothing here is cached.

use serde::{Deserialize, Serialize};

use super::metrics::{equity_curve, max_drawdown, sharpe_ratio};
use super::position::{Position, PositionStatus};
use super::trade::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub total_pnl: f64,
    pub open_positions: usize,
    pub total_trades: usize,
    /// Percentage (0-100) of closed positions with positive pnl.
    pub win_rate: f64,
    pub total_closed_positions: usize,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: Option<f64>,
}

impl PortfolioStats {
    pub fn compute(positions: &[Position], trades: &[Trade], bankroll: f64) -> Self {
        let open_positions = positions.iter().filter(|p| p.is_open()).count();
        let total_pnl: f64 = positions.iter().map(|p| p.pnl).sum();

        let mut closed: Vec<&Position> = positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .collect();
        let total_closed_positions = closed.len();
        let wins = closed.iter().filter(|p| p.pnl > 0.0).count();

        let win_rate = if total_closed_positions == 0 {
            0.0
        } else {
            wins as f64 / total_closed_positions as f64 * 100.0
        };

        closed.sort_by_key(|p| (p.updated_at, p.id));
        let realized: Vec<f64> = closed.iter().map(|p| p.pnl).collect();
        let returns: Vec<f64> = closed
            .iter()
            .filter(|p| p.size > 0.0)
            .map(|p| p.pnl / p.size)
            .collect();

        let max_drawdown = if realized.is_empty() {
            None
        } else {
            Some(max_drawdown(&equity_curve(bankroll, &realized)))
        };

        PortfolioStats {
            total_pnl,
            open_positions,
            total_trades: trades.len(),
            win_rate,
            total_closed_positions,
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown,
        }
    }
}

/// Paper balance: bankroll plus realized results minus capital held in open positions.
pub fn paper_balance(bankroll: f64, positions: &[Position]) -> f64 {
    positions.iter().fold(bankroll, |balance, p| {
        if p.is_open() {
            balance - p.exposure()
        } else {
            balance + p.pnl
        }
    })
}
