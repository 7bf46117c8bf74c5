//! Summary statistics over the remembered trade results.

use statrs::statistics::Statistics;

/// Win rate, dispersion and extremes of a P&L series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total: f64,
    pub mean: f64,
    /// Sample standard deviation; zero with fewer than two results
    pub std_dev: f64,
    pub best: f64,
    pub worst: f64,
    /// Gross profit over gross loss; infinite without losses
    pub profit_factor: f64,
}

impl MemoryStats {
    pub fn calculate(pnls: &[f64]) -> Self {
        if pnls.is_empty() {
            return Self::default();
        }

        let wins = pnls.iter().filter(|p| **p > 0.0).count();
        let losses = pnls.iter().filter(|p| **p < 0.0).count();
        let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();

        let std_dev = if pnls.len() > 1 { pnls.std_dev() } else { 0.0 };
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            count: pnls.len(),
            wins,
            losses,
            win_rate: wins as f64 / pnls.len() as f64,
            total: pnls.iter().sum(),
            mean: pnls.mean(),
            std_dev,
            best: Statistics::max(pnls),
            worst: Statistics::min(pnls),
            profit_factor,
        }
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Recent Trades ===")?;
        writeln!(f, "Trades:        {} ({} wins, {} losses)", self.count, self.wins, self.losses)?;
        writeln!(f, "Win Rate:      {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Total P&L:     {:.2}", self.total)?;
        writeln!(f, "Mean P&L:      {:.2}", self.mean)?;
        writeln!(f, "Std Dev:       {:.2}", self.std_dev)?;
        writeln!(f, "Best / Worst:  {:.2} / {:.2}", self.best, self.worst)?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        assert_eq!(MemoryStats::calculate(&[]), MemoryStats::default());
    }

    #[test]
    fn test_mixed_history() {
        let stats = MemoryStats::calculate(&[4.0, -2.0, 6.0, -2.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 2);
        assert!((stats.win_rate - 0.5).abs() < 1e-12);
        assert!((stats.total - 6.0).abs() < 1e-12);
        assert!((stats.mean - 1.5).abs() < 1e-12);
        assert_eq!(stats.best, 6.0);
        assert_eq!(stats.worst, -2.0);
        assert!((stats.profit_factor - 2.5).abs() < 1e-12);
        // Sample variance: (6.25 + 12.25 + 20.25 + 12.25) / 3 = 17
        assert!((stats.std_dev - 17.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_single_win() {
        let stats = MemoryStats::calculate(&[3.0]);
        assert_eq!(stats.std_dev, 0.0);
        assert!(stats.profit_factor.is_infinite());
    }
}
