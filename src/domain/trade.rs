use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a spread position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Long the spread (long leg 1, short leg 2)
    Long,
    /// Short the spread
    Short,
}

/// A closed round-trip on the spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Bar index of the entry in the simulated series
    pub entry_idx: usize,
    pub exit_idx: usize,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    /// Standardized spread at entry/exit (sigma_stat units)
    pub z_entry: f64,
    pub z_exit: f64,
    /// Raw log-spread at entry/exit
    pub x_entry: f64,
    pub x_exit: f64,
    /// Signed leverage (>0 long-spread, <0 short-spread)
    pub leverage: f64,
    /// Entry + exit costs paid
    pub costs: f64,
    /// Log PnL net of costs
    pub pnl: f64,
    /// Bars held
    pub bars: usize,
}

impl Trade {
    pub fn side(&self) -> Side {
        if self.leverage < 0.0 {
            Side::Short
        } else {
            Side::Long
        }
    }

    /// PnL before costs
    pub fn gross_pnl(&self) -> f64 {
        self.pnl + self.costs
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} x{:.2}: {} (z={:.2}) -> {} (z={:.2}), pnl={:.6}, bars={}",
            self.side(),
            self.leverage.abs(),
            self.entry_time,
            self.z_entry,
            self.exit_time,
            self.z_exit,
            self.pnl,
            self.bars
        )
    }
}
