//! Expected-profit objective: `P(win | bid) × profit(bid | win)`.

use tracing::debug;

use crate::oracle::{ProfitFormula, ProfitOracle, WinProbabilityOracle};

/// Where the conditional profit comes from.
#[derive(Clone, Copy)]
pub enum ProfitSource<'a> {
    Oracle(&'a dyn ProfitOracle),
    /// `bid - base_price`
    Formula,
}

impl std::fmt::Debug for ProfitSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oracle(_) => f.write_str("Oracle"),
            Self::Formula => f.write_str("Formula"),
        }
    }
}

/// Expected profit for one tender, as a function of the bid alone.
///
/// Oracle failures never escape: they come back as `NaN` and the search steps
/// treat them as `-inf`.
#[derive(Clone, Copy)]
pub struct Objective<'a> {
    win: &'a dyn WinProbabilityOracle,
    profit: ProfitSource<'a>,
    base_price: f64,
    quality_score: f64,
    clamp_profit: bool,
}

impl<'a> Objective<'a> {
    pub fn new(
        win: &'a dyn WinProbabilityOracle,
        profit: ProfitSource<'a>,
        base_price: f64,
        quality_score: f64,
    ) -> Self {
        Self {
            win,
            profit,
            base_price,
            quality_score,
            clamp_profit: false,
        }
    }

    /// Floor conditional profit at zero.
    pub fn with_profit_clamp(mut self, clamp: bool) -> Self {
        self.clamp_profit = clamp;
        self
    }

    /// Win probability clamped to `[0, 1]`, `None` when the oracle fails or
    /// returns a non-finite value.
    pub fn win_probability(&self, bid: f64) -> Option<f64> {
        match self
            .win
            .win_probability(bid, self.base_price, self.quality_score)
        {
            Ok(p) if p.is_finite() => Some(p.clamp(0.0, 1.0)),
            Ok(p) => {
                debug!("Win oracle returned {} at bid {}", p, bid);
                None
            }
            Err(e) => {
                debug!("Win oracle failed at bid {}: {}", bid, e);
                None
            }
        }
    }

    /// Profit if `bid` wins, `None` when the profit oracle fails or returns a
    /// non-finite value.
    pub fn profit_if_won(&self, bid: f64) -> Option<f64> {
        let result = match self.profit {
            ProfitSource::Oracle(oracle) => {
                oracle.profit_if_won(bid, self.base_price, self.quality_score)
            }
            ProfitSource::Formula => {
                ProfitFormula.profit_if_won(bid, self.base_price, self.quality_score)
            }
        };
        match result {
            Ok(profit) if !profit.is_finite() => {
                debug!("Profit oracle returned {} at bid {}", profit, bid);
                None
            }
            Ok(profit) if self.clamp_profit => Some(profit.max(0.0)),
            Ok(profit) => Some(profit),
            Err(e) => {
                debug!("Profit oracle failed at bid {}: {}", bid, e);
                None
            }
        }
    }

    /// Expected profit at `bid`; `NaN` if either oracle has no answer.
    pub fn expected_profit(&self, bid: f64) -> f64 {
        match (self.win_probability(bid), self.profit_if_won(bid)) {
            (Some(p), Some(profit)) => p * profit,
            _ => f64::NAN,
        }
    }
}

/// Selection key: non-finite values rank below everything.
pub(crate) fn screened(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::NEG_INFINITY
    }
}
