//! Run report.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use barflow_core::{Order, OrderStatus, Trade};

use crate::config::ExecutionMode;

/// Account state recorded after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub cash: Decimal,
    pub value: Decimal,
}

/// Final position in one feed's instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub feed: String,
    pub size: Decimal,
    pub price: Decimal,
}

/// Bars delivered by one feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub name: String,
    pub bars: usize,
    /// Set when the feed stopped on an error
    pub error: Option<String>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: String,
    pub mode: ExecutionMode,
    pub ticks: usize,
    pub feeds: Vec<FeedSummary>,
    pub initial_cash: Decimal,
    pub final_cash: Decimal,
    pub final_value: Decimal,
    pub positions: Vec<PositionSummary>,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

impl RunReport {
    pub fn orders_with_status(&self, status: OrderStatus) -> usize {
        self.orders.iter().filter(|o| o.status == status).count()
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    /// Net pnl of closed trades.
    pub fn realized_pnl(&self) -> Decimal {
        self.closed_trades().map(|t| t.pnlcomm).sum()
    }

    pub fn total_return_pct(&self) -> Decimal {
        if self.initial_cash.is_zero() {
            return Decimal::ZERO;
        }
        (self.final_value - self.initial_cash) / self.initial_cash * Decimal::ONE_HUNDRED
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                        RUN REPORT                         \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str(&format!("  Strategy:            {}\n", self.strategy));
        s.push_str(&format!("  Mode:                {}\n", self.mode));
        s.push_str(&format!("  Ticks:               {}\n", self.ticks));
        for feed in &self.feeds {
            match &feed.error {
                Some(e) => s.push_str(&format!(
                    "  Feed {:<15} {} bars (stopped: {})\n",
                    feed.name, feed.bars, e
                )),
                None => s.push_str(&format!("  Feed {:<15} {} bars\n", feed.name, feed.bars)),
            }
        }
        s.push('\n');

        s.push_str("ACCOUNT\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Initial Cash:        {:.2}\n", self.initial_cash));
        s.push_str(&format!("  Final Cash:          {:.2}\n", self.final_cash));
        s.push_str(&format!("  Final Value:         {:.2}\n", self.final_value));
        s.push_str(&format!("  Total Return:        {:.2}%\n", self.total_return_pct()));
        for p in self.positions.iter().filter(|p| !p.size.is_zero()) {
            s.push_str(&format!(
                "  Position {:<11} {} @ {:.2}\n",
                p.feed, p.size, p.price
            ));
        }
        s.push('\n');

        s.push_str("ORDERS & TRADES\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Orders:              {}\n", self.orders.len()));
        s.push_str(&format!(
            "  Completed:           {}\n",
            self.orders_with_status(OrderStatus::Completed)
        ));
        s.push_str(&format!(
            "  Canceled/Expired:    {}\n",
            self.orders_with_status(OrderStatus::Canceled)
                + self.orders_with_status(OrderStatus::Expired)
        ));
        s.push_str(&format!(
            "  Margin/Rejected:     {}\n",
            self.orders_with_status(OrderStatus::Margin)
                + self.orders_with_status(OrderStatus::Rejected)
        ));
        s.push_str(&format!("  Trades:              {}\n", self.trades.len()));
        s.push_str(&format!(
            "  Closed Trades:       {}\n",
            self.closed_trades().count()
        ));
        s.push_str(&format!("  Realized PnL (net):  {:.2}\n", self.realized_pnl()));
        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
