//! Holdings, cash and contribution tracking for one simulation run.

/// Whole shares bought with at most `cash` at `price`. Zero for a non-positive
/// or non-finite price.
pub fn affordable_shares(cash: f64, price: f64) -> u64 {
    if !(price.is_finite() && price > 0.0 && cash.is_finite() && cash > 0.0) {
        return 0;
    }
    let mut shares = (cash / price).floor() as u64;
    while shares > 0 && shares as f64 * price > cash {
        shares -= 1;
    }
    shares
}

/// A long position under the average-cost method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holding {
    pub shares: u64,
    pub cost_basis: f64,
}

impl Holding {
    pub fn is_flat(&self) -> bool {
        self.shares == 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn average_cost(&self) -> f64 {
        if self.shares == 0 {
            0.0
        } else {
            self.cost_basis / self.shares as f64
        }
    }

    /// Unrealized gain as `(percent, amount)` against the cost basis.
    pub fn unrealized(&self, price: f64) -> (f64, f64) {
        let amount = self.market_value(price) - self.cost_basis;
        let pct = if self.cost_basis > 0.0 {
            amount / self.cost_basis * 100.0
        } else {
            0.0
        };
        (pct, amount)
    }

    pub fn buy(&mut self, shares: u64, cost: f64) {
        self.shares += shares;
        self.cost_basis += cost;
    }

    /// Removes `shares` (capped at the holding) at `price` and returns
    /// `(sold, revenue, realized_pnl)`.
    pub fn sell(&mut self, shares: u64, price: f64) -> (u64, f64, f64) {
        let sold = shares.min(self.shares);
        let revenue = sold as f64 * price;
        let sold_cost = self.average_cost() * sold as f64;

        self.shares -= sold;
        self.cost_basis -= sold_cost;
        if self.shares == 0 {
            self.cost_basis = 0.0;
        }

        (sold, revenue, revenue - sold_cost)
    }
}

/// Mutable state of a single-asset simulation, owned by the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub cash: f64,
    pub holding: Holding,
    pub total_contributed: f64,
}

impl SimulationState {
    pub fn new(initial_capital: f64) -> Self {
        SimulationState {
            cash: initial_capital,
            holding: Holding::default(),
            total_contributed: initial_capital,
        }
    }

    pub fn contribute(&mut self, amount: f64) {
        self.cash += amount;
        self.total_contributed += amount;
    }

    pub fn total_assets(&self, price: f64) -> f64 {
        self.cash + self.holding.market_value(price)
    }

    /// Buys as many whole shares as `budget` (capped at cash) affords.
    /// Returns `(shares, cost)`, or `None` when nothing could be bought.
    pub fn buy_with(&mut self, budget: f64, price: f64) -> Option<(u64, f64)> {
        let shares = affordable_shares(budget.min(self.cash), price);
        if shares == 0 {
            return None;
        }
        let cost = shares as f64 * price;
        self.cash -= cost;
        self.holding.buy(shares, cost);
        Some((shares, cost))
    }

    /// Sells `floor(shares × ratio)` shares. Returns `(sold, revenue, pnl)`, or
    /// `None` when the rounded quantity is zero.
    pub fn sell_fraction(&mut self, ratio: f64, price: f64) -> Option<(u64, f64, f64)> {
        let quantity = (self.holding.shares as f64 * ratio).floor() as u64;
        if quantity == 0 {
            return None;
        }
        let (sold, revenue, pnl) = self.holding.sell(quantity, price);
        self.cash += revenue;
        Some((sold, revenue, pnl))
    }
}
