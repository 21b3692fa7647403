//! Domain error types.

/// Rejections raised while building or validating a strategy configuration.
///
/// Every variant is detected before the simulation starts; none of them is ever
/// defaulted away silently.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    Missing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    Invalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy type: {0}")]
    UnknownStrategy(String),

    #[error("initial_capital must be a non-negative number, got {0}")]
    NegativeCapital(f64),

    #[error("{name} must be at least 1")]
    ZeroPeriod { name: &'static str },

    #[error("{fast_name} ({fast}) must be shorter than {slow_name} ({slow})")]
    PeriodOrder {
        fast_name: &'static str,
        fast: usize,
        slow_name: &'static str,
        slow: usize,
    },

    #[error("rsi thresholds must satisfy 0 <= buy < sell <= 100, got buy={buy} sell={sell}")]
    RsiThresholds { buy: f64, sell: f64 },

    #[error("bollinger std multiplier must be positive, got {0}")]
    StdMultiplier(f64),

    #[error("DCA strategy requires a contribution plan")]
    MissingContribution,

    #[error("contribution amount must be a non-negative number, got {0}")]
    ContributionAmount(f64),

    #[error("contribution day_of_month must be within 1..=31, got {0}")]
    ContributionDay(u32),

    #[error("contribution month_of_year must be within 1..=12, got {0}")]
    ContributionMonth(u32),

    #[error("stock allocations are only supported for the DCA strategy")]
    AllocationsRequireDca,

    #[error("allocation ratio for {symbol} must be within 0..=1, got {ratio}")]
    AllocationRatio { symbol: String, ratio: f64 },

    #[error("stock allocation ratios must sum to 1.0, got {total}")]
    AllocationSum { total: f64 },

    #[error("duplicate allocation symbol: {0}")]
    DuplicateSymbol(String),

    #[error("empty symbol")]
    EmptySymbol,

    #[error("start_date {start} is after end_date {end}")]
    DateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("no price data for {symbol} in the requested range")]
    EmptyPriceSeries { symbol: String },

    #[error("price bars for {symbol} are not in strictly increasing date order")]
    UnorderedPriceSeries { symbol: String },
}

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("market data error for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    #[error("result store error: {reason}")]
    Store { reason: String },

    #[error("no stored result {id} for {owner}")]
    NotFound { owner: String, id: u64 },

    #[error("comparison needs at least 2 results, got {count}")]
    TooFewResults { count: usize },

    #[error("parameter sweep error: {reason}")]
    Sweep { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    /// Process exit status reported by the CLI for this error kind.
    pub fn exit_status(&self) -> u8 {
        match self {
            BacktestError::Io(_) => 1,
            BacktestError::InvalidConfiguration(_) => 2,
            BacktestError::Store { .. }
            | BacktestError::NotFound { .. }
            | BacktestError::TooFewResults { .. } => 3,
            BacktestError::Sweep { .. } => 4,
            BacktestError::MarketData { .. } => 5,
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
