//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::{DEFAULT_STORE_DIR, JsonResultStore};
use crate::domain::backtest::{BacktestResult, run_full_backtest};
use crate::domain::config::StrategyConfig;
use crate::domain::config_loader::build_strategy_config;
use crate::domain::error::BacktestError;
use crate::domain::history::{HistoryItem, compare};
use crate::domain::price::PriceBar;
use crate::domain::signal::SignalStats;
use crate::domain::sweep::{ParamRange, SweepGrid, optimize};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::store_port::ResultStorePort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OWNER: &str = "local";

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Result store directory [default: [store] path, then ./results]
    #[arg(long)]
    pub store: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_OWNER)]
    pub owner: String,
}

impl StoreArgs {
    /// `--store`, then `[store] path` when a config file is loaded, then `./results`.
    pub fn open(&self, config: Option<&dyn ConfigPort>) -> JsonResultStore {
        match (&self.store, config) {
            (Some(dir), _) => JsonResultStore::new(dir.clone()),
            (None, Some(config)) => JsonResultStore::from_config(config),
            (None, None) => JsonResultStore::new(PathBuf::from(DEFAULT_STORE_DIR)),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and save the result
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Also write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_save: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show signal statistics for a configuration
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Grid-search two strategy parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// MIN:MAX:STEP for the short / fast / buy parameter
        #[arg(long, value_parser = parse_range)]
        param1: ParamRange,
        /// MIN:MAX:STEP for the long / slow / sell parameter
        #[arg(long, value_parser = parse_range)]
        param2: ParamRange,
    },
    /// List stored results, newest first
    History {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print a stored result
    Show {
        id: u64,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Delete a stored result
    Delete {
        id: u64,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Compare two or more stored results
    Compare {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u64>,
        #[command(flatten)]
        store: StoreArgs,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            no_save,
            store,
        } => run_backtest(
            &config,
            data_dir.as_deref(),
            output.as_deref(),
            no_save,
            &store,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Signals { config, data_dir } => run_signals(&config, data_dir.as_deref()),
        Command::Optimize {
            config,
            data_dir,
            param1,
            param2,
        } => run_optimize(&config, data_dir.as_deref(), SweepGrid { param1, param2 }),
        Command::History { store } => run_history(&store),
        Command::Show { id, store } => run_show(id, &store),
        Command::Delete { id, store } => run_delete(id, &store),
        Command::Compare { ids, store } => run_compare(&ids, &store),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Parses `MIN:MAX:STEP`.
pub fn parse_range(s: &str) -> Result<ParamRange, String> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [min, max, step] = parts.as_slice() else {
        return Err(format!("expected MIN:MAX:STEP, got '{}'", s));
    };
    let num = |v: &str| {
        v.parse::<usize>()
            .map_err(|_| format!("'{}' is not a non-negative integer", v))
    };
    Ok(ParamRange::new(num(*min)?, num(*max)?, num(*step)?))
}

/// Loads and validates the strategy configuration at `path`.
pub fn load_strategy(path: &Path) -> Result<(FileConfigAdapter, StrategyConfig), BacktestError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    let config = build_strategy_config(&adapter)?;
    Ok((adapter, config))
}

/// `--data-dir`, then `[backtest] data_dir`, then `./data`.
pub fn resolve_data_dir(override_dir: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("backtest", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Symbol whose bars drive single-series commands: the configured symbol, or
/// the first allocation for multi-asset configs.
fn primary_symbol(config: &StrategyConfig) -> &str {
    config
        .allocations
        .first()
        .map(|a| a.symbol.as_str())
        .unwrap_or(config.symbol.as_str())
}

fn run_backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    output: Option<&Path>,
    no_save: bool,
    store_args: &StoreArgs,
) -> Result<(), BacktestError> {
    let (adapter, config) = load_strategy(config_path)?;
    let data = CsvAdapter::new(resolve_data_dir(data_dir, &adapter));
    let store = store_args.open(Some(&adapter));

    let id = if no_save {
        0
    } else {
        store.next_id(&store_args.owner)?
    };

    eprintln!(
        "Running {} on {} from {} to {}",
        config.kind,
        if config.is_multi_asset() {
            "multiple assets"
        } else {
            config.symbol.as_str()
        },
        config.start_date,
        config.end_date
    );
    let result = run_full_backtest(&data, &config, id)?;
    print_summary(&result);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result).map_err(|e| BacktestError::Store {
            reason: format!("failed to encode result: {}", e),
        })?;
        fs::write(path, json)?;
        eprintln!("Result written to: {}", path.display());
    }

    if !no_save {
        store.save(&store_args.owner, &result)?;
        eprintln!("Saved as result #{} for {}", id, store_args.owner);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), BacktestError> {
    let (_, config) = load_strategy(config_path)?;
    eprintln!("Configuration is valid.");
    eprintln!("  Name:     {}", config.name);
    eprintln!("  Strategy: {}", config.kind);
    eprintln!("  Period:   {} to {}", config.start_date, config.end_date);
    if let Some(plan) = &config.contribution {
        eprintln!(
            "  Contrib:  {:.2} {} on day {}",
            plan.amount, plan.interval, plan.day_of_month
        );
    }
    for alloc in &config.allocations {
        eprintln!("  {:<8}  {:.1}%", alloc.symbol, alloc.ratio * 100.0);
    }
    Ok(())
}

fn fetch_primary(
    data_dir: Option<&Path>,
    adapter: &FileConfigAdapter,
    config: &StrategyConfig,
) -> Result<Vec<PriceBar>, BacktestError> {
    let data = CsvAdapter::new(resolve_data_dir(data_dir, adapter));
    data.fetch_prices(primary_symbol(config), config.start_date, config.end_date)
}

fn run_signals(config_path: &Path, data_dir: Option<&Path>) -> Result<(), BacktestError> {
    let (adapter, config) = load_strategy(config_path)?;
    let bars = fetch_primary(data_dir, &adapter, &config)?;

    let indicators = config.kind.compute_indicators(&bars);
    let signals = config
        .kind
        .generate_signals(&bars, &indicators, config.contribution.as_ref());
    let stats = SignalStats::collect(&bars, &signals);

    eprintln!("\n=== Signals: {} ({}) ===", primary_symbol(&config), config.kind);
    eprintln!("Days:          {}", stats.total_days);
    eprintln!("Buy signals:   {}", stats.buy_signals);
    eprintln!("Sell signals:  {}", stats.sell_signals);
    if let (Some(first), Some(last)) = (stats.first_signal, stats.last_signal) {
        eprintln!("First / last:  {} / {}", first, last);
    }
    for sample in &stats.samples {
        eprintln!("  {}  {:<4?}  {:.2}", sample.date, sample.signal, sample.close);
    }
    Ok(())
}

fn run_optimize(
    config_path: &Path,
    data_dir: Option<&Path>,
    grid: SweepGrid,
) -> Result<(), BacktestError> {
    let (adapter, config) = load_strategy(config_path)?;
    let bars = fetch_primary(data_dir, &adapter, &config)?;

    let sweep = optimize(&bars, &config, &grid)?;
    eprintln!("\n=== Optimization: {} ===", config.kind.type_name());
    eprintln!("Best params:   {} / {}", sweep.best_param1, sweep.best_param2);
    eprintln!("Best return:   {:.2}%", sweep.best_return);
    eprintln!("Sharpe:        {:.2}", sweep.best_sharpe);

    let header: Vec<String> = sweep.y_labels.iter().map(|y| format!("{:>8}", y)).collect();
    eprintln!("\n{:>6}{}", "", header.join(""));
    for (x, label) in sweep.x_labels.iter().enumerate() {
        let row: Vec<String> = sweep
            .heatmap
            .iter()
            .filter(|c| c.x == x)
            .map(|c| match c.value {
                Some(v) => format!("{:>8.1}", v),
                None => format!("{:>8}", "-"),
            })
            .collect();
        eprintln!("{:>6}{}", label, row.join(""));
    }
    Ok(())
}

fn run_history(store_args: &StoreArgs) -> Result<(), BacktestError> {
    let store = store_args.open(None);
    let items: Vec<HistoryItem> = store
        .list(&store_args.owner)?
        .iter()
        .map(HistoryItem::from_result)
        .collect();

    if items.is_empty() {
        eprintln!("No stored results for {}", store_args.owner);
        return Ok(());
    }
    for item in &items {
        eprintln!(
            "#{:<4} {:<24} {:<12} {:<12} {}  {:>8.2}%  {:?}",
            item.id,
            item.name,
            item.symbol,
            item.strategy_type,
            item.period,
            item.total_return,
            item.status
        );
    }
    Ok(())
}

fn run_show(id: u64, store_args: &StoreArgs) -> Result<(), BacktestError> {
    let store = store_args.open(None);
    let stored = store.load(&store_args.owner, id)?;
    eprintln!("Saved at {}", stored.created_at.format("%Y-%m-%d %H:%M:%S"));
    print_summary(&stored.result);

    if !stored.result.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &stored.result.trades {
            eprintln!(
                "  {}  {:<4?}  {:>8} @ {:>10.2}  cash {:>12.2}  total {:>12.2}{}",
                t.date,
                t.action,
                t.shares,
                t.price,
                t.cash_balance,
                t.total_assets,
                t.symbol
                    .as_deref()
                    .map(|s| format!("  [{}]", s))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn run_delete(id: u64, store_args: &StoreArgs) -> Result<(), BacktestError> {
    let store = store_args.open(None);
    store.delete(&store_args.owner, id)?;
    eprintln!("Deleted result #{}", id);
    Ok(())
}

fn run_compare(ids: &[u64], store_args: &StoreArgs) -> Result<(), BacktestError> {
    let store = store_args.open(None);
    let results = ids
        .iter()
        .map(|&id| store.load(&store_args.owner, id).map(|s| s.result))
        .collect::<Result<Vec<_>, _>>()?;
    let comparison = compare(&results)?;

    eprintln!(
        "{:<6} {:<24} {:>10} {:>10} {:>8} {:>10} {:>8}",
        "id", "name", "return%", "annual%", "sharpe", "drawdown%", "win%"
    );
    for row in &comparison.metrics {
        eprintln!(
            "#{:<5} {:<24} {:>10.2} {:>10.2} {:>8.2} {:>10.2} {:>8.1}",
            row.id,
            row.name,
            row.total_return,
            row.annualized_return,
            row.sharpe_ratio,
            row.max_drawdown,
            row.win_rate
        );
    }
    Ok(())
}

pub fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    eprintln!("\n=== {} ({}) ===", result.strategy_name, result.strategy_type);
    eprintln!("Symbol:           {}", result.symbol);
    eprintln!("Period:           {} to {}", result.start_date, result.end_date);
    eprintln!("Final Capital:    {:.2}", result.final_capital);
    eprintln!("Total Cost:       {:.2}", s.total_cost);
    eprintln!("Total Return:     {:.2}%", s.total_return);
    eprintln!("Annualized:       {:.2}%", s.annualized_return);
    eprintln!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    eprintln!("Max Drawdown:     {:.2}%", s.max_drawdown);
    eprintln!("Total Trades:     {}", s.total_trades);
    eprintln!(
        "Win Rate:         {:.1}% ({} / {})",
        s.win_rate, s.profit_trades, s.loss_trades
    );
    if let Some(reason) = &result.degraded {
        eprintln!("warning: metrics unavailable ({})", reason);
    }
}
