//! TOML configuration loading and validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use folio::engine::{DEFAULT_STEP_DAYS, Schedule};
use folio::optimize::EvolutionConfig;
use folio::strategy::{
    CrossoverMomentum, MomentumRanking, PairwiseReallocation, PureReturn, Strategy,
    VolatilityTarget, crossover, momentum_ranking, pairwise, pure_return, volatility_target,
};
use folio::{Allocation, RiskProfile, WEIGHT_EPSILON};
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub portfolios: Vec<PortfolioConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// CSV with columns `date,ticker,category,sector,return,price`.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    "ledger.jsonl".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_step_days")]
    pub step_days: i64,
}

fn default_step_days() -> i64 {
    DEFAULT_STEP_DAYS
}

impl ScheduleConfig {
    pub fn to_schedule(&self) -> Result<Schedule> {
        Ok(Schedule::with_step(self.start, self.end, self.step_days)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

/// One managed portfolio.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub strategy: StrategyConfig,
    /// Overrides the strategy's default search budget.
    #[serde(default)]
    pub optimizer: Option<EvolutionConfig>,
    /// Starting weights when the ledger has nothing for this portfolio.
    #[serde(default)]
    pub holdings: BTreeMap<String, f64>,
}

impl PortfolioConfig {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("#{} {name}", self.id),
            None => format!("#{}", self.id),
        }
    }

    pub fn initial_holdings(&self) -> Allocation {
        self.holdings.iter().map(|(t, w)| (t.clone(), *w)).collect()
    }

    /// Instantiate the configured strategy.
    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        self.strategy.build(self.optimizer.clone())
    }
}

/// Strategy selection, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    VolatilityTarget {
        #[serde(default = "default_target_vol")]
        target_vol: f64,
        #[serde(default = "default_vol_penalty")]
        penalty: f64,
        #[serde(default = "default_vol_threshold")]
        threshold: f64,
    },
    PureReturn {
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_return_threshold")]
        threshold: f64,
    },
    MomentumRanking {
        #[serde(default = "default_trade_fraction")]
        trade_fraction: f64,
        #[serde(default = "default_ranking_threshold")]
        threshold: f64,
    },
    Pairwise {
        #[serde(default = "default_pairwise_threshold")]
        threshold: f64,
    },
    Crossover {
        #[serde(default = "default_crossover_threshold")]
        threshold: f64,
    },
}

fn default_target_vol() -> f64 {
    folio::objective::DEFAULT_TARGET_VOL
}
fn default_vol_penalty() -> f64 {
    folio::objective::DEFAULT_VOL_PENALTY
}
fn default_vol_threshold() -> f64 {
    volatility_target::DEFAULT_THRESHOLD
}
fn default_window() -> usize {
    folio::score::MEAN_RETURN_WINDOW
}
fn default_return_threshold() -> f64 {
    pure_return::DEFAULT_THRESHOLD
}
fn default_trade_fraction() -> f64 {
    momentum_ranking::DEFAULT_TRADE_FRACTION
}
fn default_ranking_threshold() -> f64 {
    momentum_ranking::DEFAULT_THRESHOLD
}
fn default_pairwise_threshold() -> f64 {
    pairwise::DEFAULT_THRESHOLD
}
fn default_crossover_threshold() -> f64 {
    crossover::DEFAULT_THRESHOLD
}

impl StrategyConfig {
    pub fn risk_profile(&self) -> RiskProfile {
        match self {
            StrategyConfig::VolatilityTarget { .. } => RiskProfile::LowRisk,
            StrategyConfig::PureReturn { .. } => RiskProfile::HighYieldEquity,
            StrategyConfig::MomentumRanking { .. } | StrategyConfig::Pairwise { .. } => {
                RiskProfile::LowTurnover
            }
            StrategyConfig::Crossover { .. } => RiskProfile::EquityMomentum,
        }
    }

    fn threshold(&self) -> f64 {
        match self {
            StrategyConfig::VolatilityTarget { threshold, .. }
            | StrategyConfig::PureReturn { threshold, .. }
            | StrategyConfig::MomentumRanking { threshold, .. }
            | StrategyConfig::Pairwise { threshold }
            | StrategyConfig::Crossover { threshold } => *threshold,
        }
    }

    pub fn build(&self, optimizer: Option<EvolutionConfig>) -> Box<dyn Strategy> {
        match *self {
            StrategyConfig::VolatilityTarget {
                target_vol,
                penalty,
                threshold,
            } => {
                let mut s = VolatilityTarget::new()
                    .with_target(target_vol, penalty)
                    .with_threshold(threshold);
                if let Some(cfg) = optimizer {
                    s = s.with_config(cfg);
                }
                Box::new(s)
            }
            StrategyConfig::PureReturn { window, threshold } => {
                let mut s = PureReturn::new().with_window(window).with_threshold(threshold);
                if let Some(cfg) = optimizer {
                    s = s.with_config(cfg);
                }
                Box::new(s)
            }
            StrategyConfig::MomentumRanking {
                trade_fraction,
                threshold,
            } => Box::new(
                MomentumRanking::new()
                    .with_trade_fraction(trade_fraction)
                    .with_threshold(threshold),
            ),
            StrategyConfig::Pairwise { threshold } => {
                let mut s = PairwiseReallocation::new().with_threshold(threshold);
                if let Some(cfg) = optimizer {
                    s = s.with_config(cfg);
                }
                Box::new(s)
            }
            StrategyConfig::Crossover { threshold } => {
                Box::new(CrossoverMomentum::new().with_threshold(threshold))
            }
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.start > self.schedule.end {
            return Err(Error::Config("schedule start must not be after end".into()));
        }
        if self.schedule.step_days < 1 {
            return Err(Error::Config("schedule step_days must be >= 1".into()));
        }

        let mut seen = FxHashSet::default();
        for p in &self.portfolios {
            if !seen.insert(p.id) {
                return Err(Error::Config(format!("duplicate portfolio id {}", p.id)));
            }
            validate_portfolio(p)?;
        }
        Ok(())
    }

    /// Portfolios selected by an optional id filter.
    pub fn select(&self, id: Option<u32>) -> Result<Vec<&PortfolioConfig>> {
        match id {
            None => Ok(self.portfolios.iter().collect()),
            Some(id) => self
                .portfolios
                .iter()
                .find(|p| p.id == id)
                .map(|p| vec![p])
                .ok_or(Error::UnknownPortfolio(id)),
        }
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

fn validate_portfolio(p: &PortfolioConfig) -> Result<()> {
    let label = p.label();
    let threshold = p.strategy.threshold();
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(Error::Config(format!("{label}: threshold must be >= 0")));
    }

    match p.strategy {
        StrategyConfig::VolatilityTarget {
            target_vol,
            penalty,
            ..
        } => {
            if !(target_vol > 0.0 && target_vol.is_finite()) {
                return Err(Error::Config(format!("{label}: target_vol must be > 0")));
            }
            if !(penalty >= 0.0 && penalty.is_finite()) {
                return Err(Error::Config(format!("{label}: penalty must be >= 0")));
            }
        }
        StrategyConfig::PureReturn { window, .. } if window == 0 => {
            return Err(Error::Config(format!("{label}: window must be >= 1")));
        }
        StrategyConfig::MomentumRanking { trade_fraction, .. }
            if !(trade_fraction > 0.0 && trade_fraction <= 1.0) =>
        {
            return Err(Error::Config(format!(
                "{label}: trade_fraction must be in (0.0, 1.0]"
            )));
        }
        _ => {}
    }

    if let Some(opt) = &p.optimizer {
        if opt.population_size < 4 {
            return Err(Error::Config(format!("{label}: population_size must be >= 4")));
        }
        if !(opt.mutation_scale >= 0.0 && opt.mutation_scale.is_finite()) {
            return Err(Error::Config(format!("{label}: mutation_scale must be >= 0")));
        }
        for (name, rate) in [
            ("mutation_rate", opt.mutation_rate),
            ("crossover_rate", opt.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::Config(format!("{label}: {name} must be in [0.0, 1.0]")));
            }
        }
    }

    let mut total = 0.0;
    for (ticker, weight) in &p.holdings {
        if !(0.0..=1.0).contains(weight) {
            return Err(Error::Config(format!(
                "{label}: holding {ticker} weight must be in [0.0, 1.0]"
            )));
        }
        total += weight;
    }
    if total > 1.0 + WEIGHT_EPSILON {
        return Err(Error::Config(format!(
            "{label}: holdings sum to {total:.4} (> 1.0)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
[data]
path = "data/observations.csv"

[ledger]
path = "out/ledger.jsonl"

[schedule]
start = "2023-01-02"
end = "2023-12-25"

[[portfolios]]
id = 1
name = "Low risk"
strategy = { kind = "volatility_target", target_vol = 0.12 }

[portfolios.optimizer]
population_size = 15
max_generations = 20
seed = 42

[[portfolios]]
id = 2
strategy = { kind = "momentum_ranking" }

[portfolios.holdings]
AAPL = 0.5
MSFT = 0.3

[[portfolios]]
id = 3
strategy = { kind = "crossover", threshold = 0.001 }
"#
    }

    #[test]
    fn parse_example_config() {
        let config: Config = toml::from_str(example_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.schedule.step_days, 7);
        assert_eq!(config.ledger.path, PathBuf::from("out/ledger.jsonl"));
        assert_eq!(config.portfolios.len(), 3);

        let p1 = &config.portfolios[0];
        assert_eq!(p1.label(), "#1 Low risk");
        assert_eq!(
            p1.strategy,
            StrategyConfig::VolatilityTarget {
                target_vol: 0.12,
                penalty: 1000.0,
                threshold: 1e-3
            }
        );
        let opt = p1.optimizer.as_ref().unwrap();
        assert_eq!(opt.population_size, 15);
        assert_eq!(opt.seed, Some(42));
        // unspecified fields keep their defaults
        assert_eq!(opt.tolerance, EvolutionConfig::default().tolerance);

        let p2 = &config.portfolios[1];
        assert_eq!(p2.strategy.risk_profile(), RiskProfile::LowTurnover);
        assert_eq!(p2.initial_holdings().get("AAPL"), 0.5);
        assert!((p2.initial_holdings().cash() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn defaults_for_optional_sections() {
        let toml = r#"
[data]
path = "obs.csv"

[schedule]
start = "2023-01-02"
end = "2023-02-27"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ledger.path, PathBuf::from("ledger.jsonl"));
        assert_eq!(config.audit_path(), PathBuf::from("./logs/audit.jsonl"));
        assert!(config.portfolios.is_empty());
    }

    #[test]
    fn built_strategies_match_profiles() {
        let config: Config = toml::from_str(example_toml()).unwrap();
        for p in &config.portfolios {
            assert_eq!(p.build_strategy().risk_profile(), p.strategy.risk_profile());
        }
    }

    #[test]
    fn validate_catches_reversed_schedule() {
        let mut config: Config = toml::from_str(example_toml()).unwrap();
        config.schedule.end = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_duplicate_ids() {
        let mut config: Config = toml::from_str(example_toml()).unwrap();
        config.portfolios[2].id = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_overallocated_holdings() {
        let mut config: Config = toml::from_str(example_toml()).unwrap();
        config.portfolios[1].holdings.insert("SPY".into(), 0.4);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_bad_trade_fraction() {
        let mut config: Config = toml::from_str(example_toml()).unwrap();
        config.portfolios[1].strategy = StrategyConfig::MomentumRanking {
            trade_fraction: 0.0,
            threshold: 1e-6,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn select_by_id() {
        let config: Config = toml::from_str(example_toml()).unwrap();
        assert_eq!(config.select(None).unwrap().len(), 3);
        assert_eq!(config.select(Some(2)).unwrap()[0].id, 2);
        assert!(matches!(config.select(Some(9)), Err(Error::UnknownPortfolio(9))));
    }

    #[test]
    fn unknown_strategy_kind_is_rejected() {
        let toml = example_toml().replace("\"crossover\"", "\"martingale\"");
        assert!(toml::from_str::<Config>(&toml).is_err());
    }
}
