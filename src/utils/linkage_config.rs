// src/utils/linkage_config.rs
//! Thresholds and runtime switches for a linkage run, read from the environment.

use log::{info, warn};
use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::matching::scorer::ScorerKind;
use crate::models::{Score, Tier};

pub const DEFAULT_SERIAL_CUTOFF: Score = 65;
pub const DEFAULT_ACCOUNT_CUTOFF: Score = 65;
pub const DEFAULT_NAME_CUTOFF: Score = 70;
pub const DEFAULT_CONFIDENT_THRESHOLD: Score = 97;
pub const DEFAULT_GOOD_MATCH_SERIAL_MIN: Score = 90;
pub const DEFAULT_GOOD_MATCH_NAME_MIN: Score = 75;
/// Known misspelling in the transaction extracts.
pub const DEFAULT_KEY_CORRECTIONS: &str = "kwni market=41755 kwini market";

/// Which columns must agree before two rows are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingKeyMode {
    CountyTransformer,
    Transformer,
}

impl FromStr for GroupingKeyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "county_transformer" | "county+transformer" => Ok(GroupingKeyMode::CountyTransformer),
            "transformer" => Ok(GroupingKeyMode::Transformer),
            other => Err(ConfigError::InvalidValue {
                field: "LINKAGE_GROUPING_KEY",
                reason: format!("unknown grouping key '{}'", other),
            }),
        }
    }
}

/// Settings for one matcher invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    pub tier: Tier,
    pub cutoff: Score,
    pub scorer: ScorerKind,
    /// Matches at or above this claim both rows for the rest of the run.
    pub confident_threshold: Score,
}

#[derive(Debug, Clone)]
pub struct LinkageConfig {
    pub serial: TierConfig,
    pub account: TierConfig,
    pub name: TierConfig,
    pub grouping_key: GroupingKeyMode,
    pub good_match_serial_min: Score,
    pub good_match_name_min: Score,
    /// Metric for the secondary name score used to break remaining duplicates.
    pub dedup_scorer: ScorerKind,
    pub parallel: bool,
    pub threads: usize,
    pub key_corrections: Vec<(String, String)>,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            serial: TierConfig {
                tier: Tier::Serial,
                cutoff: DEFAULT_SERIAL_CUTOFF,
                scorer: ScorerKind::Ratio,
                confident_threshold: DEFAULT_CONFIDENT_THRESHOLD,
            },
            account: TierConfig {
                tier: Tier::Account,
                cutoff: DEFAULT_ACCOUNT_CUTOFF,
                scorer: ScorerKind::Ratio,
                confident_threshold: DEFAULT_CONFIDENT_THRESHOLD,
            },
            name: TierConfig {
                tier: Tier::Name,
                cutoff: DEFAULT_NAME_CUTOFF,
                scorer: ScorerKind::TokenSet,
                confident_threshold: DEFAULT_CONFIDENT_THRESHOLD,
            },
            grouping_key: GroupingKeyMode::CountyTransformer,
            good_match_serial_min: DEFAULT_GOOD_MATCH_SERIAL_MIN,
            good_match_name_min: DEFAULT_GOOD_MATCH_NAME_MIN,
            dedup_scorer: ScorerKind::TokenSort,
            parallel: true,
            threads: num_cpus::get(),
            key_corrections: parse_key_corrections(DEFAULT_KEY_CORRECTIONS).unwrap_or_default(),
        }
    }
}

impl LinkageConfig {
    /// Create configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let confident = env_or("CONFIDENT_THRESHOLD", DEFAULT_CONFIDENT_THRESHOLD);

        let key_corrections = match env::var("LINKAGE_KEY_CORRECTIONS") {
            Ok(raw) => parse_key_corrections(&raw).unwrap_or_else(|e| {
                warn!("⚠️  {} - using default key corrections", e);
                defaults.key_corrections.clone()
            }),
            Err(_) => defaults.key_corrections.clone(),
        };

        Self {
            serial: TierConfig {
                cutoff: env_or("SERIAL_CUTOFF", DEFAULT_SERIAL_CUTOFF),
                scorer: env_or("SERIAL_SCORER", defaults.serial.scorer),
                confident_threshold: confident,
                ..defaults.serial
            },
            account: TierConfig {
                cutoff: env_or("ACCOUNT_CUTOFF", DEFAULT_ACCOUNT_CUTOFF),
                scorer: env_or("ACCOUNT_SCORER", defaults.account.scorer),
                confident_threshold: confident,
                ..defaults.account
            },
            name: TierConfig {
                cutoff: env_or("NAME_CUTOFF", DEFAULT_NAME_CUTOFF),
                scorer: env_or("NAME_SCORER", defaults.name.scorer),
                confident_threshold: confident,
                ..defaults.name
            },
            grouping_key: env_or("LINKAGE_GROUPING_KEY", defaults.grouping_key),
            good_match_serial_min: env_or("GOOD_MATCH_SERIAL_MIN", DEFAULT_GOOD_MATCH_SERIAL_MIN),
            good_match_name_min: env_or("GOOD_MATCH_NAME_MIN", DEFAULT_GOOD_MATCH_NAME_MIN),
            dedup_scorer: defaults.dedup_scorer,
            parallel: env_or("LINKAGE_PARALLEL", true),
            threads: env_or("LINKAGE_THREADS", defaults.threads).max(1),
            key_corrections,
        }
    }

    pub fn tier(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Serial => &self.serial,
            Tier::Account => &self.account,
            Tier::Name => &self.name,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in Tier::ALL {
            let cfg = self.tier(tier);
            if cfg.cutoff > 100 {
                return Err(ConfigError::InvalidValue {
                    field: "cutoff",
                    reason: format!("{} cutoff {} exceeds 100", tier, cfg.cutoff),
                });
            }
            if cfg.confident_threshold > 100 {
                return Err(ConfigError::InvalidValue {
                    field: "CONFIDENT_THRESHOLD",
                    reason: format!("{} exceeds 100", cfg.confident_threshold),
                });
            }
        }
        if self.good_match_serial_min > 100 || self.good_match_name_min > 100 {
            return Err(ConfigError::InvalidValue {
                field: "GOOD_MATCH_*",
                reason: "good-match thresholds must be within 0..=100".to_string(),
            });
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("⚙️  Linkage configuration:");
        for tier in Tier::ALL {
            let cfg = self.tier(tier);
            let (name, emoji) = tier.log_label();
            info!(
                "   • {} {}: scorer={}, cutoff={}, confident>={}",
                emoji, name, cfg.scorer, cfg.cutoff, cfg.confident_threshold
            );
        }
        info!("   • Grouping key: {:?}", self.grouping_key);
        info!(
            "   • Good match: serial>={} with name>={} on the same survey row",
            self.good_match_serial_min, self.good_match_name_min
        );
        if self.parallel {
            info!("   • Parallel scoring on {} threads", self.threads);
        } else {
            info!("   • Sequential scoring");
        }
        if !self.key_corrections.is_empty() {
            info!("   • Grouping key corrections: {:?}", self.key_corrections);
        }
    }
}

/// Parse `from=to` pairs separated by `;`.
pub fn parse_key_corrections(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok((from.trim().to_string(), to.trim().to_string()))
            }
            _ => Err(ConfigError::MalformedCorrection(entry.to_string())),
        })
        .collect()
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️  Invalid value '{}' for {}, using default {:?}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkageConfig::default();
        assert_eq!(config.serial.cutoff, 65);
        assert_eq!(config.account.cutoff, 65);
        assert_eq!(config.name.cutoff, 70);
        assert_eq!(config.name.scorer, ScorerKind::TokenSet);
        assert_eq!(config.serial.confident_threshold, 97);
        assert_eq!(
            config.key_corrections,
            vec![("kwni market".to_string(), "41755 kwini market".to_string())]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_config() {
        env::set_var("SERIAL_CUTOFF", "80");
        env::set_var("NAME_SCORER", "token_sort");
        env::set_var("CONFIDENT_THRESHOLD", "100");
        env::set_var("LINKAGE_GROUPING_KEY", "transformer");
        env::set_var("LINKAGE_PARALLEL", "false");

        let config = LinkageConfig::from_env();
        assert_eq!(config.serial.cutoff, 80);
        assert_eq!(config.name.scorer, ScorerKind::TokenSort);
        assert_eq!(config.account.confident_threshold, 100);
        assert_eq!(config.grouping_key, GroupingKeyMode::Transformer);
        assert!(!config.parallel);

        env::remove_var("SERIAL_CUTOFF");
        env::remove_var("NAME_SCORER");
        env::remove_var("CONFIDENT_THRESHOLD");
        env::remove_var("LINKAGE_GROUPING_KEY");
        env::remove_var("LINKAGE_PARALLEL");
    }

    #[test]
    fn test_invalid_env_value_falls_back() {
        env::set_var("GOOD_MATCH_NAME_MIN", "lots");
        let config = LinkageConfig::from_env();
        assert_eq!(config.good_match_name_min, DEFAULT_GOOD_MATCH_NAME_MIN);
        env::remove_var("GOOD_MATCH_NAME_MIN");
    }

    #[test]
    fn test_validate_rejects_out_of_range_cutoff() {
        let mut config = LinkageConfig::default();
        config.name.cutoff = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_key_corrections() {
        let parsed = parse_key_corrections("a=b; c d = e f ;").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("a".to_string(), "b".to_string()),
                ("c d".to_string(), "e f".to_string())
            ]
        );
        assert!(parse_key_corrections("missing-separator").is_err());
        assert!(parse_key_corrections("=to").is_err());
    }
}
