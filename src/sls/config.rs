//! Search configuration.
//!
//! `SearchConfig` is the immutable snapshot every component reads. It is
//! produced once, before the engine is built, by merging `SearchOverrides`
//! (from `key=value` parameters or JSON) over the defaults and validating
//! the result. The engine never consults anything else.

use crate::sls::random::PROBABILITY_SCALE;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown parameter: {0}")]
    UnknownKey(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("{key} = {value} is out of range ({range})")]
    OutOfRange {
        key: &'static str,
        value: String,
        range: &'static str,
    },

    #[error("expected key=value, got {0:?}")]
    Malformed(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SearchConfig {
    pub max_memory: u32,
    pub max_restarts: u32,
    pub max_repairs: u32,
    pub walksat: bool,
    pub walksat_ucb: bool,
    pub walksat_ucb_constant: f64,
    pub walksat_ucb_init: bool,
    pub walksat_ucb_forget: f64,
    pub walksat_ucb_noise: f64,
    pub walksat_repick: bool,
    pub scale_unsat: f64,
    pub paws_init: u32,
    pub paws_sp: u32,
    pub wp: u32,
    pub vns_mc: u32,
    pub vns_repick: bool,
    pub restart_base: u32,
    pub restart_init: bool,
    pub early_prune: bool,
    pub random_offset: bool,
    pub rescore: bool,
    pub dt_axiomatic: bool,
    pub track_unsat: bool,
    pub random_seed: u32,
    pub arith_use_lookahead: bool,
    pub arith_allow_plateau: bool,
    pub arith_use_clausal_lookahead: bool,
    pub bv_use_top_level_assertions: bool,
    pub bv_use_lookahead: bool,
    pub bv_allow_rotation: bool,
    pub str_update_strategy: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_memory: u32::MAX,
            max_restarts: u32::MAX,
            max_repairs: 1000,
            walksat: true,
            walksat_ucb: true,
            walksat_ucb_constant: 20.0,
            walksat_ucb_init: false,
            walksat_ucb_forget: 1.0,
            walksat_ucb_noise: 0.0002,
            walksat_repick: true,
            scale_unsat: 0.5,
            paws_init: 40,
            paws_sp: 52,
            wp: 100,
            vns_mc: 0,
            vns_repick: false,
            restart_base: 100,
            restart_init: false,
            early_prune: true,
            random_offset: true,
            rescore: true,
            dt_axiomatic: true,
            track_unsat: false,
            random_seed: 0,
            arith_use_lookahead: true,
            arith_allow_plateau: false,
            arith_use_clausal_lookahead: false,
            bv_use_top_level_assertions: true,
            bv_use_lookahead: true,
            bv_allow_rotation: true,
            str_update_strategy: 2,
        }
    }
}

/// String update strategies for the string mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrUpdateStrategy {
    SingleChar,
    Subsequence,
    Combined,
}

impl SearchConfig {
    /// Merges `overrides` over the defaults and validates the result.
    ///
    /// # Errors
    ///
    /// If any resolved value is out of range.
    pub fn resolve(overrides: &SearchOverrides) -> ConfigResult<Self> {
        let mut config = Self::default();
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// If a probability exceeds 1024, `restart_base` is zero,
    /// `str_update_strategy` is above 2, or a real parameter is negative,
    /// non-finite, or (for `walksat_ucb_forget`) outside `(0, 1]`.
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [("paws_sp", self.paws_sp), ("wp", self.wp)] {
            if value > PROBABILITY_SCALE {
                return Err(ConfigError::OutOfRange {
                    key,
                    value: value.to_string(),
                    range: "0..=1024",
                });
            }
        }
        if self.restart_base == 0 {
            return Err(ConfigError::OutOfRange {
                key: "restart_base",
                value: "0".to_string(),
                range: "1..",
            });
        }
        if self.str_update_strategy > 2 {
            return Err(ConfigError::OutOfRange {
                key: "str_update_strategy",
                value: self.str_update_strategy.to_string(),
                range: "0..=2",
            });
        }
        for (key, value) in [
            ("walksat_ucb_constant", self.walksat_ucb_constant),
            ("walksat_ucb_noise", self.walksat_ucb_noise),
            ("scale_unsat", self.scale_unsat),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    key,
                    value: value.to_string(),
                    range: "finite, >= 0",
                });
            }
        }
        let forget = self.walksat_ucb_forget;
        if !(forget > 0.0 && forget <= 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "walksat_ucb_forget",
                value: forget.to_string(),
                range: "(0, 1]",
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn str_strategy(&self) -> StrUpdateStrategy {
        match self.str_update_strategy {
            0 => StrUpdateStrategy::SingleChar,
            1 => StrUpdateStrategy::Subsequence,
            _ => StrUpdateStrategy::Combined,
        }
    }

    /// The configuration as a JSON object, in the format read by
    /// `SearchOverrides::from_json`.
    ///
    /// # Errors
    ///
    /// If serialization fails.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

macro_rules! overrides {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Values that replace the defaults. Unset fields keep the default.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct SearchOverrides {
            $(pub $field: Option<$ty>,)*
        }

        impl SearchOverrides {
            fn apply(&self, config: &mut SearchConfig) {
                $(if let Some(v) = self.$field.clone() {
                    config.$field = v;
                })*
            }

            /// Sets one parameter from its textual form. The `sls.` prefix is accepted.
            ///
            /// # Errors
            ///
            /// If the key is unknown or the value does not parse.
            pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
                let name = key.strip_prefix("sls.").unwrap_or(key);
                match name {
                    $(stringify!($field) => {
                        self.$field = Some(parse_value::<$ty>(name, value)?);
                        Ok(())
                    })*
                    _ => Err(ConfigError::UnknownKey(key.to_string())),
                }
            }
        }
    };
}

overrides! {
    max_memory: u32,
    max_restarts: u32,
    max_repairs: u32,
    walksat: bool,
    walksat_ucb: bool,
    walksat_ucb_constant: f64,
    walksat_ucb_init: bool,
    walksat_ucb_forget: f64,
    walksat_ucb_noise: f64,
    walksat_repick: bool,
    scale_unsat: f64,
    paws_init: u32,
    paws_sp: u32,
    wp: u32,
    vns_mc: u32,
    vns_repick: bool,
    restart_base: u32,
    restart_init: bool,
    early_prune: bool,
    random_offset: bool,
    rescore: bool,
    dt_axiomatic: bool,
    track_unsat: bool,
    random_seed: u32,
    arith_use_lookahead: bool,
    arith_allow_plateau: bool,
    arith_use_clausal_lookahead: bool,
    bv_use_top_level_assertions: bool,
    bv_use_lookahead: bool,
    bv_allow_rotation: bool,
    str_update_strategy: u32,
}

impl SearchOverrides {
    /// # Errors
    ///
    /// If the JSON is malformed or names an unknown parameter.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a `key=value` pair and applies it.
    ///
    /// # Errors
    ///
    /// If there is no `=`, the key is unknown, or the value does not parse.
    pub fn set_pair(&mut self, pair: &str) -> ConfigResult<()> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::Malformed(pair.to_string()))?;
        self.set(key.trim(), value.trim())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
