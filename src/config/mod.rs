use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::filter::LogicalOperatorPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub hooks: HookConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub logical_operators: LogicalOperatorPolicy,
    pub max_limit: Option<usize>,
    pub debug_logging: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            logical_operators: LogicalOperatorPolicy::Ignore,
            max_limit: None,
            debug_logging: false,
        }
    }
}

/// How queued after-hooks get run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Spawn a drain task on the current tokio runtime once a write commits
    #[default]
    Spawn,
    /// Leave hooks queued until `HookScheduler::flush` is called
    Manual,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    pub dispatch: DispatchMode,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("FILTER_LOGICAL_OPERATORS") {
            match v.to_ascii_lowercase().as_str() {
                "ignore" => self.filter.logical_operators = LogicalOperatorPolicy::Ignore,
                "reject" => self.filter.logical_operators = LogicalOperatorPolicy::Reject,
                other => tracing::warn!("Unknown FILTER_LOGICAL_OPERATORS value '{}', keeping default", other),
            }
        }
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        if let Ok(v) = env::var("HOOKS_DISPATCH") {
            match v.to_ascii_lowercase().as_str() {
                "spawn" => self.hooks.dispatch = DispatchMode::Spawn,
                "manual" => self.hooks.dispatch = DispatchMode::Manual,
                other => tracing::warn!("Unknown HOOKS_DISPATCH value '{}', keeping default", other),
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                logical_operators: LogicalOperatorPolicy::Ignore,
                max_limit: None,
                debug_logging: true,
            },
            hooks: HookConfig { dispatch: DispatchMode::Spawn },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                logical_operators: LogicalOperatorPolicy::Reject,
                max_limit: None,
                debug_logging: false,
            },
            hooks: HookConfig { dispatch: DispatchMode::Spawn },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                logical_operators: LogicalOperatorPolicy::Ignore,
                max_limit: Some(1000),
                debug_logging: false,
            },
            hooks: HookConfig { dispatch: DispatchMode::Spawn },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig::default(),
            hooks: HookConfig::default(),
        }
    }
}

// Process-wide defaults, read once. Models can carry their own AppConfig instead.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
