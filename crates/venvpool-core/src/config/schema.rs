//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。

use super::env_keys::{observability as obv_keys, pool as pool_keys};
use super::loader::{env_bool, env_optional, env_or};
use std::path::PathBuf;

/// 池配置：池根目录、默认运行时版本、下载缓存
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Base directory; each runtime version gets its own child directory.
    pub pool_dir: PathBuf,
    /// Runtime version used when none is given explicitly.
    pub python: String,
    pub pip_cache_dir: Option<PathBuf>,
}

impl PoolConfig {
    /// 从环境变量加载，空值使用默认（会自动加载 .env）
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let pool_dir = env_optional(pool_keys::VENVPOOL_DIR, pool_keys::POOL_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(default_pool_dir);
        let python = env_or(pool_keys::VENVPOOL_PYTHON, &[], || "3".to_string());
        let pip_cache_dir = env_optional(
            pool_keys::VENVPOOL_PIP_CACHE_DIR,
            pool_keys::PIP_CACHE_DIR_ALIASES,
        )
        .map(PathBuf::from);
        Self {
            pool_dir,
            python,
            pip_cache_dir,
        }
    }

    /// Same as [`PoolConfig::from_env`] but with the CLI's `--pool-dir` taking precedence.
    pub fn with_pool_dir(mut self, pool_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = pool_dir {
            self.pool_dir = dir;
        }
        self
    }
}

/// `~/.cache/venvpool/pool`, falling back to `~/.venvpool/pool` where no cache dir is known.
pub fn default_pool_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("venvpool"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".venvpool")
        })
        .join("pool")
}

/// 可观测性配置：quiet、log_level、log_json
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            let quiet = env_bool(obv_keys::VENVPOOL_QUIET, obv_keys::QUIET_ALIASES, false);
            let log_level = env_or(
                obv_keys::VENVPOOL_LOG_LEVEL,
                obv_keys::LOG_LEVEL_ALIASES,
                || "venvpool=info".to_string(),
            );
            let log_json = env_bool(obv_keys::VENVPOOL_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false);
            Self {
                quiet,
                log_level,
                log_json,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_dir_ends_with_pool() {
        let dir = default_pool_dir();
        assert!(dir.ends_with("venvpool/pool") || dir.ends_with(".venvpool/pool"));
    }

    #[test]
    fn test_cli_pool_dir_overrides() {
        let cfg = PoolConfig {
            pool_dir: PathBuf::from("/from/env"),
            python: "3".to_string(),
            pip_cache_dir: None,
        };
        assert_eq!(
            cfg.clone().with_pool_dir(Some(PathBuf::from("/from/cli"))).pool_dir,
            PathBuf::from("/from/cli")
        );
        assert_eq!(cfg.with_pool_dir(None).pool_dir, PathBuf::from("/from/env"));
    }
}
