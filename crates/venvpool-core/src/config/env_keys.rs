//! 环境变量 key 常量与别名定义
//!
//! 主变量优先使用 `VENVPOOL_*`，兼容 pyven 时代的 `PYVEN_*`。

/// 池目录与下载缓存
pub mod pool {
    /// Base directory holding one subdirectory per runtime version.
    pub const VENVPOOL_DIR: &str = "VENVPOOL_DIR";
    pub const POOL_DIR_ALIASES: &[&str] = &["PYVEN_POOL_DIR"];

    /// Runtime version used when the CLI does not name one, e.g. "3" or "3.11".
    pub const VENVPOOL_PYTHON: &str = "VENVPOOL_PYTHON";

    /// Download cache handed to pip as `PIP_CACHE_DIR`.
    pub const VENVPOOL_PIP_CACHE_DIR: &str = "VENVPOOL_PIP_CACHE_DIR";
    pub const PIP_CACHE_DIR_ALIASES: &[&str] = &["PYVEN_PIP_CACHE_DIR"];
}

/// 可观测性与日志
pub mod observability {
    pub const VENVPOOL_QUIET: &str = "VENVPOOL_QUIET";
    pub const QUIET_ALIASES: &[&str] = &["PYVEN_QUIET"];

    pub const VENVPOOL_LOG_LEVEL: &str = "VENVPOOL_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["PYVEN_LOG_LEVEL"];

    pub const VENVPOOL_LOG_JSON: &str = "VENVPOOL_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];
}
