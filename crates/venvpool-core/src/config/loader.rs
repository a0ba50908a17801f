//! 统一环境变量加载逻辑
//!
//! 集中维护 fallback 链，避免在业务代码中重复 `or_else` 调用。

use std::env;

/// 废弃变量 → 推荐变量映射（用于检测并提示迁移）
const DEPRECATED_PAIRS: &[(&str, &str)] = &[
    ("PYVEN_POOL_DIR", "VENVPOOL_DIR"),
    ("PYVEN_PIP_CACHE_DIR", "VENVPOOL_PIP_CACHE_DIR"),
    ("PYVEN_QUIET", "VENVPOOL_QUIET"),
    ("PYVEN_LOG_LEVEL", "VENVPOOL_LOG_LEVEL"),
];

/// 检测废弃变量：若使用了废弃变量且未设置推荐变量，打印一次迁移提示
fn warn_deprecated_env_vars() {
    use std::sync::Once;
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        let hints = deprecated_hints(|key| env::var(key).is_ok());
        if !hints.is_empty() {
            tracing::warn!(
                "[DEPRECATED] the following environment variables are deprecated:\n   {}",
                hints.join("\n   ")
            );
        }
    });
}

fn deprecated_hints(is_set: impl Fn(&str) -> bool) -> Vec<String> {
    DEPRECATED_PAIRS
        .iter()
        .filter(|(deprecated, recommended)| is_set(deprecated) && !is_set(recommended))
        .map(|(deprecated, recommended)| format!("{} → {}", deprecated, recommended))
        .collect()
}

/// 加载当前目录下的 `.env` 到环境变量（不覆盖已存在的变量）
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        if let Ok(content) = std::fs::read_to_string(&path) {
            for (key, value) in parse_dotenv(&content) {
                if env::var(&key).is_err() {
                    // SAFETY: runs once, before any thread that reads the environment is spawned.
                    #[allow(unsafe_code)]
                    unsafe {
                        env::set_var(&key, &value);
                    }
                }
            }
        }
        warn_deprecated_env_vars();
    });
}

/// Parse `KEY=value` lines, skipping blanks and comments, stripping quotes and
/// unquoted inline comments.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// 从主变量或别名链读取环境变量，失败时使用默认值
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// 从主变量或别名链读取，返回 Option（空值视为未设置）
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// 解析布尔型环境变量：1/true/yes 为 true，0/false/no 为 false
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv(
            "# comment\n\nVENVPOOL_DIR=/tmp/pool # inline\nVENVPOOL_PYTHON=\"3.11\"\nbroken line\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("VENVPOOL_DIR".to_string(), "/tmp/pool".to_string()),
                ("VENVPOOL_PYTHON".to_string(), "3.11".to_string()),
            ]
        );
    }

    #[test]
    fn test_deprecated_hints() {
        let hints = deprecated_hints(|key| key == "PYVEN_POOL_DIR");
        assert_eq!(hints, vec!["PYVEN_POOL_DIR → VENVPOOL_DIR".to_string()]);
        let none = deprecated_hints(|key| key == "PYVEN_POOL_DIR" || key == "VENVPOOL_DIR");
        assert!(none.is_empty());
    }

    #[test]
    fn test_env_optional_missing() {
        assert_eq!(env_optional("VENVPOOL_TEST_DEFINITELY_UNSET", &[]), None);
        assert!(env_bool("VENVPOOL_TEST_DEFINITELY_UNSET", &[], true));
        assert_eq!(
            env_or("VENVPOOL_TEST_DEFINITELY_UNSET", &[], || "x".to_string()),
            "x"
        );
    }
}
