//! Reader file names and the orphan policy.
//!
//! A reader file is named `<pid>-<uuid>-<origin>`, where the origin is the
//! host name followed, on Linux, by `~pidns<inode>` of the writer's pid
//! namespace. Pids are only comparable within one namespace, and containers
//! sharing a host name need not share one. A file is orphaned when its origin
//! is ours and its pid no longer exists. Anything else (foreign origin,
//! unparseable name, pid we may not signal) is treated as live.

use std::sync::OnceLock;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderName {
    pub pid: u32,
    pub origin: String,
}

/// Unique name for a new reader file owned by this process.
pub fn new_reader_name() -> String {
    format!(
        "{}-{}-{}",
        std::process::id(),
        Uuid::new_v4().simple(),
        this_origin()
    )
}

pub fn parse_reader_name(name: &str) -> Option<ReaderName> {
    let (pid, rest) = name.split_once('-')?;
    let pid: u32 = pid.parse().ok()?;
    let (token, origin) = rest.split_once('-')?;
    if token.len() != 32 || !token.bytes().all(|b| b.is_ascii_hexdigit()) || origin.is_empty() {
        return None;
    }
    Some(ReaderName {
        pid,
        origin: origin.to_string(),
    })
}

/// Host name and pid namespace of this process, as written into reader names.
pub fn this_origin() -> &'static str {
    static ORIGIN: OnceLock<String> = OnceLock::new();
    ORIGIN.get_or_init(|| match pid_namespace() {
        Some(ns) => format!("{}~pidns{}", host_name(), ns),
        None => host_name(),
    })
}

#[cfg(target_os = "linux")]
fn pid_namespace() -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self/ns/pid").ok().map(|m| m.ino())
}

#[cfg(not(target_os = "linux"))]
fn pid_namespace() -> Option<u64> {
    None
}

/// Host name restricted to characters that are safe in a file name.
fn host_name() -> String {
    let raw = hostname().unwrap_or_else(|| "localhost".to_string());
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "localhost".to_string()
    } else {
        cleaned
    }
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

/// Whether the reader file `name` belongs to a process that is gone.
pub fn is_orphaned(name: &str) -> bool {
    match parse_reader_name(name) {
        Some(reader) => reader.origin == this_origin() && !pid_alive(reader.pid),
        None => false,
    }
}

/// `kill(pid, 0)`: `ESRCH` means gone; success or `EPERM` means alive.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return true;
    };
    if raw <= 0 {
        // 0 and negatives address process groups, never a single reader.
        return true;
    }
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_name_roundtrip() {
        let name = new_reader_name();
        let parsed = parse_reader_name(&name).unwrap();
        assert_eq!(parsed.pid, std::process::id());
        assert_eq!(parsed.origin, this_origin());
    }

    #[test]
    fn test_host_with_dashes() {
        let name = format!("42-{}-build-box-01.lan", Uuid::new_v4().simple());
        let parsed = parse_reader_name(&name).unwrap();
        assert_eq!(parsed.pid, 42);
        assert_eq!(parsed.origin, "build-box-01.lan");
    }

    #[test]
    fn test_unparseable_names_are_never_orphans() {
        for name in ["", "abc", "12", "12-nothex-host", "x-0123456789abcdef0123456789abcdef-h"] {
            assert!(parse_reader_name(name).is_none(), "{:?}", name);
            assert!(!is_orphaned(name));
        }
    }

    #[test]
    fn test_own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
        assert!(!is_orphaned(&new_reader_name()));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_orphan() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        let name = format!("{}-{}-{}", pid, Uuid::new_v4().simple(), this_origin());
        assert!(is_orphaned(&name));
        let foreign = format!("{}-{}-some-other-host", pid, Uuid::new_v4().simple());
        assert!(!is_orphaned(&foreign));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_other_pid_namespace_is_never_orphan() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(this_origin().starts_with(&format!("{}~pidns", host_name())));
        // Same host name, different container.
        let elsewhere = format!("{}-{}-{}~pidns1", pid, Uuid::new_v4().simple(), host_name());
        assert!(!is_orphaned(&elsewhere));
        let bare_host = format!("{}-{}-{}", pid, Uuid::new_v4().simple(), host_name());
        assert!(!is_orphaned(&bare_host));
    }
}
