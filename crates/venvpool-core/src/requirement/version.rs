//! Release versions (PEP 440 subset) with numeric, zero-padded ordering.
//!
//! `5`, `5.0` and `5.00` are the same version. Local labels (`+ubuntu1`) are
//! accepted but take no part in ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::RequirementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

/// Sort key of the pre-release slot. A dev-only release sorts before every pre-release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreKind, u64),
    Final,
}

/// Sort key of the dev slot: `.devN` sorts before the same version without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Final,
}

#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v?(?:(?P<epoch>[0-9]+)!)?(?P<release>[0-9]+(?:\.[0-9]+)*)(?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>[0-9]+)?)?(?:-(?P<post_n1>[0-9]+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)?(?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?(?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?$",
        )
        .expect("version pattern is valid")
    })
}

fn number(text: &str, original: &str) -> Result<u64, RequirementError> {
    text.parse::<u64>()
        .map_err(|_| RequirementError::InvalidVersion(original.to_string()))
}

impl Version {
    /// Parse a version string. Plain dotted releases skip the regex entirely,
    /// since they are what manifests overwhelmingly contain.
    pub fn parse(text: &str) -> Result<Self, RequirementError> {
        let trimmed = text.trim();
        if let Some(release) = Self::parse_plain_release(trimmed) {
            return Ok(Self::from_release(release));
        }
        let lowered = trimmed.to_ascii_lowercase();
        let caps = version_regex()
            .captures(&lowered)
            .ok_or_else(|| RequirementError::InvalidVersion(text.to_string()))?;

        let epoch = match caps.name("epoch") {
            Some(m) => number(m.as_str(), text)?,
            None => 0,
        };
        let release = caps["release"]
            .split('.')
            .map(|part| number(part, text))
            .collect::<Result<Vec<_>, _>>()?;
        let pre = match caps.name("pre_l") {
            Some(label) => {
                let kind = match label.as_str() {
                    "a" | "alpha" => PreKind::Alpha,
                    "b" | "beta" => PreKind::Beta,
                    _ => PreKind::Rc,
                };
                let n = match caps.name("pre_n") {
                    Some(m) => number(m.as_str(), text)?,
                    None => 0,
                };
                Some((kind, n))
            }
            None => None,
        };
        let post = if let Some(m) = caps.name("post_n1") {
            Some(number(m.as_str(), text)?)
        } else if caps.name("post_l").is_some() {
            match caps.name("post_n2") {
                Some(m) => Some(number(m.as_str(), text)?),
                None => Some(0),
            }
        } else {
            None
        };
        let dev = if caps.name("dev_l").is_some() {
            match caps.name("dev_n") {
                Some(m) => Some(number(m.as_str(), text)?),
                None => Some(0),
            }
        } else {
            None
        };
        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
        })
    }

    fn parse_plain_release(text: &str) -> Option<Vec<u64>> {
        if text.is_empty() || text.starts_with('.') || text.ends_with('.') {
            return None;
        }
        let mut release = Vec::with_capacity(4);
        for part in text.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            release.push(part.parse::<u64>().ok()?);
        }
        Some(release)
    }

    pub fn from_release(release: Vec<u64>) -> Self {
        Self {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// True when the version is nothing but epoch and release segments.
    pub fn is_plain_release(&self) -> bool {
        self.pre.is_none() && self.post.is_none() && self.dev.is_none()
    }

    /// `[X.Y, X.(Y+1))` for the prefix `X.Y`: the bounds of `==X.Y.*`.
    pub(crate) fn prefix_bounds(&self) -> (Version, Version) {
        self.truncated_bounds(self.release.len())
    }

    /// Bounds of the first `len` release segments, used by `~=` (which drops the last one).
    pub(crate) fn truncated_bounds(&self, len: usize) -> (Version, Version) {
        let prefix: Vec<u64> = self.release[..len.min(self.release.len())].to_vec();
        let mut upper = prefix.clone();
        if let Some(last) = upper.last_mut() {
            *last = last.saturating_add(1);
        }
        let lower = Version {
            epoch: self.epoch,
            ..Version::from_release(prefix)
        };
        let upper = Version {
            epoch: self.epoch,
            ..Version::from_release(upper)
        };
        (lower, upper)
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (Some((kind, n)), _, _) => PreKey::Pre(kind, n),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        match self.dev {
            Some(n) => DevKey::Dev(n),
            None => DevKey::Final,
        }
    }
}

fn cmp_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_release(&self.release, &other.release))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((kind, n)) = self.pre {
            let label = match kind {
                PreKind::Alpha => "a",
                PreKind::Beta => "b",
                PreKind::Rc => "rc",
            };
            write!(f, "{}{}", label, n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        Ok(())
    }
}
