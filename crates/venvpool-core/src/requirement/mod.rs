//! Requirement parsing and version matching.
//!
//! Grammar: `name[extra1,extra2] op1 ver1, op2 ver2, ...`, whitespace-insensitive
//! around tokens. Names compare case-insensitively with runs of `-`, `_`, `.`
//! treated as one separator; extras compare as an unordered set.
//!
//! Serialization is canonical so that regenerated manifests are reproducible:
//! the name keeps its original spelling, extras are sorted, constraints are
//! deduplicated and sorted by their text.

mod compiled;
mod specifier;
mod version;

pub use compiled::CompiledSpecifiers;
pub use specifier::{Operator, Specifier, SpecifierSet};
pub use version::{PreKind, Version};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("Invalid requirement: {0}")]
    InvalidRequirement(String),

    #[error("Invalid version specifier: {0}")]
    InvalidSpecifier(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Well-formed but outside what the matcher understands (markers, URLs, `===`).
    #[error("Unsupported requirement: {0}")]
    Unsupported(String),
}

fn head_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\[\]]*)\])?\s*(.*)$")
            .expect("requirement pattern is valid")
    })
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_.]+").expect("separator pattern is valid"))
}

/// Comparison key for project and extra names: lowercase, separator runs folded to `-`.
pub fn normalize_name(name: &str) -> String {
    separator_regex()
        .replace_all(&name.trim().to_ascii_lowercase(), "-")
        .into_owned()
}

/// A parsed `name[extras] constraints` requirement. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct Requirement {
    name: String,
    key: String,
    extras: BTreeSet<String>,
    specifiers: SpecifierSet,
    compiled: CompiledSpecifiers,
}

impl Requirement {
    pub fn parse(line: &str) -> Result<Self, RequirementError> {
        let line = line.trim();
        if line.contains(';') {
            return Err(RequirementError::Unsupported(format!(
                "environment markers are not supported: {}",
                line
            )));
        }
        if line.contains('@') || line.contains("://") {
            return Err(RequirementError::Unsupported(format!(
                "direct references are not supported: {}",
                line
            )));
        }
        let caps = head_regex()
            .captures(line)
            .ok_or_else(|| RequirementError::InvalidRequirement(line.to_string()))?;
        let name = caps[1].to_string();

        let mut extras = BTreeSet::new();
        if let Some(list) = caps.get(2) {
            for extra in list.as_str().split(',').map(str::trim).filter(|e| !e.is_empty()) {
                if !extra
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                {
                    return Err(RequirementError::InvalidRequirement(line.to_string()));
                }
                extras.insert(normalize_name(extra));
            }
        }

        let mut rest = caps[3].trim();
        // Legacy `name (>=1.0)` form.
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            rest = inner.trim();
        }
        let specifiers = SpecifierSet::parse(rest).map_err(|e| match e {
            RequirementError::InvalidSpecifier(_) => {
                RequirementError::InvalidRequirement(line.to_string())
            }
            other => other,
        })?;
        let compiled = CompiledSpecifiers::compile(&specifiers);
        Ok(Self {
            key: normalize_name(&name),
            name,
            extras,
            specifiers,
            compiled,
        })
    }

    /// Name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized name used for equality and manifest lookups.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn extras(&self) -> &BTreeSet<String> {
        &self.extras
    }

    pub fn specifiers(&self) -> &SpecifierSet {
        &self.specifiers
    }

    /// Does `version` satisfy every constraint? Uses the compiled matcher.
    pub fn accept(&self, version: &str) -> bool {
        self.compiled.accept(version)
    }

    /// Same answer as [`Requirement::accept`], via the reference matcher.
    pub fn accept_reference(&self, version: &str) -> bool {
        self.specifiers.accept(version)
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.extras == other.extras && self.specifiers == other.specifiers
    }
}

impl Eq for Requirement {}

impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        write!(f, "{}", self.specifiers)
    }
}

/// Strip a trailing comment (`#` after any whitespace) and surrounding
/// whitespace; `None` for blank/comment lines.
pub fn requirement_line(line: &str) -> Option<&str> {
    let comment = line
        .char_indices()
        .zip(line.chars().skip(1))
        .find(|((_, c), next)| c.is_whitespace() && *next == '#')
        .map(|((pos, _), _)| pos);
    let line = match comment {
        Some(pos) => &line[..pos],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        None
    } else {
        Some(line)
    }
}

/// Parse requirement strings (e.g. the lines of a requirements file).
pub fn parse_requirements<I, S>(lines: I) -> Result<Vec<Requirement>, RequirementError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| requirement_line(line.as_ref()).map(Requirement::parse))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_both(a: &str, b: &str) -> Vec<Requirement> {
        parse_requirements([a, b]).unwrap()
    }

    #[test]
    fn test_bare_name() {
        for r in parse_both(" woo ", "woo") {
            assert_eq!(r.name(), "woo");
            assert_eq!(r.to_string(), "woo");
            for version in ["1.2.3", "2.0", "500"] {
                assert!(r.accept(version));
                assert!(r.accept_reference(version));
            }
        }
    }

    #[test]
    fn test_separator_runs_in_name() {
        for r in parse_both(" W--..__o == 5 ", "W--..__o==5") {
            assert_eq!(r.name(), "W--..__o");
            assert_eq!(r.key(), "w-o");
            assert_eq!(r.to_string(), "W--..__o==5");
            assert!(!r.accept("1.2.3"));
            assert!(!r.accept("2.0"));
            for version in ["5", "5.0", "5.00"] {
                assert!(r.accept(version));
            }
        }
    }

    #[test]
    fn test_padded_equality() {
        for r in parse_both(" woo == 5.00 ", "woo==5.00") {
            assert_eq!(r.to_string(), "woo==5.00");
            assert!(!r.accept("1.2.3"));
            assert!(!r.accept("2.0"));
            for version in ["5", "5.0", "5.00"] {
                assert!(r.accept(version));
            }
            assert!(!r.accept("5.01"));
        }
    }

    #[test]
    fn test_range() {
        for r in parse_both(" yay >= 2 , < 3 ", "yay>=2,<3") {
            assert_eq!(r.name(), "yay");
            assert_eq!(r.to_string(), "yay<3,>=2");
            assert!(!r.accept("1.9"));
            assert!(r.accept("2"));
            assert!(r.accept("2.9"));
            assert!(!r.accept("3"));
        }
    }

    #[test]
    fn test_extras_canonical() {
        let a: Requirement = "foo[baz,bar,bar]".parse().unwrap();
        let b: Requirement = "foo[bar,baz]".parse().unwrap();
        assert_eq!(a.to_string(), "foo[bar,baz]");
        assert_eq!(b.to_string(), "foo[bar,baz]");
        assert_eq!(a, b);
        let none: Requirement = "foo[]".parse().unwrap();
        assert_eq!(none.to_string(), "foo");
    }

    #[test]
    fn test_name_equality_folds_case_and_separators() {
        let a: Requirement = "Zope.Interface>=5".parse().unwrap();
        let b: Requirement = "zope_interface >=5".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Zope.Interface>=5");
        assert_eq!(b.to_string(), "zope_interface>=5");
    }

    #[test]
    fn test_parenthesized_specifiers() {
        let r: Requirement = "foo (>=1.0, <2)".parse().unwrap();
        assert_eq!(r.to_string(), "foo<2,>=1.0");
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let reqs = parse_requirements(["", "# pinned", "a==1 # why", "  b  "]).unwrap();
        let texts: Vec<String> = reqs.iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["a==1", "b"]);
    }

    #[test]
    fn test_comment_after_any_whitespace() {
        assert_eq!(requirement_line("a==1\t# pinned"), Some("a==1"));
        assert_eq!(requirement_line("a==1  \t #x"), Some("a==1"));
        assert_eq!(requirement_line("\t# only a comment"), None);
        assert_eq!(
            requirement_line("pkg @ https://h/p.zip#sha256=ab"),
            Some("pkg @ https://h/p.zip#sha256=ab")
        );
        let reqs = parse_requirements(["a==1\t# pinned"]).unwrap();
        assert_eq!(reqs[0].to_string(), "a==1");
    }

    #[test]
    fn test_unsupported_and_invalid() {
        assert!(matches!(
            Requirement::parse("foo>=1; python_version<'3'"),
            Err(RequirementError::Unsupported(_))
        ));
        assert!(matches!(
            Requirement::parse("foo @ https://example.com/foo.whl"),
            Err(RequirementError::Unsupported(_))
        ));
        assert!(matches!(
            Requirement::parse("foo===1.0"),
            Err(RequirementError::Unsupported(_))
        ));
        for bad in ["-e .", ">=1", "foo[bar", "foo >> 1", "foo[b!r]"] {
            assert!(
                matches!(Requirement::parse(bad), Err(RequirementError::InvalidRequirement(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_fast_and_reference_agree() {
        let reqs = parse_requirements([
            "a", "b==5.00", "c>=2,<3", "d!=1.4.*", "e~=2.2", "f>1,<1", "g==2.*,!=2.5",
        ])
        .unwrap();
        for r in &reqs {
            for version in ["0.9", "1.4.1", "2", "2.2", "2.5", "2.9", "3", "5.0", "x.y"] {
                assert_eq!(r.accept(version), r.accept_reference(version), "{} {}", r, version);
            }
        }
    }
}
