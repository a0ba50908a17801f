//! Version constraints and the reference matcher.
//!
//! [`SpecifierSet::accept`] evaluates every constraint directly against the
//! candidate version. It is the obviously-correct baseline that
//! [`super::CompiledSpecifiers`] is tested against.

use std::fmt;

use super::version::Version;
use super::RequirementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    /// `~=`: compatible release.
    Compatible,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Compatible => "~=",
        }
    }

    /// Longest operators first so `>=` is not read as `>`.
    const ALL: [Operator; 7] = [
        Self::Eq,
        Self::Ne,
        Self::Ge,
        Self::Le,
        Self::Compatible,
        Self::Gt,
        Self::Lt,
    ];
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(operator, version)` constraint, e.g. `>=2` or `==1.4.*`.
#[derive(Debug, Clone)]
pub struct Specifier {
    op: Operator,
    /// Version exactly as written (minus `.*`), kept for canonical output.
    text: String,
    version: Version,
    wildcard: bool,
}

impl Specifier {
    pub fn parse(clause: &str) -> Result<Self, RequirementError> {
        let clause = clause.trim();
        if clause.starts_with("===") {
            return Err(RequirementError::Unsupported(format!(
                "arbitrary equality is not supported: {}",
                clause
            )));
        }
        let op = Operator::ALL
            .into_iter()
            .find(|op| clause.starts_with(op.as_str()))
            .ok_or_else(|| RequirementError::InvalidSpecifier(clause.to_string()))?;
        let rest = clause[op.as_str().len()..].trim();
        if rest.is_empty() || rest.contains(char::is_whitespace) {
            return Err(RequirementError::InvalidSpecifier(clause.to_string()));
        }
        let (text, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };
        let version = Version::parse(text)
            .map_err(|_| RequirementError::InvalidSpecifier(clause.to_string()))?;
        if wildcard && (!matches!(op, Operator::Eq | Operator::Ne) || !version.is_plain_release()) {
            return Err(RequirementError::InvalidSpecifier(clause.to_string()));
        }
        if op == Operator::Compatible && version.release().len() < 2 {
            return Err(RequirementError::InvalidSpecifier(clause.to_string()));
        }
        Ok(Self {
            op,
            text: text.to_string(),
            version,
            wildcard,
        })
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Reference semantics of a single constraint.
    pub fn contains(&self, candidate: &Version) -> bool {
        match (self.op, self.wildcard) {
            (Operator::Eq, false) => candidate == &self.version,
            (Operator::Ne, false) => candidate != &self.version,
            (Operator::Eq, true) => {
                let (lo, hi) = self.version.prefix_bounds();
                candidate >= &lo && candidate < &hi
            }
            (Operator::Ne, true) => {
                let (lo, hi) = self.version.prefix_bounds();
                !(candidate >= &lo && candidate < &hi)
            }
            (Operator::Ge, _) => candidate >= &self.version,
            (Operator::Le, _) => candidate <= &self.version,
            (Operator::Gt, _) => candidate > &self.version,
            (Operator::Lt, _) => candidate < &self.version,
            (Operator::Compatible, _) => {
                let keep = self.version.release().len() - 1;
                let (lo, hi) = self.version.truncated_bounds(keep);
                candidate >= &self.version && candidate >= &lo && candidate < &hi
            }
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.text)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

/// All constraints of one requirement, deduplicated and in canonical order.
#[derive(Debug, Clone, Default)]
pub struct SpecifierSet {
    specs: Vec<Specifier>,
}

impl SpecifierSet {
    /// Parse the comma-separated constraint list after the name/extras.
    pub fn parse(text: &str) -> Result<Self, RequirementError> {
        let mut specs = text
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(Specifier::parse)
            .collect::<Result<Vec<_>, _>>()?;
        // Ordered by serialized text so input order never shows in the output.
        specs.sort_by_cached_key(|s| s.to_string());
        specs.dedup_by(|a, b| a.to_string() == b.to_string());
        Ok(Self { specs })
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specs.iter()
    }

    /// Reference check: parse, then test every constraint in turn.
    pub fn accept(&self, version: &str) -> bool {
        if self.specs.is_empty() {
            return true;
        }
        match Version::parse(version) {
            Ok(v) => self.accept_version(&v),
            Err(_) => false,
        }
    }

    pub fn accept_version(&self, version: &Version) -> bool {
        self.specs.iter().all(|s| s.contains(version))
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

impl PartialEq for SpecifierSet {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for SpecifierSet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let set = SpecifierSet::parse(" >= 2 , < 3 ").unwrap();
        assert_eq!(set.to_string(), "<3,>=2");
        let again = SpecifierSet::parse("<3,>=2,>=2").unwrap();
        assert_eq!(set, again);
    }

    #[test]
    fn test_original_version_text_kept() {
        let set = SpecifierSet::parse("== 5.00").unwrap();
        assert_eq!(set.to_string(), "==5.00");
    }

    #[test]
    fn test_wildcard() {
        let set = SpecifierSet::parse("==1.4.*").unwrap();
        assert!(set.accept("1.4"));
        assert!(set.accept("1.4.99"));
        assert!(!set.accept("1.5"));
        assert!(!set.accept("1.3.9"));
        assert_eq!(set.to_string(), "==1.4.*");

        let not = SpecifierSet::parse("!=1.4.*").unwrap();
        assert!(!not.accept("1.4.2"));
        assert!(not.accept("1.5"));
    }

    #[test]
    fn test_compatible_release() {
        let set = SpecifierSet::parse("~=2.2").unwrap();
        assert!(set.accept("2.2"));
        assert!(set.accept("2.9"));
        assert!(!set.accept("3.0"));
        assert!(!set.accept("2.1"));

        let set = SpecifierSet::parse("~=1.4.5").unwrap();
        assert!(set.accept("1.4.5"));
        assert!(set.accept("1.4.9"));
        assert!(!set.accept("1.5"));
        assert!(!set.accept("1.4.4"));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["=>1", "==", "== 1 2", "~=1", ">=1.*", "==1.0a1.*", "===1.0", "1.0"] {
            assert!(SpecifierSet::parse(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_unparseable_version_rejected_when_constrained() {
        let set = SpecifierSet::parse(">=1").unwrap();
        assert!(!set.accept("not-a-version"));
        assert!(SpecifierSet::default().accept("not-a-version"));
    }
}
