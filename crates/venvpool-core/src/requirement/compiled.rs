//! Optimized matcher: constraints folded once into an interval plus exclusions.
//!
//! Compatibility checks run per cached environment × per requirement, so the
//! per-call cost is one version parse, at most two comparisons and a scan of
//! the (usually empty) exclusion list. Must agree with
//! [`SpecifierSet::accept`](super::SpecifierSet::accept) on every input.

use std::cmp::Ordering;

use super::specifier::{Operator, SpecifierSet};
use super::version::Version;

#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

#[derive(Debug, Clone)]
enum Exclusion {
    Exact(Version),
    /// Half-open `[lo, hi)`, from `!=X.Y.*`.
    Range(Version, Version),
}

impl Exclusion {
    fn excludes(&self, v: &Version) -> bool {
        match self {
            Self::Exact(x) => v == x,
            Self::Range(lo, hi) => v >= lo && v < hi,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompiledSpecifiers {
    lower: Option<Bound>,
    upper: Option<Bound>,
    exclusions: Vec<Exclusion>,
    /// No version can satisfy the constraints.
    empty: bool,
    /// No constraints at all: accept anything, even unparseable versions.
    unconstrained: bool,
}

impl CompiledSpecifiers {
    pub fn compile(set: &SpecifierSet) -> Self {
        let mut compiled = Self {
            unconstrained: set.is_empty(),
            ..Self::default()
        };
        for spec in set.iter() {
            let v = spec.version();
            match (spec.operator(), spec.is_wildcard()) {
                (Operator::Eq, false) => {
                    compiled.raise_lower(v.clone(), true);
                    compiled.cut_upper(v.clone(), true);
                }
                (Operator::Eq, true) => {
                    let (lo, hi) = v.prefix_bounds();
                    compiled.raise_lower(lo, true);
                    compiled.cut_upper(hi, false);
                }
                (Operator::Ne, false) => compiled.exclusions.push(Exclusion::Exact(v.clone())),
                (Operator::Ne, true) => {
                    let (lo, hi) = v.prefix_bounds();
                    compiled.exclusions.push(Exclusion::Range(lo, hi));
                }
                (Operator::Ge, _) => compiled.raise_lower(v.clone(), true),
                (Operator::Gt, _) => compiled.raise_lower(v.clone(), false),
                (Operator::Le, _) => compiled.cut_upper(v.clone(), true),
                (Operator::Lt, _) => compiled.cut_upper(v.clone(), false),
                (Operator::Compatible, _) => {
                    let (lo, hi) = v.truncated_bounds(v.release().len() - 1);
                    compiled.raise_lower(lo, true);
                    compiled.raise_lower(v.clone(), true);
                    compiled.cut_upper(hi, false);
                }
            }
        }
        compiled.empty = compiled.bounds_cross();
        compiled
    }

    fn raise_lower(&mut self, version: Version, inclusive: bool) {
        self.lower = Some(match self.lower.take() {
            None => Bound { version, inclusive },
            Some(cur) => match version.cmp(&cur.version) {
                Ordering::Greater => Bound { version, inclusive },
                Ordering::Less => cur,
                Ordering::Equal => Bound {
                    inclusive: cur.inclusive && inclusive,
                    ..cur
                },
            },
        });
    }

    fn cut_upper(&mut self, version: Version, inclusive: bool) {
        self.upper = Some(match self.upper.take() {
            None => Bound { version, inclusive },
            Some(cur) => match version.cmp(&cur.version) {
                Ordering::Less => Bound { version, inclusive },
                Ordering::Greater => cur,
                Ordering::Equal => Bound {
                    inclusive: cur.inclusive && inclusive,
                    ..cur
                },
            },
        });
    }

    fn bounds_cross(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    pub fn accept(&self, version: &str) -> bool {
        if self.unconstrained {
            return true;
        }
        if self.empty {
            return false;
        }
        match Version::parse(version) {
            Ok(v) => self.accept_version(&v),
            Err(_) => false,
        }
    }

    pub fn accept_version(&self, v: &Version) -> bool {
        if self.empty {
            return false;
        }
        if let Some(lo) = &self.lower {
            match v.cmp(&lo.version) {
                Ordering::Less => return false,
                Ordering::Equal if !lo.inclusive => return false,
                _ => {}
            }
        }
        if let Some(hi) = &self.upper {
            match v.cmp(&hi.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !hi.inclusive => return false,
                _ => {}
            }
        }
        !self.exclusions.iter().any(|x| x.excludes(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECIFIERS: &[&str] = &[
        "",
        "==5.00",
        ">=2,<3",
        "<3,>=2",
        ">2",
        "<=1.4",
        "!=1.0",
        "==1.4.*",
        "!=1.4.*",
        "~=2.2",
        "~=1.4.5",
        ">=1.0a1,<1.0",
        ">1,<1",
        ">=1,<=1",
        "==1,!=1.0",
        ">=3,<2",
        "==2.*,!=2.5,>=2.1",
        ">=1!1.0",
        ">1.0.post1,<=1.0.post3",
        "<2.0.dev1",
    ];

    const VERSIONS: &[&str] = &[
        "0", "1", "1.0", "1.0.0", "1.0a1", "1.0rc2", "1.0.dev3", "1.0.post1", "1.0.post2",
        "1.0.post3", "1.3.9", "1.4", "1.4.0", "1.4.5", "1.4.9", "1.5", "1.9", "2", "2.0.dev0",
        "2.0.dev1", "2.1", "2.2", "2.5", "2.5.0", "2.9", "2.99", "3", "3.0.dev0", "3.0", "5",
        "5.0", "5.00", "5.01", "1!0.5", "1!1.0", "10.0", "garbage", "",
    ];

    #[test]
    fn test_agrees_with_reference() {
        for spec in SPECIFIERS {
            let set = SpecifierSet::parse(spec).unwrap();
            let compiled = CompiledSpecifiers::compile(&set);
            for version in VERSIONS {
                assert_eq!(
                    set.accept(version),
                    compiled.accept(version),
                    "{:?} vs {:?}",
                    spec,
                    version
                );
            }
        }
    }

    #[test]
    fn test_empty_interval() {
        let compiled = CompiledSpecifiers::compile(&SpecifierSet::parse(">1,<1").unwrap());
        assert!(compiled.empty);
        assert!(!compiled.accept("1"));
        let point = CompiledSpecifiers::compile(&SpecifierSet::parse(">=1,<=1.0").unwrap());
        assert!(!point.empty);
        assert!(point.accept("1.0.0"));
    }

    #[test]
    fn test_unconstrained_accepts_anything() {
        let compiled = CompiledSpecifiers::compile(&SpecifierSet::default());
        assert!(compiled.accept("1.2.3"));
        assert!(compiled.accept("2.0"));
        assert!(compiled.accept("500"));
        assert!(compiled.accept("whatever"));
    }
}
