//! Semantic versions as embedded in revision names.
//!
//! Revision names carry the version the author chose (`worker-v1.3.1`,
//! `worker-v2.0`, `worker-v1.0.0-beta.1`). Parsing is lenient in the same way
//! the authoring side is: the leading `v` is optional and missing minor or
//! patch components count as zero. Ordering follows SemVer 2.0 precedence:
//! numeric `major.minor.patch`, then a release outranks any of its
//! pre-releases, then pre-release identifiers left to right. Build metadata
//! never affects ordering.

use std::cmp::Ordering;

use thiserror::Error;

/// Why a string is not a semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("version is empty")]
    Empty,
    #[error("component \"{0}\" is not a non-negative integer")]
    InvalidNumber(String),
    #[error("expected at most major.minor.patch, found {0} components")]
    TooManyComponents(usize),
    #[error("pre-release identifier \"{0}\" is empty or contains invalid characters")]
    InvalidPrerelease(String),
    #[error("build metadata \"{0}\" is empty or contains invalid characters")]
    InvalidBuild(String),
}

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alphanumeric(_)) => Ordering::Less,
            (Identifier::Alphanumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alphanumeric(a), Identifier::Alphanumeric(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{n}"),
            Identifier::Alphanumeric(s) => f.write_str(s),
        }
    }
}

/// A parsed semantic version.
///
/// Equality and ordering ignore build metadata, so `1.0.0+a == 1.0.0+b`.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<Identifier>,
    build: Option<String>,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: None,
        }
    }

    /// Parses `[v]MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let s = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let (rest, build) = match s.split_once('+') {
            Some((rest, build)) => {
                if !valid_dotted(build) {
                    return Err(VersionError::InvalidBuild(build.to_string()));
                }
                (rest, Some(build.to_string()))
            }
            None => (s, None),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => {
                if !valid_dotted(pre) {
                    return Err(VersionError::InvalidPrerelease(pre.to_string()));
                }
                (core, parse_prerelease(pre))
            }
            None => (rest, Vec::new()),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::TooManyComponents(parts.len()));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = parse_number(part)?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            build,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }
}

fn parse_number(part: &str) -> Result<u64, VersionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidNumber(part.to_string()));
    }
    part.parse()
        .map_err(|_| VersionError::InvalidNumber(part.to_string()))
}

fn valid_dotted(s: &str) -> bool {
    s.split('.').all(|ident| {
        !ident.is_empty()
            && ident
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

fn parse_prerelease(pre: &str) -> Vec<Identifier> {
    pre.split('.')
        .map(|ident| {
            if ident.bytes().all(|b| b.is_ascii_digit()) {
                match ident.parse() {
                    Ok(n) => Identifier::Numeric(n),
                    Err(_) => Identifier::Alphanumeric(ident.to_string()),
                }
            } else {
                Identifier::Alphanumeric(ident.to_string())
            }
        })
        .collect()
}

impl std::str::FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                // Vec ordering is lexicographic with the shorter prefix first,
                // which is exactly SemVer's rule for identifier lists.
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(ToString::to_string).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}
