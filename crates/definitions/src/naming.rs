//! Capability references and revision names.
//!
//! A capability reference is what users write in an application: either a
//! bare definition name (`worker`) or a name pinned to a version
//! (`worker@v1.3.1`). Revisions are stored under `<name>-v<version>`
//! (`worker-v1.3.1`), so a pinned reference converts to a store key by
//! swapping `@v` for `-v`. Opaque revision tokens (`worker@v1-hotfix`) follow
//! the same rule.

use serde::{Deserialize, Serialize};

use crate::{ObjectName, ResolveError, SemanticVersion};

/// Separator between a definition name and its pinned version in a reference.
pub const VERSION_SEPARATOR: &str = "@v";

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const QUALIFIED_NAME_ERR: &str = "must consist of alphanumeric characters, '-', '_' or '.', \
     and must start and end with an alphanumeric character \
     (e.g. 'MyName',  or 'my.name',  or '123-abc')";
const DNS1123_SUBDOMAIN_ERR: &str = "a lowercase RFC 1123 subdomain must consist of lower case \
     alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character \
     (e.g. 'example.com')";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks `value` against the store's qualified-name rules and returns every
/// violation found. An empty list means the name is valid.
///
/// A qualified name is an optional DNS-1123 subdomain prefix and `/`, followed
/// by a name part of at most 63 alphanumerics, `-`, `_` or `.` that starts and
/// ends with an alphanumeric.
pub fn validate_qualified_name(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    let parts: Vec<&str> = value.split('/').collect();
    let name = match parts.as_slice() {
        [name] => *name,
        [prefix, name] => {
            if prefix.is_empty() {
                errs.push("prefix part must be non-empty".to_string());
            } else {
                errs.extend(
                    validate_dns1123_subdomain(prefix)
                        .into_iter()
                        .map(|msg| format!("prefix part {msg}")),
                );
            }
            *name
        }
        _ => {
            errs.push(format!(
                "a qualified name {QUALIFIED_NAME_ERR} with an optional DNS subdomain prefix \
                 and '/' (e.g. 'example.com/MyName')"
            ));
            return errs;
        }
    };

    if name.is_empty() {
        errs.push("name part must be non-empty".to_string());
    } else if name.len() > QUALIFIED_NAME_MAX_LENGTH {
        errs.push(format!(
            "name part must be no more than {QUALIFIED_NAME_MAX_LENGTH} characters"
        ));
    }
    if !is_qualified_name_part(name) {
        errs.push(format!("name part {QUALIFIED_NAME_ERR}"));
    }
    errs
}

fn is_qualified_name_part(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn validate_dns1123_subdomain(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
        errs.push(format!(
            "must be no more than {DNS1123_SUBDOMAIN_MAX_LENGTH} characters"
        ));
    }
    let label_ok = |label: &str| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    };
    if !value.split('.').all(label_ok) {
        errs.push(DNS1123_SUBDOMAIN_ERR.to_string());
    }
    errs
}

// ---------------------------------------------------------------------------
// Revision names
// ---------------------------------------------------------------------------

/// A validated store key for a definition revision (or a bare definition
/// name used directly as one).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionName(String);

impl RevisionName {
    /// Validates `value` as a qualified name.
    pub fn parse(value: impl Into<String>) -> Result<Self, ResolveError> {
        let value = value.into();
        let messages = validate_qualified_name(&value);
        if messages.is_empty() {
            Ok(Self(value))
        } else {
            Err(ResolveError::InvalidName {
                name: value,
                messages,
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The store key for this revision.
    pub fn to_object_name(&self) -> ObjectName {
        ObjectName::from_validated(self.0.clone())
    }
}

impl TryFrom<String> for RevisionName {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RevisionName> for String {
    fn from(name: RevisionName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RevisionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RevisionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converts a capability reference into the store key of the revision it
/// names.
///
/// `worker@v1.3.1` becomes `worker-v1.3.1`. A reference without `@v` (or with
/// nothing before it) is taken as a direct object name and returned unchanged
/// if it is valid.
pub fn convert_to_revision_name(reference: &str) -> Result<RevisionName, ResolveError> {
    match reference.split_once(VERSION_SEPARATOR) {
        Some((base, suffix)) if !base.is_empty() => {
            RevisionName::parse(format!("{base}-v{suffix}"))
        }
        _ => RevisionName::parse(reference),
    }
}

// ---------------------------------------------------------------------------
// Capability references
// ---------------------------------------------------------------------------

/// A parsed capability reference: base definition name plus an optional
/// version token (`v1.3.1`, `v1-hotfix`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityReference {
    pub base_name: String,
    pub version_token: Option<String>,
}

impl CapabilityReference {
    /// Splits `name` or `name@token`. Never fails; validation happens when the
    /// reference is converted to a revision name.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('@') {
            Some((base, token)) => Self {
                base_name: base.to_string(),
                version_token: Some(token.to_string()),
            },
            None => Self {
                base_name: raw.to_string(),
                version_token: None,
            },
        }
    }

    /// `true` if the reference pins a version or revision.
    pub fn is_pinned(&self) -> bool {
        self.version_token.is_some()
    }

    /// Recovers `(base name, version)` from a revision name of the form
    /// `<base>-v<semver>`.
    ///
    /// The split happens at the right-most `-v` whose remainder is a valid
    /// semantic version, so base names that themselves contain `-v` survive.
    pub fn from_revision_name(revision: &str) -> Option<(String, String)> {
        revision
            .rmatch_indices("-v")
            .map(|(idx, _)| (&revision[..idx], &revision[idx + 2..]))
            .find(|(base, version)| {
                !base.is_empty() && !version.is_empty() && SemanticVersion::parse(version).is_ok()
            })
            .map(|(base, version)| (base.to_string(), version.to_string()))
    }
}

impl std::fmt::Display for CapabilityReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version_token {
            Some(token) => write!(f, "{}@{}", self.base_name, token),
            None => f.write_str(&self.base_name),
        }
    }
}

/// Widens a pinned revision name to the version range auto-update searches.
///
/// A full `major.minor.patch` pin drops its patch (and any pre-release or
/// build suffix): `worker-v1.3.1` searches `worker-v1.3`. Shorter pins and
/// opaque tokens are already a range (or cannot be widened) and come back
/// unchanged.
pub fn auto_update_prefix(revision: &RevisionName, base_name: &str) -> String {
    let Some(version) = revision
        .as_str()
        .strip_prefix(base_name)
        .and_then(|rest| rest.strip_prefix("-v"))
    else {
        return revision.to_string();
    };
    let core = version.split(['-', '+']).next().unwrap_or(version);
    match core.split('.').collect::<Vec<_>>().as_slice() {
        [major, minor, _patch] => format!("{base_name}-v{major}.{minor}"),
        _ => revision.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Numbered revisions
// ---------------------------------------------------------------------------

/// Returns everything before the last `-` of a numbered revision name
/// (`shop-worker-v3` → `shop-worker`).
pub fn extract_component_name(revision: &str) -> String {
    match revision.rsplit_once('-') {
        Some((name, _)) => name.to_string(),
        None => String::new(),
    }
}

/// Returns the revision number from a name like `myapp-v3`.
///
/// The last `delimiter`-separated segment must be `v<integer>`; `v1`, `appv2`
/// and `myapp-a1` are all rejected.
pub fn extract_revision_num(revision: &str, delimiter: &str) -> Result<i64, ResolveError> {
    let bad = || ResolveError::BadRevision {
        revision: revision.to_string(),
    };
    let (_, last) = revision.rsplit_once(delimiter).ok_or_else(bad)?;
    let number = last.strip_prefix('v').ok_or_else(bad)?;
    number.parse().map_err(|_| bad())
}
