//! Newtype domain identifiers.
//!
//! Namespaces, object names and object UIDs are all strings (or UUIDs) under
//! the hood, but mixing them up is a silent bug: passing a namespace where a
//! revision name is expected would produce a valid-looking but wrong lookup.
//! Each concept therefore gets its own newtype.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, AsRef.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Wraps a value already known to be non-empty.
            #[allow(dead_code)]
            pub(crate) fn from_validated(value: String) -> Self {
                debug_assert!(!value.is_empty());
                Self(value)
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// A resource-store namespace (e.g. `"default"`, `"vela-system"`).
    Namespace
}

string_id! {
    /// The name of a stored object: either a live definition (`"worker"`) or a
    /// definition revision (`"worker-v1.3.1"`).
    ///
    /// Unlike [`crate::naming::RevisionName`] this is not validated; it is the
    /// store's key as given to it.
    ObjectName
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed
// ---------------------------------------------------------------------------

/// Store-assigned unique identity of an object.
///
/// Two objects with the same namespace and name but different UIDs are
/// different incarnations (the first was deleted and the name reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectUid(Uuid);

impl ObjectUid {
    /// Generates a new random UID.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an [`ObjectUid`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ObjectUid {
    fn default() -> Self {
        Self::new_random()
    }
}

impl std::fmt::Display for ObjectUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
