//! Macro for defining validated identifier newtypes.
//!
//! Keyspaces, shards and migration contexts share one invariant (non-empty,
//! no whitespace or control characters) and the same trait surface. The macro
//! generates the struct, a fallible constructor and the conversions.

/// Define a strongly-typed identifier newtype.
///
/// Generates:
/// - The struct with `Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize`
/// - Validating `Deserialize` and `FromStr`
/// - `parse()` (returns `CoreError::InvalidIdentifier`), `as_str()`, `into_inner()`
/// - `Display`, `AsRef<str>`, `Deref<Target=str>`, `Borrow<str>`
/// - `PartialEq<str>`, `PartialEq<&str>`
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident($kind:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl $Name {
            /// Validate and wrap an identifier.
            pub fn parse(value: impl Into<String>) -> $crate::error::CoreResult<Self> {
                let value = value.into();
                match $crate::newtype_string::identifier_problem(&value) {
                    None => Ok(Self(value)),
                    Some(reason) => Err($crate::error::CoreError::InvalidIdentifier {
                        kind: $kind,
                        value,
                        reason,
                    }),
                }
            }

            /// Return the underlying identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::parse(s).map_err(serde::de::Error::custom)
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $crate::error::CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $Name::parse(s)
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

pub(crate) use define_identifier;

/// Returns why `value` is not a usable identifier, if it isn't.
pub(crate) fn identifier_problem(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some("must not be empty")
    } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("must not contain whitespace or control characters")
    } else if value.contains(',') {
        Some("must not contain commas")
    } else {
        None
    }
}
