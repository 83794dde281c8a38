//! Newtypes for Sakura Cloud resource identifiers to avoid stringly-typed code.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a provider identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into().trim().to_owned())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Returns `true` when the identifier is composed only of ASCII
            /// digits, which is the shape of every Sakura Cloud resource ID.
            #[must_use]
            pub fn is_numeric(&self) -> bool {
                !self.0.is_empty() && self.0.chars().all(|ch| ch.is_ascii_digit())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }
    };
}

resource_id!(
    /// Provider-assigned server identifier.
    ServerId
);
resource_id!(
    /// Provider-assigned disk identifier.
    DiskId
);
resource_id!(
    /// Identifier of a transient customisation note.
    NoteId
);
resource_id!(
    /// Identifier of a network interface attached to a server.
    InterfaceId
);
resource_id!(
    /// Identifier of a packet filter (firewall ruleset).
    PacketFilterId
);
resource_id!(
    /// Identifier of a source archive (base image) used to build a disk.
    ArchiveId
);
