//! Branded identifier newtypes.
//!
//! Users, groups, and messages are keyed by the store's integer primary keys.
//! Wrapping them keeps a `GroupId` from being passed where a `UserId` is
//! expected. Connections get a process-local `conn_`-prefixed `UUIDv7`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value as stored in the database.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

integer_id!(
    /// Stable identity of a registered user.
    UserId
);
integer_id!(
    /// Identity of a study group (chat room).
    GroupId
);
integer_id!(
    /// Identity of a persisted chat message.
    MessageId
);

/// Identity of one live transport-level link.
///
/// A connection carries exactly one group subscription for its lifetime;
/// joining another group means opening a new connection with a new id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, time-ordered connection id.
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_parses_route_segment() {
        assert_eq!("42".parse::<GroupId>().unwrap(), GroupId(42));
        assert_eq!(" 7 ".parse::<GroupId>().unwrap(), GroupId(7));
        assert!("abc".parse::<GroupId>().is_err());
    }

    #[test]
    fn integer_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId(5)).unwrap();
        assert_eq!(json, "5");
        let back: GroupId = serde_json::from_str("12").unwrap();
        assert_eq!(back, GroupId(12));
    }

    #[test]
    fn display_is_bare_integer() {
        assert_eq!(MessageId(99).to_string(), "99");
    }

    #[test]
    fn connection_ids_are_prefixed_and_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert!(a.as_str().starts_with("conn_"));
        assert_ne!(a, b);
    }
}
