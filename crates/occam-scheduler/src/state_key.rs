//! State key and version identifiers

use bytes::Bytes;
use std::fmt;

/// Position of a transaction within its batch
pub type TxIndex = usize;

/// Number of times a transaction has been re-executed (0 for the first run)
pub type Incarnation = u32;

/// A unique identifier for a piece of state touched by a transaction
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(Bytes);

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self(Bytes::copy_from_slice(key.as_bytes()))
    }
}

impl From<String> for StateKey {
    fn from(key: String) -> Self {
        Self(Bytes::from(key))
    }
}

impl From<Vec<u8>> for StateKey {
    fn from(key: Vec<u8>) -> Self {
        Self(Bytes::from(key))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0.iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// One execution attempt of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    /// Transaction index in the batch
    pub index: TxIndex,
    /// Incarnation of this attempt
    pub incarnation: Incarnation,
}

impl Version {
    /// Create a new version
    pub fn new(index: TxIndex, incarnation: Incarnation) -> Self {
        Self { index, incarnation }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.index, self.incarnation)
    }
}
