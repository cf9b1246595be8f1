//! Node, edge and region identifiers backed by a global string interner.
//!
//! Layouts key every per-node table by [`Id`], so identifiers must be cheap to
//! copy, hash and send to the force-simulation worker thread. Interning gives
//! all three: an `Id` is a `Copy` symbol while its text lives once in a
//! process-wide table.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner, so ids can
/// be created on the caller's thread and resolved on the worker thread.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        // The interner holds no invariants a panicking writer could break.
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Interned identifier for nodes, edges and constraints
///
/// # Examples
///
/// ```
/// use astrolabe_core::identifier::Id;
///
/// let a = Id::new("server");
/// let b = Id::new("database");
///
/// let edge = Id::pair(a, b);
/// assert_eq!(edge, "server->database");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    ///
    /// # Examples
    ///
    /// ```
    /// use astrolabe_core::identifier::Id;
    ///
    /// let id = Id::new("node-1");
    /// assert_eq!(id, Id::new("node-1"));
    /// ```
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Creates an internal identifier without a caller-chosen name.
    pub fn from_anonymous(idx: usize) -> Self {
        Self::new(&format!("__{idx}"))
    }

    /// Creates the directed pair identifier `"<source>-><target>"`.
    ///
    /// Used for edges created without an explicit id and for connector
    /// connections.
    pub fn pair(source: Id, target: Id) -> Self {
        let name = format!("{source}->{target}");
        Self::new(&name)
    }

    /// Returns the interned text as an owned string
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = interner().resolve(self.0).map(str::to_owned);
        match text {
            Some(text) => f.write_str(&text),
            None => write!(f, "<unknown id>"),
        }
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl PartialEq<str> for Id {
    /// Allows direct comparison with string slices: `id == "string"`
    fn eq(&self, other: &str) -> bool {
        interner().resolve(self.0) == Some(other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Id::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let id1 = Id::new("alpha");
        let id2 = Id::new("alpha");
        let id3 = Id::new("beta");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1, "alpha");
    }

    #[test]
    fn test_from_anonymous() {
        assert_eq!(Id::from_anonymous(0), Id::from_anonymous(0));
        assert_ne!(Id::from_anonymous(0), Id::from_anonymous(1));
    }

    #[test]
    fn test_pair_is_directed() {
        let a = Id::new("a");
        let b = Id::new("b");
        assert_eq!(Id::pair(a, b), "a->b");
        assert_ne!(Id::pair(a, b), Id::pair(b, a));
    }

    #[test]
    fn test_display_trait() {
        let id = Id::new("display_test");
        assert_eq!(format!("{id}"), "display_test");
        assert_eq!(id.as_string(), "display_test");
    }

    #[test]
    fn test_from_string() {
        let id: Id = String::from("owned").into();
        assert_eq!(id, Id::new("owned"));
    }

    #[test]
    fn test_hash_and_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Id::new("key1"), "value1");
        map.insert(Id::new("key2"), "value2");

        assert_eq!(map.get(&Id::new("key1")), Some(&"value1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_ids_cross_threads() {
        let id = Id::new("shared");
        let text = std::thread::spawn(move || id.to_string())
            .join()
            .unwrap();
        assert_eq!(text, "shared");
    }
}
