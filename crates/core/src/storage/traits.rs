use crate::errors::CoreError;

/// Durable string-keyed blob storage.
///
/// The core only needs whole-value reads and writes; a `put` must either
/// replace the value completely or fail and leave the old one in place.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), CoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), CoreError>;
}
