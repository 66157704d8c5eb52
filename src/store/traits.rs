use crate::error::PipeBurstError;

/// A string key-value slot store, the shape of the browser's local storage.
/// Implement this for each persistence backend the host offers.
pub trait KeyValueStore {
    /// Returns the stored value, or `None` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, PipeBurstError>;

    /// Writes the value, replacing any previous one.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PipeBurstError>;

    /// Removes the key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), PipeBurstError>;
}
