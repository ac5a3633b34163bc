use age::secrecy::SecretString;

use crate::core::errors::Result;

/// Port for the passphrase cipher protecting side artifacts.
///
/// Implementations live in `adapters::cipher`. The core layer only
/// depends on this trait, never on a concrete cipher.
pub trait ArtifactCipher: Send + Sync {
    /// Encrypt plaintext with a key derived from `passphrase`.
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>>;

    /// Decrypt ciphertext produced by `encrypt` with the same passphrase.
    /// loft only writes artifacts; reading them back is for verification.
    #[cfg(test)]
    fn decrypt(&self, ciphertext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>>;

    /// File extension appended to encrypted artifacts (e.g. "age").
    fn extension(&self) -> &str;
}
