#[cfg(test)]
use std::io::Read;
use std::io::Write;

use age::secrecy::{ExposeSecret, SecretString};

use crate::core::errors::{LoftError, Result};
use crate::core::traits::cipher::ArtifactCipher;

/// age passphrase encryption (scrypt + ChaCha20-Poly1305).
///
/// Output is ASCII-armored so the artifact survives any transfer tool
/// untouched and can be inspected on the remote.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgeArtifactCipher;

impl AgeArtifactCipher {
    pub fn new() -> Self {
        Self
    }

    fn owned(passphrase: &SecretString) -> SecretString {
        SecretString::from(passphrase.expose_secret().to_owned())
    }
}

impl ArtifactCipher for AgeArtifactCipher {
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>> {
        if passphrase.expose_secret().is_empty() {
            return Err(LoftError::Cipher {
                reason: "repository passphrase is empty".into(),
            });
        }

        let encryptor = age::Encryptor::with_user_passphrase(Self::owned(passphrase));

        let mut output = Vec::new();
        let armored =
            age::armor::ArmoredWriter::wrap_output(&mut output, age::armor::Format::AsciiArmor)
                .map_err(|e| LoftError::Cipher {
                    reason: format!("Armor writer failed: {e}"),
                })?;

        let mut writer = encryptor
            .wrap_output(armored)
            .map_err(|e| LoftError::Cipher {
                reason: format!("Encryption stream failed: {e}"),
            })?;

        writer
            .write_all(plaintext)
            .map_err(|e| LoftError::Cipher {
                reason: format!("Write failed: {e}"),
            })?;

        writer
            .finish()
            .and_then(|armored| armored.finish())
            .map_err(|e| LoftError::Cipher {
                reason: format!("Encryption finish failed: {e}"),
            })?;

        Ok(output)
    }

    #[cfg(test)]
    fn decrypt(&self, ciphertext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>> {
        let identity = age::scrypt::Identity::new(Self::owned(passphrase));

        let decryptor = age::Decryptor::new(age::armor::ArmoredReader::new(ciphertext))
            .map_err(|e| LoftError::Cipher {
                reason: format!("Invalid encrypted file: {e}"),
            })?;

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| LoftError::Cipher {
                reason: format!("{e}"),
            })?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| LoftError::Cipher {
                reason: format!("Read decrypted data failed: {e}"),
            })?;

        Ok(plaintext)
    }

    fn extension(&self) -> &str {
        "age"
    }
}
