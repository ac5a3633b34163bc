pub mod age_artifact_cipher;
