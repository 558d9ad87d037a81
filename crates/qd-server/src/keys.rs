//! Host identity
//!
//! The daemon presents an Ed25519 host key. By default a fresh key is
//! generated on every start; a persisted OpenSSH key can be configured
//! instead.

use std::path::Path;

use anyhow::{Context, Result};
use rand::{CryptoRng, RngCore};
use russh_keys::key::KeyPair;

/// Generate an Ed25519 host key from the given entropy source
pub fn generate_host_key<R>(rng: &mut R) -> KeyPair
where
    R: CryptoRng + RngCore,
{
    KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(rng))
}

/// Load the host key at `path`, or generate an ephemeral one when no path
/// is configured
pub fn load_or_generate_host_key<R>(path: Option<&Path>, rng: &mut R) -> Result<KeyPair>
where
    R: CryptoRng + RngCore,
{
    match path {
        Some(path) => {
            tracing::info!("Loading host key from {:?}", path);
            russh_keys::load_secret_key(path, None)
                .with_context(|| format!("Failed to load host key from {:?}", path))
        }
        None => {
            tracing::info!("Generating ephemeral Ed25519 host key");
            Ok(generate_host_key(rng))
        }
    }
}

/// SHA-256 fingerprint of the key's public half
pub fn fingerprint(key: &KeyPair) -> Result<String> {
    let public = key
        .clone_public_key()
        .context("Failed to derive public host key")?;
    Ok(public.fingerprint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_same_seed_same_key() {
        let a = generate_host_key(&mut StdRng::seed_from_u64(7));
        let b = generate_host_key(&mut StdRng::seed_from_u64(7));
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_different_seed_different_key() {
        let a = generate_host_key(&mut StdRng::seed_from_u64(1));
        let b = generate_host_key(&mut StdRng::seed_from_u64(2));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_no_path_generates() {
        let key = load_or_generate_host_key(None, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(matches!(key, KeyPair::Ed25519(_)));
    }

    #[test]
    fn test_missing_key_file_is_an_error() {
        let result = load_or_generate_host_key(
            Some(Path::new("/nonexistent/qdsshd/host_key")),
            &mut StdRng::seed_from_u64(3),
        );
        assert!(result.is_err());
    }
}
