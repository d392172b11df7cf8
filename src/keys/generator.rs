//! Signing key generation
//!
//! Generates the RSA-2048 key pair the CDN verifies signed URLs against,
//! using the `rsa` crate. The public key is derived from the private key,
//! never generated independently.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ProvisionError;

use super::PrivateKeyPem;

/// RSA modulus size the CDN's signed-URL scheme requires
pub const KEY_BITS: usize = 2048;

/// Generated signing key pair
pub struct GeneratedKeyPair {
    /// Private key, PKCS#8 PEM, write-once
    pub private_key_pem: PrivateKeyPem,
    /// Public key in SPKI PEM format, safe to share
    pub public_key_pem: String,
    /// SHA256 fingerprint of the public key DER
    pub fingerprint: String,
}

/// Generate an RSA-2048 key pair for signed-URL verification
pub fn generate_rsa_keypair() -> Result<GeneratedKeyPair, ProvisionError> {
    debug!(bits = KEY_BITS, "Generating signing key pair");

    let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
        .map_err(|e| ProvisionError::KeyGenerationFailure(format!("RSA generation: {e}")))?;

    // Derive the public half from the private key
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| {
            ProvisionError::KeyGenerationFailure(format!("Failed to encode private key: {e}"))
        })?
        .to_string();

    let public_key_pem = public_key.to_public_key_pem(LineEnding::LF).map_err(|e| {
        ProvisionError::KeyGenerationFailure(format!("Failed to encode public key: {e}"))
    })?;

    let public_key_der = public_key.to_public_key_der().map_err(|e| {
        ProvisionError::KeyGenerationFailure(format!("Failed to encode public key DER: {e}"))
    })?;
    let fingerprint = format!(
        "SHA256:{}",
        BASE64.encode(Sha256::digest(public_key_der.as_bytes()))
    );

    debug!(fingerprint = %fingerprint, "Key pair generated successfully");

    Ok(GeneratedKeyPair {
        private_key_pem: PrivateKeyPem::new(private_key_pem),
        public_key_pem,
        fingerprint,
    })
}

/// Sign a message with a PEM private key (PKCS#1 v1.5, SHA-256)
pub fn sign_sha256(private_key_pem: &str, message: &[u8]) -> Result<Vec<u8>, ProvisionError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| ProvisionError::KeyGenerationFailure(format!("Invalid private key: {e}")))?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    Ok(signing_key.sign(message).to_vec())
}

/// Verify a signature against a PEM public key (PKCS#1 v1.5, SHA-256)
pub fn verify_sha256(public_key_pem: &str, message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key)
        .verify(message, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pair_is_mathematically_paired() {
        let keypair = generate_rsa_keypair().unwrap();

        assert!(keypair.public_key_pem.contains("-----BEGIN PUBLIC KEY-----"));
        assert!(keypair.fingerprint.starts_with("SHA256:"));

        // The key pair must round-trip a signature: the public key the CDN
        // verifies with is derived from the private key in the secret store
        let nonce = b"signed-url-nonce";
        let signature = sign_sha256(keypair.private_key_pem.expose(), nonce).unwrap();
        assert!(verify_sha256(&keypair.public_key_pem, nonce, &signature));
        assert!(!verify_sha256(&keypair.public_key_pem, b"other message", &signature));
    }

    #[test]
    fn test_keypairs_are_unique() {
        let key1 = generate_rsa_keypair().unwrap();
        let key2 = generate_rsa_keypair().unwrap();
        assert_ne!(key1.fingerprint, key2.fingerprint);
        assert_ne!(key1.public_key_pem, key2.public_key_pem);
    }
}
