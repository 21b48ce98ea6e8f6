use crate::crypto;
use crate::error::{CertError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

/// Digest + detached signature over a canonical string, both base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDigest {
    /// Base64 SHA-256 of the canonical string's UTF-8 bytes.
    pub hash: String,
    /// Base64 device signature over the same bytes.
    pub signature: String,
}

/// How a stored digest/signature pair failed re-verification. The two
/// kinds are reported separately: a digest mismatch means the stored
/// fields no longer produce the stored hash, a signature failure means
/// the signature does not verify against the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    DigestMismatch,
    BadSignature(String),
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyFailure::DigestMismatch => {
                f.write_str("recalculated hash does not match stored hash")
            }
            VerifyFailure::BadSignature(e) => write!(f, "signature verification failed: {}", e),
        }
    }
}

/// Base64 SHA-256 digest of a canonical string. The same computation
/// `sign` performs, exposed so the auditor can rebuild a chain of
/// digests without touching key material.
pub fn digest_b64(canonical: &str) -> String {
    BASE64.encode(Sha256::digest(canonical.as_bytes()))
}

/// Signature engine with automatic algorithm detection.
///
/// Holds the device credential pair for the duration of one signing or
/// verification operation. The private key never leaves this type and
/// is never logged.
pub struct SignatureEngine {
    certificate_pem: String,
    private_key_pem: String,
    algorithm: crypto::KeyAlgorithm,
}

impl SignatureEngine {
    /// Build an engine from PEM credentials, validating the certificate
    /// up front so signing cannot fail late on a bad credential.
    pub fn new(certificate_pem: &str, private_key_pem: &str) -> Result<Self> {
        let algorithm = crypto::detect_algorithm(certificate_pem)?;
        Ok(Self {
            certificate_pem: certificate_pem.to_string(),
            private_key_pem: private_key_pem.to_string(),
            algorithm,
        })
    }

    pub fn algorithm(&self) -> crypto::KeyAlgorithm {
        self.algorithm
    }

    /// Hash and sign a canonical string.
    pub fn sign(&self, canonical: &str) -> Result<SignedDigest> {
        let data = canonical.as_bytes();
        let hash = BASE64.encode(Sha256::digest(data));
        let signature = BASE64.encode(crypto::sign_bytes(&self.private_key_pem, data)?);
        tracing::debug!(algo = %self.algorithm, hash = %hash, "signed canonical string");
        Ok(SignedDigest { hash, signature })
    }

    /// Re-verify a stored digest/signature pair against a recomputed
    /// canonical string. Used by the integrity auditor; the digest is
    /// always recomputed from the canonical string, never trusted from
    /// storage.
    pub fn verify(
        &self,
        canonical: &str,
        stored_hash_b64: &str,
        stored_sig_b64: &str,
    ) -> Result<std::result::Result<(), VerifyFailure>> {
        let data = canonical.as_bytes();
        let expected = Sha256::digest(data);

        let stored_hash = BASE64
            .decode(stored_hash_b64)
            .map_err(|e| CertError::VerificationFailed(format!("stored hash not base64: {}", e)))?;
        if stored_hash != expected.as_slice() {
            return Ok(Err(VerifyFailure::DigestMismatch));
        }

        let sig = BASE64.decode(stored_sig_b64).map_err(|e| {
            CertError::VerificationFailed(format!("stored signature not base64: {}", e))
        })?;
        match crypto::verify_bytes(&self.certificate_pem, data, &sig) {
            Ok(()) => Ok(Ok(())),
            Err(e) => Ok(Err(VerifyFailure::BadSignature(e.to_string()))),
        }
    }
}
