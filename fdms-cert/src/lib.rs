//! Device signing for the fiscal protocol
//!
//! Computes the SHA-256 digest and detached signature over a canonical
//! string with a device's private key, auto-detecting the key family
//! (ECDSA P-256 or RSA) from the device certificate. Verification is
//! used by the integrity auditor only.

mod crypto;
mod engine;
mod error;

pub use crypto::{detect_algorithm, sign_bytes, verify_bytes, KeyAlgorithm};
pub use engine::{digest_b64, SignatureEngine, SignedDigest, VerifyFailure};
pub use error::{CertError, Result};
