use crate::error::{CertError, Result};
use ring::{rand as ring_rand, signature};
use x509_parser::prelude::*;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// Key family of a device credential, detected from the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    EcdsaP256,
    Rsa,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::EcdsaP256 => f.write_str("ECC"),
            KeyAlgorithm::Rsa => f.write_str("RSA"),
        }
    }
}

/// Detect the key algorithm family from a PEM certificate.
pub fn detect_algorithm(cert_pem: &str) -> Result<KeyAlgorithm> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| CertError::InvalidCertificate(format!("PEM parse error: {}", e)))?;
    let (_, x509) = x509_parser::parse_x509_certificate(&pem.contents)
        .map_err(|e| CertError::InvalidCertificate(format!("X509 parse error: {}", e)))?;

    let oid = x509
        .tbs_certificate
        .subject_pki
        .algorithm
        .algorithm
        .to_id_string();
    match oid.as_str() {
        OID_EC_PUBLIC_KEY => Ok(KeyAlgorithm::EcdsaP256),
        OID_RSA_ENCRYPTION => Ok(KeyAlgorithm::Rsa),
        other => Err(CertError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Sign data with a PKCS#8 private key (ECDSA P-256 or RSA PKCS1v15,
/// SHA-256 either way). Tries ECDSA first, then RSA.
pub fn sign_bytes(priv_key_pem: &str, data: &[u8]) -> Result<Vec<u8>> {
    let der = decode_pem(priv_key_pem, "PRIVATE KEY")?;
    let rng = ring_rand::SystemRandom::new();

    if let Ok(key_pair) =
        signature::EcdsaKeyPair::from_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &der, &rng)
    {
        let sig = key_pair
            .sign(&rng, data)
            .map_err(|e| CertError::SigningFailed(e.to_string()))?;
        return Ok(sig.as_ref().to_vec());
    }

    if let Ok(key_pair) = signature::RsaKeyPair::from_pkcs8(&der) {
        let mut sig = vec![0; key_pair.public().modulus_len()];
        key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &rng, data, &mut sig)
            .map_err(|e| CertError::SigningFailed(e.to_string()))?;
        return Ok(sig);
    }

    Err(CertError::InvalidKey(
        "Unsupported or invalid private key format".into(),
    ))
}

/// Verify a detached signature against the public key of a PEM
/// certificate.
pub fn verify_bytes(cert_pem: &str, data: &[u8], sig: &[u8]) -> Result<()> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| CertError::InvalidCertificate(format!("PEM parse error: {}", e)))?;
    let (_, x509) = x509_parser::parse_x509_certificate(&pem.contents)
        .map_err(|e| CertError::InvalidCertificate(format!("X509 parse error: {}", e)))?;

    let spki = x509.tbs_certificate.subject_pki;
    let key_bytes = spki.subject_public_key.data;
    let oid = spki.algorithm.algorithm.to_id_string();

    let peer_public_key = match oid.as_str() {
        OID_EC_PUBLIC_KEY => {
            signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, key_bytes)
        }
        OID_RSA_ENCRYPTION => {
            signature::UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, key_bytes)
        }
        other => return Err(CertError::UnsupportedAlgorithm(other.to_string())),
    };

    peer_public_key
        .verify(data, sig)
        .map_err(|_| CertError::VerificationFailed("Signature does not match".into()))
}

fn decode_pem(pem_str: &str, tag: &str) -> Result<Vec<u8>> {
    let pems = ::pem::parse_many(pem_str)
        .map_err(|e| CertError::InvalidKey(format!("PEM parse error: {}", e)))?;

    for p in pems {
        if p.tag() == tag {
            return Ok(p.into_contents());
        }
    }

    Err(CertError::InvalidKey(format!("PEM tag '{}' not found", tag)))
}
