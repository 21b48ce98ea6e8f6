use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

pub type Result<T> = std::result::Result<T, CertError>;
