//! Errors raised by the Web Crypto shim

use boa_engine::{JsError, JsNativeError};
use thiserror::Error;

/// Errors that can occur while installing or calling `crypto.subtle`
#[derive(Error, Debug)]
pub enum WebCryptoError {
    #[error("UnsupportedFormat: key format '{0}' is not supported, only 'raw' keys can be imported")]
    UnsupportedFormat(String),

    #[error("UnsupportedAlgorithm: '{name}' is not supported, expected {expected}")]
    UnsupportedAlgorithm { name: String, expected: &'static str },

    #[error("InvalidAlgorithmShape: {0}")]
    InvalidAlgorithmShape(&'static str),

    #[error("InvalidKey: key must be a CryptoKey returned by crypto.subtle.importKey")]
    InvalidKey,

    #[error("MissingIV: algorithm.iv must be a non-empty ArrayBuffer or ArrayBufferView")]
    MissingIv,

    #[error("{0} must be an ArrayBuffer or ArrayBufferView")]
    NotBufferSource(&'static str),

    #[error("keyUsages must be an array of strings")]
    InvalidKeyUsages,

    #[error("ConfigurationError: {0}")]
    Configuration(String),

    /// Failure reported by the native primitive, message kept verbatim
    #[error("{0}")]
    Backend(String),

    #[error("EnvironmentError: {0}")]
    Environment(String),

    #[error(transparent)]
    Engine(#[from] JsError),
}

impl WebCryptoError {
    /// Configuration error for an install with only one of the two custom functions
    pub(crate) fn unpaired_functions() -> Self {
        Self::Configuration(
            "encryptionFunction and decryptionFunction must be provided together".to_string(),
        )
    }

    /// Configuration error for an install with neither custom functions nor a native primitive
    pub(crate) fn missing_native() -> Self {
        Self::Configuration(
            "missing dependency: no native AES module is available, \
             provide encryptionFunction and decryptionFunction instead"
                .to_string(),
        )
    }
}

impl From<WebCryptoError> for JsError {
    fn from(err: WebCryptoError) -> Self {
        match err {
            WebCryptoError::Engine(inner) => inner,
            WebCryptoError::InvalidAlgorithmShape(_)
            | WebCryptoError::InvalidKey
            | WebCryptoError::NotBufferSource(_)
            | WebCryptoError::InvalidKeyUsages => {
                JsNativeError::typ().with_message(err.to_string()).into()
            }
            _ => JsNativeError::error().with_message(err.to_string()).into(),
        }
    }
}

/// Result type for shim operations
pub type WebCryptoResult<T> = Result<T, WebCryptoError>;
