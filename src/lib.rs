//! webcrypto-shim - Web Crypto `crypto.subtle` AES-CBC polyfill for the Boa JS engine
//!
//! Provides:
//! - `crypto.subtle.importKey` for raw AES keys
//! - `crypto.subtle.encrypt` / `crypto.subtle.decrypt` for AES-CBC
//! - A native AES primitive built on RustCrypto, or user supplied JS functions
//! - A small [`Runtime`] to evaluate scripts against the polyfill

pub mod runtime;
pub mod webcrypto;

// Re-export commonly used types
pub use runtime::{Runtime, RuntimeConfig, RuntimeError, RuntimeResult};
#[cfg(feature = "native-aes")]
pub use webcrypto::RustCryptoAes;
pub use webcrypto::{
    AesError, CryptoKey, InstallOptions, NativeAes, WebCryptoError, WebCryptoResult, install,
    register_installer,
};
