//! Cipher backends behind `crypto.subtle.encrypt` / `crypto.subtle.decrypt`
//!
//! Two implementations share one interface:
//! - [`NativeBackend`] marshals keys and IVs to hex and data to base64 and calls
//!   a [`NativeAes`] primitive.
//! - [`CustomBackend`] hands raw bytes to a pair of user supplied JS functions.
//!
//! Both validate their arguments the same way before doing any work.
//!
//! The backend is picked once by `install` and captured by the installed functions.

use boa_engine::{
    Context, JsArgs, JsResult, JsValue,
    object::builtins::{AlignedVec, JsArrayBuffer, JsFunction, JsUint8Array},
};
use boa_gc::{Finalize, Trace};
use std::rc::Rc;
use thiserror::Error;

use super::algorithm::{AlgorithmIdentifier, cbc_mode_for_key};
use super::crypto_key::CryptoKey;
use super::encoding::{base64_to_bytes, buffer_source_to_bytes, bytes_to_base64, bytes_to_hex};
use super::error::{WebCryptoError, WebCryptoResult};

/// Errors reported by a native AES primitive
#[derive(Error, Debug)]
pub enum AesError {
    #[error("Unsupported cipher mode: {0}")]
    UnsupportedMode(String),

    #[error("Invalid key length {actual} for {mode}, expected {expected}")]
    InvalidKeyLength {
        mode: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid IV length {0}, expected 16")]
    InvalidIvLength(usize),

    #[error("Invalid ciphertext length {0}, expected a non-zero multiple of 16")]
    InvalidCiphertextLength(usize),

    #[error("{0}")]
    Encoding(String),

    #[error("Decryption failed: invalid padding")]
    Padding,

    #[error("{0}")]
    Cipher(String),

    /// Anything else a third-party primitive wants to report
    #[error("{0}")]
    Other(String),
}

/// A native AES-CBC primitive speaking strings: base64 data, hex key and IV,
/// and a mode token such as `aes-128-cbc`. Returns base64.
pub trait NativeAes {
    fn encrypt(&self, data_base64: &str, key_hex: &str, iv_hex: &str, mode: &str)
    -> Result<String, AesError>;

    fn decrypt(&self, data_base64: &str, key_hex: &str, iv_hex: &str, mode: &str)
    -> Result<String, AesError>;
}

/// Direction of a cipher call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Encrypt,
    Decrypt,
}

/// The capability set `{ encrypt, decrypt }` a strategy provides.
///
/// `run` gets the raw `(algorithm, key, data)` arguments and returns either the
/// result buffer or a promise for it.
pub(crate) trait CipherBackend: Trace + Finalize + Clone + 'static {
    fn name(&self) -> &'static str;

    fn run(&self, direction: Direction, args: &[JsValue], context: &mut Context)
    -> JsResult<JsValue>;
}

/// Strategy backed by a native string-based AES primitive
#[derive(Clone, Trace, Finalize)]
pub(crate) struct NativeBackend {
    #[unsafe_ignore_trace]
    primitive: Rc<dyn NativeAes>,
}

/// Validated inputs of a cipher call
struct CipherRequest {
    key: CryptoKey,
    iv: Vec<u8>,
    data: Vec<u8>,
}

impl CipherRequest {
    /// Validation order: descriptor shape, algorithm name, key, IV, data
    fn parse(args: &[JsValue], context: &mut Context) -> WebCryptoResult<Self> {
        let algorithm_arg = args.get_or_undefined(0);
        if algorithm_arg.is_string() {
            return Err(WebCryptoError::InvalidAlgorithmShape(
                "algorithm must be an object with name and iv, a bare name cannot carry an IV",
            ));
        }

        let algorithm = AlgorithmIdentifier::from_js(algorithm_arg, context)?;
        if !algorithm.is_aes_cbc() {
            return Err(WebCryptoError::UnsupportedAlgorithm {
                name: algorithm.name().to_string(),
                expected: "AES-CBC",
            });
        }

        let key = CryptoKey::from_js(args.get_or_undefined(1)).ok_or(WebCryptoError::InvalidKey)?;
        let iv = algorithm.iv(context)?;
        let data = buffer_source_to_bytes(args.get_or_undefined(2), "data", context)?;

        Ok(Self { key, iv, data })
    }
}

impl NativeBackend {
    pub(crate) fn new(primitive: Rc<dyn NativeAes>) -> Self {
        Self { primitive }
    }

    fn call(&self, direction: Direction, args: &[JsValue], context: &mut Context) -> WebCryptoResult<JsValue> {
        let request = CipherRequest::parse(args, context)?;

        let mode = cbc_mode_for_key(request.key.raw_bytes().len());
        let key_hex = bytes_to_hex(request.key.raw_bytes());
        let iv_hex = bytes_to_hex(&request.iv);
        let data_base64 = bytes_to_base64(&request.data);

        let output = match direction {
            Direction::Encrypt => self.primitive.encrypt(&data_base64, &key_hex, &iv_hex, &mode),
            Direction::Decrypt => self.primitive.decrypt(&data_base64, &key_hex, &iv_hex, &mode),
        }
        .map_err(|e| WebCryptoError::Backend(e.to_string()))?;

        let bytes = base64_to_bytes(&output).map_err(WebCryptoError::Backend)?;
        let buffer = JsArrayBuffer::from_byte_block(AlignedVec::from_iter(0, bytes), context)?;
        Ok(buffer.into())
    }
}

impl CipherBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn run(&self, direction: Direction, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        self.call(direction, args, context).map_err(Into::into)
    }
}

/// Strategy backed by user supplied `encryptionFunction` / `decryptionFunction`
#[derive(Clone, Trace, Finalize)]
pub(crate) struct CustomBackend {
    encrypt: JsFunction,
    decrypt: JsFunction,
}

impl CustomBackend {
    pub(crate) fn new(encrypt: JsFunction, decrypt: JsFunction) -> Self {
        Self { encrypt, decrypt }
    }
}

impl CipherBackend for CustomBackend {
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Same validation as the native path, then the user function gets raw bytes
    fn run(&self, direction: Direction, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        let request = CipherRequest::parse(args, context)?;

        let raw_key = JsUint8Array::from_iter(request.key.raw_bytes().iter().copied(), context)?;
        let data = JsUint8Array::from_iter(request.data, context)?;

        let function = match direction {
            Direction::Encrypt => &self.encrypt,
            Direction::Decrypt => &self.decrypt,
        };
        function.call(
            &JsValue::undefined(),
            &[args.get_or_undefined(0).clone(), raw_key.into(), data.into()],
            context,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every call and answers with a fixed payload
    #[derive(Default)]
    pub(crate) struct RecordingAes {
        pub(crate) calls: RefCell<Vec<(Direction, String, String, String, String)>>,
    }

    impl NativeAes for RecordingAes {
        fn encrypt(&self, data: &str, key: &str, iv: &str, mode: &str) -> Result<String, AesError> {
            self.calls.borrow_mut().push((
                Direction::Encrypt,
                data.to_string(),
                key.to_string(),
                iv.to_string(),
                mode.to_string(),
            ));
            Ok(bytes_to_base64(b"ciphertext"))
        }

        fn decrypt(&self, data: &str, key: &str, iv: &str, mode: &str) -> Result<String, AesError> {
            self.calls.borrow_mut().push((
                Direction::Decrypt,
                data.to_string(),
                key.to_string(),
                iv.to_string(),
                mode.to_string(),
            ));
            Err(AesError::Other("native decrypt refused".to_string()))
        }
    }

    #[test]
    fn test_aes_error_messages() {
        assert_eq!(
            AesError::InvalidKeyLength {
                mode: "aes-256-cbc".to_string(),
                expected: 32,
                actual: 16,
            }
            .to_string(),
            "Invalid key length 16 for aes-256-cbc, expected 32"
        );
        assert_eq!(
            AesError::Padding.to_string(),
            "Decryption failed: invalid padding"
        );
    }

    #[test]
    fn test_backend_names() {
        let native = NativeBackend::new(Rc::new(RecordingAes::default()));
        assert_eq!(native.name(), "native");
    }
}
