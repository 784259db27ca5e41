//! AlgorithmIdentifier parsing and cipher mode derivation

use boa_engine::{Context, JsValue, js_string};

use super::encoding::buffer_source_to_bytes;
use super::error::{WebCryptoError, WebCryptoResult};

/// An `AlgorithmIdentifier` as passed to `crypto.subtle`: a bare name or a
/// `{ name, iv }` dictionary.
#[derive(Debug, Clone)]
pub(crate) enum AlgorithmIdentifier {
    Name(String),
    Descriptor {
        name: String,
        /// Raw `iv` property. Its buffer conversion waits until the key is checked
        iv: JsValue,
    },
}

impl AlgorithmIdentifier {
    pub(crate) fn from_js(value: &JsValue, context: &mut Context) -> WebCryptoResult<Self> {
        if value.is_string() {
            let name = value.to_string(context)?.to_std_string_escaped();
            return Ok(Self::Name(name));
        }

        let obj = value.as_object().ok_or(WebCryptoError::InvalidAlgorithmShape(
            "algorithm must be a string or an object with a name property",
        ))?;

        let name = obj.get(js_string!("name"), context)?;
        let name = if name.is_undefined() {
            String::new()
        } else {
            name.to_string(context)?.to_std_string_escaped()
        };
        let iv = obj.get(js_string!("iv"), context)?;

        Ok(Self::Descriptor { name, iv })
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Descriptor { name, .. } => name,
        }
    }

    /// Any AES variant, the check `importKey` applies
    pub(crate) fn is_aes(&self) -> bool {
        self.name().to_ascii_lowercase().contains("aes")
    }

    pub(crate) fn is_aes_cbc(&self) -> bool {
        self.name().to_ascii_lowercase().contains("aes-cbc")
    }

    /// Bytes of `algorithm.iv`. Absent, empty, or non-buffer values all count as missing.
    pub(crate) fn iv(&self, context: &mut Context) -> WebCryptoResult<Vec<u8>> {
        let Self::Descriptor { iv, .. } = self else {
            return Err(WebCryptoError::MissingIv);
        };
        match buffer_source_to_bytes(iv, "algorithm.iv", context) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) | Err(WebCryptoError::NotBufferSource(_)) => Err(WebCryptoError::MissingIv),
            Err(e) => Err(e),
        }
    }
}

/// Mode token understood by the native primitive, e.g. `aes-256-cbc` for a 32 byte key
pub(crate) fn cbc_mode_for_key(key_len: usize) -> String {
    format!("aes-{}-cbc", key_len * 8)
}
