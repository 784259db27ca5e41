//! Conversions between the byte buffers of the Web Crypto surface and the
//! hex/base64 strings the native AES primitive works with.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use boa_engine::{
    Context, JsValue,
    object::builtins::{JsArrayBuffer, JsDataView, JsTypedArray},
};

use super::error::{WebCryptoError, WebCryptoResult};

/// Lowercase hex, two digits per byte
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[cfg(feature = "native-aes")]
pub(crate) fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    hex::decode(hex).map_err(|e| format!("Invalid hex string: {}", e))
}

/// Standard alphabet, padded, no line wrapping
pub(crate) fn bytes_to_base64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub(crate) fn base64_to_bytes(base64: &str) -> Result<Vec<u8>, String> {
    BASE64_STANDARD
        .decode(base64)
        .map_err(|e| format!("Invalid base64 string: {}", e))
}

/// Copy the bytes addressed by a BufferSource (ArrayBuffer, typed array or DataView).
///
/// Views only contribute `byteOffset .. byteOffset + byteLength` of their
/// underlying buffer. `what` names the argument in the error message.
pub(crate) fn buffer_source_to_bytes(
    value: &JsValue,
    what: &'static str,
    context: &mut Context,
) -> WebCryptoResult<Vec<u8>> {
    let obj = value
        .as_object()
        .ok_or(WebCryptoError::NotBufferSource(what))?
        .clone();

    if let Ok(buffer) = JsArrayBuffer::from_object(obj.clone()) {
        let data = buffer
            .data()
            .ok_or(WebCryptoError::NotBufferSource(what))?;
        return Ok(data.to_vec());
    }

    let (buffer, offset, length) = if let Ok(view) = JsTypedArray::from_object(obj.clone()) {
        (
            view.buffer(context)?,
            view.byte_offset(context)? as usize,
            view.byte_length(context)? as usize,
        )
    } else if let Ok(view) = JsDataView::from_object(obj) {
        (
            view.buffer(context)?,
            view.byte_offset(context)? as usize,
            view.byte_length(context)? as usize,
        )
    } else {
        return Err(WebCryptoError::NotBufferSource(what));
    };

    let buffer = buffer
        .as_object()
        .and_then(|o| JsArrayBuffer::from_object(o.clone()).ok())
        .ok_or(WebCryptoError::NotBufferSource(what))?;
    let data = buffer
        .data()
        .ok_or(WebCryptoError::NotBufferSource(what))?;

    data.get(offset..offset + length)
        .map(<[u8]>::to_vec)
        .ok_or(WebCryptoError::NotBufferSource(what))
}
