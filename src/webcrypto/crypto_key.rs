//! Opaque `CryptoKey` handle returned by `crypto.subtle.importKey`

use boa_engine::{
    Context, JsData, JsObject, JsResult, JsValue, js_string,
    object::builtins::JsArray,
};
use boa_gc::{Finalize, Trace};
use std::{fmt, rc::Rc};

/// Key material and metadata captured at import time
struct KeyMaterial {
    raw: Vec<u8>,
    algorithm: String,
    extractable: bool,
    usages: Vec<String>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("raw", &format_args!("[{} bytes]", self.raw.len()))
            .field("algorithm", &self.algorithm)
            .field("extractable", &self.extractable)
            .field("usages", &self.usages)
            .finish()
    }
}

/// An imported secret key.
///
/// Only `importKey` creates these. `encrypt`/`decrypt` recognize a key by its
/// native data, so a plain object with the same properties is not a key.
#[derive(Debug, Clone, Trace, Finalize, JsData)]
pub struct CryptoKey {
    #[unsafe_ignore_trace]
    material: Rc<KeyMaterial>,
}

impl CryptoKey {
    pub(crate) fn new(raw: Vec<u8>, algorithm: String, extractable: bool, usages: Vec<String>) -> Self {
        Self {
            material: Rc::new(KeyMaterial {
                raw,
                algorithm,
                extractable,
                usages,
            }),
        }
    }

    /// Look up the key behind a JS value, if it is one
    pub(crate) fn from_js(value: &JsValue) -> Option<Self> {
        let obj = value.as_object()?;
        let key = obj.downcast_ref::<CryptoKey>()?.clone();
        Some(key)
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.material.raw
    }

    /// Algorithm name as given to `importKey`
    pub fn algorithm(&self) -> &str {
        &self.material.algorithm
    }

    pub fn extractable(&self) -> bool {
        self.material.extractable
    }

    pub fn usages(&self) -> &[String] {
        &self.material.usages
    }

    /// Key size in bits
    pub fn length(&self) -> usize {
        self.material.raw.len() * 8
    }

    /// Wrap the key in a JS object shaped like a Web Crypto `CryptoKey`
    pub(crate) fn into_js_object(self, context: &mut Context) -> JsResult<JsObject> {
        let algorithm = JsObject::with_object_proto(context.intrinsics());
        algorithm.set(
            js_string!("name"),
            JsValue::from(js_string!(self.algorithm())),
            false,
            context,
        )?;
        algorithm.set(
            js_string!("length"),
            JsValue::from(self.length() as u32),
            false,
            context,
        )?;

        let usages = JsArray::from_iter(
            self.usages()
                .iter()
                .map(|usage| JsValue::from(js_string!(usage.as_str()))),
            context,
        );
        let extractable = self.extractable();

        let prototype = context.intrinsics().constructors().object().prototype();
        let key_obj = JsObject::from_proto_and_data(prototype, self);

        key_obj.set(js_string!("type"), js_string!("secret"), false, context)?;
        key_obj.set(js_string!("algorithm"), algorithm, false, context)?;
        key_obj.set(js_string!("extractable"), extractable, false, context)?;
        key_obj.set(js_string!("usages"), usages, false, context)?;

        Ok(key_obj)
    }
}
