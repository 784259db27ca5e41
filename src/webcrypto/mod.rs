//! Web Crypto polyfill - `crypto.subtle` AES-CBC subset
//!
//! Installs onto the global `crypto.subtle` namespace:
//! - crypto.subtle.importKey('raw', keyData, algorithm, extractable?, usages?)
//! - crypto.subtle.encrypt({ name: 'AES-CBC', iv }, key, data)
//! - crypto.subtle.decrypt({ name: 'AES-CBC', iv }, key, data)
//! - TextDecoder, only when the host does not already provide one
//!
//! Encryption is delegated either to a native AES primitive ([`NativeAes`],
//! [`RustCryptoAes`] by default) or to a pair of JS functions supplied at install
//! time. The choice is made once per `install` call.

mod algorithm;
mod backend;
mod crypto_key;
mod encoding;
mod error;
#[cfg(feature = "native-aes")]
mod native;

use boa_engine::{
    Context, JsArgs, JsError, JsObject, JsResult, JsValue, NativeFunction, js_string,
    object::builtins::{JsArray, JsFunction, JsPromise},
    property::PropertyKey,
};
use boa_runtime::text::TextDecoder;
use std::{fmt, rc::Rc};

pub use backend::{AesError, NativeAes};
pub use crypto_key::CryptoKey;
pub use error::{WebCryptoError, WebCryptoResult};
#[cfg(feature = "native-aes")]
pub use native::RustCryptoAes;

use algorithm::AlgorithmIdentifier;
use backend::{CipherBackend, CustomBackend, Direction, NativeBackend};
use encoding::buffer_source_to_bytes;

/// Name of the global installer function registered by [`register_installer`]
pub const INSTALLER_NAME: &str = "polyfillWebCrypto";

/// Options for [`install`]
///
/// `encryption_function` and `decryption_function` must be given together.
/// When both are absent the `native` primitive is used.
#[derive(Clone)]
pub struct InstallOptions {
    /// `(algorithm, rawKeyBytes, data) => Promise<buffer>` used by `encrypt`
    pub encryption_function: Option<JsFunction>,
    /// `(algorithm, rawKeyBytes, data) => Promise<buffer>` used by `decrypt`
    pub decryption_function: Option<JsFunction>,
    /// Native AES primitive, `RustCryptoAes` when the `native-aes` feature is on
    pub native: Option<Rc<dyn NativeAes>>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            encryption_function: None,
            decryption_function: None,
            native: default_native(),
        }
    }
}

impl fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallOptions")
            .field("encryption_function", &self.encryption_function.is_some())
            .field("decryption_function", &self.decryption_function.is_some())
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl InstallOptions {
    /// Options with both custom functions set
    pub fn with_functions(encrypt: JsFunction, decrypt: JsFunction) -> Self {
        Self {
            encryption_function: Some(encrypt),
            decryption_function: Some(decrypt),
            ..Default::default()
        }
    }

    /// Options using the given native primitive
    pub fn with_native(native: Rc<dyn NativeAes>) -> Self {
        Self {
            encryption_function: None,
            decryption_function: None,
            native: Some(native),
        }
    }

    /// Read `{ encryptionFunction?, decryptionFunction? }` from a JS value.
    ///
    /// `undefined` and `null` give the default options. Present but
    /// non-callable functions are a configuration error.
    pub fn from_js(value: &JsValue, native: Option<Rc<dyn NativeAes>>, context: &mut Context) -> WebCryptoResult<Self> {
        let mut options = Self {
            encryption_function: None,
            decryption_function: None,
            native,
        };
        if value.is_null_or_undefined() {
            return Ok(options);
        }

        let obj = value.as_object().ok_or_else(|| {
            WebCryptoError::Configuration("options must be an object".to_string())
        })?;
        options.encryption_function = read_function(&obj, "encryptionFunction", context)?;
        options.decryption_function = read_function(&obj, "decryptionFunction", context)?;
        Ok(options)
    }
}

fn read_function(obj: &JsObject, name: &str, context: &mut Context) -> WebCryptoResult<Option<JsFunction>> {
    let value = obj.get(js_string!(name), context)?;
    if value.is_null_or_undefined() {
        return Ok(None);
    }
    value
        .as_object()
        .and_then(|o| JsFunction::from_object(o.clone()))
        .map(Some)
        .ok_or_else(|| WebCryptoError::Configuration(format!("{} must be a function", name)))
}

#[cfg(feature = "native-aes")]
fn default_native() -> Option<Rc<dyn NativeAes>> {
    Some(Rc::new(RustCryptoAes))
}

#[cfg(not(feature = "native-aes"))]
fn default_native() -> Option<Rc<dyn NativeAes>> {
    None
}

/// Strategy picked by [`select_strategy`]
enum Strategy {
    Native(NativeBackend),
    Custom(CustomBackend),
}

/// Custom functions win, a lone function is an error, then the native primitive
fn select_strategy(options: InstallOptions) -> WebCryptoResult<Strategy> {
    match (options.encryption_function, options.decryption_function) {
        (Some(encrypt), Some(decrypt)) => Ok(Strategy::Custom(CustomBackend::new(encrypt, decrypt))),
        (Some(_), None) | (None, Some(_)) => Err(WebCryptoError::unpaired_functions()),
        (None, None) => options
            .native
            .map(|native| Strategy::Native(NativeBackend::new(native)))
            .ok_or_else(WebCryptoError::missing_native),
    }
}

/// Install `importKey`, `encrypt` and `decrypt` on `crypto.subtle`.
///
/// Safe to call repeatedly: each call re-binds the three functions and leaves
/// every other property of `crypto` and `crypto.subtle` alone. Configuration
/// and environment errors are returned before anything is modified.
pub fn install(context: &mut Context, options: InstallOptions) -> WebCryptoResult<()> {
    let strategy = select_strategy(options)?;
    check_writable_targets(context)?;

    let global = context.global_object();
    let crypto = ensure_namespace(&global, "crypto", context)?;
    let subtle = ensure_namespace(&crypto, "subtle", context)?;

    let import_key_fn = NativeFunction::from_fn_ptr(subtle_import_key);
    set_slot(&subtle, "importKey", import_key_fn, context)?;

    let backend_name = match strategy {
        Strategy::Native(backend) => publish_cipher_functions(backend, &subtle, context)?,
        Strategy::Custom(backend) => publish_cipher_functions(backend, &subtle, context)?,
    };

    install_text_decoder(context);
    tracing::debug!(backend = backend_name, "crypto.subtle polyfill installed");

    Ok(())
}

/// Fail with `Environment` before any write if one of the properties
/// `install` assigns cannot be assigned
fn check_writable_targets(context: &mut Context) -> WebCryptoResult<()> {
    let global = context.global_object();
    let Some(crypto) = global.get(js_string!("crypto"), context)?.as_object() else {
        return ensure_writable(&global, "crypto", "crypto", context);
    };
    let Some(subtle) = crypto.get(js_string!("subtle"), context)?.as_object() else {
        return ensure_writable(&crypto, "subtle", "crypto.subtle", context);
    };
    for (name, path) in [
        ("importKey", "crypto.subtle.importKey"),
        ("encrypt", "crypto.subtle.encrypt"),
        ("decrypt", "crypto.subtle.decrypt"),
    ] {
        ensure_writable(&subtle, name, path, context)?;
    }
    Ok(())
}

/// Whether `owner[name] = value` would succeed, judged from the own property
/// or, when there is none, from the object's extensibility
fn ensure_writable(
    owner: &JsObject,
    name: &'static str,
    path: &'static str,
    context: &mut Context,
) -> WebCryptoResult<()> {
    let own = owner
        .borrow()
        .properties()
        .get(&PropertyKey::from(js_string!(name)));
    let writable = match own {
        Some(desc) if desc.is_accessor_descriptor() => {
            desc.set().is_some_and(|setter| !setter.is_undefined())
        }
        Some(desc) => desc.writable().unwrap_or(false),
        None => owner.is_extensible(context)?,
    };
    if !writable {
        return Err(WebCryptoError::Environment(format!("{} is read-only", path)));
    }
    Ok(())
}

/// Get `owner[name]` if it is an object, otherwise put a fresh object there
fn ensure_namespace(owner: &JsObject, name: &'static str, context: &mut Context) -> WebCryptoResult<JsObject> {
    let existing = owner.get(js_string!(name), context)?;
    if let Some(obj) = existing.as_object() {
        return Ok(obj);
    }

    let namespace = JsObject::with_object_proto(context.intrinsics());
    let replaced = owner
        .set(js_string!(name), namespace.clone(), false, context)
        .unwrap_or(false);
    if !replaced {
        return Err(WebCryptoError::Environment(format!(
            "cannot create the '{}' namespace",
            name
        )));
    }

    tracing::debug!(namespace = name, "created missing namespace");
    Ok(namespace)
}

/// Assign `owner[name] = function`, failing if the property is read-only
fn set_slot(
    owner: &JsObject,
    name: &'static str,
    function: NativeFunction,
    context: &mut Context,
) -> WebCryptoResult<()> {
    let function = function.to_js_function(context.realm());
    if !owner.set(js_string!(name), function, false, context)? {
        return Err(WebCryptoError::Environment(format!(
            "crypto.subtle.{} is read-only",
            name
        )));
    }
    Ok(())
}

/// Provide boa_runtime's `TextDecoder` unless the host already has one.
/// Only the decoder class is registered, a host `TextEncoder` is never touched.
fn install_text_decoder(context: &mut Context) {
    match register_text_decoder(context) {
        Ok(true) => tracing::debug!("installed TextDecoder"),
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "TextDecoder fallback not installed"),
    }
}

fn register_text_decoder(context: &mut Context) -> JsResult<bool> {
    let global = context.global_object();
    if global.has_property(js_string!("TextDecoder"), context)? {
        return Ok(false);
    }

    // A previous install registered the class but the global was deleted since
    match context.get_global_class::<TextDecoder>() {
        Some(class) => {
            global.set(js_string!("TextDecoder"), class.constructor(), true, context)?;
        }
        None => context.register_global_class::<TextDecoder>()?,
    }
    Ok(true)
}

/// Bind `encrypt` / `decrypt` for the chosen backend on `subtle`
fn publish_cipher_functions<B: CipherBackend>(
    backend: B,
    subtle: &JsObject,
    context: &mut Context,
) -> WebCryptoResult<&'static str> {
    let name = backend.name();

    let encrypt_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, backend: &B, context| {
            let result = backend.run(Direction::Encrypt, args, context);
            settle(result, context)
        },
        backend.clone(),
    );
    let decrypt_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, backend: &B, context| {
            let result = backend.run(Direction::Decrypt, args, context);
            settle(result, context)
        },
        backend,
    );

    set_slot(subtle, "encrypt", encrypt_fn, context)?;
    set_slot(subtle, "decrypt", decrypt_fn, context)?;

    Ok(name)
}

/// Turn an operation result into a promise.
///
/// Errors become an already-rejected promise carrying the thrown value as is.
/// A promise result is adopted, so the returned promise settles with it.
fn settle(result: JsResult<JsValue>, context: &mut Context) -> JsResult<JsValue> {
    let (promise, resolvers) = JsPromise::new_pending(context);
    match result {
        Ok(value) => {
            resolvers
                .resolve
                .call(&JsValue::undefined(), &[value], context)?;
        }
        Err(err) => {
            let reason = err.to_opaque(context);
            resolvers
                .reject
                .call(&JsValue::undefined(), &[reason], context)?;
        }
    }
    Ok(promise.into())
}

/// crypto.subtle.importKey(format, keyData, algorithm, extractable, usages)
fn subtle_import_key(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let result = import_key(args, context)
        .map_err(JsError::from)
        .and_then(|key| key.into_js_object(context))
        .map(JsValue::from);
    settle(result, context)
}

fn import_key(args: &[JsValue], context: &mut Context) -> WebCryptoResult<CryptoKey> {
    let format = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    if format != "raw" {
        return Err(WebCryptoError::UnsupportedFormat(format));
    }

    let algorithm = AlgorithmIdentifier::from_js(args.get_or_undefined(2), context)?;
    if !algorithm.is_aes() {
        return Err(WebCryptoError::UnsupportedAlgorithm {
            name: algorithm.name().to_string(),
            expected: "an AES algorithm",
        });
    }

    let raw = buffer_source_to_bytes(args.get_or_undefined(1), "keyData", context)?;
    let extractable = args.get_or_undefined(3).to_boolean();
    let usages = read_usages(args.get_or_undefined(4), context)?;

    Ok(CryptoKey::new(
        raw,
        algorithm.name().to_string(),
        extractable,
        usages,
    ))
}

fn read_usages(value: &JsValue, context: &mut Context) -> WebCryptoResult<Vec<String>> {
    if value.is_undefined() {
        return Ok(Vec::new());
    }

    let array = value
        .as_object()
        .and_then(|o| JsArray::from_object(o.clone()).ok())
        .ok_or(WebCryptoError::InvalidKeyUsages)?;

    let len = array.length(context)?;
    let mut usages = Vec::with_capacity(len as usize);
    for i in 0..len {
        let usage = array.get(i, context)?;
        usages.push(usage.to_string(context)?.to_std_string_escaped());
    }
    Ok(usages)
}

/// Register `globalThis.polyfillWebCrypto(options?)` so scripts can install the
/// polyfill themselves. `native` is the primitive used when no functions are given.
pub fn register_installer(context: &mut Context, native: Option<Rc<dyn NativeAes>>) -> JsResult<()> {
    let installer = InstallerCaptures { native };
    let install_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &InstallerCaptures, context| {
            let options = InstallOptions::from_js(
                args.get_or_undefined(0),
                captures.native.clone(),
                context,
            )?;
            install(context, options)?;
            Ok(JsValue::undefined())
        },
        installer,
    );

    context.global_object().set(
        js_string!(INSTALLER_NAME),
        install_fn.to_js_function(context.realm()),
        false,
        context,
    )?;
    Ok(())
}

#[derive(boa_gc::Trace, boa_gc::Finalize)]
struct InstallerCaptures {
    #[unsafe_ignore_trace]
    native: Option<Rc<dyn NativeAes>>,
}
