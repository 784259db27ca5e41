//! JavaScript runtime powered by Boa engine
//!
//! A small host around a Boa [`Context`] with the Web Crypto polyfill wired in.
//!
//! Features provided:
//! - Console API, routed to `tracing` under the `console` target
//! - `crypto.subtle` importKey / encrypt / decrypt (AES-CBC)
//! - `polyfillWebCrypto(options?)` for scripts that install it themselves
//! - Promise settling for async results

use boa_engine::{
    Context, JsResult, JsValue, Source,
    builtins::promise::PromiseState,
    context::ContextBuilder,
    object::builtins::JsPromise,
};
use boa_gc::{Finalize, Trace};
use boa_runtime::{ConsoleState, Logger, extensions::ConsoleExtension, register_extensions};
use thiserror::Error;

use crate::webcrypto::{self, InstallOptions, WebCryptoError};

/// Errors that can occur during runtime execution
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Promise rejected: {0}")]
    Rejected(String),

    #[error("Promise still pending after all jobs ran")]
    Pending,

    #[error(transparent)]
    WebCrypto(#[from] WebCryptoError),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Console logger that forwards to `tracing`
#[derive(Debug, Clone, Default, Trace, Finalize)]
pub struct ShimLogger;

impl Logger for ShimLogger {
    fn log(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::info!(target: "console", "{}", msg);
        Ok(())
    }

    fn info(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::info!(target: "console", "{}", msg);
        Ok(())
    }

    fn warn(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::warn!(target: "console", "{}", msg);
        Ok(())
    }

    fn error(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::error!(target: "console", "{}", msg);
        Ok(())
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Install `crypto.subtle` with default options when the runtime is built.
    /// Skipped when no native primitive is compiled in.
    pub install_webcrypto: bool,
    /// Expose the global `polyfillWebCrypto` installer
    pub expose_installer: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            install_webcrypto: true,
            expose_installer: true,
        }
    }
}

impl RuntimeConfig {
    /// A bare context: console only, nothing crypto related installed
    pub fn bare() -> Self {
        Self {
            install_webcrypto: false,
            expose_installer: false,
        }
    }
}

/// A Boa context with the polyfill available
pub struct Runtime {
    context: Context,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> RuntimeResult<Self> {
        let mut context = ContextBuilder::default()
            .build()
            .map_err(|e| RuntimeError::JsError(e.to_string()))?;

        register_extensions((ConsoleExtension(ShimLogger),), None, &mut context)
            .map_err(|e| RuntimeError::JsError(e.to_string()))?;

        let defaults = InstallOptions::default();
        if config.expose_installer {
            webcrypto::register_installer(&mut context, defaults.native.clone())
                .map_err(|e| RuntimeError::JsError(e.to_string()))?;
        }
        if config.install_webcrypto {
            if defaults.native.is_some() {
                webcrypto::install(&mut context, defaults)?;
            } else {
                tracing::warn!("no native AES primitive, crypto.subtle left for polyfillWebCrypto");
            }
        }

        tracing::debug!(?config, "runtime ready");
        Ok(Self { context })
    }

    /// (Re)install the polyfill with explicit options
    pub fn install(&mut self, options: InstallOptions) -> RuntimeResult<()> {
        webcrypto::install(&mut self.context, options)?;
        Ok(())
    }

    /// Evaluate a script and return its completion value
    pub fn eval(&mut self, code: &str) -> RuntimeResult<JsValue> {
        let result = self.context.eval(Source::from_bytes(code));
        self.context
            .run_jobs()
            .map_err(|e| RuntimeError::JsError(e.to_string()))?;
        result.map_err(|e| RuntimeError::JsError(e.to_string()))
    }

    /// Settle `value` if it is a promise, otherwise return it as is
    pub fn resolve(&mut self, value: JsValue) -> RuntimeResult<JsValue> {
        let Some(promise) = value
            .as_object()
            .and_then(|obj| JsPromise::from_object(obj.clone()).ok())
        else {
            return Ok(value);
        };

        self.context
            .run_jobs()
            .map_err(|e| RuntimeError::JsError(e.to_string()))?;

        match promise.state() {
            PromiseState::Fulfilled(value) => Ok(value),
            PromiseState::Rejected(reason) => Err(RuntimeError::Rejected(self.value_to_string(&reason))),
            PromiseState::Pending => Err(RuntimeError::Pending),
        }
    }

    /// Evaluate a script and settle the promise it produces
    pub fn eval_async(&mut self, code: &str) -> RuntimeResult<JsValue> {
        let value = self.eval(code)?;
        self.resolve(value)
    }

    /// Get mutable reference to the underlying context
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Convert a JsValue to a displayable string
    pub fn value_to_string(&mut self, value: &JsValue) -> String {
        value
            .to_string(&mut self.context)
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_else(|_| "[error converting value]".to_string())
    }
}
