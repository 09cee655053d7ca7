//! Method dispatch and the invocation lifecycle.
//!
//! An application wires its state type and handlers into an [`App`]
//! through [`AppBuilder`]; the builder cross-checks every registration
//! against the ABI manifest so the dispatch table and the manifest can
//! never drift apart. At run time [`App::run`] drives one invocation:
//! read the input register, decode arguments against the manifest, route
//! to the handler, persist the post-state, flush the delta, and write
//! the return value — or translate any failure into a host panic.

use core::fmt;
use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use meld_wasm_abi::codec;
use meld_wasm_abi::schema::{Manifest, Method, TypeRef};
use meld_wasm_abi::validate::{validate_manifest, ValidationError};
use meld_wasm_abi::value::AbiValue;
use meld_wasm_abi::{DecodeError, EncodeError};

use crate::{delta, env, state};

/// How a method participates in the state lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MethodKind {
    /// Runs exactly once, producing the initial state.
    Init,
    /// Read-only: neither persists state nor commits a delta.
    View,
    /// Mutating (the default): persists state and commits the delta.
    Call,
}

/// A domain-level failure surfaced by a method body.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct MethodError {
    pub kind: String,
    pub message: String,
}

impl MethodError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A failure while building an [`App`] from its parts.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum AppDefinitionError {
    #[error(transparent)]
    Manifest(#[from] ValidationError),
    #[error("method `{0}` is not declared in the manifest")]
    UndeclaredMethod(String),
    #[error("method `{0}`'s registered kind does not match the manifest")]
    KindMismatch(String),
    #[error("method `{0}` is registered twice")]
    DuplicateRegistration(String),
    #[error("manifest method `{0}` has no registered handler")]
    MissingHandler(String),
}

/// A failure inside one invocation. All of these are fatal: the
/// dispatcher reports them through `env::panic_str` and the host rolls
/// the invocation back.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("context is already initialized")]
    AlreadyInitialized,
    #[error("context is not initialized")]
    NotInitialized,
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("invalid arguments for `{method}`: {source}")]
    InvalidArguments {
        method: String,
        source: DecodeError,
    },
    #[error("root state is corrupted: {0}")]
    CorruptState(String),
    #[error("return value of `{method}` does not match its declared type: {source}")]
    InvalidReturn {
        method: String,
        source: EncodeError,
    },
    #[error("method `{method}` declares a return type but returned nothing")]
    MissingReturn { method: String },
    #[error(transparent)]
    Host(#[from] env::HostError),
    #[error(transparent)]
    Application(#[from] MethodError),
}

type InitFn<S> = Box<dyn Fn(AbiValue) -> Result<S, MethodError>>;
type ViewFn<S> = Box<dyn Fn(&S, AbiValue) -> Result<Option<AbiValue>, MethodError>>;
type CallFn<S> = Box<dyn Fn(&mut S, AbiValue) -> Result<Option<AbiValue>, MethodError>>;

enum Handler<S> {
    Init(InitFn<S>),
    View(ViewFn<S>),
    Call(CallFn<S>),
}

impl<S> Handler<S> {
    const fn kind(&self) -> MethodKind {
        match self {
            Self::Init(_) => MethodKind::Init,
            Self::View(_) => MethodKind::View,
            Self::Call(_) => MethodKind::Call,
        }
    }
}

/// Builder for an [`App`]'s dispatch table.
pub struct AppBuilder<S> {
    manifest: Manifest,
    handlers: BTreeMap<String, Handler<S>>,
    duplicate: Option<String>,
}

impl<S> AppBuilder<S> {
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            handlers: BTreeMap::new(),
            duplicate: None,
        }
    }

    fn register(mut self, name: &str, handler: Handler<S>) -> Self {
        if self.handlers.insert(name.to_owned(), handler).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_owned());
        }
        self
    }

    /// Registers the init method, producing the initial state.
    #[must_use]
    pub fn init(
        self,
        name: &str,
        f: impl Fn(AbiValue) -> Result<S, MethodError> + 'static,
    ) -> Self {
        self.register(name, Handler::Init(Box::new(f)))
    }

    /// Registers a read-only method.
    #[must_use]
    pub fn view(
        self,
        name: &str,
        f: impl Fn(&S, AbiValue) -> Result<Option<AbiValue>, MethodError> + 'static,
    ) -> Self {
        self.register(name, Handler::View(Box::new(f)))
    }

    /// Registers a mutating method.
    #[must_use]
    pub fn call(
        self,
        name: &str,
        f: impl Fn(&mut S, AbiValue) -> Result<Option<AbiValue>, MethodError> + 'static,
    ) -> Self {
        self.register(name, Handler::Call(Box::new(f)))
    }

    /// Validates the manifest and cross-checks every registration
    /// against it.
    pub fn build(self) -> Result<App<S>, AppDefinitionError> {
        if let Some(name) = self.duplicate {
            return Err(AppDefinitionError::DuplicateRegistration(name));
        }
        validate_manifest(&self.manifest)?;

        for (name, handler) in &self.handlers {
            let method = self
                .manifest
                .method(name)
                .ok_or_else(|| AppDefinitionError::UndeclaredMethod(name.clone()))?;
            let declared = if method.is_init {
                MethodKind::Init
            } else if method.is_view {
                MethodKind::View
            } else {
                MethodKind::Call
            };
            if handler.kind() != declared {
                return Err(AppDefinitionError::KindMismatch(name.clone()));
            }
        }
        for method in &self.manifest.methods {
            if !self.handlers.contains_key(&method.name) {
                return Err(AppDefinitionError::MissingHandler(method.name.clone()));
            }
        }

        Ok(App {
            manifest: self.manifest,
            handlers: self.handlers,
        })
    }
}

impl<S> fmt::Debug for AppBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A validated dispatch table over a state type `S`.
pub struct App<S> {
    manifest: Manifest,
    handlers: BTreeMap<String, Handler<S>>,
}

impl<S: BorshSerialize + BorshDeserialize> App<S> {
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Drives one invocation to completion, translating any failure into
    /// a host panic. This is the wasm entry point body.
    pub fn run(&self, name: &str) {
        if let Err(err) = self.dispatch(name) {
            env::panic_str(&err.to_string());
        }
    }

    /// Drives one invocation, leaving failures to the caller. No state
    /// is persisted and no delta is committed on failure.
    pub fn dispatch(&self, name: &str) -> Result<(), DispatchError> {
        delta::start();
        let result = self.dispatch_inner(name);
        if result.is_err() {
            delta::abort();
        }
        result
    }

    fn dispatch_inner(&self, name: &str) -> Result<(), DispatchError> {
        let method = self
            .manifest
            .method(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_owned()))?;
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_owned()))?;

        // Lifecycle checks come before argument decoding: a repeated
        // init is AlreadyInitialized even when its arguments are junk.
        match handler {
            Handler::Init(_) if state::exists() => {
                return Err(DispatchError::AlreadyInitialized);
            }
            Handler::View(_) | Handler::Call(_) if !state::exists() => {
                return Err(DispatchError::NotInitialized);
            }
            _ => {}
        }

        let payload = env::input();
        let args = decode_args(&self.manifest, method, &payload)?;

        match handler {
            Handler::Init(f) => {
                let initial = f(args)?;
                state::save(&initial);
                let _ = delta::commit()?;
            }
            Handler::Call(f) => {
                let mut current = load_state::<S>()?;
                let returned = f(&mut current, args)?;
                state::save(&current);
                self.return_value(method, returned)?;
                let _ = delta::commit()?;
            }
            Handler::View(f) => {
                let current = load_state::<S>()?;
                let returned = f(&current, args)?;
                delta::abort();
                self.return_value(method, returned)?;
            }
        }
        Ok(())
    }

    fn return_value(
        &self,
        method: &Method,
        value: Option<AbiValue>,
    ) -> Result<(), DispatchError> {
        match (&method.returns, value) {
            (Some(ty), Some(value)) => {
                let bytes = codec::encode_value(&value, ty, &self.manifest).map_err(|source| {
                    DispatchError::InvalidReturn {
                        method: method.name.clone(),
                        source,
                    }
                })?;
                env::value_return(&bytes);
                Ok(())
            }
            (Some(_), None) => Err(DispatchError::MissingReturn {
                method: method.name.clone(),
            }),
            // A unit-returning method's value, if any, is dropped.
            (None, _) => Ok(()),
        }
    }
}

impl<S> fmt::Debug for App<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn load_state<S: BorshDeserialize>() -> Result<S, DispatchError> {
    if !state::exists() {
        return Err(DispatchError::NotInitialized);
    }
    state::load::<S>()
        .map_err(|err| DispatchError::CorruptState(err.to_string()))?
        .ok_or(DispatchError::NotInitialized)
}

/// Decodes the input payload against the method's parameter list.
///
/// Zero parameters ignore the payload; one parameter decodes the payload
/// as that type; several parameters decode strictly as a record whose
/// fields follow the declared parameter order.
fn decode_args(
    manifest: &Manifest,
    method: &Method,
    payload: &[u8],
) -> Result<AbiValue, DispatchError> {
    let invalid = |source| DispatchError::InvalidArguments {
        method: method.name.clone(),
        source,
    };
    match method.params.as_slice() {
        [] => Ok(AbiValue::Unit),
        [single] => codec::decode_value(payload, &single.type_, manifest).map_err(invalid),
        params => {
            let fields: Vec<(&str, &TypeRef)> = params
                .iter()
                .map(|param| (param.name.as_str(), &param.type_))
                .collect();
            codec::decode_fields(payload, &fields, manifest)
                .map(AbiValue::Record)
                .map_err(invalid)
        }
    }
}
