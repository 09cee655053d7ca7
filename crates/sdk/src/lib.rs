//! Guest-side SDK for meld applications.
//!
//! This crate is the shell between application code and the host ABI:
//! the typed bridge over raw host calls ([`env`]), the per-invocation
//! delta recorder with nested-collection tracking ([`delta`]), the state
//! lifecycle and method dispatcher ([`app`]), and typed events
//! ([`event`]). The CRDT collections themselves live in `meld-storage`
//! and talk to the host exclusively through [`env`].

pub mod app;
pub mod delta;
pub mod env;
pub mod event;
pub mod state;

// Re-exported so applications track the SDK's codec versions.
pub use {borsh, serde, serde_json};

pub use app::{App, AppBuilder, AppDefinitionError, DispatchError, MethodError, MethodKind};
pub use event::AppEvent;

#[cfg(test)]
mod tests;

/// Exports application methods as wasm entry points.
///
/// Each listed method becomes a `#[no_mangle] extern "C"` function that
/// builds the app definition and dispatches to the method of the same
/// name:
///
/// ```ignore
/// meld_sdk::app_methods!(my_app() => init, get_username, set_username);
/// ```
#[macro_export]
macro_rules! app_methods {
    ($app:expr => $($method:ident),+ $(,)?) => {
        $(
            #[no_mangle]
            pub extern "C" fn $method() {
                ($app).run(stringify!($method));
            }
        )+
    };
}
