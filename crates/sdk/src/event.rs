//! Typed application events.

use crate::env;

/// An event an application can surface to the host.
///
/// The kind names the event (typically the variant name) and the payload
/// is its borsh encoding. Events are fire-and-forget: the host forwards
/// them to subscribed clients after a successful invocation.
pub trait AppEvent {
    fn kind(&self) -> &str;
    fn payload(&self) -> Vec<u8>;
}

/// Surfaces `event` to the host.
pub fn emit<E: AppEvent>(event: &E) {
    env::emit_raw(event.kind(), &event.payload());
}
