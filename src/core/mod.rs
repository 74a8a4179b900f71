//! Core runtime pieces: debouncing, option binding, change notification.

pub mod binder;
pub mod debounce;
pub mod event_bus;

pub use binder::{BinderState, CommitFn, FieldView, OptionBinder};
pub use debounce::Debouncer;
pub use event_bus::{EventBus, SubscriptionId};
