//! A push-based reactive notification kernel.
//!
//! Observables deliver a sequence of values (`next`) to Observers,
//! terminated by at most one of `error` or `complete`. Subscriptions
//! aggregate the teardown work of an ongoing execution, and Subscribers
//! merge both roles while enforcing a selectable producer-side concurrency
//! and backpressure policy.
//!
//! The invariants the kernel guarantees for any pipeline:
//!
//! - the first terminal notification wins; later terminals and values are
//!   accounted for through the dropped-notification hook, never delivered;
//! - a terminal is forwarded downstream before the subscription's teardown
//!   runs, and teardown runs exactly once, in registration order;
//! - observer callback panics are contained by default and surface either
//!   as in-band errors or through the unhandled-error hook, never as a
//!   crash of the producer.
//!
//! ```
//! use rxflow::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! Observable::from_iter(1..=10)
//!   .map(|v| v * 2)
//!   .filter(|v| *v > 10)
//!   .take(3)
//!   .subscribe(CallbackObserver::on_next(move |v: i32| {
//!     sink.lock().unwrap().push(v)
//!   }));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![12, 14, 16]);
//! ```

pub mod context;
pub mod error;
pub mod hooks;
pub mod notification;
pub mod observable;
pub mod observer;
mod ops;
mod serializer;
pub mod subscriber;
pub mod subscription;

pub mod prelude {
  pub use crate::context::Context;
  pub use crate::error::{
    error_message, rx_error, InvalidArgumentError, ObserverError, PanicPayload, RxError,
    UnsubscriptionError,
  };
  pub use crate::hooks::{
    get_on_dropped_notification, get_on_unhandled_error, log_on_dropped_notification,
    log_on_unhandled_error, on_dropped_notification, on_unhandled_error,
    reset_on_dropped_notification, reset_on_unhandled_error, set_on_dropped_notification,
    set_on_unhandled_error,
  };
  pub use crate::notification::Notification;
  pub use crate::observable::{Observable, SourceFactory};
  pub use crate::observer::{CallbackObserver, DynObserver, Observer};
  pub use crate::subscriber::{Backpressure, ConcurrencyMode, Subscriber};
  pub use crate::subscription::{Subscription, Teardown, TeardownWithContext, Unsubscribable};
}
