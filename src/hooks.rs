//! Process-wide sinks for errors and notifications nobody else can observe.
//!
//! Both hooks default to ignoring their input. Applications replace them to
//! integrate with logging or metrics; the `log_*` variants below are
//! ready-made replacements that emit `tracing` events. Writers swap the
//! handler atomically, readers load it once per invocation, and no lock is
//! taken on the hot path.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

use crate::{context::Context, error::RxError};

/// Handler for errors that reached the end of the line: observer callback
/// panics, and errors emitted with no error callback to receive them.
pub type UnhandledErrorHandler = Box<dyn Fn(&Context, &RxError) + Send + Sync>;

/// Handler for notifications discarded because of a closed consumer or
/// drop-mode contention. Receives the notification lazily renderable as its
/// `Next(..)` / `Error(..)` / `Complete()` string form.
pub type DroppedNotificationHandler = Box<dyn Fn(&Context, &dyn fmt::Display) + Send + Sync>;

static ON_UNHANDLED_ERROR: Lazy<ArcSwap<UnhandledErrorHandler>> =
  Lazy::new(|| ArcSwap::from_pointee(Box::new(|_: &Context, _: &RxError| {}) as UnhandledErrorHandler));

static ON_DROPPED_NOTIFICATION: Lazy<ArcSwap<DroppedNotificationHandler>> = Lazy::new(|| {
  ArcSwap::from_pointee(Box::new(|_: &Context, _: &dyn fmt::Display| {}) as DroppedNotificationHandler)
});

/// Installs the handler invoked when an error is emitted and not otherwise
/// handled.
pub fn set_on_unhandled_error<F>(handler: F)
where
  F: Fn(&Context, &RxError) + Send + Sync + 'static,
{
  ON_UNHANDLED_ERROR.store(Arc::new(Box::new(handler)));
}

/// Restores the ignoring default.
pub fn reset_on_unhandled_error() {
  ON_UNHANDLED_ERROR.store(Arc::new(Box::new(|_: &Context, _: &RxError| {})));
}

/// Returns the currently installed unhandled-error handler.
pub fn get_on_unhandled_error() -> Arc<UnhandledErrorHandler> {
  ON_UNHANDLED_ERROR.load_full()
}

/// Invokes the currently installed unhandled-error handler.
pub fn on_unhandled_error(ctx: &Context, err: &RxError) {
  let handler = ON_UNHANDLED_ERROR.load();
  (**handler)(ctx, err);
}

/// Installs the handler invoked when a notification is dropped.
pub fn set_on_dropped_notification<F>(handler: F)
where
  F: Fn(&Context, &dyn fmt::Display) + Send + Sync + 'static,
{
  ON_DROPPED_NOTIFICATION.store(Arc::new(Box::new(handler)));
}

/// Restores the ignoring default.
pub fn reset_on_dropped_notification() {
  ON_DROPPED_NOTIFICATION.store(Arc::new(Box::new(|_: &Context, _: &dyn fmt::Display| {})));
}

/// Returns the currently installed dropped-notification handler.
pub fn get_on_dropped_notification() -> Arc<DroppedNotificationHandler> {
  ON_DROPPED_NOTIFICATION.load_full()
}

/// Invokes the currently installed dropped-notification handler.
pub fn on_dropped_notification(ctx: &Context, notification: &dyn fmt::Display) {
  let handler = ON_DROPPED_NOTIFICATION.load();
  (**handler)(ctx, notification);
}

/// Ready-made unhandled-error handler that emits a `tracing` error event.
pub fn log_on_unhandled_error(_ctx: &Context, err: &RxError) {
  tracing::error!("unhandled error: {}", err);
}

/// Ready-made dropped-notification handler that emits a `tracing` warning.
pub fn log_on_dropped_notification(_ctx: &Context, notification: &dyn fmt::Display) {
  tracing::warn!("dropped notification: {}", notification);
}
