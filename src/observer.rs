use std::{
  fmt,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
  },
};

use crate::{
  context::Context,
  error::{observer_panic_error, RxError},
  hooks::{on_dropped_notification, on_unhandled_error},
  notification::Notification,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Observer lifecycle states. Terminal states are absorbing.
pub(crate) const ACTIVE: u8 = 0;
pub(crate) const ERRORED: u8 = 1;
pub(crate) const COMPLETED: u8 = 2;

/// An Observer is the consumer of an Observable. It receives three kinds of
/// notification: `next`, `error` and `complete`.
///
/// Implementations accept concurrent callers. At most one terminal
/// notification (`error` or `complete`) is ever honored; everything arriving
/// after the observer closed is discarded through the dropped-notification
/// hook. The context-less methods delegate to the context-aware ones with an
/// empty [`Context`].
pub trait Observer: Send + Sync {
  type Item;

  /// Receives the next value. Called zero or more times.
  fn next(&self, value: Self::Item) {
    self.next_with_context(&Context::default(), value);
  }

  fn next_with_context(&self, ctx: &Context, value: Self::Item);

  /// Receives the terminal error. Honored at most once.
  fn error(&self, err: RxError) {
    self.error_with_context(&Context::default(), err);
  }

  fn error_with_context(&self, ctx: &Context, err: RxError);

  /// Receives the completion signal. Honored at most once.
  fn complete(&self) {
    self.complete_with_context(&Context::default());
  }

  fn complete_with_context(&self, ctx: &Context);

  /// True once a terminal notification was taken.
  fn is_closed(&self) -> bool;

  /// True once the terminal was an error.
  fn has_thrown(&self) -> bool;

  /// True once the terminal was a completion.
  fn is_completed(&self) -> bool;

  /// Capability probe used to avoid wrapping a subscriber in another
  /// subscriber.
  #[doc(hidden)]
  fn as_subscriber(&self) -> Option<Subscriber<Self::Item>> {
    None
  }

  /// Capability probe for the direct-dispatch path.
  #[doc(hidden)]
  fn as_callback(&self) -> Option<&CallbackObserver<Self::Item>> {
    None
  }

  /// Cancel handle of observers that also own a subscription; a subscriber
  /// wrapping such an observer registers its own disposal there so
  /// cancelling the downstream cascades.
  #[doc(hidden)]
  fn cancel_handle(&self) -> Option<Subscription> {
    None
  }
}

/// Shared, type-erased observer handle.
pub type DynObserver<Item> = Arc<dyn Observer<Item = Item>>;

impl<T: Observer + ?Sized> Observer for Arc<T> {
  type Item = T::Item;

  fn next_with_context(&self, ctx: &Context, value: Self::Item) {
    (**self).next_with_context(ctx, value);
  }

  fn error_with_context(&self, ctx: &Context, err: RxError) {
    (**self).error_with_context(ctx, err);
  }

  fn complete_with_context(&self, ctx: &Context) {
    (**self).complete_with_context(ctx);
  }

  fn is_closed(&self) -> bool {
    (**self).is_closed()
  }

  fn has_thrown(&self) -> bool {
    (**self).has_thrown()
  }

  fn is_completed(&self) -> bool {
    (**self).is_completed()
  }

  fn as_subscriber(&self) -> Option<Subscriber<Self::Item>> {
    (**self).as_subscriber()
  }

  fn as_callback(&self) -> Option<&CallbackObserver<Self::Item>> {
    (**self).as_callback()
  }

  fn cancel_handle(&self) -> Option<Subscription> {
    (**self).cancel_handle()
  }
}

type NextFn<Item> = Box<dyn Fn(&Context, Item) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&Context, RxError) + Send + Sync>;
type CompleteFn = Box<dyn Fn(&Context) + Send + Sync>;

/// Observer built from callbacks, with an atomic lifecycle and optional
/// panic capture.
///
/// Capture is on by default: a panic inside the next callback is re-routed
/// to the error callback (or the unhandled-error hook when there is none),
/// a panic inside the error or complete callback escalates to the hook, and
/// no panic ever escapes to the producer. The `unchecked` constructors and
/// [`Context::with_panic_capture_disabled`] opt out, letting panics
/// propagate for benchmarking or latency-critical paths.
pub struct CallbackObserver<Item> {
  status: AtomicU8,
  capture_panics: bool,
  on_next: Option<NextFn<Item>>,
  on_error: Option<ErrorFn>,
  on_complete: Option<CompleteFn>,
}

impl<Item: 'static> CallbackObserver<Item> {
  /// Creates an observer from context-less callbacks, with panic capture.
  pub fn new(
    on_next: impl Fn(Item) + Send + Sync + 'static,
    on_error: impl Fn(RxError) + Send + Sync + 'static,
    on_complete: impl Fn() + Send + Sync + 'static,
  ) -> Self {
    Self::with_context(
      move |_, value| on_next(value),
      move |_, err| on_error(err),
      move |_| on_complete(),
    )
  }

  /// Creates an observer from context-aware callbacks, with panic capture.
  pub fn with_context(
    on_next: impl Fn(&Context, Item) + Send + Sync + 'static,
    on_error: impl Fn(&Context, RxError) + Send + Sync + 'static,
    on_complete: impl Fn(&Context) + Send + Sync + 'static,
  ) -> Self {
    CallbackObserver {
      status: AtomicU8::new(ACTIVE),
      capture_panics: true,
      on_next: Some(Box::new(on_next)),
      on_error: Some(Box::new(on_error)),
      on_complete: Some(Box::new(on_complete)),
    }
  }

  /// Creates an observer whose callbacks are NOT wrapped with panic
  /// capture. Panics propagate to the producer and leave the lifecycle
  /// untouched. Callers either guarantee no panics or want them raw.
  pub fn unchecked(
    on_next: impl Fn(Item) + Send + Sync + 'static,
    on_error: impl Fn(RxError) + Send + Sync + 'static,
    on_complete: impl Fn() + Send + Sync + 'static,
  ) -> Self {
    let mut observer = Self::new(on_next, on_error, on_complete);
    observer.capture_panics = false;
    observer
  }

  /// Context-aware variant of [`CallbackObserver::unchecked`].
  pub fn unchecked_with_context(
    on_next: impl Fn(&Context, Item) + Send + Sync + 'static,
    on_error: impl Fn(&Context, RxError) + Send + Sync + 'static,
    on_complete: impl Fn(&Context) + Send + Sync + 'static,
  ) -> Self {
    let mut observer = Self::with_context(on_next, on_error, on_complete);
    observer.capture_panics = false;
    observer
  }

  /// Partial observer with only the next callback wired.
  /// Warning: errors are silenced.
  pub fn on_next(on_next: impl Fn(Item) + Send + Sync + 'static) -> Self {
    Self::new(on_next, |_| {}, || {})
  }

  /// Partial observer with only the error callback wired.
  pub fn on_error(on_error: impl Fn(RxError) + Send + Sync + 'static) -> Self {
    Self::new(|_| {}, on_error, || {})
  }

  /// Partial observer with only the complete callback wired.
  /// Warning: errors are silenced.
  pub fn on_complete(on_complete: impl Fn() + Send + Sync + 'static) -> Self {
    Self::new(|_| {}, |_| {}, on_complete)
  }

  /// Observer that ignores everything.
  /// Warning: errors are silenced.
  pub fn noop() -> Self {
    Self::new(|_| {}, |_| {}, || {})
  }

  /// Observer that emits every notification as a `tracing` event, for
  /// debugging pipelines.
  pub fn trace() -> Self
  where
    Item: fmt::Debug,
  {
    Self::new(
      |value| tracing::info!("next: {:?}", value),
      |err| tracing::info!("error: {}", err),
      || tracing::info!("completed"),
    )
  }
}

impl<Item: fmt::Debug + 'static> CallbackObserver<Item> {
  pub(crate) fn effective_capture(&self, ctx: &Context) -> bool {
    self.capture_panics && !ctx.is_panic_capture_disabled()
  }

  /// Full delivery pipeline with a precomputed capture flag. Used by
  /// subscribers that pinned the flag at subscribe time; behaves exactly
  /// like `next_with_context` otherwise.
  pub(crate) fn next_with_capture(&self, ctx: &Context, value: Item, capture: bool) {
    if self.on_next.is_none() || self.status.load(Ordering::Acquire) != ACTIVE {
      on_dropped_notification(ctx, &Notification::Next(value));
      return;
    }
    self.try_next(ctx, value, capture);
  }

  pub(crate) fn error_with_capture(&self, ctx: &Context, err: RxError, capture: bool) {
    if self.on_error.is_none()
      || self
        .status
        .compare_exchange(ACTIVE, ERRORED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
      on_dropped_notification(ctx, &Notification::<Item>::Error(err));
      return;
    }
    self.try_error(ctx, err, capture);
  }

  pub(crate) fn complete_with_capture(&self, ctx: &Context, capture: bool) {
    if self.on_complete.is_none()
      || self
        .status
        .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
      on_dropped_notification(ctx, &Notification::<Item>::Complete);
      return;
    }
    self.try_complete(ctx, capture);
  }

  fn try_next(&self, ctx: &Context, value: Item, capture: bool) {
    let Some(on_next) = &self.on_next else { return };
    if !capture {
      on_next(ctx, value);
      return;
    }

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_next(ctx, value))) {
      let _ = self
        .status
        .compare_exchange(ACTIVE, ERRORED, Ordering::AcqRel, Ordering::Acquire);
      let err = observer_panic_error(payload);
      if self.on_error.is_some() {
        self.try_error(ctx, err, capture);
      } else {
        on_unhandled_error(ctx, &err);
      }
    }
  }

  fn try_error(&self, ctx: &Context, err: RxError, capture: bool) {
    let Some(on_error) = &self.on_error else { return };
    if !capture {
      on_error(ctx, err);
      return;
    }

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_error(ctx, err))) {
      on_unhandled_error(ctx, &observer_panic_error(payload));
    }
  }

  fn try_complete(&self, ctx: &Context, capture: bool) {
    let Some(on_complete) = &self.on_complete else { return };
    if !capture {
      on_complete(ctx);
      return;
    }

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_complete(ctx))) {
      on_unhandled_error(ctx, &observer_panic_error(payload));
    }
  }
}

impl<Item: fmt::Debug + 'static> Observer for CallbackObserver<Item> {
  type Item = Item;

  fn next_with_context(&self, ctx: &Context, value: Item) {
    self.next_with_capture(ctx, value, self.effective_capture(ctx));
  }

  fn error_with_context(&self, ctx: &Context, err: RxError) {
    self.error_with_capture(ctx, err, self.effective_capture(ctx));
  }

  fn complete_with_context(&self, ctx: &Context) {
    self.complete_with_capture(ctx, self.effective_capture(ctx));
  }

  fn is_closed(&self) -> bool {
    self.status.load(Ordering::Acquire) != ACTIVE
  }

  fn has_thrown(&self) -> bool {
    self.status.load(Ordering::Acquire) == ERRORED
  }

  fn is_completed(&self) -> bool {
    self.status.load(Ordering::Acquire) == COMPLETED
  }

  fn as_callback(&self) -> Option<&CallbackObserver<Item>> {
    Some(self)
  }
}
