use std::{
  fmt,
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
  },
};

use once_cell::sync::OnceCell;

use crate::{
  context::Context,
  error::RxError,
  hooks::on_dropped_notification,
  notification::Notification,
  observer::{DynObserver, Observer, ACTIVE, COMPLETED, ERRORED},
  serializer::{MutexSerializer, NoopSerializer, Serializer},
  subscription::{Subscription, Unsubscribable},
};

/// How a subscriber serializes concurrent producers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConcurrencyMode {
  /// Serialized behind a real mutex; contended producers block.
  Safe,
  /// A no-op lock is still invoked, keeping the synchronized call shape,
  /// but the caller guarantees a single writer. Kept distinct from
  /// `SingleProducer` so the cost of the call shape itself stays
  /// measurable.
  Unsafe,
  /// Serialized behind a real mutex; a `next` that cannot take the lock
  /// immediately is dropped through the dropped-notification hook.
  EventuallySafe,
  /// No serializer at all, atomic status checks only. The caller
  /// guarantees a single producer.
  SingleProducer,
}

/// What happens to a `next` when the serializer is contended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backpressure {
  /// Wait for the serializer.
  Block,
  /// Discard the notification and tell the dropped-notification hook.
  Drop,
}

/// Implements both [`Observer`] and [`Unsubscribable`]. While the Observer
/// is the public API for consuming values, every observer handed to
/// `subscribe` gets wrapped into a Subscriber so the pipeline gains
/// cancellation and a producer-side concurrency policy. Crucial for
/// operators, rarely used directly.
///
/// Terminal notifications are taken by compare-and-swap, so across any
/// number of concurrent producers exactly one of `error`/`complete` reaches
/// the destination; the losers are dropped through the hook. A terminal,
/// forwarded or dropped, always disposes the embedded [`Subscription`]
/// after the notification was delivered.
pub struct Subscriber<Item> {
  core: Arc<Core<Item>>,
}

impl<Item> Clone for Subscriber<Item> {
  fn clone(&self) -> Self {
    Subscriber { core: self.core.clone() }
  }
}

struct Core<Item> {
  // The serializer only orders producers; status carries the lifecycle.
  // Reading status through the serializer would deadlock observers that
  // call unsubscribe or the introspection methods synchronously.
  status: AtomicU8,
  backpressure: Backpressure,
  serializer: Option<Box<dyn Serializer>>,
  lockless: bool,
  destination: Option<DynObserver<Item>>,
  subscription: Subscription,
  mode: ConcurrencyMode,
  /// Capture flag pinned at subscribe time for the direct-dispatch path.
  direct_capture: OnceCell<bool>,
}

impl<Item: fmt::Debug + 'static> Subscriber<Item> {
  /// Wraps `destination` in a [`ConcurrencyMode::Safe`] subscriber. If the
  /// destination is already a subscriber it is returned verbatim, keeping
  /// its original mode's guarantees and avoiding double wrapping.
  pub fn new(destination: impl Observer<Item = Item> + 'static) -> Self {
    Self::with_mode(destination, ConcurrencyMode::Safe)
  }

  /// Wraps `destination` with an explicit concurrency mode. Same verbatim
  /// return as [`Subscriber::new`] when the destination is already a
  /// subscriber.
  pub fn with_mode(destination: impl Observer<Item = Item> + 'static, mode: ConcurrencyMode) -> Self {
    if let Some(subscriber) = destination.as_subscriber() {
      return subscriber;
    }

    let (serializer, backpressure, lockless): (Option<Box<dyn Serializer>>, _, _) = match mode {
      ConcurrencyMode::Safe => (
        Some(Box::new(MutexSerializer::new())),
        Backpressure::Block,
        false,
      ),
      ConcurrencyMode::Unsafe => (Some(Box::new(NoopSerializer)), Backpressure::Block, false),
      ConcurrencyMode::EventuallySafe => (
        Some(Box::new(MutexSerializer::new())),
        Backpressure::Drop,
        false,
      ),
      ConcurrencyMode::SingleProducer => (None, Backpressure::Block, true),
    };

    Self::from_parts(
      Some(Arc::new(destination) as DynObserver<Item>),
      mode,
      serializer,
      backpressure,
      lockless,
    )
  }

  fn from_parts(
    destination: Option<DynObserver<Item>>,
    mode: ConcurrencyMode,
    serializer: Option<Box<dyn Serializer>>,
    backpressure: Backpressure,
    lockless: bool,
  ) -> Self {
    let subscriber = Subscriber {
      core: Arc::new(Core {
        status: AtomicU8::new(ACTIVE),
        backpressure,
        serializer,
        lockless,
        destination: destination.clone(),
        subscription: Subscription::new(),
        mode,
        direct_capture: OnceCell::new(),
      }),
    };

    // A destination that owns a subscription gets this subscriber's
    // disposal registered on it, so cancelling the downstream cascades
    // upstream. The linkage goes through a weak reference: the downstream
    // already owns us transitively and a strong closure would cycle.
    if let Some(handle) = destination.as_ref().and_then(|d| d.cancel_handle()) {
      let weak = Arc::downgrade(&subscriber.core);
      handle.add(move || {
        if let Some(core) = weak.upgrade() {
          Subscriber { core }.unsubscribe();
        }
      });
    }

    subscriber
  }

  /// Pins the effective panic-capture flag for this subscription so the
  /// hot path can skip the per-notification context lookup. Only takes
  /// effect when the destination is a [`CallbackObserver`]; every
  /// observable behavior of the plain path is preserved.
  ///
  /// [`CallbackObserver`]: crate::observer::CallbackObserver
  pub(crate) fn install_direct_dispatch(&self, ctx: &Context) {
    if let Some(callback) = self
      .core
      .destination
      .as_deref()
      .and_then(|d| d.as_callback())
    {
      let _ = self.core.direct_capture.set(callback.effective_capture(ctx));
    }
  }

  fn forward_next(&self, ctx: &Context, value: Item) {
    let Some(destination) = self.core.destination.as_deref() else { return };
    if let (Some(&capture), Some(callback)) =
      (self.core.direct_capture.get(), destination.as_callback())
    {
      callback.next_with_capture(ctx, value, capture);
    } else {
      destination.next_with_context(ctx, value);
    }
  }

  fn forward_error(&self, ctx: &Context, err: RxError) {
    let Some(destination) = self.core.destination.as_deref() else { return };
    if let (Some(&capture), Some(callback)) =
      (self.core.direct_capture.get(), destination.as_callback())
    {
      callback.error_with_capture(ctx, err, capture);
    } else {
      destination.error_with_context(ctx, err);
    }
  }

  fn forward_complete(&self, ctx: &Context) {
    let Some(destination) = self.core.destination.as_deref() else { return };
    if let (Some(&capture), Some(callback)) =
      (self.core.direct_capture.get(), destination.as_callback())
    {
      callback.complete_with_capture(ctx, capture);
    } else {
      destination.complete_with_context(ctx);
    }
  }

  fn dispose_subscription(&self) {
    // Idempotent even with racing terminals.
    self.core.subscription.unsubscribe();
  }
}

impl<Item> Subscriber<Item> {
  /// Registers a finalizer on the embedded subscription.
  pub fn add(&self, teardown: impl FnOnce() + Send + 'static) {
    self.core.subscription.add(teardown);
  }

  /// Registers a context-aware finalizer on the embedded subscription.
  pub fn add_with_context(&self, teardown: impl FnOnce(&Context) + Send + 'static) {
    self.core.subscription.add_with_context(teardown);
  }

  /// Chains another cancellable resource onto the embedded subscription.
  pub fn add_unsubscribable<U>(&self, unsubscribable: U)
  where
    U: Unsubscribable + Send + 'static,
  {
    self.core.subscription.add_unsubscribable(unsubscribable);
  }

  /// Blocks until this subscriber is disposed. Discouraged; see
  /// [`Subscription::wait`].
  pub fn wait(&self) {
    self.core.subscription.wait();
  }

  /// Handle to the embedded subscription.
  pub fn subscription(&self) -> Subscription {
    self.core.subscription.clone()
  }

  /// The concurrency mode this subscriber was built with.
  pub fn mode(&self) -> ConcurrencyMode {
    self.core.mode
  }
}

impl<Item: fmt::Debug + 'static> Observer for Subscriber<Item> {
  type Item = Item;

  fn next_with_context(&self, ctx: &Context, value: Item) {
    let core = &self.core;
    if core.destination.is_none() {
      return;
    }

    if core.lockless {
      if core.status.load(Ordering::Acquire) != ACTIVE {
        on_dropped_notification(ctx, &Notification::Next(value));
        return;
      }
      self.forward_next(ctx, value);
      return;
    }

    let Some(serializer) = core.serializer.as_deref() else { return };
    if core.backpressure == Backpressure::Drop {
      if !serializer.try_acquire() {
        on_dropped_notification(ctx, &Notification::Next(value));
        return;
      }
    } else {
      serializer.acquire();
    }

    // Recheck under the serializer; a terminal may have won the race.
    if core.status.load(Ordering::Acquire) != ACTIVE {
      serializer.release();
      on_dropped_notification(ctx, &Notification::Next(value));
      return;
    }

    self.forward_next(ctx, value);
    serializer.release();
  }

  fn error_with_context(&self, ctx: &Context, err: RxError) {
    let core = &self.core;

    if core.lockless {
      if core
        .status
        .compare_exchange(ACTIVE, ERRORED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
      {
        on_dropped_notification(ctx, &Notification::<Item>::Error(err));
        self.dispose_subscription();
        return;
      }
      self.forward_error(ctx, err);
      self.dispose_subscription();
      return;
    }

    let Some(serializer) = core.serializer.as_deref() else { return };
    serializer.acquire();

    if core
      .status
      .compare_exchange(ACTIVE, ERRORED, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      serializer.release();
      on_dropped_notification(ctx, &Notification::<Item>::Error(err));
      self.dispose_subscription();
      return;
    }

    self.forward_error(ctx, err);
    serializer.release();
    self.dispose_subscription();
  }

  fn complete_with_context(&self, ctx: &Context) {
    let core = &self.core;

    if core.lockless {
      if core
        .status
        .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
      {
        on_dropped_notification(ctx, &Notification::<Item>::Complete);
        self.dispose_subscription();
        return;
      }
      self.forward_complete(ctx);
      self.dispose_subscription();
      return;
    }

    let Some(serializer) = core.serializer.as_deref() else { return };
    serializer.acquire();

    if core
      .status
      .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      serializer.release();
      on_dropped_notification(ctx, &Notification::<Item>::Complete);
      self.dispose_subscription();
      return;
    }

    self.forward_complete(ctx);
    serializer.release();
    self.dispose_subscription();
  }

  fn is_closed(&self) -> bool {
    self.core.status.load(Ordering::Acquire) != ACTIVE
  }

  fn has_thrown(&self) -> bool {
    self.core.status.load(Ordering::Acquire) == ERRORED
  }

  fn is_completed(&self) -> bool {
    self.core.status.load(Ordering::Acquire) == COMPLETED
  }

  fn as_subscriber(&self) -> Option<Subscriber<Item>> {
    Some(self.clone())
  }

  fn cancel_handle(&self) -> Option<Subscription> {
    Some(self.core.subscription.clone())
  }
}

impl<Item: fmt::Debug + 'static> Unsubscribable for Subscriber<Item> {
  fn unsubscribe(&self) {
    // Best-effort close; losers of the race do nothing extra. The embedded
    // subscription's own idempotence keeps finalizers at-most-once.
    let _ = self
      .core
      .status
      .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire);
    self.core.subscription.unsubscribe();
  }

  fn unsubscribe_with_context(&self, ctx: &Context) {
    let _ = self
      .core
      .status
      .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire);
    self.core.subscription.unsubscribe_with_context(ctx);
  }
}
