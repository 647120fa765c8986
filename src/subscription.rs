use std::{
  panic::{catch_unwind, panic_any, AssertUnwindSafe},
  sync::{mpsc, Arc},
};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{
  context::Context,
  error::{PanicPayload, UnsubscriptionError},
  hooks::on_unhandled_error,
};

/// Cleans up one resource acquired for a subscription, such as closing a
/// file or stopping a worker. Runs at most once, when the subscription is
/// disposed.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// Context-aware teardown, for cancellation-aware cleanup such as aborting
/// in-flight requests against a deadline carried on the context.
pub type TeardownWithContext = Box<dyn FnOnce(&Context) + Send>;

/// Anything that can be cancelled.
pub trait Unsubscribable {
  fn unsubscribe(&self);
  fn unsubscribe_with_context(&self, ctx: &Context);
}

/// Represents an ongoing Observable execution and aggregates the teardown
/// work to run when that execution is cancelled.
///
/// Disposal is idempotent and one-way. Finalizers registered after disposal
/// run immediately, exactly once, at registration time.
#[derive(Clone, Default)]
pub struct Subscription {
  inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
  done: bool,
  finalizers: SmallVec<[Teardown; 1]>,
  ctx_finalizers: SmallVec<[TeardownWithContext; 1]>,
}

impl Subscription {
  /// Creates an empty subscription.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a subscription that runs `teardown` on disposal.
  pub fn with_teardown(teardown: impl FnOnce() + Send + 'static) -> Self {
    let subscription = Self::new();
    subscription.add(teardown);
    subscription
  }

  /// Creates a subscription that runs a context-aware `teardown` on
  /// disposal.
  pub fn with_context_teardown(teardown: impl FnOnce(&Context) + Send + 'static) -> Self {
    let subscription = Self::new();
    subscription.add_with_context(teardown);
    subscription
  }

  /// Registers a finalizer to execute upon unsubscription. When the
  /// subscription is already disposed, the finalizer runs immediately and
  /// is not retained; a panic from that immediate run is captured and
  /// routed to the unhandled-error hook.
  pub fn add(&self, teardown: impl FnOnce() + Send + 'static) {
    let mut state = self.inner.lock();
    if state.done {
      drop(state);
      if let Err(payload) = exec_finalizer(Box::new(teardown)) {
        let err = crate::error::rx_error(UnsubscriptionError::new(vec![payload]));
        on_unhandled_error(&Context::default(), &err);
      }
      return;
    }
    state.finalizers.push(Box::new(teardown));
  }

  /// Registers a finalizer that receives the disposing context. Same
  /// immediate-run semantics as [`Subscription::add`], with a default
  /// context.
  pub fn add_with_context(&self, teardown: impl FnOnce(&Context) + Send + 'static) {
    let mut state = self.inner.lock();
    if state.done {
      drop(state);
      if let Err(payload) = exec_ctx_finalizer(Box::new(teardown), &Context::default()) {
        let err = crate::error::rx_error(UnsubscriptionError::new(vec![payload]));
        on_unhandled_error(&Context::default(), &err);
      }
      return;
    }
    state.ctx_finalizers.push(Box::new(teardown));
  }

  /// Chains another cancellable resource onto this subscription, so
  /// disposing this one disposes it too.
  pub fn add_unsubscribable<U>(&self, unsubscribable: U)
  where
    U: Unsubscribable + Send + 'static,
  {
    self.add(move || unsubscribable.unsubscribe());
  }

  /// True once the subscription has been disposed.
  pub fn is_closed(&self) -> bool {
    self.inner.lock().done
  }

  /// Blocks until the subscription is disposed.
  ///
  /// Prefer consuming the terminal notification instead; this is a
  /// convenience for tests and simple drivers and may block forever.
  pub fn wait(&self) {
    let (tx, rx) = mpsc::channel();
    self.add(move || {
      let _ = tx.send(());
    });
    let _ = rx.recv();
  }

  fn dispose(&self, ctx: &Context) {
    let (finalizers, ctx_finalizers) = {
      let mut state = self.inner.lock();
      if state.done {
        return;
      }
      state.done = true;
      (
        std::mem::take(&mut state.finalizers),
        std::mem::take(&mut state.ctx_finalizers),
      )
    };

    // The lock is released before any finalizer runs, so finalizers that
    // register further teardown land in the immediate-run branch of `add`
    // instead of deadlocking.
    let mut causes: Vec<PanicPayload> = Vec::new();
    for finalizer in finalizers {
      if let Err(payload) = exec_finalizer(finalizer) {
        causes.push(payload);
      }
    }
    for finalizer in ctx_finalizers {
      if let Err(payload) = exec_ctx_finalizer(finalizer, ctx) {
        causes.push(payload);
      }
    }

    if !causes.is_empty() {
      panic_any(UnsubscriptionError::new(causes));
    }
  }
}

impl Unsubscribable for Subscription {
  /// Disposes the resources held by the subscription. Finalizers run in
  /// registration order, plain ones before context-aware ones, each
  /// exactly once. A panicking finalizer does not prevent the others from
  /// running; once every finalizer ran, the collected panics are re-raised
  /// as a single [`UnsubscriptionError`].
  fn unsubscribe(&self) {
    self.dispose(&Context::default());
  }

  /// Disposes with `ctx` handed to context-aware finalizers.
  fn unsubscribe_with_context(&self, ctx: &Context) {
    self.dispose(ctx);
  }
}

fn exec_finalizer(finalizer: Teardown) -> Result<(), PanicPayload> {
  catch_unwind(AssertUnwindSafe(finalizer)).map_err(PanicPayload::from_unwind)
}

fn exec_ctx_finalizer(finalizer: TeardownWithContext, ctx: &Context) -> Result<(), PanicPayload> {
  catch_unwind(AssertUnwindSafe(|| finalizer(ctx))).map_err(PanicPayload::from_unwind)
}
