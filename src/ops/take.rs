use std::{
  fmt,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

use crate::{
  context::Context,
  error::RxError,
  observable::Observable,
  observer::{CallbackObserver, Observer},
  subscriber::ConcurrencyMode,
  subscription::{Teardown, Unsubscribable},
};

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Forwards the first `count` values, then completes and cancels the
  /// upstream subscription.
  pub fn take(&self, count: usize) -> Observable<Item> {
    let source = self.clone();

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      if count == 0 {
        destination.complete_with_context(ctx);
        return None;
      }

      let seen = Arc::new(AtomicUsize::new(0));
      let next = {
        let destination = destination.clone();
        let seen = seen.clone();
        move |ctx: &Context, value: Item| {
          let taken = seen.fetch_add(1, Ordering::AcqRel) + 1;
          if taken < count {
            destination.next_with_context(ctx, value);
          } else if taken == count {
            destination.next_with_context(ctx, value);
            // Completing disposes the downstream subscription, which runs
            // the teardown below and cancels the upstream.
            destination.complete_with_context(ctx);
          }
        }
      };
      let error = {
        let destination = destination.clone();
        move |ctx: &Context, err: RxError| destination.error_with_context(ctx, err)
      };
      let complete = {
        let destination = destination.clone();
        move |ctx: &Context| destination.complete_with_context(ctx)
      };

      let upstream =
        source.subscribe_with_context(ctx, CallbackObserver::with_context(next, error, complete));
      Some(Box::new(move || upstream.unsubscribe()) as Teardown)
    })
  }
}
