use std::{fmt, sync::Arc};

use crate::{
  context::Context,
  error::RxError,
  observable::Observable,
  observer::{CallbackObserver, Observer},
  subscriber::ConcurrencyMode,
  subscription::{Teardown, Unsubscribable},
};

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Runs `observe` on every value as a side effect, forwarding the
  /// sequence untouched.
  pub fn tap<F>(&self, observe: F) -> Observable<Item>
  where
    F: Fn(&Item) + Send + Sync + 'static,
  {
    let source = self.clone();
    let observe = Arc::new(observe);

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let observe = observe.clone();
      let next = {
        let destination = destination.clone();
        move |ctx: &Context, value: Item| {
          observe(&value);
          destination.next_with_context(ctx, value);
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
