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
  /// Runs `action` once per subscription when it ends, whether by
  /// terminal notification or by cancellation.
  pub fn finalize<F>(&self, action: F) -> Observable<Item>
  where
    F: Fn() + Send + Sync + 'static,
  {
    let source = self.clone();
    let action = Arc::new(action);

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let action = action.clone();
      let next = {
        let destination = destination.clone();
        move |ctx: &Context, value: Item| destination.next_with_context(ctx, value)
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
      Some(Box::new(move || {
        upstream.unsubscribe();
        action();
      }) as Teardown)
    })
  }
}
