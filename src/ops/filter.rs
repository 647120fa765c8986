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
  /// Forwards only the values `predicate` accepts.
  pub fn filter<F>(&self, predicate: F) -> Observable<Item>
  where
    F: Fn(&Item) -> bool + Send + Sync + 'static,
  {
    let source = self.clone();
    let predicate = Arc::new(predicate);

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let predicate = predicate.clone();
      let next = {
        let destination = destination.clone();
        move |ctx: &Context, value: Item| {
          if predicate(&value) {
            destination.next_with_context(ctx, value);
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
