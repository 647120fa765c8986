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
  /// Transforms every value with `project`, forwarding terminals
  /// unchanged.
  pub fn map<B, F>(&self, project: F) -> Observable<B>
  where
    B: fmt::Debug + 'static,
    F: Fn(Item) -> B + Send + Sync + 'static,
  {
    let source = self.clone();
    let project = Arc::new(project);

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let project = project.clone();
      let next = {
        let destination = destination.clone();
        move |ctx: &Context, value: Item| destination.next_with_context(ctx, project(value))
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
