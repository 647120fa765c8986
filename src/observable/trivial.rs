use std::fmt;

use crate::{error::RxError, observable::Observable, observer::Observer};

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Completes immediately without emitting.
  pub fn empty() -> Self {
    Observable::new(|ctx, destination| {
      destination.complete_with_context(ctx);
      None
    })
  }

  /// Never emits and never terminates. Subscriptions only end through
  /// `unsubscribe`.
  pub fn never() -> Self {
    Observable::new(|_, _| None)
  }

  /// Errors immediately with `err`.
  pub fn throw(err: RxError) -> Self {
    Observable::new(move |ctx, destination| {
      destination.error_with_context(ctx, err.clone());
      None
    })
  }
}
