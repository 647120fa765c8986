use std::fmt;

use crate::{observable::Observable, observer::Observer};

impl<Item> Observable<Item>
where
  Item: Clone + fmt::Debug + Send + Sync + 'static,
{
  /// Emits `value` once, then completes.
  pub fn of(value: Item) -> Self {
    Observable::new(move |ctx, destination| {
      destination.next_with_context(ctx, value.clone());
      destination.complete_with_context(ctx);
      None
    })
  }
}
