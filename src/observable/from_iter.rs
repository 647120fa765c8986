use std::fmt;

use crate::{observable::Observable, observer::Observer};

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Emits every element of `iter`, then completes. Emission stops early
  /// when the subscriber closes, e.g. through a downstream `take`.
  pub fn from_iter<I>(iter: I) -> Self
  where
    I: IntoIterator<Item = Item> + Clone + Send + Sync + 'static,
  {
    Observable::new(move |ctx, destination| {
      for value in iter.clone() {
        if destination.is_closed() {
          break;
        }
        destination.next_with_context(ctx, value);
      }
      destination.complete_with_context(ctx);
      None
    })
  }
}
