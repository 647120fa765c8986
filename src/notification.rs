use std::fmt;

use crate::error::RxError;

/// A value emitted through a pipeline: the next element, a terminal error,
/// or the completion signal. Immutable once produced.
///
/// The `Display` form is consumed only by the dropped-notification hook, so
/// formatting cost is paid only when a hook actually renders it.
#[derive(Clone, Debug)]
pub enum Notification<Item> {
  Next(Item),
  Error(RxError),
  Complete,
}

impl<Item> Notification<Item> {
  /// True for `Next`.
  pub fn is_next(&self) -> bool {
    matches!(self, Notification::Next(_))
  }

  /// True for `Error` and `Complete`.
  pub fn is_terminal(&self) -> bool {
    !self.is_next()
  }
}

impl<Item: fmt::Debug> fmt::Display for Notification<Item> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notification::Next(value) => write!(f, "Next({value:?})"),
      Notification::Error(err) => write!(f, "Error({err})"),
      Notification::Complete => f.write_str("Complete()"),
    }
  }
}
