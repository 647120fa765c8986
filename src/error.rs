use std::{any::Any, fmt, sync::Arc};

use thiserror::Error;

/// Type-erased error currency carried by `Error` notifications.
///
/// Cheap to clone, so the same error can traverse every stage of a pipeline
/// and still reach the global hooks.
pub type RxError = Arc<dyn std::error::Error + Send + Sync>;

/// Lifts a concrete error into the pipeline currency.
pub fn rx_error<E>(err: E) -> RxError
where
  E: std::error::Error + Send + Sync + 'static,
{
  Arc::new(err)
}

/// Builds an [`RxError`] from a plain message.
pub fn error_message(msg: impl Into<String>) -> RxError {
  Arc::new(MessageError(msg.into()))
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

/// What a caught panic carried.
#[derive(Clone, Debug)]
pub enum PanicPayload {
  /// The panic carried a `&str` or `String` message.
  Message(String),
  /// The panic re-raised an in-band error.
  Error(RxError),
  /// The payload was some other type.
  Opaque,
}

impl PanicPayload {
  pub(crate) fn from_unwind(payload: Box<dyn Any + Send>) -> Self {
    let payload = match payload.downcast::<&'static str>() {
      Ok(msg) => return PanicPayload::Message((*msg).to_owned()),
      Err(other) => other,
    };
    let payload = match payload.downcast::<String>() {
      Ok(msg) => return PanicPayload::Message(*msg),
      Err(other) => other,
    };
    match payload.downcast::<RxError>() {
      Ok(err) => PanicPayload::Error(*err),
      Err(_) => PanicPayload::Opaque,
    }
  }
}

impl fmt::Display for PanicPayload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PanicPayload::Message(msg) => f.write_str(msg),
      PanicPayload::Error(err) => write!(f, "{err}"),
      PanicPayload::Opaque => f.write_str("opaque panic payload"),
    }
  }
}

/// An observer callback panicked while handling a notification.
#[derive(Clone, Debug, Error)]
#[error("observer callback panicked: {cause}")]
pub struct ObserverError {
  cause: PanicPayload,
}

impl ObserverError {
  /// The recovered panic payload.
  pub fn cause(&self) -> &PanicPayload {
    &self.cause
  }
}

pub(crate) fn observer_panic_error(payload: Box<dyn Any + Send>) -> RxError {
  Arc::new(ObserverError { cause: PanicPayload::from_unwind(payload) })
}

/// One or more teardown functions panicked during unsubscription.
#[derive(Clone, Debug, Error)]
#[error("{} teardown function(s) panicked during unsubscription: {}", .causes.len(), render_causes(.causes))]
pub struct UnsubscriptionError {
  causes: Vec<PanicPayload>,
}

impl UnsubscriptionError {
  pub(crate) fn new(causes: Vec<PanicPayload>) -> Self {
    UnsubscriptionError { causes }
  }

  /// The recovered panic payloads, in finalizer execution order.
  pub fn causes(&self) -> &[PanicPayload] {
    &self.causes
  }
}

fn render_causes(causes: &[PanicPayload]) -> String {
  causes
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// A caller handed an operator an argument it cannot work with, e.g.
/// reversed clamp bounds.
#[derive(Clone, Debug, Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgumentError(pub String);
