mod from_iter;
mod of;
mod trivial;

use std::{fmt, sync::Arc};

use crate::{
  context::Context,
  observer::Observer,
  subscriber::{ConcurrencyMode, Subscriber},
  subscription::Teardown,
};

/// Factory invoked on every subscription. It receives the subscribing
/// context and the wrapping [`Subscriber`] as its destination, emits
/// synchronously or spawns producers, and returns an optional teardown
/// releasing whatever it acquired.
///
/// A factory that spawns workers must route worker panics through the
/// unhandled-error hook and return a teardown that makes those workers
/// exit; nothing here kills them.
pub type SourceFactory<Item> = dyn Fn(&Context, Subscriber<Item>) -> Option<Teardown> + Send + Sync;

/// A lazy push-based sequence of values.
///
/// Subscribing wraps the destination observer in a [`Subscriber`] carrying
/// this observable's concurrency mode, runs the source factory against it,
/// and returns the subscriber as the cancellation handle. Nothing happens
/// until `subscribe` is called, and each subscription runs the factory
/// again.
pub struct Observable<Item> {
  source: Arc<SourceFactory<Item>>,
  mode: ConcurrencyMode,
}

impl<Item> Clone for Observable<Item> {
  fn clone(&self) -> Self {
    Observable { source: self.source.clone(), mode: self.mode }
  }
}

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Creates an observable whose subscribers fully serialize producers
  /// ([`ConcurrencyMode::Safe`]).
  pub fn new<F>(source: F) -> Self
  where
    F: Fn(&Context, Subscriber<Item>) -> Option<Teardown> + Send + Sync + 'static,
  {
    Self::with_mode(ConcurrencyMode::Safe, source)
  }

  /// Creates an observable with an explicit producer-side concurrency
  /// mode. The mode only changes how the wrapping subscriber serializes
  /// producers; everything else behaves identically.
  pub fn with_mode<F>(mode: ConcurrencyMode, source: F) -> Self
  where
    F: Fn(&Context, Subscriber<Item>) -> Option<Teardown> + Send + Sync + 'static,
  {
    Observable { source: Arc::new(source), mode }
  }

  /// Subscribes `destination` with an empty context.
  pub fn subscribe(&self, destination: impl Observer<Item = Item> + 'static) -> Subscriber<Item> {
    self.subscribe_with_context(&Context::default(), destination)
  }

  /// Subscribes `destination`, threading `ctx` through the source factory
  /// and into every teardown.
  ///
  /// The returned subscriber doubles as the subscription handle; if the
  /// source already terminated synchronously, the factory's teardown has
  /// run by the time this returns.
  pub fn subscribe_with_context(
    &self,
    ctx: &Context,
    destination: impl Observer<Item = Item> + 'static,
  ) -> Subscriber<Item> {
    let subscriber = Subscriber::with_mode(destination, self.mode);
    subscriber.install_direct_dispatch(ctx);

    if let Some(teardown) = (self.source)(ctx, subscriber.clone()) {
      subscriber.add(teardown);
    }

    subscriber
  }

  /// The concurrency mode subscribers of this observable are built with.
  pub fn mode(&self) -> ConcurrencyMode {
    self.mode
  }
}
