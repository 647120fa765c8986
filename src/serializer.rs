use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

/// Producer-side serialization seam for subscribers.
///
/// Both implementations keep the same acquire/release call shape so the
/// synchronized and unsynchronized variants stay interchangeable and
/// measurable against each other. A separate lockless mode skips the
/// serializer entirely; "lock that does nothing" and "no lock" are distinct
/// on purpose.
pub(crate) trait Serializer: Send + Sync {
  fn acquire(&self);
  /// Attempts to acquire without blocking; false on contention.
  fn try_acquire(&self) -> bool;
  fn release(&self);
}

/// Serializer backed by a real mutex.
pub(crate) struct MutexSerializer {
  raw: RawMutex,
}

impl MutexSerializer {
  pub(crate) fn new() -> Self {
    MutexSerializer { raw: RawMutex::INIT }
  }
}

impl Serializer for MutexSerializer {
  fn acquire(&self) {
    self.raw.lock();
  }

  fn try_acquire(&self) -> bool {
    self.raw.try_lock()
  }

  fn release(&self) {
    // Callers pair release with a successful acquire on the same instance.
    unsafe { self.raw.unlock() }
  }
}

/// Serializer whose methods are invoked but do nothing.
pub(crate) struct NoopSerializer;

impl Serializer for NoopSerializer {
  fn acquire(&self) {}

  fn try_acquire(&self) -> bool {
    true
  }

  fn release(&self) {}
}
