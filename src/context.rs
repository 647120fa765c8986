use std::{
  any::{Any, TypeId},
  collections::HashMap,
  sync::Arc,
};

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Immutable bag of typed values that travels with every notification and
/// teardown.
///
/// A context is cheap to clone and never mutated in place: `with_value`
/// returns a derived context. Values are keyed by their type, so a private
/// key type per concern avoids collisions the same way unexported context
/// keys do.
#[derive(Clone, Default)]
pub struct Context {
  values: Option<Arc<ValueMap>>,
}

impl Context {
  /// An empty context. Allocation-free.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a derived context that also carries `value`, keyed by its
  /// type. A later value of the same type shadows the earlier one.
  pub fn with_value<V: Any + Send + Sync>(&self, value: V) -> Self {
    let mut values: ValueMap = self
      .values
      .as_deref()
      .cloned()
      .unwrap_or_default();
    values.insert(TypeId::of::<V>(), Arc::new(value));
    Context { values: Some(Arc::new(values)) }
  }

  /// Looks up the value of type `V`, if any.
  pub fn value<V: Any + Send + Sync>(&self) -> Option<&V> {
    self
      .values
      .as_ref()?
      .get(&TypeId::of::<V>())?
      .downcast_ref()
  }

  /// Returns a derived context that disables observer panic capture for
  /// subscriptions driven with it.
  ///
  /// Intended for benchmarking or ultra-low-latency pipelines where the
  /// capture wrapper is measurable; capture stays enabled by default.
  pub fn with_panic_capture_disabled(&self) -> Self {
    self.with_value(PanicCaptureDisabled)
  }

  /// True when this context carries the panic-capture opt-out.
  pub fn is_panic_capture_disabled(&self) -> bool {
    self.value::<PanicCaptureDisabled>().is_some()
  }
}

struct PanicCaptureDisabled;

#[cfg(test)]
mod test {
  use super::*;

  struct Tenant(&'static str);

  #[test]
  fn empty_context_has_no_values() {
    let ctx = Context::new();
    assert!(ctx.value::<Tenant>().is_none());
    assert!(!ctx.is_panic_capture_disabled());
  }

  #[test]
  fn with_value_derives_without_mutating() {
    let base = Context::new();
    let derived = base.with_value(Tenant("acme"));

    assert!(base.value::<Tenant>().is_none());
    assert_eq!(derived.value::<Tenant>().unwrap().0, "acme");
  }

  #[test]
  fn later_value_shadows_earlier() {
    let ctx = Context::new()
      .with_value(Tenant("first"))
      .with_value(Tenant("second"));
    assert_eq!(ctx.value::<Tenant>().unwrap().0, "second");
  }

  #[test]
  fn capture_opt_out_is_carried() {
    let ctx = Context::new().with_panic_capture_disabled();
    assert!(ctx.is_panic_capture_disabled());

    // Unrelated derivations keep the marker.
    let derived = ctx.with_value(Tenant("acme"));
    assert!(derived.is_panic_capture_disabled());
  }
}
