use std::{
  fmt, ops,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;

use crate::{
  context::Context,
  error::RxError,
  observable::Observable,
  observer::{CallbackObserver, Observer},
  subscriber::ConcurrencyMode,
  subscription::{Teardown, Unsubscribable},
};

impl<Item: fmt::Debug + 'static> Observable<Item> {
  /// Counts the values the source emits and delivers the total when the
  /// source completes.
  pub fn count(&self) -> Observable<u64> {
    let source = self.clone();

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let counter = Arc::new(AtomicU64::new(0));
      let next = {
        let counter = counter.clone();
        move |_: &Context, _: Item| {
          counter.fetch_add(1, Ordering::AcqRel);
        }
      };
      let error = {
        let destination = destination.clone();
        move |ctx: &Context, err: RxError| destination.error_with_context(ctx, err)
      };
      let complete = {
        let destination = destination.clone();
        move |ctx: &Context| {
          destination.next_with_context(ctx, counter.load(Ordering::Acquire));
          destination.complete_with_context(ctx);
        }
      };

      let upstream =
        source.subscribe_with_context(ctx, CallbackObserver::with_context(next, error, complete));
      Some(Box::new(move || upstream.unsubscribe()) as Teardown)
    })
  }
}

impl<Item> Observable<Item>
where
  Item: Copy + Default + ops::AddAssign + fmt::Debug + Send + 'static,
{
  /// Sums the values the source emits and delivers the total when the
  /// source completes. An empty source sums to the default value.
  pub fn sum(&self) -> Observable<Item> {
    let source = self.clone();

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let total = Arc::new(Mutex::new(Item::default()));
      let next = {
        let total = total.clone();
        move |_: &Context, value: Item| {
          *total.lock() += value;
        }
      };
      let error = {
        let destination = destination.clone();
        move |ctx: &Context, err: RxError| destination.error_with_context(ctx, err)
      };
      let complete = {
        let destination = destination.clone();
        move |ctx: &Context| {
          let total = *total.lock();
          destination.next_with_context(ctx, total);
          destination.complete_with_context(ctx);
        }
      };

      let upstream =
        source.subscribe_with_context(ctx, CallbackObserver::with_context(next, error, complete));
      Some(Box::new(move || upstream.unsubscribe()) as Teardown)
    })
  }
}

impl<Item> Observable<Item>
where
  Item: Copy + Into<f64> + fmt::Debug + Send + 'static,
{
  /// Averages the values the source emits and delivers the result when the
  /// source completes. An empty source averages to a single NaN.
  pub fn average(&self) -> Observable<f64> {
    let source = self.clone();

    Observable::with_mode(ConcurrencyMode::Unsafe, move |ctx, destination| {
      let state = Arc::new(Mutex::new((0.0_f64, 0_u64)));
      let next = {
        let state = state.clone();
        move |_: &Context, value: Item| {
          let mut state = state.lock();
          state.0 += value.into();
          state.1 += 1;
        }
      };
      let error = {
        let destination = destination.clone();
        move |ctx: &Context, err: RxError| destination.error_with_context(ctx, err)
      };
      let complete = {
        let destination = destination.clone();
        move |ctx: &Context| {
          let (total, count) = *state.lock();
          if count == 0 {
            destination.next_with_context(ctx, f64::NAN);
            destination.complete_with_context(ctx);
            return;
          }
          destination.next_with_context(ctx, total / count as f64);
          destination.complete_with_context(ctx);
        }
      };

      let upstream =
        source.subscribe_with_context(ctx, CallbackObserver::with_context(next, error, complete));
      Some(Box::new(move || upstream.unsubscribe()) as Teardown)
    })
  }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::AtomicUsize;

  use super::*;
  use crate::{error::error_message, observer::CallbackObserver};

  fn approx_eq(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= 1e-9
  }

  #[test]
  fn count_delivers_the_total_on_complete() {
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = counts.clone();
    Observable::from_iter(vec!["a", "b", "c"])
      .count()
      .subscribe(CallbackObserver::on_next(move |n: u64| sink.lock().push(n)));

    assert_eq!(*counts.lock(), vec![3]);
  }

  #[test]
  fn count_of_empty_source_is_zero() {
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = counts.clone();
    Observable::<i32>::empty()
      .count()
      .subscribe(CallbackObserver::on_next(move |n: u64| sink.lock().push(n)));

    assert_eq!(*counts.lock(), vec![0]);
  }

  #[test]
  fn sum_accumulates() {
    let sums = Arc::new(Mutex::new(Vec::new()));
    let sink = sums.clone();
    Observable::from_iter(1..=4)
      .sum()
      .subscribe(CallbackObserver::on_next(move |n: i32| sink.lock().push(n)));

    assert_eq!(*sums.lock(), vec![10]);
  }

  #[test]
  fn average_delivers_the_mean() {
    let averages = Arc::new(Mutex::new(Vec::new()));
    let sink = averages.clone();
    Observable::from_iter(vec![1_i32, 2, 3, 4])
      .average()
      .subscribe(CallbackObserver::on_next(move |avg: f64| sink.lock().push(avg)));

    let averages = averages.lock();
    assert_eq!(averages.len(), 1);
    assert!(approx_eq(2.5, averages[0]));
  }

  #[test]
  fn average_of_empty_source_is_a_single_nan_then_complete() {
    let averages = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));

    let sink = averages.clone();
    let counter = completions.clone();
    Observable::<i32>::empty().average().subscribe(CallbackObserver::new(
      move |avg: f64| sink.lock().push(avg),
      |e| panic!("unexpected error: {e}"),
      move || {
        counter.fetch_add(1, Ordering::SeqCst);
      },
    ));

    let averages = averages.lock();
    assert_eq!(averages.len(), 1);
    assert!(averages[0].is_nan());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn reductions_forward_errors() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    Observable::<i32>::throw(error_message("upstream"))
      .sum()
      .subscribe(CallbackObserver::on_error(move |e| sink.lock().push(e.to_string())));

    assert_eq!(*errors.lock(), vec!["upstream"]);
  }
}
