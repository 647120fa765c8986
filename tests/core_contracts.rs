//! End-to-end contracts of the notification kernel: delivery ordering,
//! termination-once under concurrency, teardown semantics and panic
//! containment, exercised through the public API only.

use std::{
  fmt::Display,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc, Arc,
  },
  thread,
  time::Duration,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rxflow::prelude::*;

/// Serializes every test that replaces or feeds the process-wide hooks, so
/// concurrent test threads never pollute each other's counters.
static HOOK_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn with_dropped_notification<R>(
  handler: impl Fn(&Context, &dyn Display) + Send + Sync + 'static,
  f: impl FnOnce() -> R,
) -> R {
  let _guard = HOOK_GUARD.lock();
  set_on_dropped_notification(handler);
  let result = f();
  reset_on_dropped_notification();
  result
}

fn collect_dropped<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
  let dropped = Arc::new(Mutex::new(Vec::new()));
  let sink = dropped.clone();
  let result = with_dropped_notification(
    move |_, notification| sink.lock().push(notification.to_string()),
    f,
  );
  let dropped = dropped.lock().clone();
  (result, dropped)
}

struct Recorder {
  values: Mutex<Vec<i32>>,
  errors: Mutex<Vec<String>>,
  completions: AtomicUsize,
}

impl Recorder {
  fn new() -> Arc<Self> {
    Arc::new(Recorder {
      values: Mutex::new(Vec::new()),
      errors: Mutex::new(Vec::new()),
      completions: AtomicUsize::new(0),
    })
  }

  fn observer(self: &Arc<Self>) -> Arc<CallbackObserver<i32>> {
    let on_next = {
      let recorder = self.clone();
      move |v| recorder.values.lock().push(v)
    };
    let on_error = {
      let recorder = self.clone();
      move |e: RxError| recorder.errors.lock().push(e.to_string())
    };
    let on_complete = {
      let recorder = self.clone();
      move || {
        recorder.completions.fetch_add(1, Ordering::SeqCst);
      }
    };
    Arc::new(CallbackObserver::new(on_next, on_error, on_complete))
  }
}

#[test]
fn simple_sequence_is_delivered_in_order() {
  let recorder = Recorder::new();
  let observer = recorder.observer();

  let subscription = Observable::new(|ctx: &Context, destination: Subscriber<i32>| {
    destination.next_with_context(ctx, 1);
    destination.next_with_context(ctx, 2);
    destination.next_with_context(ctx, 3);
    destination.complete_with_context(ctx);
    None
  })
  .subscribe(observer.clone());

  subscription.wait();

  assert_eq!(*recorder.values.lock(), vec![1, 2, 3]);
  assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);
  assert!(observer.is_completed());
  assert!(observer.is_closed());
  assert!(!observer.has_thrown());
}

#[test]
fn error_short_circuits_and_accounts_the_rest_as_drops() {
  let recorder = Recorder::new();
  let observer = recorder.observer();

  let ((), dropped) = collect_dropped(|| {
    Observable::new(|ctx: &Context, destination: Subscriber<i32>| {
      destination.next_with_context(ctx, 1);
      destination.error_with_context(ctx, error_message("broken pipe"));
      destination.next_with_context(ctx, 2);
      destination.complete_with_context(ctx);
      None
    })
    .subscribe(observer.clone());
  });

  assert_eq!(*recorder.values.lock(), vec![1]);
  assert_eq!(*recorder.errors.lock(), vec!["broken pipe"]);
  assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
  assert!(observer.has_thrown());
  assert_eq!(dropped, vec!["Next(2)", "Complete()"]);
}

#[test]
fn teardown_runs_once_after_the_terminal_callback() {
  let order = Arc::new(Mutex::new(Vec::new()));

  let log = order.clone();
  let observer = CallbackObserver::new(
    |_: i32| {},
    |e| panic!("unexpected error: {e}"),
    move || log.lock().push("complete"),
  );

  let log = order.clone();
  Observable::new(move |ctx: &Context, destination: Subscriber<i32>| {
    destination.next_with_context(ctx, 1);
    destination.complete_with_context(ctx);
    let log = log.clone();
    Some(Box::new(move || log.lock().push("teardown")) as Teardown)
  })
  .subscribe(observer);

  assert_eq!(*order.lock(), vec!["complete", "teardown"]);
}

#[test]
fn late_add_runs_synchronously_and_is_not_retained() {
  let runs = Arc::new(AtomicUsize::new(0));

  let subscription = Subscription::new();
  subscription.unsubscribe();

  let counter = runs.clone();
  subscription.add(move || {
    counter.fetch_add(1, Ordering::SeqCst);
  });
  assert_eq!(runs.load(Ordering::SeqCst), 1);

  subscription.unsubscribe();
  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn hundred_racing_completes_deliver_exactly_one() {
  let completions = Arc::new(AtomicUsize::new(0));
  let finalizer_runs = Arc::new(AtomicUsize::new(0));

  let ((), dropped) = collect_dropped(|| {
    let counter = completions.clone();
    let subscriber = Subscriber::new(CallbackObserver::new(
      |_: i32| {},
      |e| panic!("unexpected error: {e}"),
      move || {
        counter.fetch_add(1, Ordering::SeqCst);
      },
    ));
    let finalizer = finalizer_runs.clone();
    subscriber.add(move || {
      finalizer.fetch_add(1, Ordering::SeqCst);
    });

    crossbeam_utils::thread::scope(|scope| {
      for _ in 0..100 {
        let subscriber = subscriber.clone();
        scope.spawn(move |_| subscriber.complete());
      }
    })
    .unwrap();
  });

  assert_eq!(completions.load(Ordering::SeqCst), 1);
  assert_eq!(finalizer_runs.load(Ordering::SeqCst), 1);
  let dropped_completes = dropped.iter().filter(|n| *n == "Complete()").count();
  assert_eq!(dropped_completes, 99);
}

#[test]
fn mixed_terminal_race_honors_exactly_one() {
  let terminals = Arc::new(AtomicUsize::new(0));

  let ((), dropped) = collect_dropped(|| {
    let errors = terminals.clone();
    let completions = terminals.clone();
    let subscriber = Subscriber::new(CallbackObserver::new(
      |_: i32| {},
      move |_| {
        errors.fetch_add(1, Ordering::SeqCst);
      },
      move || {
        completions.fetch_add(1, Ordering::SeqCst);
      },
    ));

    crossbeam_utils::thread::scope(|scope| {
      for i in 0..100 {
        let subscriber = subscriber.clone();
        if i % 2 == 0 {
          scope.spawn(move |_| subscriber.complete());
        } else {
          scope.spawn(move |_| subscriber.error(error_message("racing")));
        }
      }
    })
    .unwrap();

    assert!(subscriber.subscription().is_closed());
  });

  assert_eq!(terminals.load(Ordering::SeqCst), 1);
  assert_eq!(dropped.len(), 99);
}

#[test]
fn no_next_is_delivered_after_the_terminal_returns() {
  let complete_seen = Arc::new(AtomicBool::new(false));
  let violated = Arc::new(AtomicBool::new(false));
  let delivered = Arc::new(AtomicUsize::new(0));

  let ((), dropped) = collect_dropped(|| {
    let subscriber = {
      let complete_seen = complete_seen.clone();
      let complete_seen_complete = complete_seen.clone();
      let violated = violated.clone();
      let delivered = delivered.clone();
      Subscriber::new(CallbackObserver::new(
        move |_: i32| {
          if complete_seen.load(Ordering::SeqCst) {
            violated.store(true, Ordering::SeqCst);
          }
          delivered.fetch_add(1, Ordering::SeqCst);
        },
        |e| panic!("unexpected error: {e}"),
        move || complete_seen_complete.store(true, Ordering::SeqCst),
      ))
    };

    crossbeam_utils::thread::scope(|scope| {
      for _ in 0..4 {
        let subscriber = subscriber.clone();
        scope.spawn(move |_| {
          for v in 0..250 {
            subscriber.next(v);
          }
        });
      }
      let subscriber = subscriber.clone();
      scope.spawn(move |_| {
        thread::sleep(Duration::from_millis(1));
        subscriber.complete();
      });
    })
    .unwrap();
  });

  assert!(!violated.load(Ordering::SeqCst));
  let dropped_nexts = dropped.iter().filter(|n| n.starts_with("Next(")).count();
  assert_eq!(delivered.load(Ordering::SeqCst) + dropped_nexts, 1000);
}

#[test]
fn drop_backpressure_surfaces_the_loser() {
  let delivered = Arc::new(Mutex::new(Vec::new()));
  let (entered_tx, entered_rx) = mpsc::channel();
  let (release_tx, release_rx) = mpsc::channel::<()>();
  let entered_tx = Mutex::new(entered_tx);
  let release_rx = Mutex::new(release_rx);

  let sink = delivered.clone();
  let subscriber = Subscriber::with_mode(
    CallbackObserver::new(
      move |v: i32| {
        sink.lock().push(v);
        if v == 1 {
          entered_tx.lock().send(()).unwrap();
          release_rx.lock().recv().unwrap();
        }
      },
      |e| panic!("unexpected error: {e}"),
      || {},
    ),
    ConcurrencyMode::EventuallySafe,
  );

  let ((), dropped) = collect_dropped(|| {
    thread::scope(|scope| {
      let blocker = subscriber.clone();
      scope.spawn(move || blocker.next(1));

      entered_rx.recv().unwrap();
      subscriber.next(2);
      release_tx.send(()).unwrap();
    });
  });

  assert_eq!(*delivered.lock(), vec![1]);
  assert_eq!(dropped, vec!["Next(2)"]);
}

#[test]
fn next_panic_is_contained_and_bounced_to_error() {
  let recorder = Recorder::new();
  let errors = recorder.clone();
  let observer = Arc::new(CallbackObserver::new(
    |_: i32| panic!("x marks the spot"),
    move |e: RxError| errors.errors.lock().push(e.to_string()),
    || {},
  ));

  Observable::new(|ctx: &Context, destination: Subscriber<i32>| {
    destination.next_with_context(ctx, 1);
    None
  })
  .subscribe(observer.clone());

  let errors = recorder.errors.lock();
  assert_eq!(errors.len(), 1);
  assert!(errors[0].contains("x marks the spot"));
  assert!(observer.has_thrown());
}

#[test]
fn capture_opt_out_lets_the_panic_reach_the_producer() {
  let observable = Observable::new(|ctx: &Context, destination: Subscriber<i32>| {
    destination.next_with_context(ctx, 1);
    None
  });

  let ctx = Context::new().with_panic_capture_disabled();
  let result = catch_unwind(AssertUnwindSafe(|| {
    observable.subscribe_with_context(
      &ctx,
      CallbackObserver::new(|_: i32| panic!("raw panic"), |_| {}, || {}),
    );
  }));

  assert!(result.is_err());
}

#[test]
fn unsubscribe_context_reaches_context_finalizers() {
  struct Deadline(&'static str);

  let seen = Arc::new(Mutex::new(None));

  let subscription = Observable::<i32>::never().subscribe(CallbackObserver::noop());
  let sink = seen.clone();
  subscription.add_with_context(move |ctx| {
    *sink.lock() = ctx.value::<Deadline>().map(|d| d.0);
  });

  subscription.unsubscribe_with_context(&Context::new().with_value(Deadline("100ms")));

  assert_eq!(*seen.lock(), Some("100ms"));
}

#[test]
fn operator_chains_compose_over_the_kernel() {
  let seen = Arc::new(Mutex::new(Vec::new()));

  let sink = seen.clone();
  let ((), dropped) = collect_dropped(|| {
    Observable::from_iter(1..=10)
      .map(|v| v * 2)
      .filter(|v| *v > 10)
      .take(3)
      .subscribe(CallbackObserver::on_next(move |v: i32| sink.lock().push(v)));
  });

  assert_eq!(*seen.lock(), vec![12, 14, 16]);
  // The cancelled upstream still tried to complete once.
  assert_eq!(dropped, vec!["Complete()"]);
}

#[test]
fn cancellation_cascades_through_operators() {
  let finalized = Arc::new(AtomicUsize::new(0));

  let counter = finalized.clone();
  let subscription = Observable::<i32>::never()
    .map(|v| v)
    .finalize(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    })
    .subscribe(CallbackObserver::noop());

  assert_eq!(finalized.load(Ordering::SeqCst), 0);
  subscription.unsubscribe();
  assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn reductions_deliver_on_complete() {
  let results = Arc::new(Mutex::new(Vec::new()));

  let sink = results.clone();
  Observable::from_iter(vec![2_i32, 4, 6])
    .average()
    .subscribe(CallbackObserver::on_next(move |avg: f64| sink.lock().push(avg)));

  assert_eq!(*results.lock(), vec![4.0]);
}

#[test]
fn threaded_producer_completes_and_wait_unblocks() {
  let recorder = Recorder::new();
  let observer = recorder.observer();

  let subscription = Observable::with_mode(
    ConcurrencyMode::Safe,
    |ctx: &Context, destination: Subscriber<i32>| {
      let ctx = ctx.clone();
      thread::spawn(move || {
        for v in 1..=3 {
          destination.next_with_context(&ctx, v);
        }
        destination.complete_with_context(&ctx);
      });
      None
    },
  )
  .subscribe(observer.clone());

  subscription.wait();

  assert_eq!(*recorder.values.lock(), vec![1, 2, 3]);
  assert!(observer.is_completed());
}
