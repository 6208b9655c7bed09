use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Wakes the sweeper thread early when it is asked to stop.
struct StopSignal {
  stopped: Mutex<bool>,
  condvar: Condvar,
}

/// The background thread that runs periodic cache maintenance.
///
/// Stopping (explicitly or by dropping) wakes the thread immediately and
/// joins it, so no scheduled work outlives its owner.
pub(crate) struct Sweeper {
  handle: Option<JoinHandle<()>>,
  signal: Arc<StopSignal>,
  interval: Duration,
}

impl Sweeper {
  /// Spawns a thread that calls `tick` once per `interval`, starting one
  /// interval from now.
  pub(crate) fn spawn<F>(interval: Duration, tick: F) -> Self
  where
    F: Fn() + Send + 'static,
  {
    let signal = Arc::new(StopSignal {
      stopped: Mutex::new(false),
      condvar: Condvar::new(),
    });
    let thread_signal = Arc::clone(&signal);

    let handle = thread::spawn(move || loop {
      // An interval too large to represent as an `Instant` never elapses.
      let deadline = Instant::now().checked_add(interval);
      {
        let mut stopped = thread_signal.stopped.lock();
        while !*stopped {
          match deadline {
            Some(deadline) => {
              if thread_signal
                .condvar
                .wait_until(&mut stopped, deadline)
                .timed_out()
              {
                break;
              }
            }
            None => thread_signal.condvar.wait(&mut stopped),
          }
        }
        if *stopped {
          return;
        }
      } // The lock is released before the caches are touched.

      tick();
    });

    Self {
      handle: Some(handle),
      signal,
      interval,
    }
  }

  pub(crate) fn interval(&self) -> Duration {
    self.interval
  }

  /// Signals the thread to stop and waits for it to exit.
  pub(crate) fn stop(mut self) {
    self.shutdown();
  }

  fn shutdown(&mut self) {
    {
      let mut stopped = self.signal.stopped.lock();
      *stopped = true;
    }
    self.signal.condvar.notify_all();

    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        tracing::warn!("cache sweeper thread panicked");
      }
    }
  }
}

impl Drop for Sweeper {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn ticks_repeatedly_until_stopped() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let sweeper = Sweeper::spawn(Duration::from_millis(10), move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(120));
    sweeper.stop();
    let after_stop = ticks.load(Ordering::SeqCst);
    assert!(after_stop >= 2, "expected several ticks, got {after_stop}");

    thread::sleep(Duration::from_millis(50));
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop, "no ticks after stop");
  }

  #[test]
  fn unrepresentable_interval_waits_for_stop() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let mut sweeper = Sweeper::spawn(Duration::MAX, move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(sweeper.interval(), Duration::MAX);

    thread::sleep(Duration::from_millis(50));
    let handle = sweeper.handle.take().unwrap();
    assert!(!handle.is_finished(), "the thread must still be waiting");

    *sweeper.signal.stopped.lock() = true;
    sweeper.signal.condvar.notify_all();
    assert!(handle.join().is_ok(), "the thread must exit without panicking");
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn stop_does_not_wait_for_the_interval() {
    let sweeper = Sweeper::spawn(Duration::from_secs(3600), || {});
    let started = Instant::now();
    drop(sweeper);
    assert!(started.elapsed() < Duration::from_secs(5));
  }
}
