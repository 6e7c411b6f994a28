use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Lets at most one decode run at a time, with a minimum pause between decodes.
///
/// Frames that arrive while the gate is closed are dropped, never queued.
#[derive(Debug)]
pub struct DecodeGate {
    in_flight: AtomicBool,
    last_finished: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl DecodeGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last_finished: Mutex::new(None),
            min_interval,
        }
    }

    /// Claims the decode slot for a frame arriving at `now`, or `None` if the frame must be
    /// dropped.
    pub fn try_acquire(self: &Arc<Self>, now: Instant) -> Option<DecodePermit> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("decode in flight, dropping frame");
            return None;
        }
        let last = *self
            .last_finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = last {
            if now.saturating_duration_since(last) < self.min_interval {
                self.in_flight.store(false, Ordering::Release);
                trace!("decoded too recently, dropping frame");
                return None;
            }
        }
        Some(DecodePermit {
            gate: Arc::clone(self),
            acquired_at: now,
            finished_at: None,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn release(&self, finished_at: Instant) {
        *self
            .last_finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(finished_at);
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Holds the decode slot and can be moved onto a worker. Dropping it reopens the gate; the minimum
/// interval counts from the time passed to [`DecodePermit::finish`], or from acquisition if it
/// was never called.
#[derive(Debug)]
pub struct DecodePermit {
    gate: Arc<DecodeGate>,
    acquired_at: Instant,
    finished_at: Option<Instant>,
}

impl DecodePermit {
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn finish(mut self, now: Instant) {
        self.finished_at = Some(now);
    }
}

impl Drop for DecodePermit {
    fn drop(&mut self) {
        self.gate
            .release(self.finished_at.unwrap_or(self.acquired_at));
    }
}
