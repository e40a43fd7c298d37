//! Embassy time driver running on a scaled virtual clock.
//!
//! Virtual time advances at `speed_percent / 100` times host time, so a
//! simulated run of minutes can finish in seconds. Changing the speed rebases
//! the mapping at the current instant, keeping virtual "now" continuous.
//! A background thread wakes timers once their virtual deadline is reached.

use core::task::Waker;
use embassy_time_driver::{Driver, TICK_HZ, time_driver_impl};
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant as StdInstant};

pub const MIN_SPEED_PERCENT: u32 = 1;
pub const MAX_SPEED_PERCENT: u32 = 10_000;

// Fixed-point Q32.32 speed factor. 1.0 == 1 << 32.
const ONE_Q32: u128 = 1 << 32;
const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
struct ScaledClock {
    origin_real: StdInstant,
    origin_ticks: u64,
    scale_q32: u128,
    percent: u32,
}

impl ScaledClock {
    fn new(origin_real: StdInstant) -> Self {
        Self {
            origin_real,
            origin_ticks: 0,
            scale_q32: ONE_Q32,
            percent: 100,
        }
    }

    fn to_virtual(&self, real: StdInstant) -> u64 {
        let real_ns = real.saturating_duration_since(self.origin_real).as_nanos();
        let real_ticks = real_ns * TICK_HZ as u128 / NANOS_PER_SEC;
        let scaled = real_ticks * self.scale_q32 / ONE_Q32;
        self.origin_ticks.saturating_add(scaled.min(u64::MAX as u128) as u64)
    }

    /// Host instant at which `ticks` is reached. Deadlines before the origin are due at the origin.
    fn to_real(&self, ticks: u64) -> StdInstant {
        let Some(virtual_dt) = ticks.checked_sub(self.origin_ticks) else {
            return self.origin_real;
        };
        let real_ticks = virtual_dt as u128 * ONE_Q32 / self.scale_q32;
        let real_ns = real_ticks * NANOS_PER_SEC / TICK_HZ as u128;
        self.origin_real + Duration::from_nanos(real_ns.min(u64::MAX as u128) as u64)
    }

    /// Switch to `percent` at host instant `now` without a jump in virtual time.
    fn rebase(&mut self, percent: u32, now: StdInstant) {
        self.origin_ticks = self.to_virtual(now);
        self.origin_real = now;
        self.scale_q32 = percent as u128 * ONE_Q32 / 100;
        self.percent = percent;
    }
}

/// Pending timer wakers keyed by virtual deadline.
#[derive(Default)]
struct WakeQueue {
    deadlines: BTreeMap<u64, Vec<Waker>>,
    // Bumped on speed changes so the scheduler re-evaluates its wait.
    epoch: u64,
}

impl WakeQueue {
    fn push(&mut self, at: u64, waker: &Waker) {
        let wakers = self.deadlines.entry(at).or_default();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.deadlines.keys().next().copied()
    }

    /// Remove and return every waker due at or before `now`.
    fn take_due(&mut self, now: u64) -> Vec<Waker> {
        let later = self.deadlines.split_off(&now.saturating_add(1));
        let due = std::mem::replace(&mut self.deadlines, later);
        due.into_values().flatten().collect()
    }
}

static CLOCK: OnceLock<Mutex<ScaledClock>> = OnceLock::new();
static QUEUE: OnceLock<Mutex<WakeQueue>> = OnceLock::new();
static QUEUE_CHANGED: Condvar = Condvar::new();
static SCHEDULER_STARTED: OnceLock<()> = OnceLock::new();

fn clock() -> &'static Mutex<ScaledClock> {
    CLOCK.get_or_init(|| Mutex::new(ScaledClock::new(StdInstant::now())))
}

fn queue() -> &'static Mutex<WakeQueue> {
    QUEUE.get_or_init(|| Mutex::new(WakeQueue::default()))
}

fn clock_snapshot() -> ScaledClock {
    *clock().lock().unwrap()
}

fn ensure_scheduler_thread() {
    SCHEDULER_STARTED.get_or_init(|| {
        std::thread::Builder::new()
            .name("virtual-time-scheduler".into())
            .spawn(scheduler_thread)
            .expect("failed to start virtual time scheduler thread");
    });
}

fn scheduler_thread() {
    // Upper bound on one wait so speed changes apply promptly even if a notify is missed.
    const MAX_WAIT_SLICE: Duration = Duration::from_millis(25);

    loop {
        // The queue lock is never held while the clock lock is taken.
        let (next_at, epoch) = {
            let mut guard = queue().lock().unwrap();
            loop {
                if let Some(next_at) = guard.next_deadline() {
                    break (next_at, guard.epoch);
                }
                guard = QUEUE_CHANGED.wait(guard).unwrap();
            }
        };

        let now = StdInstant::now();
        let real_target = clock_snapshot().to_real(next_at);
        if real_target > now {
            let wait = (real_target - now).min(MAX_WAIT_SLICE);
            let guard = queue().lock().unwrap();
            if guard.epoch == epoch {
                let _ = QUEUE_CHANGED.wait_timeout(guard, wait).unwrap();
            }
            continue;
        }

        let now_ticks = clock_snapshot().to_virtual(StdInstant::now());
        let ready = queue().lock().unwrap().take_due(now_ticks);
        for waker in ready {
            waker.wake();
        }
    }
}

struct ScaledDriver;

impl Driver for ScaledDriver {
    fn now(&self) -> u64 {
        clock_snapshot().to_virtual(StdInstant::now())
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        ensure_scheduler_thread();
        queue().lock().unwrap().push(at, waker);
        QUEUE_CHANGED.notify_all();
    }
}

time_driver_impl!(static DRIVER: ScaledDriver = ScaledDriver);

/// Set the virtual clock speed, clamped to `MIN_SPEED_PERCENT..=MAX_SPEED_PERCENT`.
pub fn set_simulation_speed_percent(percent: u32) {
    let percent = percent.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
    {
        let mut c = clock().lock().unwrap();
        if c.percent == percent {
            return;
        }
        c.rebase(percent, StdInstant::now());
    }
    {
        let mut q = queue().lock().unwrap();
        q.epoch = q.epoch.wrapping_add(1);
    }
    QUEUE_CHANGED.notify_all();
    log::debug!("Simulation speed set to {}%", percent);
}

pub fn get_simulation_speed_percent() -> u32 {
    clock().lock().unwrap().percent
}
