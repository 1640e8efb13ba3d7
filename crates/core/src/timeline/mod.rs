use std::{fmt, sync::Arc};

use serde::Serialize;

use crate::{AudioClock, AudioOutput, GrainVoice, Result, ScorpionError};

/// Default polling period of the grain scheduler, in seconds.
pub const DEFAULT_PERIOD: f64 = 0.05;

/// Invocations a task may make in one [`Scheduler::run_until`] call. A task
/// that falls further behind skips ahead on its own grid instead.
pub const MAX_CATCH_UP: usize = 16;

/// Work driven by a [`Scheduler`].
///
/// `advance` is called with the time the task was scheduled for and returns
/// the absolute time of its next invocation. A non-finite return ends the
/// task.
pub trait TimedTask: Send {
    fn advance(&mut self, now: f64) -> f64;
}

struct Entry {
    task: Box<dyn TimedTask>,
    next_time: f64,
}

/// Session-owned scheduler. Due tasks run with their scheduled time rather
/// than the wall time, so execution jitter never accumulates into drift.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Box<dyn TimedTask>, start_time: f64) {
        self.entries.push(Entry {
            task,
            next_time: start_time,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending invocation, if any task is registered.
    pub fn next_time(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|entry| entry.next_time)
            .min_by(f64::total_cmp)
    }

    /// Runs every invocation due at or before `now` and returns how many ran.
    pub fn run_until(&mut self, now: f64) -> usize {
        let mut invocations = 0;

        self.entries.retain_mut(|entry| {
            let mut ran = 0;
            let mut previous = entry.next_time;
            while entry.next_time <= now {
                if ran == MAX_CATCH_UP {
                    let stride = entry.next_time - previous;
                    let skipped = ((now - entry.next_time) / stride).floor() + 1.0;
                    entry.next_time += skipped * stride;
                    tracing::warn!(
                        skipped,
                        next = entry.next_time,
                        "timed task fell behind, skipping missed invocations"
                    );
                    break;
                }
                let scheduled = entry.next_time;
                let next = entry.task.advance(scheduled);
                invocations += 1;

                if !next.is_finite() {
                    tracing::debug!(scheduled, "timed task finished");
                    return false;
                }
                if next <= scheduled {
                    tracing::warn!(scheduled, next, "timed task did not advance, removing it");
                    return false;
                }
                previous = scheduled;
                entry.next_time = next;
                ran += 1;
            }
            true
        });

        invocations
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.entries.len())
            .field("next_time", &self.next_time())
            .finish()
    }
}

/// Whether a grain will sound at the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrainState {
    Idle,
    Armed,
}

/// Polls the voice's gain once per period and triggers a grain when it is
/// non-zero.
pub struct GrainScheduler {
    voice: GrainVoice,
    clock: Arc<dyn AudioClock>,
    output: Arc<dyn AudioOutput>,
    period: f64,
}

impl GrainScheduler {
    pub fn new(
        voice: GrainVoice,
        clock: Arc<dyn AudioClock>,
        output: Arc<dyn AudioOutput>,
        period: f64,
    ) -> Result<Self> {
        if !(period.is_finite() && period > 0.0) {
            return Err(ScorpionError::config(format!(
                "scheduler period must be positive, got {period}"
            )));
        }

        Ok(Self {
            voice,
            clock,
            output,
            period,
        })
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn voice(&self) -> &GrainVoice {
        &self.voice
    }

    pub fn state(&self) -> GrainState {
        if self.voice.gain() > 0.0 {
            GrainState::Armed
        } else {
            GrainState::Idle
        }
    }
}

impl TimedTask for GrainScheduler {
    fn advance(&mut self, now: f64) -> f64 {
        match self.voice.trigger(self.clock.current_time()) {
            Ok(Some(grain)) => self.output.schedule(grain),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, now, "grain suppressed for this tick"),
        }

        now + self.period
    }
}

impl fmt::Debug for GrainScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrainScheduler")
            .field("period", &self.period)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{intensity::IntensityCell, BufferStore, GrainLog, ManualClock};

    fn grain_scheduler(period: f64) -> (GrainScheduler, IntensityCell, GrainLog, ManualClock) {
        let mut rng = StdRng::seed_from_u64(11);
        let buffers = BufferStore::with_white_noise(&mut rng, 1_000, 2.0).unwrap();
        let gain = IntensityCell::new();
        let voice = GrainVoice::with_rng(buffers, gain.clone(), rng);
        let log = GrainLog::new();
        let clock = ManualClock::new();
        let scheduler =
            GrainScheduler::new(voice, Arc::new(clock.clone()), Arc::new(log.clone()), period)
                .unwrap();
        (scheduler, gain, log, clock)
    }

    struct Recording {
        calls: Arc<Mutex<Vec<f64>>>,
        step: f64,
        remaining: usize,
    }

    impl TimedTask for Recording {
        fn advance(&mut self, now: f64) -> f64 {
            self.calls.lock().unwrap().push(now);
            if self.remaining == 0 {
                return f64::INFINITY;
            }
            self.remaining -= 1;
            now + self.step
        }
    }

    #[test]
    fn rejects_non_positive_period() {
        for period in [0.0, -0.05, f64::NAN] {
            let mut rng = StdRng::seed_from_u64(0);
            let buffers = BufferStore::with_white_noise(&mut rng, 100, 2.0).unwrap();
            let voice = GrainVoice::with_rng(buffers, IntensityCell::new(), rng);
            let err = GrainScheduler::new(
                voice,
                Arc::new(ManualClock::new()),
                Arc::new(GrainLog::new()),
                period,
            )
            .unwrap_err();
            assert!(matches!(err, ScorpionError::Configuration(_)));
        }
    }

    #[test]
    fn idle_ticks_keep_polling() {
        let (mut scheduler, _, log, _) = grain_scheduler(DEFAULT_PERIOD);
        assert_eq!(scheduler.state(), GrainState::Idle);
        assert_eq!(scheduler.advance(1.0), 1.0 + DEFAULT_PERIOD);
        assert!(log.is_empty().unwrap());
    }

    #[test]
    fn armed_tick_triggers_once() {
        let (mut scheduler, gain, log, clock) = grain_scheduler(DEFAULT_PERIOD);
        clock.set(3.5);
        gain.store(0.6);
        assert_eq!(scheduler.state(), GrainState::Armed);

        scheduler.advance(2.0);
        assert_eq!(scheduler.state(), GrainState::Idle);
        scheduler.advance(2.05);

        let grains = log.drain().unwrap();
        assert_eq!(grains.len(), 1);
        assert_eq!(grains[0].start_time, 3.5, "uses the output clock");
    }

    #[test]
    fn missing_buffer_keeps_the_loop_alive() {
        let (mut scheduler, gain, log, _) = grain_scheduler(DEFAULT_PERIOD);
        scheduler.voice().set_buffer(5);
        gain.store(0.6);

        assert_eq!(scheduler.advance(0.0), DEFAULT_PERIOD);
        assert!(log.is_empty().unwrap());

        scheduler.voice().set_buffer(0);
        gain.store(0.6);
        scheduler.advance(DEFAULT_PERIOD);
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn runs_due_invocations_without_drift() {
        let (grain_scheduler, gain, log, _) = grain_scheduler(0.05);
        let mut scheduler = Scheduler::new();
        scheduler.add(Box::new(grain_scheduler), 0.0);

        gain.store(0.4);
        assert_eq!(scheduler.run_until(0.0), 1);
        assert_eq!(log.len().unwrap(), 1);

        // A late wake-up catches up on every missed period.
        assert_eq!(scheduler.run_until(0.5), 10);
        let next = scheduler.next_time().unwrap();
        assert!((next - 0.55).abs() < 1e-9);
        assert!(next > 0.5);
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn invokes_tasks_with_scheduled_times() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.add(
            Box::new(Recording {
                calls: calls.clone(),
                step: 0.25,
                remaining: 100,
            }),
            1.0,
        );

        scheduler.run_until(0.9);
        scheduler.run_until(1.3);
        scheduler.run_until(1.77);

        let calls = calls.lock().unwrap();
        assert_eq!(*calls, vec![1.0, 1.25, 1.5, 1.75]);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], 0.25);
        }
    }

    #[test]
    fn long_stall_skips_ahead_on_the_grid() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.add(
            Box::new(Recording {
                calls: calls.clone(),
                step: 0.25,
                remaining: usize::MAX,
            }),
            0.0,
        );

        assert_eq!(scheduler.run_until(100.1), MAX_CATCH_UP);
        assert_eq!(scheduler.next_time(), Some(100.25));

        assert_eq!(scheduler.run_until(100.25), 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), MAX_CATCH_UP + 1);
        assert_eq!(calls[MAX_CATCH_UP - 1], 3.75);
        assert_eq!(calls[MAX_CATCH_UP], 100.25);
    }

    #[test]
    fn removes_finished_and_stalled_tasks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.add(
            Box::new(Recording {
                calls: calls.clone(),
                step: 0.5,
                remaining: 1,
            }),
            0.0,
        );
        scheduler.add(
            Box::new(Recording {
                calls: calls.clone(),
                step: 0.0,
                remaining: 10,
            }),
            0.0,
        );

        assert_eq!(scheduler.run_until(2.0), 3);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_time(), None);
    }
}
