//! Actuation controller: a fixed-period loop driving the motor and the ring.
//!
//! Two phases. `Idle` shows the static count/color snapshot and starts a
//! job when a freshly polled state carries a request. `Active` counts the
//! job down by measured elapsed time, animates the ring, and on reaching
//! zero brakes, restores the snapshot and reports the completion.
//!
//! Hardware side effects are fire-and-forget: failures are logged, never
//! retried, and never change the phase.
use std::time::{Duration, Instant};

use dispenser_traits::{Clock, LedRing, Motor};
use tracing::{debug, info, warn};

use crate::animation::{Chase, snapshot};
use crate::config::ControllerCfg;
use crate::mailbox::{Notifier, StateInbox};
use crate::state::{DeviceState, RequestKey, Rgb, Visual};
use crate::status::ActuationStatus;
use crate::util::elapsed_ms_u32;

#[derive(Debug)]
enum Phase {
    Idle,
    Active { remaining_ms: u32, job: DeviceState },
}

pub struct Controller<M: Motor, L: LedRing, C: Clock> {
    motor: M,
    ring: L,
    clock: C,
    epoch: Instant,
    inbox: StateInbox,
    notifier: Notifier,
    period: Duration,
    chase: Chase,
    /// Last state received from the reconciler.
    latest: DeviceState,
    phase: Phase,
    /// What the idle ring currently shows; `None` until the first draw.
    rendered: Option<Visual>,
    last_tick: Instant,
    frame: u32,
    last_served: Option<RequestKey>,
}

impl<M: Motor, L: LedRing, C: Clock> Controller<M, L, C> {
    /// `epoch` must be the same instant the reconciler uses, so tick counts
    /// stored in a job match the ones used to time its completion.
    pub fn new(
        motor: M,
        ring: L,
        clock: C,
        epoch: Instant,
        inbox: StateInbox,
        notifier: Notifier,
        cfg: &ControllerCfg,
    ) -> Self {
        let chase = Chase::new(ring.len(), cfg.substeps_per_pixel);
        let last_tick = clock.now();
        Self {
            motor,
            ring,
            clock,
            epoch,
            inbox,
            notifier,
            period: cfg.tick,
            chase,
            latest: DeviceState::default(),
            phase: Phase::Idle,
            rendered: None,
            last_tick,
            frame: 0,
            last_served: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    /// Countdown of the running job, if any.
    pub fn remaining_ms(&self) -> Option<u32> {
        match self.phase {
            Phase::Active { remaining_ms, .. } => Some(remaining_ms),
            Phase::Idle => None,
        }
    }

    /// One iteration of the loop. Never blocks.
    pub fn tick(&mut self) -> ActuationStatus {
        let now = self.clock.now();
        let elapsed = elapsed_ms_u32(now, self.last_tick);
        self.last_tick = now;

        // The time before activation was spent idle; it does not count.
        let mut started = false;
        if let Some(state) = self.inbox.poll() {
            if state.dispense_requested {
                started = self.try_start(&state);
            }
            self.latest = state;
        }

        let remaining = match &mut self.phase {
            Phase::Idle => None,
            Phase::Active { remaining_ms, .. } => {
                if !started {
                    *remaining_ms = remaining_ms.saturating_sub(elapsed);
                }
                Some(*remaining_ms)
            }
        };

        match remaining {
            None => {
                self.refresh_idle();
                ActuationStatus::Idle
            }
            Some(0) => self.finish(),
            Some(remaining_ms) => {
                debug!(remaining_ms, elapsed_ms = elapsed, "dispensing");
                self.draw_chase();
                ActuationStatus::Dispensing { remaining_ms }
            }
        }
    }

    /// Tick forever at the configured period.
    pub fn run(mut self) {
        info!(tick_ms = self.period.as_millis() as u64, "actuation loop started");
        loop {
            self.tick();
            self.clock.sleep(self.period);
        }
    }

    fn try_start(&mut self, state: &DeviceState) -> bool {
        if self.is_active() {
            debug!(request_id = %state.request_id, "request ignored while dispensing");
            return false;
        }
        // Anonymous requests cannot be told apart, so each one is served.
        let key = state.request_key();
        if !key.request_id.is_empty() && self.last_served.as_ref() == Some(&key) {
            debug!(request_id = %state.request_id, "request already served");
            return false;
        }

        let mut job = state.clone();
        job.local_start_ms = self.clock.ticks_since(self.epoch);
        info!(
            request_id = %job.request_id,
            duration_ms = job.dispense_duration_ms,
            local_start_ms = job.local_start_ms,
            "dispense started"
        );
        if let Err(e) = self.motor.forward() {
            warn!(error = %e, "motor forward failed");
        }
        self.frame = 0;
        self.phase = Phase::Active {
            remaining_ms: job.dispense_duration_ms,
            job,
        };
        true
    }

    fn finish(&mut self) -> ActuationStatus {
        let Phase::Active { job, .. } = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return ActuationStatus::Idle;
        };
        if let Err(e) = self.motor.brake() {
            warn!(error = %e, "motor brake failed");
        }
        info!(request_id = %job.request_id, "dispense complete");
        self.last_served = Some(job.request_key());
        self.render(self.latest.visual());
        self.notifier.complete(job);
        ActuationStatus::Completed
    }

    /// Redraw the snapshot and ask for a report, only when it changed.
    fn refresh_idle(&mut self) {
        let visual = self.latest.visual();
        if self.rendered == Some(visual) {
            return;
        }
        debug!(count = visual.count, color = %visual.color, on = visual.enabled, "ring changed");
        self.render(visual);
        self.notifier.raise();
    }

    fn render(&mut self, visual: Visual) {
        self.rendered = Some(visual);
        if self.ring.is_empty() {
            return;
        }
        if visual.enabled {
            let frame = snapshot(&visual, self.ring.len());
            self.paint(&frame);
        } else if let Err(e) = self.ring.turn_off(self.ring.len()) {
            warn!(error = %e, "ring turn-off failed");
        }
    }

    fn draw_chase(&mut self) {
        if self.ring.is_empty() {
            return;
        }
        let frame = self.chase.frame(self.frame);
        self.paint(&frame);
        self.frame = (self.frame + 1) % self.chase.period();
    }

    fn paint(&mut self, frame: &[Rgb]) {
        for (i, px) in frame.iter().enumerate() {
            if let Err(e) = self.ring.set_pixel(i, px.r, px.g, px.b) {
                warn!(error = %e, pixel = i, "ring write failed");
                return;
            }
        }
        if let Err(e) = self.ring.show() {
            warn!(error = %e, "ring show failed");
        }
    }
}
