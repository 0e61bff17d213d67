//! State reconciler: owns the authoritative `DeviceState`.
//!
//! Merges inbound deltas and full shadow documents, publishes every new
//! state to the controller, and answers notifier wakes with exactly one
//! report of the state current at send time. Reports are paced by
//! `min_report_interval`; a report due too early waits, it is never dropped.
//!
//! Remote get/update failures are not fatal. They are logged and retried on
//! the next natural trigger: an inbound delta or a notifier wake.
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use dispenser_traits::{Clock, ShadowClient};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerCfg;
use crate::error::{DispenserError, Result};
use crate::fragment::{reconcile_delta, reconcile_full};
use crate::mailbox::{NotifyListener, StatePublisher, Wake};
use crate::report::build_report;
use crate::state::DeviceState;

pub struct Reconciler<S: ShadowClient, C: Clock> {
    client: S,
    clock: C,
    epoch: Instant,
    cfg: ReconcilerCfg,
    state: DeviceState,
    publisher: StatePublisher,
    listener: NotifyListener,
    deltas: xch::Receiver<String>,
    /// Wake not yet answered by a report.
    pending: Option<Wake>,
    last_report: Option<Instant>,
    /// The last get failed; fetch again on the next trigger.
    resync: bool,
    /// The last update failed; hold the pending report until the next trigger.
    stalled: bool,
    /// The notifier's sending side is gone: the actuation loop has ended.
    orphaned: bool,
}

impl<S: ShadowClient, C: Clock> Reconciler<S, C> {
    /// Connect and subscribe to deltas. Either failure is fatal.
    pub fn connect(
        mut client: S,
        clock: C,
        epoch: Instant,
        cfg: ReconcilerCfg,
        initial: DeviceState,
        publisher: StatePublisher,
        listener: NotifyListener,
    ) -> Result<Self> {
        client.connect(cfg.connect_timeout).map_err(|e| {
            error!(error = %e, "shadow connect failed");
            DispenserError::Connect(e)
        })?;
        let (sink, deltas) = xch::unbounded();
        client
            .register_delta(sink, cfg.connect_timeout)
            .map_err(|e| {
                error!(error = %e, "delta registration failed");
                DispenserError::Register(e)
            })?;
        info!("connected to device shadow");
        Ok(Self {
            client,
            clock,
            epoch,
            cfg,
            state: initial,
            publisher,
            listener,
            deltas,
            pending: None,
            last_report: None,
            resync: false,
            stalled: false,
            orphaned: false,
        })
    }

    /// Current authoritative state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Finished job received but not yet reported.
    pub fn pending_completion(&self) -> Option<&DeviceState> {
        self.pending.as_ref().and_then(|w| w.completed.as_ref())
    }

    pub fn has_pending_report(&self) -> bool {
        self.pending.is_some()
    }

    /// The actuation loop is gone; nothing will raise the notifier again.
    pub fn is_orphaned(&self) -> bool {
        self.orphaned
    }

    /// Initial sync: fetch the full document and publish the result. On
    /// failure the startup state is published and the fetch is retried later.
    pub fn prime(&mut self) {
        if let Err(e) = self.sync_from_remote() {
            warn!(error = %e, "initial shadow get failed; will retry");
            self.resync = true;
            self.publisher.publish(self.state.clone());
        }
    }

    /// Fetch the full shadow document and merge it: `reported` first,
    /// `desired` on top.
    pub fn sync_from_remote(&mut self) -> std::result::Result<(), DispenserError> {
        let text = self
            .client
            .get(self.cfg.get_timeout)
            .map_err(DispenserError::Remote)?;
        self.resync = false;
        match serde_json::from_str::<Value>(&text) {
            Ok(doc) => match reconcile_full(&self.state, &doc) {
                Some(next) => self.adopt(next),
                None => debug!("shadow document without state ignored"),
            },
            Err(e) => warn!(error = %e, "malformed shadow document ignored"),
        }
        Ok(())
    }

    /// Merge one delta document pushed by the transport.
    pub fn on_delta(&mut self, text: &str) {
        self.stalled = false;
        self.retry_sync();
        let doc: Value = match serde_json::from_str(text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "malformed delta ignored");
                return;
            }
        };
        match reconcile_delta(&self.state, &doc) {
            Some(next) => self.adopt(next),
            None => debug!("delta without state ignored"),
        }
    }

    /// Queue a report for a notifier wake.
    pub fn on_wake(&mut self, wake: Wake) {
        self.stalled = false;
        self.retry_sync();
        if let Some(job) = &wake.completed {
            // The request has been served; it is not pending any more.
            self.state.dispense_requested = false;
            self.state.local_start_ms = job.local_start_ms;
        }
        match &mut self.pending {
            Some(pending) => pending.absorb(wake),
            None => self.pending = Some(wake),
        }
    }

    /// Time left until the pending report may be sent. `None` when nothing
    /// is pending or a failed update waits for the next trigger.
    pub fn report_delay(&self) -> Option<Duration> {
        if self.pending.is_none() || self.stalled {
            return None;
        }
        let Some(last) = self.last_report else {
            return Some(Duration::ZERO);
        };
        let due = last + self.cfg.min_report_interval;
        Some(due.saturating_duration_since(self.clock.now()))
    }

    /// Send pending reports whose pacing delay has elapsed.
    pub fn flush_due(&mut self) {
        while self.report_delay() == Some(Duration::ZERO) {
            if !self.send_next() {
                break;
            }
        }
    }

    /// Wait for one delta, wake or report deadline and handle it. With
    /// `wait` set, gives up after that long and returns `false`.
    pub fn step(&mut self, wait: Option<Duration>) -> bool {
        let deltas = self.deltas.clone();
        let wakes = self.listener.receiver().clone();
        let flush = self
            .report_delay()
            .map_or_else(xch::never, xch::after);
        let give_up = wait.map_or_else(xch::never, xch::after);

        xch::select! {
            recv(deltas) -> msg => match msg {
                Ok(text) => self.on_delta(&text),
                Err(_) => {
                    warn!("delta stream closed by transport");
                    self.deltas = xch::never();
                }
            },
            recv(wakes) -> wake => match wake {
                Ok(wake) => self.on_wake(wake),
                Err(_) => {
                    error!("update notifier closed; actuation loop is gone");
                    self.orphaned = true;
                    self.listener = NotifyListener::closed();
                }
            },
            recv(flush) -> _ => {},
            recv(give_up) -> _ => return false,
        }
        self.flush_due();
        true
    }

    /// Serve deltas and wakes until the actuation loop goes away.
    pub fn run(mut self) {
        info!("reconciler loop started");
        while !self.orphaned {
            self.step(None);
        }
        info!("reconciler loop stopped");
    }

    fn adopt(&mut self, next: DeviceState) {
        if next != self.state {
            debug!(
                requested = next.dispense_requested,
                request_id = %next.request_id,
                count = next.led_ring_count,
                color = %next.led_ring_color,
                on = next.led_enabled,
                duration_ms = next.dispense_duration_ms,
                "state merged"
            );
        }
        self.state = next;
        self.publisher.publish(self.state.clone());
    }

    fn retry_sync(&mut self) {
        if !self.resync {
            return;
        }
        if let Err(e) = self.sync_from_remote() {
            warn!(error = %e, "shadow get retry failed");
        }
    }

    /// Answer the pending wake with one report. `false` if the update failed.
    fn send_next(&mut self) -> bool {
        let Some(wake) = self.pending.take() else {
            return true;
        };
        match self.send_report(wake.completed.as_ref()) {
            Ok(()) => {
                self.last_report = Some(self.clock.now());
                true
            }
            Err(e) => {
                warn!(error = %e, "report not sent; retrying on next trigger");
                self.pending = Some(wake);
                self.stalled = true;
                false
            }
        }
    }

    fn send_report(&mut self, job: Option<&DeviceState>) -> std::result::Result<(), DispenserError> {
        let now_ticks = self.clock.ticks_since(self.epoch);
        let report = build_report(&self.state, job, now_ticks);
        let doc = report
            .to_json()
            .map_err(|e| DispenserError::Runtime(format!("render report: {e}")))?;
        self.client
            .update(&doc, self.cfg.update_timeout)
            .map_err(DispenserError::Remote)?;
        info!(
            client_token = report.client_token(),
            completion = report.has_response(),
            "report sent"
        );
        Ok(())
    }
}
