//! Startup: connect, prime the state, then spawn the two loops.
use std::thread::{self, JoinHandle};

use crossbeam_channel as xch;

use dispenser_traits::{Clock, LedRing, Motor, ShadowClient};
use eyre::WrapErr;

use crate::config::EngineCfg;
use crate::controller::Controller;
use crate::error::{DispenserError, Result};
use crate::mailbox::{notifier, state_channel};
use crate::reconciler::Reconciler;
use crate::state::DeviceState;

const ACTUATION: &str = "actuation";
const RECONCILER: &str = "reconciler";

/// Sends the loop's name when its thread ends, by return or by unwinding.
struct ExitSignal {
    name: &'static str,
    tx: xch::Sender<&'static str>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.tx.send(self.name);
    }
}

fn ended(name: &str, joined: thread::Result<()>) -> DispenserError {
    match joined {
        Err(_) => DispenserError::Runtime(format!("{name} loop panicked")),
        Ok(()) => DispenserError::Runtime(format!("{name} loop stopped")),
    }
}

/// Handles of the running loops.
#[derive(Debug)]
pub struct Running {
    actuation: JoinHandle<()>,
    reconciler: JoinHandle<()>,
    exited: xch::Receiver<&'static str>,
}

impl Running {
    /// Block until the first loop ends and report why. Both loops are
    /// meant to run forever, so this always returns an error.
    pub fn join(self) -> Result<()> {
        let first = self
            .exited
            .recv()
            .map_err(|_| DispenserError::Runtime("engine loops vanished".into()))?;
        let err = if first == RECONCILER {
            match self.reconciler.join() {
                Err(_) => DispenserError::Runtime("reconciler loop panicked".into()),
                // It stops by itself only once the actuation loop is gone.
                Ok(()) => ended(ACTUATION, self.actuation.join()),
            }
        } else {
            ended(ACTUATION, self.actuation.join())
        };
        tracing::error!(error = %err, "engine stopped");
        Err(err.into())
    }

    pub fn is_finished(&self) -> bool {
        self.actuation.is_finished() || self.reconciler.is_finished()
    }
}

/// Connect to the shadow, fetch the initial document and start both loops.
///
/// Connect and registration failures are returned before any thread is
/// spawned; the caller is expected to restart the device.
pub fn start<S, M, L, C>(
    client: S,
    motor: M,
    ring: L,
    clock: C,
    cfg: &EngineCfg,
    initial: DeviceState,
) -> Result<Running>
where
    S: ShadowClient + Send + 'static,
    M: Motor + Send + 'static,
    L: LedRing + Send + 'static,
    C: Clock + Clone + Send + 'static,
{
    let epoch = clock.now();
    let (publisher, inbox) = state_channel();
    let (notifier, listener) = notifier();

    let mut reconciler = Reconciler::connect(
        client,
        clock.clone(),
        epoch,
        cfg.reconciler.clone(),
        initial,
        publisher,
        listener,
    )
    .wrap_err("shadow startup failed")?;
    reconciler.prime();

    let controller = Controller::new(motor, ring, clock, epoch, inbox, notifier, &cfg.controller);

    let (exit_tx, exited) = xch::bounded(2);
    let signal = ExitSignal {
        name: ACTUATION,
        tx: exit_tx.clone(),
    };
    let actuation = thread::Builder::new()
        .name(ACTUATION.into())
        .spawn(move || {
            let _signal = signal;
            controller.run();
        })
        .map_err(|e| DispenserError::Runtime(format!("spawn actuation loop: {e}")))?;
    let signal = ExitSignal {
        name: RECONCILER,
        tx: exit_tx,
    };
    let reconciler = thread::Builder::new()
        .name(RECONCILER.into())
        .spawn(move || {
            let _signal = signal;
            reconciler.run();
        })
        .map_err(|e| DispenserError::Runtime(format!("spawn reconciler loop: {e}")))?;

    tracing::info!("engine started");
    Ok(Running {
        actuation,
        reconciler,
        exited,
    })
}
