//! Single-slot mailboxes between the reconciler and the actuation loop.
//!
//! Both directions use a `bounded(1)` crossbeam channel. The writing side
//! keeps a receiver clone so it can evict a value the reader has not picked
//! up yet: a publish never blocks and the reader always sees the newest
//! value (or the merge of everything written since its last read).
use crossbeam_channel as xch;

use crate::state::DeviceState;

/// Overwrite-on-write slot.
#[derive(Debug)]
struct Slot<T> {
    tx: xch::Sender<T>,
    rx: xch::Receiver<T>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        let (tx, rx) = xch::bounded(1);
        Self { tx, rx }
    }

    /// Store `value`, folding it into any unread value with `merge(old, new)`.
    fn put_with(&self, mut value: T, merge: impl Fn(T, T) -> T) {
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return,
                Err(xch::TrySendError::Full(v)) => {
                    // The reader may drain the slot between the two calls;
                    // then there is nothing to merge and the next send succeeds.
                    value = match self.rx.try_recv() {
                        Ok(old) => merge(old, v),
                        Err(_) => v,
                    };
                }
                // We hold a receiver, so the channel cannot disconnect.
                Err(xch::TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Writing half of the device state channel. Owned by the reconciler.
#[derive(Debug)]
pub struct StatePublisher {
    slot: Slot<DeviceState>,
}

impl StatePublisher {
    /// Replace whatever the controller has not read yet. Never blocks.
    pub fn publish(&self, state: DeviceState) {
        self.slot.put_with(state, |_, newest| newest);
    }
}

/// Reading half of the device state channel. Owned by the controller.
#[derive(Debug)]
pub struct StateInbox {
    rx: xch::Receiver<DeviceState>,
}

impl StateInbox {
    /// Latest state published since the previous poll, if any.
    pub fn poll(&self) -> Option<DeviceState> {
        self.rx.try_recv().ok()
    }
}

pub fn state_channel() -> (StatePublisher, StateInbox) {
    let slot = Slot::new();
    let rx = slot.rx.clone();
    (StatePublisher { slot }, StateInbox { rx })
}

/// One wake of the reconciler's report loop.
///
/// A pending flag, not a queue: any number of raises collapse into a single
/// wake, and a wake carries at most one finished job, the latest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wake {
    /// Most recent finished job, if this wake reports a completion.
    pub completed: Option<DeviceState>,
}

impl Wake {
    pub fn refresh() -> Self {
        Self::default()
    }

    pub fn completion(job: DeviceState) -> Self {
        Self {
            completed: Some(job),
        }
    }

    /// Fold a later wake into this one. A later completion replaces an
    /// earlier one.
    pub fn absorb(&mut self, later: Wake) {
        if later.completed.is_some() {
            self.completed = later.completed;
        }
    }

    fn merged(mut self, later: Wake) -> Self {
        self.absorb(later);
        self
    }
}

/// Raising side of the update notifier. Owned by the controller.
#[derive(Debug)]
pub struct Notifier {
    slot: Slot<Wake>,
}

impl Notifier {
    /// Ask for a report of the current state.
    pub fn raise(&self) {
        self.slot.put_with(Wake::refresh(), Wake::merged);
    }

    /// Report that `job` finished dispensing.
    pub fn complete(&self, job: DeviceState) {
        self.slot.put_with(Wake::completion(job), Wake::merged);
    }
}

/// Waiting side of the update notifier. Owned by the reconciler.
#[derive(Debug)]
pub struct NotifyListener {
    rx: xch::Receiver<Wake>,
}

impl NotifyListener {
    /// A listener that never wakes, for when the raising side is gone.
    pub fn closed() -> Self {
        Self { rx: xch::never() }
    }

    /// For use in `select!` alongside other sources.
    pub fn receiver(&self) -> &xch::Receiver<Wake> {
        &self.rx
    }

    pub fn try_take(&self) -> Option<Wake> {
        self.rx.try_recv().ok()
    }
}

pub fn notifier() -> (Notifier, NotifyListener) {
    let slot = Slot::new();
    let rx = slot.rx.clone();
    (Notifier { slot }, NotifyListener { rx })
}
