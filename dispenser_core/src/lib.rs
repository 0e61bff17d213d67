#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Shadow-synchronized dispenser engine (hardware-agnostic).
//!
//! All hardware goes through `dispenser_traits::Motor` and
//! `dispenser_traits::LedRing`, and the cloud document through
//! `dispenser_traits::ShadowClient`.
//!
//! ## Architecture
//!
//! - **Reconciler** (`reconciler`): owns the authoritative `DeviceState`,
//!   merges deltas and full documents (`fragment`), sends reports (`report`).
//! - **Controller** (`controller`): fixed-period actuation loop, motor
//!   countdown and ring animation (`animation`).
//! - **Mailboxes** (`mailbox`): the single-slot state channel forward and the
//!   collapsing update notifier backward. Nothing else is shared.
//! - **Runner** (`runner`): connects, primes and spawns both loops.
pub mod animation;
pub mod color;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod fragment;
pub mod mailbox;
pub mod mocks;
pub mod reconciler;
pub mod report;
pub mod runner;
pub mod state;
pub mod status;
pub mod util;

pub use config::{ControllerCfg, EngineCfg, ReconcilerCfg};
pub use controller::Controller;
pub use conversions::initial_state;
pub use error::{DispenserError, Result};
pub use mailbox::{Notifier, NotifyListener, StateInbox, StatePublisher, Wake, notifier, state_channel};
pub use reconciler::Reconciler;
pub use runner::{Running, start};
pub use state::{DeviceState, RequestKey, Rgb, Visual};
pub use status::ActuationStatus;
