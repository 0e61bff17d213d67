//! Brushed DC dispense motor(s) behind a dual H-bridge driver.
//!
//! Each bridge has two inputs. forward: IN1 high / IN2 low, reverse: the
//! opposite, coast: both low, brake: both high. The optional auxiliary
//! bridge is always driven in lockstep with the primary one.
use dispenser_traits::{HwResult, Motor};
use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

use crate::error::{HwError, Result};

struct Bridge {
    in1: OutputPin,
    in2: OutputPin,
}

impl Bridge {
    fn set(&mut self, in1_high: bool, in2_high: bool) {
        if in1_high {
            self.in1.set_high();
        } else {
            self.in1.set_low();
        }
        if in2_high {
            self.in2.set_high();
        } else {
            self.in2.set_low();
        }
    }
}

pub struct HBridgeMotor {
    bridges: Vec<Bridge>,
}

impl HBridgeMotor {
    /// Claim the primary pin pair and, when given, the auxiliary pair.
    /// All inputs start low (coasting).
    pub fn new(primary: (u8, u8), aux: Option<(u8, u8)>) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut bridges = Vec::with_capacity(2);
        for (in1, in2) in std::iter::once(primary).chain(aux) {
            let in1 = gpio
                .get(in1)
                .map_err(|e| HwError::Gpio(format!("open motor pin {in1}: {e}")))?
                .into_output_low();
            let in2 = gpio
                .get(in2)
                .map_err(|e| HwError::Gpio(format!("open motor pin {in2}: {e}")))?
                .into_output_low();
            bridges.push(Bridge { in1, in2 });
        }
        Ok(Self { bridges })
    }

    fn drive(&mut self, in1_high: bool, in2_high: bool) {
        for bridge in &mut self.bridges {
            bridge.set(in1_high, in2_high);
        }
    }
}

impl Motor for HBridgeMotor {
    fn forward(&mut self) -> HwResult {
        debug!("motor forward");
        self.drive(true, false);
        Ok(())
    }

    fn brake(&mut self) -> HwResult {
        debug!("motor brake");
        self.drive(true, true);
        Ok(())
    }
}
