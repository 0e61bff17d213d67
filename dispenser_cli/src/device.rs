//! Backend assembly: real GPIO/SPI drivers with the `hardware` feature on
//! Linux, simulated ones otherwise.

use dispenser_core::mocks::NoRing;
use dispenser_hardware::{SimulatedLedRing, SimulatedMotor};
use dispenser_traits::{LedRing, Motor};

pub type MotorBox = Box<dyn Motor + Send>;
pub type RingBox = Box<dyn LedRing + Send>;

/// Motor and ring for the configured build.
pub fn build(cfg: &dispenser_config::Config) -> dispenser_core::Result<(MotorBox, RingBox)> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        hardware(cfg)
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        Ok(simulated(cfg))
    }
}

/// Simulated motor, plus a simulated ring unless the build has none.
pub fn simulated(cfg: &dispenser_config::Config) -> (MotorBox, RingBox) {
    let ring: RingBox = if cfg.led.enabled {
        Box::new(SimulatedLedRing::new(cfg.led.ring_length))
    } else {
        Box::new(NoRing)
    };
    (Box::new(SimulatedMotor::new()), ring)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn hardware(cfg: &dispenser_config::Config) -> dispenser_core::Result<(MotorBox, RingBox)> {
    use dispenser_core::DispenserError;
    use dispenser_hardware::{HBridgeMotor, SpiRing};

    let pins = &cfg.pins;
    let aux = pins.aux_motor_in1.zip(pins.aux_motor_in2);
    let motor = HBridgeMotor::new((pins.motor_in1, pins.motor_in2), aux)
        .map_err(|e| DispenserError::Hardware(format!("open motor pins: {e}")))?;

    let ring: RingBox = match (cfg.led.enabled, pins.led_spi_bus) {
        (true, Some(bus)) => Box::new(
            SpiRing::new(bus, cfg.led.ring_length)
                .map_err(|e| DispenserError::Hardware(format!("open LED ring on SPI{bus}: {e}")))?,
        ),
        (true, None) => {
            tracing::warn!("led.enabled is set but pins.led_spi_bus is not; running without a ring");
            Box::new(NoRing)
        }
        (false, _) => Box::new(NoRing),
    };
    Ok((Box::new(motor), ring))
}
