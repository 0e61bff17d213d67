use dispenser_core::{ActuationStatus, Controller, ControllerCfg, DeviceState, notifier, state_channel};
use dispenser_hardware::{SimulatedLedRing, SimulatedMotor};
use dispenser_traits::Clock;
use dispenser_traits::clock::test_clock::TestClock;
use proptest::prelude::*;

fn dispense(duration_ms: u32) -> DeviceState {
    DeviceState {
        dispense_duration_ms: duration_ms,
        dispense_requested: true,
        request_id: "p".into(),
        ..DeviceState::default()
    }
}

proptest! {
    #[test]
    fn remaining_never_increases_and_never_underflows(
        duration in 1u32..20_000,
        steps in prop::collection::vec(0u64..700, 1..200),
        intruders in prop::collection::vec(any::<bool>(), 200),
    ) {
        let clock = TestClock::new();
        let motor = SimulatedMotor::new();
        let probe = motor.probe();
        let (tx, inbox) = state_channel();
        let (n, wakes) = notifier();
        let mut ctl = Controller::new(
            motor,
            SimulatedLedRing::new(8),
            clock.clone(),
            clock.now(),
            inbox,
            n,
            &ControllerCfg::default(),
        );

        tx.publish(dispense(duration));
        let mut last = match ctl.tick() {
            ActuationStatus::Dispensing { remaining_ms } => remaining_ms,
            other => return Err(TestCaseError::fail(format!("not started: {other:?}"))),
        };
        prop_assert_eq!(last, duration);

        let mut completions = 0;
        for (i, ms) in steps.iter().enumerate() {
            // Extra requests while active must not disturb the countdown.
            if intruders[i] {
                tx.publish(DeviceState { request_id: format!("x{i}"), ..dispense(u32::MAX) });
            }
            clock.advance_ms(*ms);
            match ctl.tick() {
                ActuationStatus::Dispensing { remaining_ms } => {
                    prop_assert!(remaining_ms <= last);
                    prop_assert_eq!(u64::from(remaining_ms), u64::from(last).saturating_sub(*ms));
                    last = remaining_ms;
                }
                ActuationStatus::Completed => {
                    prop_assert!(u64::from(last) <= *ms);
                    completions += 1;
                    break;
                }
                ActuationStatus::Idle => prop_assert!(false, "idle while a job was running"),
            }
        }

        prop_assert!(completions <= 1);
        prop_assert_eq!(probe.forward_count(), 1);
        if completions == 1 {
            prop_assert!(!probe.is_running());
            let wake = wakes.try_take();
            prop_assert!(wake.is_some_and(|w| w.completed.is_some()));
        } else {
            prop_assert!(probe.is_running());
        }
    }
}
