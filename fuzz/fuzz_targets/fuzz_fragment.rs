#![no_main]
use dispenser_core::DeviceState;
use dispenser_core::fragment::{reconcile_delta, reconcile_full};
use dispenser_core::report::build_report;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(data) else {
        return;
    };
    let prior = DeviceState::default();
    for next in [reconcile_delta(&prior, &doc), reconcile_full(&prior, &doc)]
        .into_iter()
        .flatten()
    {
        assert!(next.request_id.len() <= dispenser_core::state::REQUEST_ID_MAX);
        // Whatever was merged must render.
        assert!(build_report(&next, Some(&next), 0).to_json().is_ok());
        // Full merges are idempotent.
        if let Some(again) = reconcile_full(&next, &doc) {
            assert_eq!(reconcile_full(&again, &doc), Some(again.clone()));
        }
    }
});
