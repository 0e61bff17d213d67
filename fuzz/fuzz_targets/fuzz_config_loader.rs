#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = dispenser_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = dispenser_core::initial_state(&cfg.initial);
            let _ = dispenser_core::EngineCfg::from(&cfg);
        }
    }
});
