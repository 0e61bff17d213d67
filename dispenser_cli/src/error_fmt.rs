//! Human-readable error descriptions and structured JSON error formatting.

use dispenser_core::DispenserError;
use dispenser_traits::RemoteError;

fn remote_hint(e: &RemoteError) -> &'static str {
    match e {
        RemoteError::Timeout => "the shadow service did not answer in time",
        RemoteError::Rejected(_) => "the shadow service refused the request",
        RemoteError::Disconnected => "the transport dropped the connection",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(de) = err.downcast_ref::<DispenserError>() {
        return match de {
            DispenserError::Connect(e) => format!(
                "What happened: Could not connect to the device shadow ({e}).\nLikely causes: {}; network not up or wrong thing name.\nHow to fix: Check connectivity and [device].thing_name, or raise timing.connect_timeout_ms. The device should be restarted.",
                remote_hint(e)
            ),
            DispenserError::Register(e) => format!(
                "What happened: Connected, but the delta subscription failed ({e}).\nLikely causes: {}; the thing's policy does not allow delta topics.\nHow to fix: Check the shadow permissions for this device, then restart it.",
                remote_hint(e)
            ),
            DispenserError::Remote(e) => format!(
                "What happened: A shadow call failed ({e}).\nLikely causes: {}.\nHow to fix: Usually transient; the engine retries on the next delta or report.",
                remote_hint(e)
            ),
            DispenserError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/dispenser.toml for a sample."
            ),
            DispenserError::Hardware(msg) => format!(
                "What happened: Hardware initialization failed ({msg}).\nLikely causes: Wrong pin or SPI bus numbers, or no permission to access GPIO/SPI.\nHow to fix: Fix [pins] in the config and make sure the process may open /dev/gpiomem and /dev/spidev*."
            ),
            DispenserError::Runtime(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config 2, connect 3, registration 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<DispenserError>() {
        Some(DispenserError::Config(_)) => 2,
        Some(DispenserError::Connect(_)) => 3,
        Some(DispenserError::Register(_)) => 4,
        _ => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<DispenserError>() {
        Some(DispenserError::Connect(_)) => "Connect",
        Some(DispenserError::Register(_)) => "Register",
        Some(DispenserError::Remote(_)) => "Remote",
        Some(DispenserError::Config(_)) => "Config",
        Some(DispenserError::Hardware(_)) => "Hardware",
        Some(DispenserError::Runtime(_)) => "Runtime",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
