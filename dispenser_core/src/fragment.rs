//! Merging inbound shadow fragments into the device state.
//!
//! Every field present (with a usable value) in a fragment overwrites the
//! prior value; absent or malformed fields keep it. `dispense_requested` is
//! the exception: it is set by the presence of a `request` object in the
//! same fragment and cleared by its absence. The request's id and timestamp
//! come from that object alone.

use serde_json::{Map, Value};
use tracing::debug;

use crate::color::parse_hex_color;
use crate::state::{DeviceState, REQUEST_ID_MAX};
use crate::util::{truncate_utf8, wrap_u32_f64};

/// Non-negative integer field, if present and well-typed.
fn uint(v: Option<&Value>) -> Option<u64> {
    v.and_then(Value::as_u64)
}

fn timestamp(v: Option<&Value>) -> Option<u32> {
    let v = v?;
    if let Some(n) = v.as_u64() {
        return Some(n as u32);
    }
    v.as_f64().and_then(wrap_u32_f64)
}

/// Apply one fragment (`led_ring`, `led`, `dispense_time_ms`, `request`)
/// on top of `prior`. A non-object fragment counts as empty.
pub fn apply_fragment(prior: &DeviceState, fragment: &Value) -> DeviceState {
    let empty = Map::new();
    let fields = fragment.as_object().unwrap_or(&empty);
    let mut next = prior.clone();

    if let Some(ring) = fields.get("led_ring").and_then(Value::as_object) {
        if let Some(count) = uint(ring.get("count")) {
            next.led_ring_count = u8::try_from(count).unwrap_or(u8::MAX);
        }
        if let Some(raw) = ring.get("color").and_then(Value::as_str) {
            match parse_hex_color(raw) {
                Some(color) => next.led_ring_color = color,
                None => debug!(color = raw, "ignoring malformed ring color"),
            }
        }
    }

    if let Some(led) = fields.get("led").and_then(Value::as_str) {
        next.led_enabled = led == "on";
    }

    if let Some(ms) = uint(fields.get("dispense_time_ms")) {
        next.dispense_duration_ms = u32::try_from(ms).unwrap_or(u32::MAX);
    }

    // `"request": null` is how the cloud clears a request, so it reads as absent.
    match fields.get("request").and_then(Value::as_object) {
        Some(request) => {
            // A request object describes a whole new request: fields it
            // lacks are cleared, never inherited from the previous one.
            next.dispense_requested = true;
            next.request_id = request
                .get("requestId")
                .and_then(Value::as_str)
                .map(|id| truncate_utf8(id, REQUEST_ID_MAX).to_string())
                .unwrap_or_default();
            next.cloud_start_ms = timestamp(request.get("timestamp")).unwrap_or(0);
        }
        None => next.dispense_requested = false,
    }

    next
}

/// The `state` object of a shadow document, if any.
pub fn state_section(doc: &Value) -> Option<&Value> {
    doc.get("state").filter(|s| s.is_object())
}

/// Merge a delta document. `None` when it carries no `state` object.
pub fn reconcile_delta(prior: &DeviceState, doc: &Value) -> Option<DeviceState> {
    state_section(doc).map(|state| apply_fragment(prior, state))
}

/// Merge a full shadow document: `reported` first as the baseline, then
/// `desired` on top so pending intent wins field by field. Missing sections
/// are treated as empty fragments.
pub fn reconcile_full(prior: &DeviceState, doc: &Value) -> Option<DeviceState> {
    let state = state_section(doc)?;
    let baseline = apply_fragment(prior, state.get("reported").unwrap_or(&Value::Null));
    Some(apply_fragment(
        &baseline,
        state.get("desired").unwrap_or(&Value::Null),
    ))
}
