//! Outbound report document.
//!
//! Every report carries the full visual/duration state plus
//! `desired.request = null`, which acknowledges any pending request so the
//! cloud cannot re-fire it. A completion adds a `response` object.
use serde::Serialize;

use crate::state::DeviceState;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    state: Sections<'a>,
    #[serde(rename = "clientToken")]
    client_token: String,
}

#[derive(Debug, Serialize)]
struct Sections<'a> {
    reported: Reported<'a>,
    desired: Acknowledge,
}

#[derive(Debug, Serialize)]
struct Reported<'a> {
    led_ring: LedRing,
    led: &'static str,
    dispense_time_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<Response<'a>>,
}

#[derive(Debug, Serialize)]
struct LedRing {
    count: u8,
    color: String,
}

#[derive(Debug, Serialize)]
struct Response<'a> {
    command: &'static str,
    #[serde(rename = "requestId")]
    request_id: &'a str,
    result: &'static str,
    timestamp: u32,
}

/// Serializes as `{"request": null}`.
#[derive(Debug, Serialize)]
struct Acknowledge {
    request: (),
}

/// Anti-replay marker derived from the tick counter.
pub fn client_token(now_ticks: u32) -> String {
    format!("token-{now_ticks}")
}

/// Cloud-relative completion time: the request's cloud timestamp plus the
/// device time elapsed since the motor started. Wraps like the tick counter.
pub fn completion_timestamp(job: &DeviceState, now_ticks: u32) -> u32 {
    job.cloud_start_ms
        .wrapping_add(now_ticks.wrapping_sub(job.local_start_ms))
}

/// Render `state`, optionally acknowledging the finished `completed` job.
pub fn build_report<'a>(
    state: &DeviceState,
    completed: Option<&'a DeviceState>,
    now_ticks: u32,
) -> Report<'a> {
    let response = completed.map(|job| Response {
        command: "dispense",
        request_id: &job.request_id,
        result: "success",
        timestamp: completion_timestamp(job, now_ticks),
    });
    Report {
        state: Sections {
            reported: Reported {
                led_ring: LedRing {
                    count: state.led_ring_count,
                    color: state.led_ring_color.to_string(),
                },
                led: if state.led_enabled { "on" } else { "off" },
                dispense_time_ms: state.dispense_duration_ms,
                response,
            },
            desired: Acknowledge { request: () },
        },
        client_token: client_token(now_ticks),
    }
}

impl Report<'_> {
    pub fn client_token(&self) -> &str {
        &self.client_token
    }

    pub fn has_response(&self) -> bool {
        self.state.reported.response.is_some()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
