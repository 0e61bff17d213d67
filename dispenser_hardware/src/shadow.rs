//! In-memory device shadow.
//!
//! Keeps `desired` and `reported` sections, applies updates as JSON merge
//! patches (`null` deletes a key) and pushes a delta document to the
//! registered sink whenever a change to `desired` leaves it different from
//! `reported`. A `SimShadowHandle` plays the cloud side: it injects desired
//! state and inspects what the device reported.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dispenser_traits::{DeltaSink, RemoteError, ShadowClient};
use serde_json::{Map, Value, json};

#[derive(Debug, Default)]
struct Failures {
    connect: bool,
    register: bool,
    gets: u32,
    updates: u32,
}

#[derive(Debug, Default)]
struct Doc {
    desired: Map<String, Value>,
    reported: Map<String, Value>,
    version: u64,
    connected: bool,
    sink: Option<DeltaSink>,
    updates: Vec<String>,
    fail: Failures,
}

impl Doc {
    fn push_delta(&mut self) {
        let Some(delta) = delta(&self.desired, &self.reported) else {
            return;
        };
        let Some(sink) = &self.sink else {
            return;
        };
        let doc = json!({ "version": self.version, "state": delta });
        if sink.send(doc.to_string()).is_err() {
            tracing::debug!("delta sink disconnected");
            self.sink = None;
        }
    }
}

/// Merge `patch` into `target`; `null` values remove keys.
fn merge_patch(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(inner) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(slot) = slot {
                    merge_patch(slot, inner);
                }
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Desired fields whose value differs from reported, recursively.
fn delta(desired: &Map<String, Value>, reported: &Map<String, Value>) -> Option<Value> {
    let mut out = Map::new();
    for (key, want) in desired {
        match (want, reported.get(key)) {
            (Value::Object(want), Some(Value::Object(have))) => {
                if let Some(inner) = delta(want, have) {
                    out.insert(key.clone(), inner);
                }
            }
            (want, Some(have)) if want == have => {}
            (want, _) => {
                out.insert(key.clone(), want.clone());
            }
        }
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

fn lock(inner: &Mutex<Doc>) -> MutexGuard<'_, Doc> {
    inner.lock().unwrap_or_else(|p| p.into_inner())
}

/// Device-side client of the in-memory shadow.
#[derive(Debug, Clone, Default)]
pub struct SimulatedShadow {
    inner: Arc<Mutex<Doc>>,
}

impl SimulatedShadow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloud-side handle onto the same document.
    pub fn handle(&self) -> SimShadowHandle {
        SimShadowHandle {
            inner: self.inner.clone(),
        }
    }
}

impl ShadowClient for SimulatedShadow {
    fn connect(&mut self, _timeout: Duration) -> Result<(), RemoteError> {
        let mut doc = lock(&self.inner);
        if doc.fail.connect {
            return Err(RemoteError::Timeout);
        }
        doc.connected = true;
        Ok(())
    }

    fn register_delta(&mut self, sink: DeltaSink, _timeout: Duration) -> Result<(), RemoteError> {
        let mut doc = lock(&self.inner);
        if !doc.connected {
            return Err(RemoteError::Rejected("not connected".into()));
        }
        if doc.fail.register {
            return Err(RemoteError::Rejected("subscription refused".into()));
        }
        doc.sink = Some(sink);
        Ok(())
    }

    fn get(&mut self, _timeout: Duration) -> Result<String, RemoteError> {
        let mut doc = lock(&self.inner);
        if !doc.connected {
            return Err(RemoteError::Disconnected);
        }
        if doc.fail.gets > 0 {
            doc.fail.gets -= 1;
            return Err(RemoteError::Timeout);
        }
        Ok(json!({
            "state": { "desired": doc.desired, "reported": doc.reported },
            "version": doc.version,
        })
        .to_string())
    }

    fn update(&mut self, document: &str, _timeout: Duration) -> Result<(), RemoteError> {
        let mut doc = lock(&self.inner);
        if !doc.connected {
            return Err(RemoteError::Disconnected);
        }
        if doc.fail.updates > 0 {
            doc.fail.updates -= 1;
            return Err(RemoteError::Timeout);
        }
        let parsed: Value = serde_json::from_str(document)
            .map_err(|e| RemoteError::Rejected(format!("malformed document: {e}")))?;
        let Some(state) = parsed.get("state").and_then(Value::as_object) else {
            return Err(RemoteError::Rejected("missing state".into()));
        };
        if let Some(Value::Object(reported)) = state.get("reported") {
            merge_patch(&mut doc.reported, reported);
        }
        let desired_changed = if let Some(Value::Object(desired)) = state.get("desired") {
            merge_patch(&mut doc.desired, desired);
            true
        } else {
            false
        };
        doc.version += 1;
        doc.updates.push(document.to_string());
        if desired_changed {
            doc.push_delta();
        }
        Ok(())
    }
}

/// Cloud-side view of a `SimulatedShadow`.
#[derive(Debug, Clone)]
pub struct SimShadowHandle {
    inner: Arc<Mutex<Doc>>,
}

impl SimShadowHandle {
    /// Merge a patch into `desired` and push the resulting delta.
    pub fn set_desired(&self, patch: Value) {
        let mut doc = lock(&self.inner);
        if let Value::Object(patch) = patch {
            merge_patch(&mut doc.desired, &patch);
        }
        doc.version += 1;
        doc.push_delta();
    }

    /// Merge a patch into `reported` without notifying the device.
    pub fn set_reported(&self, patch: Value) {
        let mut doc = lock(&self.inner);
        if let Value::Object(patch) = patch {
            merge_patch(&mut doc.reported, &patch);
        }
        doc.version += 1;
    }

    /// What the cloud API does when a user asks for a dispense.
    pub fn request_dispense(&self, request_id: &str, timestamp: u64, duration_ms: u32) {
        self.set_desired(json!({
            "dispense_time_ms": duration_ms,
            "request": {
                "command": "dispense",
                "requestId": request_id,
                "timestamp": timestamp,
            }
        }));
    }

    pub fn desired(&self) -> Value {
        Value::Object(lock(&self.inner).desired.clone())
    }

    pub fn reported(&self) -> Value {
        Value::Object(lock(&self.inner).reported.clone())
    }

    pub fn version(&self) -> u64 {
        lock(&self.inner).version
    }

    /// Every update document accepted so far, oldest first.
    pub fn updates(&self) -> Vec<String> {
        lock(&self.inner).updates.clone()
    }

    pub fn fail_connect(&self, fail: bool) {
        lock(&self.inner).fail.connect = fail;
    }

    pub fn fail_register(&self, fail: bool) {
        lock(&self.inner).fail.register = fail;
    }

    /// Make the next `n` gets time out.
    pub fn fail_next_gets(&self, n: u32) {
        lock(&self.inner).fail.gets = n;
    }

    /// Make the next `n` updates time out.
    pub fn fail_next_updates(&self, n: u32) {
        lock(&self.inner).fail.updates = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn merge_patch_deletes_on_null_and_recurses() {
        let mut target = obj(json!({"a": 1, "ring": {"count": 2, "color": "#FFFFFF"}, "request": {"x": 1}}));
        merge_patch(&mut target, &obj(json!({"ring": {"count": 5}, "request": null, "b": true})));
        assert_eq!(
            Value::Object(target),
            json!({"a": 1, "b": true, "ring": {"count": 5, "color": "#FFFFFF"}})
        );
    }

    #[test]
    fn delta_keeps_only_differing_leaves() {
        let desired = obj(json!({"led": "on", "led_ring": {"count": 5, "color": "#112233"}, "request": {"requestId": "a"}}));
        let reported = obj(json!({"led": "on", "led_ring": {"count": 3, "color": "#112233"}}));
        assert_eq!(
            delta(&desired, &reported),
            Some(json!({"led_ring": {"count": 5}, "request": {"requestId": "a"}}))
        );
        assert_eq!(delta(&reported, &reported), None);
    }
}
