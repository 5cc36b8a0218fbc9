use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use wavedag::engine::{Results, UnitSpec};

/// Records every producer invocation, in call order.
///
/// Clone it into as many fake units as needed; all clones share one log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) {
        self.calls.lock().unwrap().push(id.to_string());
    }

    /// How many times the producer of `id` ran.
    pub fn count(&self, id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// A unit that immediately succeeds with `value`.
pub fn value_unit(id: &str, value: Value, log: &CallLog) -> UnitSpec {
    let log = log.clone();
    let name = id.to_string();
    UnitSpec::new(id, move |_results: Results| {
        log.record(&name);
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// A unit that immediately fails with `message`.
pub fn failing_unit(id: &str, message: &str, log: &CallLog) -> UnitSpec {
    let log = log.clone();
    let name = id.to_string();
    let message = message.to_string();
    UnitSpec::new(id, move |_results: Results| {
        log.record(&name);
        let message = message.clone();
        async move { Err(anyhow::anyhow!(message)) }
    })
}

/// A unit that sleeps for `delay`, then succeeds with `value`.
pub fn delayed_unit(id: &str, value: Value, delay: Duration, log: &CallLog) -> UnitSpec {
    let log = log.clone();
    let name = id.to_string();
    UnitSpec::new(id, move |_results: Results| {
        log.record(&name);
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    })
}

/// A unit that succeeds with every result it could see, as a JSON object.
pub fn echo_results_unit(id: &str, log: &CallLog) -> UnitSpec {
    let log = log.clone();
    let name = id.to_string();
    UnitSpec::new(id, move |results: Results| {
        log.record(&name);
        let seen: serde_json::Map<String, Value> = results
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        async move { Ok(Value::Object(seen)) }
    })
}
