// Event Sink
// Outbound notifications to whatever view layer hosts the engines

use serde_json::Value;

/// Outbound notifications to the view layer (theme changed, panel changed,
/// dataset resolved).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &str, _payload: Value) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::EventSink;

    /// Sink that keeps every emitted event for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<(String, Value)> {
            self.events.lock().unwrap().clone()
        }

        pub fn named(&self, name: &str) -> Vec<Value> {
            self.events()
                .into_iter()
                .filter(|(event, _)| event == name)
                .map(|(_, payload)| payload)
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &str, payload: Value) {
            self.events.lock().unwrap().push((event.to_string(), payload));
        }
    }
}
