use serde_json::Value;

use crate::ids::Id;

/// Mode for a `tts:speak` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakMode {
    Replace,
    Queue,
}

/// Events dispatched on the process-wide event bus.
///
/// Every event is fire-and-forget; publishing never blocks on subscribers.
/// In addition to the external collaborator events named verbatim
/// (`lens:*`, `stt:*`, `tts:*`, `pipeline:input-received`), this also
/// carries the internal events other in-process components (Observer
/// Dispatcher, Memory Service) need to react to new facts without a direct
/// dependency edge back into the Kernel.
#[derive(Debug, Clone)]
pub enum RambleEvent {
    /// A lens target became active.
    LensActivate { lens_id: String },
    /// The active lens was deactivated.
    LensDeactivate { lens_id: String },
    /// Input was captured by the active lens instead of the pipeline.
    LensInput { lens_id: String, text: String },
    /// `processText` accepted input and is about to route it.
    PipelineInputReceived { session_id: Id, source: String },
    /// STT transport lifecycle (external collaborator, relayed verbatim).
    SttRecordingStarted,
    SttRecordingStopped,
    SttTranscribing,
    SttIntermediate { text: String },
    SttFinal { text: String },
    /// TTS transport lifecycle (external collaborator, relayed verbatim).
    TtsSpeak { text: String, voice: Option<String>, mode: SpeakMode },
    TtsGenerated,
    TtsStarted,
    TtsEnded,
    TtsCancelled,
    TtsStop,
    /// A session started or ended.
    SessionStarted { session_id: Id },
    SessionEnded { session_id: Id },
    /// New claims were persisted by the extraction pipeline.
    NewClaims { claim_ids: Vec<Id>, session_id: Id },
    /// A task transitioned to a terminal state.
    TaskCompleted { task_id: Id, task_type: String },
    TaskFailed { task_id: Id, task_type: String, error: String },
    /// The hourly decay pass finished.
    DecayCompleted { processed: usize, decayed: usize },
    /// An observer wrote a new output.
    ObserverOutputCreated { observer_name: String, output_id: Id },
    /// Arbitrary debug-surface mutation, useful for UI shells to resync.
    DebugDataChanged { key: String, value: Option<Value> },
}

/// Event bus using a tokio broadcast channel. All subscribers receive all
/// events; slow subscribers miss intermediate events rather than blocking
/// publishers (acceptable for a fire-and-forget surface).
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RambleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: RambleEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RambleEvent> {
        self.tx.subscribe()
    }

    /// Subscribe with a filter — only matching events are delivered.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Filter criteria for scoped event subscriptions. All fields are
/// optional; an event must match **all** specified criteria.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub session_id: Option<String>,
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn for_types(types: Vec<String>) -> Self {
        Self {
            event_types: Some(types),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &RambleEvent) -> bool {
        if let Some(ref sid) = self.session_id {
            if let Some(event_sid) = extract_session_id(event) {
                if event_sid != sid {
                    return false;
                }
            }
            // Events without a session_id field pass the session filter —
            // they belong to every session's view (e.g. TtsStarted).
        }

        if let Some(ref types) = self.event_types {
            let event_type = event_type_name(event);
            if !types.iter().any(|t| t == event_type) {
                return false;
            }
        }

        true
    }
}

fn extract_session_id(event: &RambleEvent) -> Option<&str> {
    match event {
        RambleEvent::PipelineInputReceived { session_id, .. } => Some(session_id.as_str()),
        RambleEvent::SessionStarted { session_id } => Some(session_id.as_str()),
        RambleEvent::SessionEnded { session_id } => Some(session_id.as_str()),
        RambleEvent::NewClaims { session_id, .. } => Some(session_id.as_str()),
        _ => None,
    }
}

fn event_type_name(event: &RambleEvent) -> &'static str {
    match event {
        RambleEvent::LensActivate { .. } => "LensActivate",
        RambleEvent::LensDeactivate { .. } => "LensDeactivate",
        RambleEvent::LensInput { .. } => "LensInput",
        RambleEvent::PipelineInputReceived { .. } => "PipelineInputReceived",
        RambleEvent::SttRecordingStarted => "SttRecordingStarted",
        RambleEvent::SttRecordingStopped => "SttRecordingStopped",
        RambleEvent::SttTranscribing => "SttTranscribing",
        RambleEvent::SttIntermediate { .. } => "SttIntermediate",
        RambleEvent::SttFinal { .. } => "SttFinal",
        RambleEvent::TtsSpeak { .. } => "TtsSpeak",
        RambleEvent::TtsGenerated => "TtsGenerated",
        RambleEvent::TtsStarted => "TtsStarted",
        RambleEvent::TtsEnded => "TtsEnded",
        RambleEvent::TtsCancelled => "TtsCancelled",
        RambleEvent::TtsStop => "TtsStop",
        RambleEvent::SessionStarted { .. } => "SessionStarted",
        RambleEvent::SessionEnded { .. } => "SessionEnded",
        RambleEvent::NewClaims { .. } => "NewClaims",
        RambleEvent::TaskCompleted { .. } => "TaskCompleted",
        RambleEvent::TaskFailed { .. } => "TaskFailed",
        RambleEvent::DecayCompleted { .. } => "DecayCompleted",
        RambleEvent::ObserverOutputCreated { .. } => "ObserverOutputCreated",
        RambleEvent::DebugDataChanged { .. } => "DebugDataChanged",
    }
}

/// A filtered event receiver that skips non-matching events.
pub struct FilteredReceiver {
    rx: tokio::sync::broadcast::Receiver<RambleEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub async fn recv(&mut self) -> Result<RambleEvent, tokio::sync::broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<RambleEvent, tokio::sync::broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_subscribe_receives_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(RambleEvent::SessionStarted {
            session_id: Id::from_str("s1"),
        });
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, RambleEvent::SessionStarted { .. }));
    }

    #[test]
    fn filter_by_session_blocks_other_sessions() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_filtered(EventFilter::for_session("s1"));

        bus.publish(RambleEvent::SessionStarted {
            session_id: Id::from_str("s2"),
        });
        bus.publish(RambleEvent::SessionStarted {
            session_id: Id::from_str("s1"),
        });

        let event = rx.try_recv().unwrap();
        match event {
            RambleEvent::SessionStarted { session_id } => assert_eq!(session_id.as_str(), "s1"),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn filter_by_event_type() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_filtered(EventFilter::for_types(vec![
            "TtsStarted".to_string(),
        ]));

        bus.publish(RambleEvent::SttRecordingStarted);
        bus.publish(RambleEvent::TtsStarted);
        bus.publish(RambleEvent::SttTranscribing);
        bus.publish(RambleEvent::TtsStarted);

        assert!(matches!(rx.try_recv().unwrap(), RambleEvent::TtsStarted));
        assert!(matches!(rx.try_recv().unwrap(), RambleEvent::TtsStarted));
    }

    #[test]
    fn sessionless_events_pass_session_filter() {
        let filter = EventFilter::for_session("s1");
        assert!(filter.matches(&RambleEvent::TtsStarted));
        assert!(!filter.matches(&RambleEvent::SessionStarted {
            session_id: Id::from_str("s2"),
        }));
    }
}
