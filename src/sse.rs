//! Server-sent event framing
//!
//! The frame id is the event's sequence id, so a reconnecting client's
//! `Last-Event-ID` header can be passed straight to
//! [`EventLog::cursor_to_index`](crate::pipeline::EventLog::cursor_to_index).

use crate::pipeline::SequencedEvent;

/// Comment line a transport can send while a subscriber is idle
pub const KEEP_ALIVE: &str = ": keep-alive\n\n";

/// Render `id: <sequence_id>\ndata: {"type":..,"payload":..}\n\n`
pub fn frame(event: &SequencedEvent) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string(&event.event)?;
    Ok(format!("id: {}\ndata: {}\n\n", event.id, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{EventKind, PipelineEvent};
    use serde_json::json;

    #[test]
    fn test_frame_layout() {
        let event = SequencedEvent {
            id: 12,
            event: PipelineEvent::new(EventKind::MilestoneStart, json!({"index": 0})),
        };
        assert_eq!(
            frame(&event).unwrap(),
            "id: 12\ndata: {\"type\":\"milestone_start\",\"payload\":{\"index\":0}}\n\n"
        );
    }

    #[test]
    fn test_frame_escapes_newlines_in_payload() {
        let event = SequencedEvent {
            id: 1,
            event: PipelineEvent::log("line one\nline two"),
        };
        let framed = frame(&event).unwrap();
        assert_eq!(framed.matches('\n').count(), 3);
        assert!(framed.contains("line one\\nline two"));
    }

    #[test]
    fn test_keep_alive_is_comment() {
        assert!(KEEP_ALIVE.starts_with(':'));
        assert!(KEEP_ALIVE.ends_with("\n\n"));
    }
}
