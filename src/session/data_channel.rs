//! Side-channel demultiplexer
//!
//! The vehicle multiplexes telemetry snapshots and detection lists over one
//! data channel it opens after negotiation. Each frame is JSON; frames are
//! routed to the injected sinks in arrival order.

use log::{debug, warn};

use super::messages::SideChannelMessage;
use super::HudSinks;

/// Route one inbound side-channel frame to the appropriate sink.
///
/// Parse failures are logged and dropped — they produce zero sink calls and
/// never propagate across the channel boundary. Unknown frame types are
/// ignored.
pub fn dispatch_frame(frame: &[u8], sinks: &dyn HudSinks) {
    match serde_json::from_slice::<SideChannelMessage>(frame) {
        Ok(SideChannelMessage::Telemetry(update)) => sinks.update_telemetry(update),
        Ok(SideChannelMessage::Detections(detections)) => sinks.update_detections(detections),
        Ok(SideChannelMessage::Unknown) => {
            debug!("Ignoring side-channel frame with unknown type");
        }
        Err(e) => {
            warn!("Side-channel frame parse error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::messages::{Detection, TelemetryUpdate};
    use crate::session::ConnectionStatus;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingSinks {
        telemetry: Mutex<Vec<TelemetryUpdate>>,
        detections: Mutex<Vec<Vec<Detection>>>,
    }

    impl HudSinks for CountingSinks {
        fn set_connection_status(&self, _status: ConnectionStatus) {}

        fn update_telemetry(&self, update: TelemetryUpdate) {
            self.telemetry.lock().push(update);
        }

        fn update_detections(&self, detections: Vec<Detection>) {
            self.detections.lock().push(detections);
        }
    }

    #[test]
    fn test_telemetry_payload_forwarded_unmodified() {
        let sinks = CountingSinks::default();
        dispatch_frame(
            br#"{"type":"telemetry","payload":{"speed":22.1,"batteryPercent":84,"consumption":1.2,"range":118}}"#,
            &sinks,
        );

        let telemetry = sinks.telemetry.lock();
        assert_eq!(telemetry.len(), 1);
        assert_eq!(telemetry[0].speed, Some(22.1));
        assert_eq!(telemetry[0].battery_percent, Some(84.0));
        assert_eq!(telemetry[0].consumption, Some(1.2));
        assert_eq!(telemetry[0].range, Some(118.0));
        assert!(sinks.detections.lock().is_empty());
    }

    #[test]
    fn test_detections_forwarded() {
        let sinks = CountingSinks::default();
        dispatch_frame(
            br#"{"type":"detections","payload":[{"class":"pothole","confidence":0.7,"x":0.1,"y":0.2,"w":0.1,"h":0.1}]}"#,
            &sinks,
        );

        let detections = sinks.detections.lock();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].len(), 1);
        assert!(sinks.telemetry.lock().is_empty());
    }

    #[test]
    fn test_parse_failure_produces_no_sink_calls() {
        let sinks = CountingSinks::default();
        dispatch_frame(b"garbage \xff frame", &sinks);
        dispatch_frame(b"", &sinks);
        assert!(sinks.telemetry.lock().is_empty());
        assert!(sinks.detections.lock().is_empty());
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let sinks = CountingSinks::default();
        dispatch_frame(br#"{"type":"gps","payload":{"lat":60.0}}"#, &sinks);
        assert!(sinks.telemetry.lock().is_empty());
        assert!(sinks.detections.lock().is_empty());
    }
}
