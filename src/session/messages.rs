//! Wire formats
//!
//! Signaling messages exchanged over the rendezvous WebSocket and the
//! side-channel payloads multiplexed over the negotiated data transport.
//! Everything is JSON text frames; field names follow the vehicle firmware's
//! camelCase convention.

use serde::{Deserialize, Serialize};

/// SDP description type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description as carried in `offer`/`answer` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate record, browser-compatible field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

/// Signaling message types exchanged with the rendezvous server.
///
/// The vehicle is the offering party; the HUD answers. Unknown message
/// types deserialize to `Unknown` and are ignored by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// SDP offer from the vehicle
    Offer { description: SessionDescription },

    /// SDP answer from the HUD
    Answer { description: SessionDescription },

    /// Trickled ICE candidate (either direction)
    Candidate { candidate: IceCandidate },

    /// Anything this client does not understand
    #[serde(other)]
    Unknown,
}

impl SignalingMessage {
    /// Parse a signaling message from a JSON text frame
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON for transmission
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Create an answer message
    pub fn answer(description: SessionDescription) -> Self {
        SignalingMessage::Answer { description }
    }

    /// Create a candidate message
    pub fn candidate(candidate: IceCandidate) -> Self {
        SignalingMessage::Candidate { candidate }
    }
}

/// Detection class reported by the on-vehicle models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
    Cone,
    Pothole,
}

/// One detection box, coordinates normalized to 0..1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Partial telemetry snapshot. Every field is optional; absent fields leave
/// the previous value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    /// Speed in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// State of charge, 0-100
    #[serde(rename = "batteryPercent", default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<f64>,

    /// Power draw in kW
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<f64>,

    /// Remaining range in km
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f64>,

    /// Pack temperatures in Celsius
    #[serde(rename = "battery1Temp", default, skip_serializing_if = "Option::is_none")]
    pub battery1_temp: Option<f64>,

    #[serde(rename = "battery2Temp", default, skip_serializing_if = "Option::is_none")]
    pub battery2_temp: Option<f64>,
}

/// A frame on the negotiated side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum SideChannelMessage {
    Telemetry(TelemetryUpdate),
    Detections(Vec<Detection>),
    #[serde(other)]
    Unknown,
}

/// Inference model selection pushed to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSelection {
    Cone,
    Pothole,
    Off,
}

impl ModelSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelection::Cone => "cone",
            ModelSelection::Pothole => "pothole",
            ModelSelection::Off => "off",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offer() {
        let json = r#"{"type":"offer","description":{"type":"offer","sdp":"v=0\r\n..."}}"#;
        let msg = SignalingMessage::from_json(json).unwrap();
        match msg {
            SignalingMessage::Offer { description } => {
                assert_eq!(description.kind, SdpType::Offer);
                assert!(description.sdp.starts_with("v=0"));
            }
            _ => panic!("Expected Offer"),
        }
    }

    #[test]
    fn test_parse_candidate_with_browser_field_names() {
        let json = r#"{"type":"candidate","candidate":{"candidate":"candidate:1 1 UDP 2130706431 192.168.1.10 54321 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        let msg = SignalingMessage::from_json(json).unwrap();
        match msg {
            SignalingMessage::Candidate { candidate } => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
            }
            _ => panic!("Expected Candidate"),
        }
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let json = r#"{"type":"keepalive","timestamp":12345}"#;
        let msg = SignalingMessage::from_json(json).unwrap();
        assert_eq!(msg, SignalingMessage::Unknown);
    }

    #[test]
    fn test_answer_serialization() {
        let msg = SignalingMessage::answer(SessionDescription::answer("v=0..."));
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"answer""#));
        assert!(json.contains("v=0"));
    }

    #[test]
    fn test_side_channel_telemetry_partial() {
        let json = r#"{"type":"telemetry","payload":{"speed":21.5,"batteryPercent":85}}"#;
        let msg: SideChannelMessage = serde_json::from_str(json).unwrap();
        match msg {
            SideChannelMessage::Telemetry(update) => {
                assert_eq!(update.speed, Some(21.5));
                assert_eq!(update.battery_percent, Some(85.0));
                assert_eq!(update.range, None);
            }
            _ => panic!("Expected Telemetry"),
        }
    }

    #[test]
    fn test_side_channel_detections() {
        let json = r#"{"type":"detections","payload":[{"class":"cone","confidence":0.9,"x":0.4,"y":0.6,"w":0.2,"h":0.2}]}"#;
        let msg: SideChannelMessage = serde_json::from_str(json).unwrap();
        match msg {
            SideChannelMessage::Detections(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].class, DetectionClass::Cone);
            }
            _ => panic!("Expected Detections"),
        }
    }

    #[test]
    fn test_side_channel_unknown_type() {
        let json = r#"{"type":"debugdump","payload":{"x":1}}"#;
        let msg: SideChannelMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, SideChannelMessage::Unknown);
    }
}
