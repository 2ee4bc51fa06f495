//! Wire types exchanged with the rendering surface.
//!
//! Both directions are JSON objects discriminated by a `type` field. Inbound
//! messages carry an `Unknown` catch-all so that a newer surface can add
//! message types without breaking older hosts.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed surface message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode surface message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Messages produced by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "pdfInitialized")]
    Initialized,
    #[serde(rename = "pageFlipped", rename_all = "camelCase")]
    PageFlipped {
        #[serde(default)]
        page: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_pages: Option<u32>,
    },
    #[serde(rename = "pdfLoaded")]
    Loaded {
        #[serde(default)]
        pages: u32,
    },
    #[serde(rename = "pdfError")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(rename = "fullscreenChange", rename_all = "camelCase")]
    FullscreenChanged { is_fullscreen: bool },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// Commands the host sends to the rendering surface. None of them is
/// acknowledged directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundCommand {
    #[serde(rename = "navigate")]
    Navigate { direction: Direction },
    #[serde(rename = "audioToggle")]
    SetAudio { enabled: bool },
    #[serde(rename = "fullscreen")]
    RequestFullscreen,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "initializationAttempt")]
    InitAttempt { attempt: u32 },
    #[serde(rename = "initNavigation")]
    InitNavigation,
}

pub fn decode_inbound(raw: &str) -> Result<InboundMessage, WireError> {
    serde_json::from_str(raw).map_err(WireError::Malformed)
}

pub fn encode_inbound(message: &InboundMessage) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(WireError::Encode)
}

pub fn encode_command(command: &OutboundCommand) -> Result<String, WireError> {
    serde_json::to_string(command).map_err(WireError::Encode)
}

pub fn decode_command(raw: &str) -> Result<OutboundCommand, WireError> {
    serde_json::from_str(raw).map_err(WireError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_known_inbound_type() {
        assert_eq!(
            decode_inbound(r#"{"type":"pdfInitialized"}"#).unwrap(),
            InboundMessage::Initialized
        );
        assert_eq!(
            decode_inbound(r#"{"type":"pageFlipped","page":6,"totalPages":42}"#).unwrap(),
            InboundMessage::PageFlipped {
                page: 6,
                total_pages: Some(42)
            }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"pageFlipped","page":3}"#).unwrap(),
            InboundMessage::PageFlipped {
                page: 3,
                total_pages: None
            }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"pdfLoaded","pages":42}"#).unwrap(),
            InboundMessage::Loaded { pages: 42 }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"pdfError","message":"corrupt file"}"#).unwrap(),
            InboundMessage::Error {
                message: "corrupt file".into()
            }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"fullscreenChange","isFullscreen":true}"#).unwrap(),
            InboundMessage::FullscreenChanged {
                is_fullscreen: true
            }
        );
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        assert_eq!(
            decode_inbound(r#"{"type":"pageFlipped"}"#).unwrap(),
            InboundMessage::PageFlipped {
                page: 0,
                total_pages: None
            }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"pdfError"}"#).unwrap(),
            InboundMessage::Error {
                message: String::new()
            }
        );
    }

    #[test]
    fn unrecognized_type_decodes_as_unknown() {
        assert_eq!(
            decode_inbound(r#"{"type":"thumbnailReady","page":2}"#).unwrap(),
            InboundMessage::Unknown
        );
    }

    #[test]
    fn malformed_payloads_are_errors() {
        for raw in [
            "not json",
            "42",
            r#"{"page":3}"#,
            r#"{"type":"pageFlipped","page":"three"}"#,
            r#"{"type":"pageFlipped","page":-1}"#,
            r#"{"type":"fullscreenChange"}"#,
        ] {
            assert!(
                matches!(decode_inbound(raw), Err(WireError::Malformed(_))),
                "expected {raw} to be rejected"
            );
        }
    }

    #[test]
    fn outbound_commands_use_surface_field_names() {
        let navigate = encode_command(&OutboundCommand::Navigate {
            direction: Direction::Next,
        })
        .unwrap();
        insta::assert_snapshot!(navigate, @r#"{"type":"navigate","direction":"next"}"#);

        let audio = encode_command(&OutboundCommand::SetAudio { enabled: false }).unwrap();
        insta::assert_snapshot!(audio, @r#"{"type":"audioToggle","enabled":false}"#);

        let attempt = encode_command(&OutboundCommand::InitAttempt { attempt: 2 }).unwrap();
        insta::assert_snapshot!(attempt, @r#"{"type":"initializationAttempt","attempt":2}"#);

        let fullscreen = encode_command(&OutboundCommand::RequestFullscreen).unwrap();
        insta::assert_snapshot!(fullscreen, @r#"{"type":"fullscreen"}"#);
    }

    #[test]
    fn page_flip_encoding_omits_unknown_total() {
        let raw = encode_inbound(&InboundMessage::PageFlipped {
            page: 4,
            total_pages: None,
        })
        .unwrap();
        assert_eq!(raw, r#"{"type":"pageFlipped","page":4}"#);
    }
}
