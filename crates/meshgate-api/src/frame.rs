//! Unsolicited state frames pushed by the gateway over UDP.
//!
//! ```json
//! {"addr":"AA:BB","data":{"stype":"single","subid":18,"status":1}}
//! {"addr":"AA:BB","data":{"stype":"all","status":[0,1,0]}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One decoded event datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFrame {
    /// Board (bus node) the frame originates from.
    #[serde(rename = "addr")]
    pub board_id: String,

    #[serde(rename = "data")]
    pub update: FrameUpdate,
}

/// Payload of an [`UpdateFrame`], discriminated by `stype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stype", rename_all = "lowercase")]
pub enum FrameUpdate {
    /// One output changed.
    Single {
        #[serde(rename = "subid")]
        sub_address: u16,
        status: u8,
    },
    /// Full snapshot of a board, positional by button.
    ///
    /// Decoding is all-or-nothing: one entry outside `0..=255` fails the
    /// whole frame, and the listener drops it like any malformed datagram.
    All {
        #[serde(rename = "status")]
        statuses: Vec<u8>,
    },
}

impl UpdateFrame {
    pub fn single(board_id: impl Into<String>, sub_address: u16, status: u8) -> Self {
        Self {
            board_id: board_id.into(),
            update: FrameUpdate::Single {
                sub_address,
                status,
            },
        }
    }

    pub fn all(board_id: impl Into<String>, statuses: Vec<u8>) -> Self {
        Self {
            board_id: board_id.into(),
            update: FrameUpdate::All { statuses },
        }
    }

    /// Decode a raw datagram.
    pub fn from_slice(raw: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(raw).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::from_utf8_lossy(raw).into_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decodes_single() {
        let frame =
            UpdateFrame::from_slice(br#"{"addr":"AA:BB","data":{"stype":"single","subid":18,"status":1}}"#)
                .unwrap();
        assert_eq!(frame, UpdateFrame::single("AA:BB", 18, 1));
    }

    #[test]
    fn decodes_all() {
        let frame =
            UpdateFrame::from_slice(br#"{"addr":"AA:BB","data":{"stype":"all","status":[0,1,0]}}"#)
                .unwrap();
        assert_eq!(frame, UpdateFrame::all("AA:BB", vec![0, 1, 0]));
    }

    #[test]
    fn out_of_range_status_rejects_whole_snapshot() {
        let raw = br#"{"addr":"AA:BB","data":{"stype":"all","status":[0,256,1]}}"#;
        assert!(matches!(
            UpdateFrame::from_slice(raw),
            Err(Error::Deserialization { .. })
        ));
    }

    #[test]
    fn unknown_stype_keeps_raw_body() {
        let raw = br#"{"addr":"AA:BB","data":{"stype":"scene","id":4}}"#;
        match UpdateFrame::from_slice(raw).unwrap_err() {
            Error::Deserialization { body, .. } => assert!(body.contains("scene")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
