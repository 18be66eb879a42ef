// Gateway command client
//
// Every command is a JSON POST to `http://<gateway>:8900/operate`. The
// gateway answers with a plain-text body; only the exact string `ok` counts
// as acceptance.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

pub const DEFAULT_COMMAND_PORT: u16 = 8900;

/// Board address that targets every board on the mesh.
pub const BROADCAST_ADDR: &str = "ffffffffffff";

const OPERATE_PATH: &str = "operate";
const SUCCESS_BODY: &str = "ok";
const SWITCH_COMMAND: &str = "swcmd";

// ── Payloads ─────────────────────────────────────────────────────────

/// Top-level command envelope: `{"type":"swcmd","data":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<CommandTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTarget {
    pub addr: Vec<String>,
    pub nodedata: NodeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmdtype", rename_all = "lowercase")]
pub enum NodeData {
    Operate { subid: u16, cmd: u8 },
    GetStatus,
}

impl CommandRequest {
    /// Drive one output on one board to `value`.
    pub fn operate(board_id: &str, sub_address: u16, value: u8) -> Self {
        Self::single(
            board_id,
            NodeData::Operate {
                subid: sub_address,
                cmd: value,
            },
        )
    }

    /// Ask every board to push a full status frame.
    pub fn status_broadcast() -> Self {
        Self::single(BROADCAST_ADDR, NodeData::GetStatus)
    }

    fn single(addr: &str, nodedata: NodeData) -> Self {
        Self {
            kind: SWITCH_COMMAND.to_owned(),
            data: vec![CommandTarget {
                addr: vec![addr.to_owned()],
                nodedata,
            }],
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client bound to one gateway address.
///
/// Cheap to clone; the registry swaps whole clients when the gateway
/// moves rather than mutating one in place.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Build a client for `host:port` from a transport config.
    pub fn new(host: &str, port: u16, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&format!("http://{host}:{port}/"))?;
        Ok(Self::with_client(transport.build_client()?, base_url))
    }

    /// Wrap an existing `reqwest::Client`; `base_url` must end in `/`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The gateway host this client talks to.
    pub fn host(&self) -> Option<&str> {
        self.base_url.host_str()
    }

    /// POST a command. `Ok(true)` iff the gateway answered exactly `ok`.
    pub async fn send_command(&self, request: &CommandRequest) -> Result<bool, Error> {
        let url = self.base_url.join(OPERATE_PATH)?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        let accepted = body == SUCCESS_BODY;
        if !accepted {
            debug!(status = %status, body = %body, "gateway rejected command");
        }
        Ok(accepted)
    }

    pub async fn operate(&self, board_id: &str, sub_address: u16, value: u8) -> Result<bool, Error> {
        self.send_command(&CommandRequest::operate(board_id, sub_address, value))
            .await
    }

    /// Broadcast a status request; doubles as the liveness probe.
    pub async fn request_status(&self) -> Result<bool, Error> {
        self.send_command(&CommandRequest::status_broadcast()).await
    }
}
