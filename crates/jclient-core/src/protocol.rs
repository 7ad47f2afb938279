//! JSON Protocol Types
//!
//! Envelope, header, port table and result codes of the semantic JSON
//! services, plus the small conversion helpers shared by request builders.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{ClientError, Result};
use crate::request::{RequestBody, UpdateRequest};

/// Protocol version stamped on every envelope
pub const PROTOCOL_VERSION: &str = "1.0";

/// Symbolic server ports
///
/// Callers pick a port by symbol; the concrete endpoint path is only used
/// when a URL is built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    Heartbeat,
    Echo,
    /// Login / logout
    Session,
    /// Read (query.serv)
    Query,
    Update,
    Insert,
    Delete,
    Dataset,
    /// Semantic tree
    Stree,
}

impl Port {
    /// Every port, in table order
    pub const ALL: [Port; 9] = [
        Port::Heartbeat,
        Port::Echo,
        Port::Session,
        Port::Query,
        Port::Update,
        Port::Insert,
        Port::Delete,
        Port::Dataset,
        Port::Stree,
    ];

    /// Endpoint path of this port
    pub fn path(&self) -> &'static str {
        match self {
            Port::Heartbeat => "ping.serv",
            Port::Echo => "echo.serv",
            Port::Session => "login.serv",
            Port::Query => "r.serv",
            Port::Update => "u.serv",
            Port::Insert => "c.serv",
            Port::Delete => "d.serv",
            Port::Dataset => "ds.serv",
            Port::Stree => "s-tree.serv",
        }
    }

    /// Symbolic name, as written on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Port::Heartbeat => "heartbeat",
            Port::Echo => "echo",
            Port::Session => "session",
            Port::Query => "query",
            Port::Update => "update",
            Port::Insert => "insert",
            Port::Delete => "delete",
            Port::Dataset => "dataset",
            Port::Stree => "stree",
        }
    }

    /// Reverse lookup from an endpoint path
    pub fn from_path(path: &str) -> Result<Port> {
        Port::ALL
            .iter()
            .copied()
            .find(|p| p.path() == path)
            .ok_or_else(|| ClientError::UnknownPort(path.to_string()))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Port {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Port::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| ClientError::UnknownPort(s.to_string()))
    }
}

/// Result code of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgCode {
    Ok,
    /// Re-authentication required
    ExSession,
    ExSemantic,
    /// Transport or connectivity failure
    ExIo,
    ExTransct,
    ExDA,
    ExGeneral,
}

impl MsgCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgCode::Ok => "ok",
            MsgCode::ExSession => "exSession",
            MsgCode::ExSemantic => "exSemantic",
            MsgCode::ExIo => "exIo",
            MsgCode::ExTransct => "exTransct",
            MsgCode::ExDA => "exDA",
            MsgCode::ExGeneral => "exGeneral",
        }
    }

    /// Parse a wire code; unknown codes degrade to `exGeneral`
    pub fn parse_lossy(code: &str) -> MsgCode {
        match code {
            "ok" => MsgCode::Ok,
            "exSession" => MsgCode::ExSession,
            "exSemantic" => MsgCode::ExSemantic,
            "exIo" => MsgCode::ExIo,
            "exTransct" => MsgCode::ExTransct,
            "exDA" => MsgCode::ExDA,
            "exGeneral" => MsgCode::ExGeneral,
            other => {
                tracing::warn!("Unknown result code '{}', treated as exGeneral", other);
                MsgCode::ExGeneral
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, MsgCode::Ok)
    }
}

impl fmt::Display for MsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for MsgCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MsgCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(MsgCode::parse_lossy(&code))
    }
}

/// CRUD discriminator of request bodies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Crud {
    #[serde(rename = "I")]
    Insert,
    #[serde(rename = "R")]
    Read,
    #[serde(rename = "U")]
    Update,
    #[serde(rename = "D")]
    Delete,
}

/// User action recorded by the server's audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[String; 4]", from = "[String; 4]")]
pub struct UserAct {
    pub func_id: String,
    pub cate: String,
    pub cmd: String,
    pub remarks: String,
}

impl UserAct {
    pub fn new(
        func_id: impl Into<String>,
        cate: impl Into<String>,
        cmd: impl Into<String>,
        remarks: impl Into<String>,
    ) -> Self {
        Self {
            func_id: func_id.into(),
            cate: cate.into(),
            cmd: cmd.into(),
            remarks: remarks.into(),
        }
    }
}

impl From<UserAct> for [String; 4] {
    fn from(act: UserAct) -> Self {
        [act.func_id, act.cate, act.cmd, act.remarks]
    }
}

impl From<[String; 4]> for UserAct {
    fn from(arr: [String; 4]) -> Self {
        let [func_id, cate, cmd, remarks] = arr;
        Self {
            func_id,
            cate,
            cmd,
            remarks,
        }
    }
}

/// Session header of an envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "usrAct", skip_serializing_if = "Option::is_none")]
    pub usr_act: Option<UserAct>,
}

impl Header {
    pub fn new(ssid: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            ssid: Some(ssid.into()),
            uid: Some(uid.into()),
            usr_act: None,
        }
    }

    /// Header seeded from a login's session info
    pub fn from_session(info: &SessionInfo) -> Self {
        Self::new(info.ssid.clone(), info.uid.clone())
    }

    /// Set the user action
    pub fn user_act(&mut self, act: UserAct) -> &mut Self {
        self.usr_act = Some(act);
        self
    }
}

/// Session info returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub ssid: String,
    pub uid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message envelope
#[derive(Debug, Clone, Serialize)]
pub struct JMessage {
    pub version: &'static str,
    /// Random, for tracing only; not guaranteed unique
    pub seq: u32,
    pub port: Port,
    pub header: Header,
    pub body: Vec<RequestBody>,
}

impl JMessage {
    /// Create an envelope around a single request body
    pub fn new(port: Port, header: Option<Header>, body: impl Into<RequestBody>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            seq: rand::random::<u32>() % 1001,
            port,
            header: header.unwrap_or_default(),
            body: vec![body.into()],
        }
    }

    /// Create an envelope addressed by endpoint path
    ///
    /// The path must be one of the port table's values.
    pub fn for_path(path: &str, header: Option<Header>, body: impl Into<RequestBody>) -> Result<Self> {
        let port = Port::from_path(path)?;
        Ok(Self::new(port, header, body))
    }

    /// Shortcut for adding post-updates to the first body
    ///
    /// Returns `None` if the first body isn't an update/insert/delete request.
    pub fn post(&mut self, pst: UpdateRequest) -> Option<&mut UpdateRequest> {
        match self.body.first_mut() {
            Some(RequestBody::Update(upd)) => Some(upd.post(pst)),
            _ => {
                tracing::warn!("post() ignored: first body of {} isn't an update", self.port);
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsonResp {
    pub code: MsgCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default)]
    pub msg: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnsonResp {
    /// Text to show a user for this response
    pub fn error_text(&self) -> String {
        if let Some(ref error) = self.error {
            return error.clone();
        }
        match &self.msg {
            Value::String(s) => s.clone(),
            Value::Null => self.code.to_string(),
            other => other.to_string(),
        }
    }

    /// Rows of the `ix`-th result set, keyed by column name
    pub fn rows(&self, ix: usize) -> Vec<Map<String, Value>> {
        match self.msg.get("rs") {
            Some(Value::Array(sets)) => sets.get(ix).map(rs2arr).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Total row count of the `ix`-th result set
    ///
    /// `total` may be a single number or one number per result set.
    pub fn total(&self, ix: usize, default: i64) -> i64 {
        match self.msg.get("total") {
            Some(Value::Number(n)) if ix == 0 => n.as_i64().unwrap_or(default),
            Some(Value::Array(totals)) => totals
                .get(ix)
                .and_then(|t| t.as_i64())
                .unwrap_or(default),
            _ => default,
        }
    }
}

/// Convert a result set into row maps
///
/// The first row holds column names; each following row is zipped with them.
pub fn rs2arr(rs: &Value) -> Vec<Map<String, Value>> {
    let Some(rows) = rs.as_array() else {
        return Vec::new();
    };
    let Some(cols) = rows.first().and_then(|r| r.as_array()) else {
        return Vec::new();
    };

    rows.iter()
        .skip(1)
        .filter_map(|r| r.as_array())
        .map(|r| {
            cols.iter()
                .zip(r.iter())
                .map(|(c, v)| (value_key(c), v.clone()))
                .collect()
        })
        .collect()
}

fn value_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A name/value pair as a wire tuple
pub fn nv2arr(name: &str, value: &str) -> [String; 2] {
    [name.to_string(), value.to_string()]
}

/// Name/value pairs as wire tuples
pub fn nvs2arr<N, V>(nvs: &[(N, V)]) -> Vec<[String; 2]>
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    nvs.iter()
        .map(|(n, v)| nv2arr(n.as_ref(), v.as_ref()))
        .collect()
}
