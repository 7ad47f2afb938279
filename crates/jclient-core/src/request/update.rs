use serde::Serialize;
use serde_json::Value;

use super::Condition;
use crate::error::{ClientError, Result};
use crate::protocol::{nvs2arr, Crud};

/// Primary key of the record(s) to update or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkSpec {
    /// Explicit conditions
    Conditions(Vec<Condition>),
    /// `{pk, v}`
    KeyValue { pk: String, v: String },
}

impl PkSpec {
    pub fn key_value(pk: impl Into<String>, v: impl Into<String>) -> Self {
        PkSpec::KeyValue {
            pk: pk.into(),
            v: v.into(),
        }
    }

    /// Read a pk given as JSON
    ///
    /// Accepts `{"pk": .., "v": ..}`, a single condition tuple or an array of
    /// condition tuples.
    pub fn from_json(pk: &Value) -> Result<Self> {
        match pk {
            Value::Object(obj) => match (obj.get("pk"), obj.get("v")) {
                (Some(Value::String(k)), Some(v)) => Ok(PkSpec::key_value(k.as_str(), scalar(v))),
                _ => Err(ClientError::InvalidPk(pk.to_string())),
            },
            Value::Array(items) if items.iter().all(Value::is_array) => items
                .iter()
                .map(|c| condition_from_json(c).ok_or_else(|| ClientError::InvalidPk(pk.to_string())))
                .collect::<Result<Vec<_>>>()
                .map(PkSpec::Conditions),
            Value::Array(_) => condition_from_json(pk)
                .map(|c| PkSpec::Conditions(vec![c]))
                .ok_or_else(|| ClientError::InvalidPk(pk.to_string())),
            _ => Err(ClientError::InvalidPk(pk.to_string())),
        }
    }

    fn into_conditions(self) -> Vec<Condition> {
        match self {
            PkSpec::Conditions(conds) => conds,
            PkSpec::KeyValue { pk, v } => vec![Condition::Pk(pk, v)],
        }
    }
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn condition_from_json(c: &Value) -> Option<Condition> {
    let items = c.as_array()?;
    if items.iter().any(|i| i.is_array() || i.is_object()) {
        return None;
    }
    match items.as_slice() {
        [n, v] => Some(Condition::pk(scalar(n), scalar(v))),
        [op, l, r] => Some(Condition::pred(scalar(op), scalar(l), scalar(r))),
        _ => None,
    }
}

/// Update / insert / delete request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRequest {
    pub a: Crud,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conn: Option<String>,

    pub mtabl: String,

    /// `[name, value]` pairs to write
    pub nvs: Vec<[String; 2]>,

    #[serde(rename = "where")]
    pub where_: Vec<Condition>,

    /// Follow-up updates the server runs in the same transaction
    #[serde(rename = "postUpds", skip_serializing_if = "Vec::is_empty")]
    pub post_upds: Vec<UpdateRequest>,
}

impl UpdateRequest {
    /// Update records of `mtabl` identified by `pk`
    pub fn new(conn: Option<&str>, mtabl: &str, pk: Option<PkSpec>) -> Self {
        Self::with_crud(Crud::Update, conn, mtabl, pk)
    }

    /// Insert into `mtabl`
    pub fn insert(conn: Option<&str>, mtabl: &str) -> Self {
        Self::with_crud(Crud::Insert, conn, mtabl, None)
    }

    /// Delete records of `mtabl` identified by `pk`
    pub fn delete(conn: Option<&str>, mtabl: &str, pk: Option<PkSpec>) -> Self {
        Self::with_crud(Crud::Delete, conn, mtabl, pk)
    }

    /// Update with a pk given as JSON
    ///
    /// A pk of unknown shape is logged and the request is built with an
    /// empty where clause; check [`UpdateRequest::where_`] before sending.
    pub fn with_json_pk(conn: Option<&str>, mtabl: &str, pk: &Value) -> Self {
        let pk = match PkSpec::from_json(pk) {
            Ok(pk) => Some(pk),
            Err(e) => {
                tracing::error!("UpdateRequest on {}: {}", mtabl, e);
                None
            }
        };
        Self::new(conn, mtabl, pk)
    }

    fn with_crud(a: Crud, conn: Option<&str>, mtabl: &str, pk: Option<PkSpec>) -> Self {
        Self {
            a,
            conn: conn.map(String::from),
            mtabl: mtabl.to_string(),
            nvs: Vec::new(),
            where_: pk.map(PkSpec::into_conditions).unwrap_or_default(),
            post_upds: Vec::new(),
        }
    }

    pub fn nv(&mut self, n: impl Into<String>, v: impl Into<String>) -> &mut Self {
        self.nvs.push([n.into(), v.into()]);
        self
    }

    pub fn nvs<N, V>(&mut self, nvs: &[(N, V)]) -> &mut Self
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        self.nvs.extend(nvs2arr(nvs));
        self
    }

    pub fn where_cond(
        &mut self,
        op: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> &mut Self {
        self.where_.push(Condition::pred(op, left, right));
        self
    }

    pub fn where_conds(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.where_.extend(conds);
        self
    }

    /// Append a post-update
    pub fn post(&mut self, pst: UpdateRequest) -> &mut Self {
        self.post_upds.push(pst);
        self
    }

    /// Append several post-updates
    pub fn posts(&mut self, psts: Vec<UpdateRequest>) -> &mut Self {
        if psts.is_empty() {
            tracing::warn!("Empty post updates on {}, nothing to add", self.mtabl);
        }
        self.post_upds.extend(psts);
        self
    }
}
