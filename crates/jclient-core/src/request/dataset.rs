use serde::{Serialize, Serializer};
use serde_json::Value;

use super::{QueryBuilder, QueryParts};
use crate::compiler::SemanticKey;

/// What a dataset request asks the server to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetAction {
    /// Load a tree from a configured semantic key
    SqlTree,
    /// Rebuild tree relationships below a root
    ReTree,
    /// Rebuild the whole forest
    ReForest,
    /// Anything else; sent as is, the server probably won't understand it
    Other(String),
}

impl DatasetAction {
    pub fn as_str(&self) -> &str {
        match self {
            DatasetAction::SqlTree => "sqltree",
            DatasetAction::ReTree => "retree",
            DatasetAction::ReForest => "reforest",
            DatasetAction::Other(t) => t,
        }
    }

    /// Parse an action name; unknown names are kept with a warning
    pub fn parse(t: &str) -> Self {
        match t {
            "sqltree" => DatasetAction::SqlTree,
            "retree" => DatasetAction::ReTree,
            "reforest" => DatasetAction::ReForest,
            other => {
                tracing::warn!(
                    "Dataset action '{}' won't be understood by server, should be one of sqltree, retree, reforest",
                    other
                );
                DatasetAction::Other(other.to_string())
            }
        }
    }
}

impl Serialize for DatasetAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Dataset / semantic tree request
///
/// Posted on the `dataset` port for `sqltree`, on the `stree` port for
/// `retree` and `reforest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRequest {
    pub a: DatasetAction,

    #[serde(flatten)]
    parts: QueryParts,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sk: Option<String>,

    #[serde(rename = "sqlArgs")]
    pub sql_args: Vec<Value>,

    #[serde(rename = "trSmtcs", skip_serializing_if = "Option::is_none")]
    pub tree_semantics: Option<Value>,

    #[serde(rename = "rootId", skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

impl DatasetRequest {
    /// Request on `mtabl` with semantic key `sk`
    ///
    /// A semantic key fixes the action to `sqltree`; any other requested
    /// action is overridden with a warning.
    pub fn new(conn: Option<&str>, mtabl: &str, sk: Option<&str>, action: DatasetAction) -> Self {
        let sk = sk.filter(|s| !s.is_empty()).map(String::from);
        let a = match (&sk, action) {
            (Some(key), a) if a != DatasetAction::SqlTree => {
                tracing::warn!(
                    "Dataset action '{}' is ignored for sk is defined: {}",
                    a.as_str(),
                    key
                );
                DatasetAction::SqlTree
            }
            (_, a) => a,
        };

        Self {
            a,
            parts: QueryParts::new(conn, mtabl, None),
            sk,
            sql_args: Vec::new(),
            tree_semantics: None,
            root_id: None,
        }
    }

    /// `sqltree` request from a parsed semantic key and its arguments
    pub fn from_semantic_key(conn: Option<&str>, sk: &SemanticKey) -> Self {
        let mut req = Self::new(conn, &sk.key, Some(&sk.key), DatasetAction::SqlTree);
        req.args(sk.args_json());
        req
    }

    /// Append positional SQL arguments
    pub fn args(&mut self, args: impl IntoIterator<Item = Value>) -> &mut Self {
        self.sql_args.extend(args);
        self
    }

    pub fn arg(&mut self, arg: impl Into<Value>) -> &mut Self {
        self.sql_args.push(arg.into());
        self
    }

    pub fn tree_semantics(&mut self, semantics: Value) -> &mut Self {
        self.tree_semantics = Some(semantics);
        self
    }

    /// Only load the subtree below `root`
    pub fn root_id(&mut self, root: impl Into<String>) -> &mut Self {
        self.root_id = Some(root.into());
        self
    }
}

impl QueryBuilder for DatasetRequest {
    fn parts(&self) -> &QueryParts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut QueryParts {
        &mut self.parts
    }
}
