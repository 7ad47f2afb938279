//! Request model
//!
//! Bodies carried by a [`JMessage`](crate::protocol::JMessage): session
//! (login/logout/ping), query, update/insert/delete and dataset requests.
//! Builders are append-only and hand back `&mut Self` so calls chain; one
//! builder instance belongs to one request being assembled.

mod dataset;
mod query;
mod update;

pub use dataset::{DatasetAction, DatasetRequest};
pub use query::QueryRequest;
pub use update::{PkSpec, UpdateRequest};

use serde::{Deserialize, Serialize};

use crate::compiler::{Direction, JoinDescriptor, JoinKind, OrderDescriptor};
use crate::crypto::CredentialToken;

/// One where condition
///
/// Written as a bare array: `[col, value]` for a primary key match,
/// `[op, left, right]` for a predicate, nested arrays for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Pk(String, String),
    Pred(String, String, String),
    Group(Vec<Condition>),
}

impl Condition {
    pub fn pk(col: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Pk(col.into(), value.into())
    }

    pub fn pred(op: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Condition::Pred(op.into(), left.into(), right.into())
    }
}

/// Select part shared by query and dataset requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conn: Option<String>,

    /// Main table
    #[serde(rename = "f")]
    pub mtabl: String,

    #[serde(rename = "mAlias", skip_serializing_if = "Option::is_none")]
    pub malias: Option<String>,

    /// `[expr, alias]`
    pub exprs: Vec<(String, Option<String>)>,

    #[serde(rename = "j")]
    pub joins: Vec<JoinDescriptor>,

    #[serde(rename = "conds")]
    pub where_: Vec<Condition>,

    /// `[column, asc|desc]`
    pub orders: Vec<(String, Direction)>,

    pub group: Vec<String>,

    /// Page index, -1 for no paging
    pub page: i64,

    /// Page size, -1 for no paging
    #[serde(rename = "pgSize")]
    pub pg_size: i64,
}

impl QueryParts {
    pub fn new(conn: Option<&str>, mtabl: &str, malias: Option<&str>) -> Self {
        Self {
            conn: conn.map(String::from),
            mtabl: mtabl.to_string(),
            malias: malias.map(String::from),
            exprs: Vec::new(),
            joins: Vec::new(),
            where_: Vec::new(),
            orders: Vec::new(),
            group: Vec::new(),
            page: -1,
            pg_size: -1,
        }
    }

    /// Whether the server is asked to page the result
    pub fn is_paged(&self) -> bool {
        self.page >= 0 && self.pg_size > 0
    }
}

/// Fluent builder contract of query-like requests
///
/// Every method appends and returns the same builder. Only [`page`] replaces
/// what an earlier call set.
///
/// [`page`]: QueryBuilder::page
pub trait QueryBuilder {
    fn parts(&self) -> &QueryParts;

    fn parts_mut(&mut self) -> &mut QueryParts;

    fn expr(&mut self, expr: impl Into<String>, alias: Option<&str>) -> &mut Self {
        self.parts_mut()
            .exprs
            .push((expr.into(), alias.map(String::from)));
        self
    }

    /// Append `(expr, alias)` pairs
    fn exprs<E, A>(&mut self, exprs: &[(E, Option<A>)]) -> &mut Self
    where
        E: AsRef<str>,
        A: AsRef<str>,
    {
        for (e, a) in exprs {
            self.expr(e.as_ref(), a.as_ref().map(|a| a.as_ref()));
        }
        self
    }

    fn join(
        &mut self,
        kind: JoinKind,
        table: impl Into<String>,
        alias: Option<&str>,
        on: Option<&str>,
    ) -> &mut Self {
        if kind == JoinKind::Main {
            tracing::warn!("Main table can't be joined, ignored");
            return self;
        }
        self.parts_mut()
            .joins
            .push(JoinDescriptor::new(kind, table, alias, on));
        self
    }

    /// Append compiled join descriptors
    fn joins(&mut self, joins: impl IntoIterator<Item = JoinDescriptor>) -> &mut Self {
        for j in joins {
            self.join(j.kind, j.table, j.alias.as_deref(), j.on.as_deref());
        }
        self
    }

    /// Inner join
    fn j(&mut self, table: impl Into<String>, alias: Option<&str>, on: &str) -> &mut Self {
        self.join(JoinKind::Inner, table, alias, Some(on))
    }

    /// Left outer join
    fn l(&mut self, table: impl Into<String>, alias: Option<&str>, on: &str) -> &mut Self {
        self.join(JoinKind::Left, table, alias, Some(on))
    }

    /// Right outer join
    fn r(&mut self, table: impl Into<String>, alias: Option<&str>, on: &str) -> &mut Self {
        self.join(JoinKind::Right, table, alias, Some(on))
    }

    /// Build one `[op, left, right]` condition
    fn where_cond(
        &mut self,
        op: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> &mut Self {
        self.parts_mut()
            .where_
            .push(Condition::pred(op, left, right));
        self
    }

    /// Merge an already built condition list
    fn where_conds(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.parts_mut().where_.extend(conds);
        self
    }

    fn orderby(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.parts_mut().orders.push((column.into(), direction));
        self
    }

    /// Append compiled order descriptors
    fn orderbys(&mut self, orders: impl IntoIterator<Item = OrderDescriptor>) -> &mut Self {
        for o in orders {
            self.orderby(o.column(), o.direction);
        }
        self
    }

    fn groupby(&mut self, column: impl Into<String>) -> &mut Self {
        self.parts_mut().group.push(column.into());
        self
    }

    fn groupbys<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        for c in columns {
            self.groupby(c.as_ref());
        }
        self
    }

    /// Ask the server for page `index` of `size` rows
    fn page(&mut self, size: i64, index: i64) -> &mut Self {
        let parts = self.parts_mut();
        parts.pg_size = size;
        parts.page = index;
        self
    }
}

/// Action of a session request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Login,
    Logout,
    Ping,
}

/// Login / logout / heartbeat body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    pub a: SessionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl SessionRequest {
    pub fn login(credential: CredentialToken) -> Self {
        Self {
            a: SessionAction::Login,
            uid: Some(credential.uid),
            token: Some(credential.token),
            iv: Some(credential.iv),
        }
    }

    pub fn logout(uid: Option<String>) -> Self {
        Self {
            a: SessionAction::Logout,
            uid,
            token: None,
            iv: None,
        }
    }

    pub fn ping() -> Self {
        Self {
            a: SessionAction::Ping,
            uid: None,
            token: None,
            iv: None,
        }
    }
}

/// Any request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Session(SessionRequest),
    Query(QueryRequest),
    Update(UpdateRequest),
    Dataset(DatasetRequest),
}

impl From<SessionRequest> for RequestBody {
    fn from(req: SessionRequest) -> Self {
        RequestBody::Session(req)
    }
}

impl From<QueryRequest> for RequestBody {
    fn from(req: QueryRequest) -> Self {
        RequestBody::Query(req)
    }
}

impl From<UpdateRequest> for RequestBody {
    fn from(req: UpdateRequest) -> Self {
        RequestBody::Update(req)
    }
}

impl From<DatasetRequest> for RequestBody {
    fn from(req: DatasetRequest) -> Self {
        RequestBody::Dataset(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_shapes() {
        let conds = vec![
            Condition::pk("id", "42"),
            Condition::pred("=", "u.orgId", "'o1'"),
            Condition::Group(vec![Condition::pred("%", "u.name", "'a'")]),
        ];
        assert_eq!(
            serde_json::to_value(&conds).unwrap(),
            json!([["id", "42"], ["=", "u.orgId", "'o1'"], [["%", "u.name", "'a'"]]])
        );
    }

    #[test]
    fn test_login_body() {
        let credential = CredentialToken {
            uid: "admin".to_string(),
            token: "dG9rZW4=".to_string(),
            iv: "aXY=".to_string(),
        };
        let body: RequestBody = SessionRequest::login(credential).into();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"a": "login", "uid": "admin", "token": "dG9rZW4=", "iv": "aXY="})
        );
    }

    #[test]
    fn test_ping_body() {
        let json = serde_json::to_value(SessionRequest::ping()).unwrap();
        assert_eq!(json, json!({"a": "ping"}));
    }
}
