//! Join / order mini-syntax
//!
//! ```text
//! join spec:  b_articles, j:b_cate:c c.id=cateId, l:b_author:a authorId=a.id and a.name = {@ form.name}
//! order spec: pubDate desc, a.name
//! ```
//!
//! Join segments that can't be parsed are reported and skipped, and so is a
//! second main table; a broken order segment fails the whole order spec.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use super::vars::{ArgValue, ResolveContext, VAR_MARKER};
use crate::request::{Condition, QueryBuilder, QueryRequest};

static JOIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([jJrRlL])\s*:\s*(\w+)(?:\s*:\s*(\w+))?\s+(.+?)\s*$").expect("static regex")
});

// a segment starting with a join flag is never a main table
static JOIN_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[jJrRlL]\s*:").expect("static regex"));

static MAIN_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\w+)\s*(?::\s*(\w+))?\s*$").expect("static regex"));

static ORDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(\w+)\.)?(\w+)(?:\s+(asc|desc))?\s*$").expect("static regex")
});

static ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)field\s*:\s*'(\w+)'").expect("static regex"));

/// Placeholder value of "everything" options in query forms
pub const ALL_PLACEHOLDER: &str = "-- ALL --";

/// Parse diagnostics
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Can't parse table join segment: '{0}'")]
    InvalidJoin(String),

    #[error("Can't parse order segment '{segment}' in '{spec}'")]
    InvalidOrder { spec: String, segment: String },

    #[error("No main table in join spec: '{0}'")]
    NoMainTable(String),

    #[error("Main table already given, skipping: '{0}'")]
    ExtraMainTable(String),
}

/// Kind of a table in a join spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Main,
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Main => "main-table",
            JoinKind::Inner => "j",
            JoinKind::Left => "l",
            JoinKind::Right => "r",
        }
    }

    fn from_flag(flag: &str) -> Option<JoinKind> {
        match flag.to_ascii_lowercase().as_str() {
            "j" => Some(JoinKind::Inner),
            "l" => Some(JoinKind::Left),
            "r" => Some(JoinKind::Right),
            _ => None,
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table of a join spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinDescriptor {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    /// On condition with its variable already spliced in
    pub on: Option<String>,
}

impl JoinDescriptor {
    pub fn new(
        kind: JoinKind,
        table: impl Into<String>,
        alias: Option<&str>,
        on: Option<&str>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: alias.map(String::from),
            on: on.map(String::from),
        }
    }
}

/// Written as `[kind, table, alias, on]`
impl Serialize for JoinDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.kind.as_str(), &self.table, &self.alias, &self.on).serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One column of an order spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDescriptor {
    pub table: String,
    pub field: String,
    pub direction: Direction,
}

impl OrderDescriptor {
    /// `table.field`
    pub fn column(&self) -> String {
        if self.table.is_empty() {
            self.field.clone()
        } else {
            format!("{}.{}", self.table, self.field)
        }
    }
}

/// Parse a join spec
///
/// Returns the descriptors in input order together with diagnostics for
/// the segments that were skipped.
pub fn parse_join_spec(
    spec: &str,
    ctx: &ResolveContext<'_>,
) -> (Vec<JoinDescriptor>, Vec<CompileError>) {
    let mut joins = Vec::new();
    let mut diagnostics = Vec::new();

    for segment in spec.split(',') {
        if let Some(caps) = JOIN.captures(segment) {
            // the pattern only admits j/l/r
            let Some(kind) = JoinKind::from_flag(&caps[1]) else {
                continue;
            };
            joins.push(JoinDescriptor {
                kind,
                table: caps[2].to_string(),
                alias: caps.get(3).map(|m| m.as_str().to_string()),
                on: Some(splice_on_condition(&caps[4], ctx)),
            });
        } else if let Some(caps) = MAIN_TABLE
            .captures(segment)
            .filter(|_| !JOIN_FLAG.is_match(segment))
        {
            if joins.iter().any(|j: &JoinDescriptor| j.kind == JoinKind::Main) {
                let err = CompileError::ExtraMainTable(segment.trim().to_string());
                tracing::error!("{}", err);
                diagnostics.push(err);
                continue;
            }
            joins.push(JoinDescriptor {
                kind: JoinKind::Main,
                table: caps[1].to_string(),
                alias: caps.get(2).map(|m| m.as_str().to_string()),
                on: None,
            });
        } else {
            let err = CompileError::InvalidJoin(segment.trim().to_string());
            tracing::error!("{}", err);
            diagnostics.push(err);
        }
    }

    (joins, diagnostics)
}

/// Replace the `{@ path}` marker of an on condition with its value
fn splice_on_condition(on: &str, ctx: &ResolveContext<'_>) -> String {
    let Some(caps) = VAR_MARKER.captures(on) else {
        return on.to_string();
    };
    let (Some(marker), Some(path)) = (caps.get(0), caps.get(1)) else {
        return on.to_string();
    };

    let rest = &on[marker.end()..];
    if VAR_MARKER.is_match(rest) {
        tracing::warn!(
            "Only one variable is supported in a join condition, the rest is sent as is: {}",
            on
        );
    }

    let path = path.as_str();
    let value = ctx.resolve(path);
    let literal = value.to_sql_literal().unwrap_or_else(|| {
        tracing::warn!("Variable {} has no literal form, using its name", path);
        ArgValue::from(path).to_sql_literal().unwrap_or_default()
    });

    format!("{}{}{}", &on[..marker.start()], literal, rest)
}

/// Parse an order spec
///
/// Columns without a table get `default_table`, columns without a direction
/// are ascending. Blank segments are ignored.
pub fn parse_order_spec(
    spec: &str,
    default_table: &str,
) -> Result<Vec<OrderDescriptor>, CompileError> {
    let mut orders = Vec::new();

    for segment in spec.split(',') {
        if segment.trim().is_empty() {
            continue;
        }
        let caps = ORDER.captures(segment).ok_or_else(|| CompileError::InvalidOrder {
            spec: spec.to_string(),
            segment: segment.trim().to_string(),
        })?;

        let direction = match caps.get(3) {
            Some(d) if d.as_str().eq_ignore_ascii_case("desc") => Direction::Desc,
            _ => Direction::Asc,
        };
        orders.push(OrderDescriptor {
            table: caps
                .get(1)
                .map_or_else(|| default_table.to_string(), |t| t.as_str().to_string()),
            field: caps[2].to_string(),
            direction,
        });
    }

    Ok(orders)
}

/// Alias of a field expression such as `field: 'userName', width: 80`
///
/// Falls back to the input when no alias can be found.
pub fn find_alias(target: &str) -> String {
    match ALIAS.captures(target) {
        Some(caps) => caps[1].to_string(),
        None => {
            tracing::error!("Can't parse field expression: {}", target);
            target.to_string()
        }
    }
}

/// Turn query-form fields into where conditions
///
/// A field is named `"<column> <op>"`, e.g. `"u.userName %"`; its value
/// becomes a quoted right operand. Blank values and the "-- ALL --"
/// placeholder are skipped. Columns without a table get `default_table`.
pub fn format_conds<N, V>(default_table: &str, fields: &[(N, V)]) -> Vec<Condition>
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    let mut conds = Vec::new();

    for (name, value) in fields {
        let value = value.as_ref();
        if value.is_empty() || value == ALL_PLACEHOLDER {
            continue;
        }

        let mut parts = name.as_ref().split_whitespace();
        let (Some(col), Some(op)) = (parts.next(), parts.next()) else {
            tracing::warn!(
                "Query field name must carry a logic operator, e.g. 't.col =': {}",
                name.as_ref()
            );
            continue;
        };

        let col = if col.contains('.') || default_table.is_empty() {
            col.to_string()
        } else {
            format!("{default_table}.{col}")
        };
        conds.push(Condition::pred(op, col, format!("'{value}'")));
    }

    conds
}

/// Everything the compiler gets out of a join spec and an order spec
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub joins: Vec<JoinDescriptor>,
    pub orders: Vec<OrderDescriptor>,
    /// Join segments that were skipped
    pub diagnostics: Vec<CompileError>,
}

impl Compiled {
    /// The main table descriptor, if the join spec has one
    pub fn main_table(&self) -> Option<&JoinDescriptor> {
        self.joins.iter().find(|j| j.kind == JoinKind::Main)
    }

    /// Build a query from the compiled descriptors
    pub fn into_query(self, conn: Option<&str>) -> Result<QueryRequest, CompileError> {
        let Some(main) = self.main_table().cloned() else {
            let tables: Vec<&str> = self.joins.iter().map(|j| j.table.as_str()).collect();
            return Err(CompileError::NoMainTable(tables.join(", ")));
        };

        let mut query = QueryRequest::new(conn, &main.table, main.alias.as_deref());
        query
            .joins(self.joins.into_iter().filter(|j| j.kind != JoinKind::Main))
            .orderbys(self.orders);
        Ok(query)
    }
}

/// Compile a join spec and an order spec
///
/// Orders default to the main table's alias, or its name when it has none.
pub fn compile(
    join_spec: &str,
    order_spec: Option<&str>,
    ctx: &ResolveContext<'_>,
) -> Result<Compiled, CompileError> {
    let (joins, diagnostics) = parse_join_spec(join_spec, ctx);

    let default_table = joins
        .iter()
        .find(|j| j.kind == JoinKind::Main)
        .map(|m| m.alias.clone().unwrap_or_else(|| m.table.clone()))
        .unwrap_or_default();

    let orders = match order_spec {
        Some(spec) => parse_order_spec(spec, &default_table)?,
        None => Vec::new(),
    };

    tracing::debug!(
        "Compiled {} tables, {} orders, {} skipped",
        joins.len(),
        orders.len(),
        diagnostics.len()
    );

    Ok(Compiled {
        joins,
        orders,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::vars::ArgPool;
    use serde_json::json;

    fn empty_ctx_test<F: FnOnce(&ResolveContext<'_>)>(f: F) {
        let ambient = ArgPool::new();
        let ctx = ResolveContext::new(None, &ambient);
        f(&ctx);
    }

    #[test]
    fn test_join_spec_keeps_segment_order() {
        empty_ctx_test(|ctx| {
            let (joins, diags) = parse_join_spec(
                "b_articles, j:b_cate cateId=b_articles.cateId, l:b_author:a authorId=a.id",
                ctx,
            );
            assert!(diags.is_empty());
            assert_eq!(joins.len(), 3);

            assert_eq!(joins[0], JoinDescriptor::new(JoinKind::Main, "b_articles", None, None));
            assert_eq!(joins[1].kind, JoinKind::Inner);
            assert_eq!(joins[1].table, "b_cate");
            assert_eq!(joins[1].alias, None);
            assert_eq!(joins[1].on.as_deref(), Some("cateId=b_articles.cateId"));
            assert_eq!(joins[2].kind, JoinKind::Left);
            assert_eq!(joins[2].alias.as_deref(), Some("a"));
        });
    }

    #[test]
    fn test_main_table_alias_and_upper_case_flag() {
        empty_ctx_test(|ctx| {
            let (joins, _) = parse_join_spec("a_users : u, R:a_roles:r r.roleId = u.roleId", ctx);
            assert_eq!(joins[0].alias.as_deref(), Some("u"));
            assert_eq!(joins[1].kind, JoinKind::Right);
            assert_eq!(joins[1].on.as_deref(), Some("r.roleId = u.roleId"));
        });
    }

    #[test]
    fn test_bad_segment_is_skipped_and_reported() {
        empty_ctx_test(|ctx| {
            let (joins, diags) = parse_join_spec("t1, x:t2:a on, j:t3 t3.id = t1.id", ctx);
            assert_eq!(joins.len(), 2);
            assert_eq!(joins[1].table, "t3");
            assert_eq!(diags, vec![CompileError::InvalidJoin("x:t2:a on".to_string())]);
        });
    }

    #[test]
    fn test_join_without_on_condition_is_reported() {
        empty_ctx_test(|ctx| {
            let (joins, diags) =
                parse_join_spec("b_articles, j:b_cate, l:b_author:a authorId=a.id, R : t4", ctx);
            assert_eq!(joins.len(), 2);
            assert_eq!(joins[0].kind, JoinKind::Main);
            assert_eq!(joins[0].table, "b_articles");
            assert_eq!(joins[1].kind, JoinKind::Left);
            assert_eq!(
                diags,
                vec![
                    CompileError::InvalidJoin("j:b_cate".to_string()),
                    CompileError::InvalidJoin("R : t4".to_string()),
                ]
            );

            let query = compile("b_articles, j:b_cate", None, ctx)
                .unwrap()
                .into_query(None)
                .unwrap();
            assert_eq!(serde_json::to_value(&query).unwrap()["f"], "b_articles");
        });
    }

    #[test]
    fn test_second_main_table_is_reported() {
        empty_ctx_test(|ctx| {
            let (joins, diags) = parse_join_spec("t1:a, t2:b, j:t3 t3.id = a.id", ctx);
            assert_eq!(joins.len(), 2);
            assert_eq!(joins[0].table, "t1");
            assert_eq!(joins[1].table, "t3");
            assert_eq!(diags, vec![CompileError::ExtraMainTable("t2:b".to_string())]);
        });
    }

    #[test]
    fn test_on_condition_variable_spliced() {
        let args = ArgPool::new().with("form", ArgPool::new().with("orgId", "o-01"));
        let ambient = ArgPool::new().with("roles", vec!["r1", "r2"]);
        let ctx = ResolveContext::new(Some(&args), &ambient);

        let (joins, _) = parse_join_spec(
            "a_users:u, j:a_orgs:o o.orgId = u.orgId and o.orgId = {@ form.orgId } and 1=1, \
             l:a_roles:r r.roleId in {@roles}",
            &ctx,
        );
        assert_eq!(
            joins[1].on.as_deref(),
            Some("o.orgId = u.orgId and o.orgId = 'o-01' and 1=1")
        );
        assert_eq!(joins[2].on.as_deref(), Some("r.roleId in ('r1', 'r2')"));
    }

    #[test]
    fn test_unresolved_on_variable_becomes_literal() {
        empty_ctx_test(|ctx| {
            let (joins, _) = parse_join_spec("t1, j:t2 t2.f = {@ missing.path}", ctx);
            assert_eq!(joins[1].on.as_deref(), Some("t2.f = 'missing.path'"));
        });
    }

    #[test]
    fn test_only_first_marker_resolved() {
        let ambient = ArgPool::new().with("a", "1").with("b", "2");
        let ctx = ResolveContext::new(None, &ambient);
        let (joins, _) = parse_join_spec("t1, j:t2 x = {@a} and y = {@b}", &ctx);
        assert_eq!(joins[1].on.as_deref(), Some("x = '1' and y = {@b}"));
    }

    #[test]
    fn test_order_defaults() {
        let orders = parse_order_spec("col, col asc, col desc, t.col DESC", "m").unwrap();
        assert_eq!(orders.len(), 4);

        assert_eq!((orders[0].table.as_str(), orders[0].direction), ("m", Direction::Asc));
        assert_eq!(orders[1].direction, Direction::Asc);
        assert_eq!((orders[2].table.as_str(), orders[2].direction), ("m", Direction::Desc));
        assert_eq!((orders[3].table.as_str(), orders[3].direction), ("t", Direction::Desc));
        assert_eq!(orders[3].column(), "t.col");
    }

    #[test]
    fn test_order_bad_segment_is_error() {
        let err = parse_order_spec("a.name, (select 1) desc", "m").unwrap_err();
        assert!(matches!(err, CompileError::InvalidOrder { ref segment, .. } if segment == "(select 1) desc"));
        assert!(parse_order_spec(" , name", "m").unwrap().len() == 1);
    }

    #[test]
    fn test_find_alias() {
        assert_eq!(find_alias("field: 'userName', width: 80"), "userName");
        assert_eq!(find_alias("no alias here"), "no alias here");
    }

    #[test]
    fn test_format_conds() {
        let conds = format_conds(
            "u",
            &[
                ("userName  %", "ad"),
                ("r.roleId =", ALL_PLACEHOLDER),
                ("o.orgId =", ""),
                ("flag", "1"),
                ("r.roleId =", "admin"),
            ],
        );
        assert_eq!(
            serde_json::to_value(&conds).unwrap(),
            json!([["%", "u.userName", "'ad'"], ["=", "r.roleId", "'admin'"]])
        );
    }

    #[test]
    fn test_compile_into_query() {
        let args = ArgPool::new().with("uid", "admin");
        let ambient = ArgPool::new();
        let ctx = ResolveContext::new(Some(&args), &ambient);

        let compiled = compile(
            "a_users:u, j:a_roles:r r.roleId = u.roleId and u.userId = {@uid}, bad segment here",
            Some("userName desc, r.roleName"),
            &ctx,
        )
        .unwrap();
        assert_eq!(compiled.diagnostics.len(), 1);
        assert_eq!(compiled.orders[0].table, "u");

        let query = compiled.into_query(Some("sys")).unwrap();
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["f"], "a_users");
        assert_eq!(json["mAlias"], "u");
        assert_eq!(
            json["j"],
            json!([["j", "a_roles", "r", "r.roleId = u.roleId and u.userId = 'admin'"]])
        );
        assert_eq!(json["orders"], json!([["u.userName", "desc"], ["r.roleName", "asc"]]));
    }

    #[test]
    fn test_compile_without_main_table() {
        empty_ctx_test(|ctx| {
            let compiled = compile("j:t2 a = b", None, ctx).unwrap();
            assert!(matches!(
                compiled.into_query(None),
                Err(CompileError::NoMainTable(_))
            ));
        });
    }
}
