//! Variable references
//!
//! `{@ x.y.z}` markers in declarations name values that live either in the
//! argument pool handed to a single compile call or in the ambient bag the
//! host registers once. Resolution never fails hard: an unresolved path
//! becomes its own text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// `{@ path }`, path captured without surrounding blanks
pub(crate) static VAR_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{@\s*([^}]*?)\s*\}").expect("static regex"));

/// Zero-argument value producer
pub type ArgFn = Arc<dyn Fn() -> ArgValue + Send + Sync>;

/// A value reachable from a variable path
#[derive(Clone)]
pub enum ArgValue {
    Scalar(String),
    List(Vec<String>),
    Map(ArgPool),
    /// Evaluated when a path ends on it
    Func(ArgFn),
}

impl ArgValue {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn() -> ArgValue + Send + Sync + 'static,
    {
        ArgValue::Func(Arc::new(f))
    }

    /// SQL literal for splicing into a condition
    ///
    /// Scalars are quoted, lists become `('a', 'b')`. Maps and functions
    /// have no literal form.
    pub fn to_sql_literal(&self) -> Option<String> {
        match self {
            ArgValue::Scalar(s) => Some(format!("'{s}'")),
            ArgValue::List(items) => Some(concat_array(items)),
            ArgValue::Map(_) | ArgValue::Func(_) => None,
        }
    }

    /// JSON for a positional SQL argument
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Scalar(s) => Value::String(s.clone()),
            ArgValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            ArgValue::Map(pool) => pool.to_json(),
            ArgValue::Func(f) => f().to_json(),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ArgValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Convert from JSON; `null` has no value
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ArgValue::Scalar(s.clone())),
            Value::Bool(_) | Value::Number(_) => Some(ArgValue::Scalar(value.to_string())),
            Value::Array(items) => Some(ArgValue::List(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Value::Object(_) => ArgPool::from_json(value).map(ArgValue::Map),
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            ArgValue::List(l) => f.debug_tuple("List").field(l).finish(),
            ArgValue::Map(m) => f.debug_tuple("Map").field(m).finish(),
            ArgValue::Func(_) => write!(f, "Func(..)"),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Scalar(a), ArgValue::Scalar(b)) => a == b,
            (ArgValue::List(a), ArgValue::List(b)) => a == b,
            (ArgValue::Map(a), ArgValue::Map(b)) => a == b,
            (ArgValue::Func(a), ArgValue::Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Scalar(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Scalar(s)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Scalar(n.to_string())
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(items: Vec<String>) -> Self {
        ArgValue::List(items)
    }
}

impl From<Vec<&str>> for ArgValue {
    fn from(items: Vec<&str>) -> Self {
        ArgValue::List(items.into_iter().map(String::from).collect())
    }
}

impl From<ArgPool> for ArgValue {
    fn from(pool: ArgPool) -> Self {
        ArgValue::Map(pool)
    }
}

/// Named values for variable resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgPool {
    vars: BTreeMap<String, ArgValue>,
}

impl ArgPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Build a pool from a JSON object; anything else has no pool form
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let vars = obj
            .iter()
            .filter_map(|(k, v)| ArgValue::from_json(v).map(|v| (k.clone(), v)))
            .collect();
        Some(Self { vars })
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Where variable paths are looked up
///
/// The argument pool of the current call is searched first, the host's
/// ambient bag second.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub args: Option<&'a ArgPool>,
    pub ambient: &'a ArgPool,
}

impl<'a> ResolveContext<'a> {
    pub fn new(args: Option<&'a ArgPool>, ambient: &'a ArgPool) -> Self {
        Self { args, ambient }
    }

    /// Resolve `path` in this context
    pub fn resolve(&self, path: &str) -> ArgValue {
        resolve_variable(path, self.args, self.ambient)
    }
}

/// Resolve a dotted variable path
///
/// The head segment picks the root: the argument pool if it has that key,
/// the ambient bag otherwise. Each following segment descends one level. A
/// function at the end of the path is called and its result used. When the
/// path can't be followed the path text itself is returned.
pub fn resolve_variable(path: &str, args: Option<&ArgPool>, ambient: &ArgPool) -> ArgValue {
    let path = path.trim();
    let mut segments = path.split('.').map(str::trim);

    let head = segments.next().unwrap_or_default();
    let root = match args {
        Some(pool) if pool.contains(head) => pool,
        _ => ambient,
    };

    let mut current = match root.get(head) {
        Some(v) => v.clone(),
        None => return unresolved(path),
    };

    for seg in segments {
        let next = match &current {
            ArgValue::Map(pool) => pool.get(seg).cloned(),
            ArgValue::Func(f) => match f() {
                ArgValue::Map(pool) => pool.get(seg).cloned(),
                _ => None,
            },
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return unresolved(path),
        }
    }

    if let ArgValue::Func(f) = current {
        current = f();
    }
    current
}

fn unresolved(path: &str) -> ArgValue {
    tracing::warn!("Can't find variable for {}", path);
    ArgValue::Scalar(path.to_string())
}

/// Render values as a quoted, comma separated, parenthesized list
pub fn concat_array<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s.as_ref())).collect();
    format!("({})", quoted.join(", "))
}

/// Semantic key with resolved positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticKey {
    pub key: String,
    pub args: Vec<ArgValue>,
}

impl SemanticKey {
    /// Positional arguments as JSON
    pub fn args_json(&self) -> Vec<Value> {
        self.args.iter().map(ArgValue::to_json).collect()
    }
}

/// Parse `"sql-key, arg1, {@obj.var1}, arg2"`
///
/// The first segment is the dataset key (a legacy `cbb.` prefix is
/// dropped). Segments carrying a `{@ path}` marker are resolved, the rest
/// pass through as literal text. Returns `None` for a blank string.
pub fn parse_sk_args(sk: &str, ctx: &ResolveContext<'_>) -> Option<SemanticKey> {
    let sk = sk.trim();
    if sk.is_empty() {
        return None;
    }

    let mut segments = sk.split(',');
    let mut key = segments.next().unwrap_or_default().trim().to_string();
    if let Some(stripped) = key.strip_prefix("cbb.") {
        tracing::warn!("sk's table name (cbb) ignored: {}", key);
        key = stripped.to_string();
    }

    let args = segments
        .map(|seg| match VAR_MARKER.captures(seg) {
            Some(caps) => ctx.resolve(&caps[1]),
            None => ArgValue::Scalar(seg.trim().to_string()),
        })
        .collect();

    Some(SemanticKey { key, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> ArgPool {
        ArgPool::new().with("a", ArgPool::new().with("b", ArgPool::new().with("c", "x")))
    }

    #[test]
    fn test_resolve_nested_path() {
        let ambient = ArgPool::new();
        let v = resolve_variable("a.b.c", Some(&nested()), &ambient);
        assert_eq!(v, ArgValue::Scalar("x".to_string()));
    }

    #[test]
    fn test_unresolved_path_falls_back_to_text() {
        let ambient = ArgPool::new();
        let v = resolve_variable("missing.path", Some(&ArgPool::new()), &ambient);
        assert_eq!(v, ArgValue::Scalar("missing.path".to_string()));

        let v = resolve_variable("a.b.nope", Some(&nested()), &ambient);
        assert_eq!(v, ArgValue::Scalar("a.b.nope".to_string()));
    }

    #[test]
    fn test_args_before_ambient() {
        let args = ArgPool::new().with("user", ArgPool::new().with("id", "from-args"));
        let ambient = ArgPool::new()
            .with("user", ArgPool::new().with("id", "from-ambient"))
            .with("org", ArgPool::new().with("id", "o-1"));

        assert_eq!(
            resolve_variable("user.id", Some(&args), &ambient).as_scalar(),
            Some("from-args")
        );
        assert_eq!(
            resolve_variable("org.id", Some(&args), &ambient).as_scalar(),
            Some("o-1")
        );
        assert_eq!(
            resolve_variable("user.id", None, &ambient).as_scalar(),
            Some("from-ambient")
        );
    }

    #[test]
    fn test_function_at_end_is_called() {
        let form = ArgPool::new().with("selected", ArgValue::func(|| ArgValue::from("r-02")));
        let ambient = ArgPool::new().with("form", form);

        let v = resolve_variable("form.selected", None, &ambient);
        assert_eq!(v.as_scalar(), Some("r-02"));
    }

    #[test]
    fn test_dotless_name() {
        let ambient = ArgPool::new().with("flag", "1");
        assert_eq!(resolve_variable(" flag ", None, &ambient).as_scalar(), Some("1"));
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(ArgValue::from("v").to_sql_literal().unwrap(), "'v'");
        assert_eq!(
            ArgValue::from(vec!["a", "b"]).to_sql_literal().unwrap(),
            "('a', 'b')"
        );
        assert!(ArgValue::Map(ArgPool::new()).to_sql_literal().is_none());
        assert_eq!(concat_array::<&str>(&[]), "()");
    }

    #[test]
    fn test_parse_sk_args() {
        let args = ArgPool::new().with("obj", ArgPool::new().with("var1", "v1"));
        let ambient = ArgPool::new();
        let ctx = ResolveContext::new(Some(&args), &ambient);

        let sk = parse_sk_args("roles.ez, lit, {@ obj.var1 }, {@nowhere.x}", &ctx).unwrap();
        assert_eq!(sk.key, "roles.ez");
        assert_eq!(
            sk.args,
            vec![
                ArgValue::from("lit"),
                ArgValue::from("v1"),
                ArgValue::from("nowhere.x"),
            ]
        );
    }

    #[test]
    fn test_parse_sk_strips_cbb_prefix() {
        let ambient = ArgPool::new();
        let ctx = ResolveContext::new(None, &ambient);
        let sk = parse_sk_args("cbb.org-list", &ctx).unwrap();
        assert_eq!(sk.key, "org-list");
        assert!(sk.args.is_empty());
        assert!(parse_sk_args("  ", &ctx).is_none());
    }

    #[test]
    fn test_pool_from_json() {
        let pool = ArgPool::from_json(&serde_json::json!({
            "u": {"id": "admin", "roles": ["r1", "r2"]},
            "n": 3,
            "gone": null
        }))
        .unwrap();

        let ambient = ArgPool::new();
        assert_eq!(
            resolve_variable("u.roles", Some(&pool), &ambient),
            ArgValue::from(vec!["r1", "r2"])
        );
        assert_eq!(resolve_variable("n", Some(&pool), &ambient).as_scalar(), Some("3"));
        assert!(!pool.contains("gone"));
    }
}
