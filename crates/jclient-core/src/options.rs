//! Bind options
//!
//! Every option a grid, list or pager binding understands. Values given in
//! code win over the ones declared on the widget; [`BindOptions::merge`]
//! fills in the gaps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compiler::ArgPool;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{ClientError, Result};
use crate::handlers::HandlerRegistry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindOptions {
    /// Join spec, e.g. `"a_users:u, j:a_roles:r r.roleId = u.roleId"`
    pub t: Option<String>,

    /// Semantic key with arguments, e.g. `"roles.ez, {@ form.orgId}"`
    pub sk: Option<String>,

    /// Query form id
    pub query: Option<String>,

    /// Variables for `{@ path}` markers, searched before the ambient bag
    pub args: Option<Value>,

    /// Positional arguments sent as they are
    pub sql_args: Vec<String>,

    /// Order spec, e.g. `"userName desc"`
    pub order: Option<String>,

    /// `[expr, alias]` columns to select
    pub exprs: Vec<(String, Option<String>)>,

    pub pagesize: Option<i64>,

    /// Column identifying a row
    pub rowpk: Option<String>,

    /// Row to select after loading, by its `rowpk` value
    pub select: Option<String>,

    pub onclick: Option<String>,
    pub onchange: Option<String>,
    pub onload: Option<String>,
    pub oncheck: Option<String>,
    pub oncheck_all: Option<String>,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_t(mut self, t: impl Into<String>) -> Self {
        self.t = Some(t.into());
        self
    }

    pub fn with_sk(mut self, sk: impl Into<String>) -> Self {
        self.sk = Some(sk.into());
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_pagesize(mut self, size: i64) -> Self {
        self.pagesize = Some(size);
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_onload(mut self, id: impl Into<String>) -> Self {
        self.onload = Some(id.into());
        self
    }

    /// Fill unset options from `fallback`
    pub fn merge(self, fallback: &BindOptions) -> BindOptions {
        fn or_vec<T: Clone>(v: Vec<T>, fallback: &[T]) -> Vec<T> {
            if v.is_empty() {
                fallback.to_vec()
            } else {
                v
            }
        }

        BindOptions {
            t: self.t.or_else(|| fallback.t.clone()),
            sk: self.sk.or_else(|| fallback.sk.clone()),
            query: self.query.or_else(|| fallback.query.clone()),
            args: self.args.or_else(|| fallback.args.clone()),
            sql_args: or_vec(self.sql_args, &fallback.sql_args),
            order: self.order.or_else(|| fallback.order.clone()),
            exprs: or_vec(self.exprs, &fallback.exprs),
            pagesize: self.pagesize.or(fallback.pagesize),
            rowpk: self.rowpk.or_else(|| fallback.rowpk.clone()),
            select: self.select.or_else(|| fallback.select.clone()),
            onclick: self.onclick.or_else(|| fallback.onclick.clone()),
            onchange: self.onchange.or_else(|| fallback.onchange.clone()),
            onload: self.onload.or_else(|| fallback.onload.clone()),
            oncheck: self.oncheck.or_else(|| fallback.oncheck.clone()),
            oncheck_all: self.oncheck_all.or_else(|| fallback.oncheck_all.clone()),
        }
    }

    /// `(hook, handler id)` of every callback option set
    pub fn hooks(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("onclick", &self.onclick),
            ("onchange", &self.onchange),
            ("onload", &self.onload),
            ("oncheck", &self.oncheck),
            ("oncheckAll", &self.oncheck_all),
        ]
        .into_iter()
        .filter_map(|(hook, id)| id.as_deref().map(|id| (hook, id)))
    }

    /// Check the options can drive a binding
    ///
    /// Needs a join spec or a semantic key, a positive page size if any, and
    /// every callback id registered.
    pub fn validate(&self, handlers: &HandlerRegistry) -> Result<()> {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.t) && blank(&self.sk) {
            return Err(ClientError::InvalidOptions(
                "either a join spec (t) or a semantic key (sk) is needed".to_string(),
            ));
        }

        if let Some(size) = self.pagesize {
            if size <= 0 {
                return Err(ClientError::InvalidOptions(format!(
                    "page size must be positive: {size}"
                )));
            }
        }

        if self.select.is_some() && self.rowpk.is_none() {
            tracing::warn!("select is ignored without rowpk");
        }

        for (hook, id) in self.hooks() {
            if !handlers.contains(id) {
                tracing::error!("{} handler {} isn't registered", hook, id);
                return Err(ClientError::UnregisteredHandler(id.to_string()));
            }
        }
        Ok(())
    }

    /// Page size to bind a pager with
    pub fn page_size(&self) -> i64 {
        self.pagesize.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// `args` as a variable pool; non-object args are ignored
    pub fn arg_pool(&self) -> Option<ArgPool> {
        let args = self.args.as_ref()?;
        let pool = ArgPool::from_json(args);
        if pool.is_none() {
            tracing::warn!("args must be an object, ignored: {}", args);
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_explicit_wins() {
        let declared = BindOptions {
            t: Some("a_users:u".to_string()),
            order: Some("userName".to_string()),
            pagesize: Some(50),
            onload: Some("declaredLoad".to_string()),
            sql_args: vec!["x".to_string()],
            ..Default::default()
        };
        let explicit = BindOptions::new().with_pagesize(20).with_onload("codeLoad");

        let opts = explicit.merge(&declared);
        assert_eq!(opts.t.as_deref(), Some("a_users:u"));
        assert_eq!(opts.order.as_deref(), Some("userName"));
        assert_eq!(opts.pagesize, Some(20));
        assert_eq!(opts.onload.as_deref(), Some("codeLoad"));
        assert_eq!(opts.sql_args, vec!["x"]);
    }

    #[test]
    fn test_validate() {
        let mut handlers = HandlerRegistry::new();
        handlers.register("loaded", |_| {});

        assert!(matches!(
            BindOptions::new().validate(&handlers),
            Err(ClientError::InvalidOptions(_))
        ));
        assert!(BindOptions::new().with_sk("roles.ez").validate(&handlers).is_ok());
        assert!(BindOptions::new()
            .with_t("t")
            .with_pagesize(0)
            .validate(&handlers)
            .is_err());

        let opts = BindOptions::new().with_t("t").with_onload("loaded");
        assert!(opts.validate(&handlers).is_ok());

        let opts = BindOptions {
            oncheck_all: Some("nowhere".to_string()),
            ..opts
        };
        assert!(matches!(
            opts.validate(&handlers),
            Err(ClientError::UnregisteredHandler(ref id)) if id == "nowhere"
        ));
    }

    #[test]
    fn test_deserialize_declared_options() {
        let opts: BindOptions = serde_json::from_value(json!({
            "t": "a_users:u",
            "pagesize": 10,
            "sqlArgs": ["a"],
            "oncheckAll": "checkAll",
            "args": {"form": {"orgId": "o1"}}
        }))
        .unwrap();

        assert_eq!(opts.page_size(), 10);
        assert_eq!(opts.sql_args, vec!["a"]);
        assert_eq!(opts.hooks().collect::<Vec<_>>(), vec![("oncheckAll", "checkAll")]);
        assert!(opts.arg_pool().unwrap().contains("form"));
        assert_eq!(BindOptions::new().page_size(), 20);
    }
}
