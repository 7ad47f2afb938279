//! Grid binder
//!
//! Binds grids and pagers to server data: options are compiled into a
//! query (or a dataset request when a semantic key is given), posted through
//! the session client, and the outcome is handed to the [`UiSink`]. Failures
//! go through the [`Messenger`] so each result code alerts once per
//! operation.
//!
//! A pager's request is compiled once at bind time; selecting a page re-sends
//! it with the new page index and size. Paging state changes only when a
//! response arrives.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::compiler::{compile, parse_sk_args, ArgPool, ResolveContext};
use crate::error::{ClientError, ServError};
use crate::events::UiSink;
use crate::handlers::HandlerRegistry;
use crate::messenger::Messenger;
use crate::options::BindOptions;
use crate::paging::{PagerRegistry, PagingState};
use crate::protocol::JMessage;
use crate::request::{Condition, DatasetRequest, QueryBuilder, QueryRequest};
use crate::session::SessionClient;

/// A compiled request that can be paged
#[derive(Debug, Clone, PartialEq)]
pub enum PagedRequest {
    Query(QueryRequest),
    Dataset(DatasetRequest),
}

impl PagedRequest {
    fn page(&mut self, size: i64, index: i64) {
        match self {
            PagedRequest::Query(q) => {
                q.page(size, index);
            }
            PagedRequest::Dataset(d) => {
                d.page(size, index);
            }
        }
    }

    fn message(self, session: &SessionClient) -> JMessage {
        match self {
            PagedRequest::Query(q) => session.query(q),
            PagedRequest::Dataset(d) => session.dataset(d),
        }
    }
}

#[derive(Debug, Clone)]
struct BoundPager {
    target: String,
    opts: BindOptions,
    request: PagedRequest,
}

/// Loads grids and pagers for a logged-in session
pub struct GridBinder {
    session: SessionClient,
    sink: Arc<dyn UiSink>,
    handlers: HandlerRegistry,
    ambient: ArgPool,
    messenger: Arc<Mutex<Messenger>>,
    pagers: Arc<Mutex<PagerRegistry>>,
    bound: Arc<Mutex<HashMap<String, BoundPager>>>,
}

impl GridBinder {
    pub fn new(session: SessionClient, sink: Arc<dyn UiSink>) -> Self {
        Self {
            session,
            sink,
            handlers: HandlerRegistry::new(),
            ambient: ArgPool::new(),
            messenger: Arc::new(Mutex::new(Messenger::new())),
            pagers: Arc::new(Mutex::new(PagerRegistry::new())),
            bound: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Callbacks the options may refer to
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Variables visible to every binding
    pub fn with_ambient(mut self, ambient: ArgPool) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn messenger(&self) -> Arc<Mutex<Messenger>> {
        self.messenger.clone()
    }

    /// Start of a new user operation: errors may alert again
    pub async fn begin(&self) {
        self.messenger.lock().await.init(None);
    }

    pub async fn paging_state(&self, pager_id: &str) -> Option<PagingState> {
        self.pagers.lock().await.get(pager_id).cloned()
    }

    /// Compile options and where conditions into a request
    ///
    /// A semantic key wins over a join spec.
    pub fn build_request(
        &self,
        opts: &BindOptions,
        conds: Vec<Condition>,
    ) -> Result<PagedRequest, ClientError> {
        let conn = self.session.client().config().conn_id.as_deref();
        let args = opts.arg_pool();
        let ctx = ResolveContext::new(args.as_ref(), &self.ambient);

        if let Some(sk) = opts.sk.as_deref().and_then(|sk| parse_sk_args(sk, &ctx)) {
            let mut req = DatasetRequest::from_semantic_key(conn, &sk);
            req.args(opts.sql_args.iter().cloned().map(Value::String))
                .exprs(&opts.exprs)
                .where_conds(conds);
            return Ok(PagedRequest::Dataset(req));
        }

        let t = opts
            .t
            .as_deref()
            .ok_or_else(|| ClientError::InvalidOptions("no join spec (t) to query".to_string()))?;
        let compiled = compile(t, opts.order.as_deref(), &ctx)?;
        for diag in &compiled.diagnostics {
            tracing::warn!("Skipped while binding: {}", diag);
        }

        let mut query = compiled.into_query(conn)?;
        query.exprs(&opts.exprs).where_conds(conds);
        Ok(PagedRequest::Query(query))
    }

    /// Bind a pager to `target` and load its first page
    pub async fn bind_pager(
        &self,
        pager_id: &str,
        target: &str,
        opts: BindOptions,
        conds: Vec<Condition>,
    ) -> Result<PagingState, ServError> {
        let st = self.register_pager(pager_id, target, opts, conds).await?;
        self.load_page(pager_id, st.page, st.size).await
    }

    /// Bind a pager to `target` without loading anything
    ///
    /// The request is compiled now; the first [`GridBinder::select_page`]
    /// sends it.
    pub async fn register_pager(
        &self,
        pager_id: &str,
        target: &str,
        opts: BindOptions,
        conds: Vec<Condition>,
    ) -> Result<PagingState, ServError> {
        opts.validate(&self.handlers)?;
        let request = self.build_request(&opts, conds)?;

        let st = self
            .pagers
            .lock()
            .await
            .bind(pager_id, opts.query.clone(), opts.page_size())
            .clone();

        self.bound.lock().await.insert(
            pager_id.to_string(),
            BoundPager {
                target: target.to_string(),
                opts,
                request,
            },
        );
        Ok(st)
    }

    /// Load another page of a bound pager
    pub async fn select_page(
        &self,
        pager_id: &str,
        page: i64,
        size: i64,
    ) -> Result<PagingState, ServError> {
        self.load_page(pager_id, page, size).await
    }

    /// Load `target` without paging
    pub async fn load_grid(
        &self,
        target: &str,
        opts: BindOptions,
        conds: Vec<Condition>,
    ) -> Result<Vec<Map<String, Value>>, ServError> {
        opts.validate(&self.handlers)?;
        let request = self.build_request(&opts, conds)?;
        let (rows, _total) = self.load(target, &opts, request).await?;
        Ok(rows)
    }

    async fn load_page(
        &self,
        pager_id: &str,
        page: i64,
        size: i64,
    ) -> Result<PagingState, ServError> {
        let bound = self
            .bound
            .lock()
            .await
            .get(pager_id)
            .cloned()
            .ok_or_else(|| ClientError::PagerNotBound(pager_id.to_string()))?;

        let mut request = bound.request;
        request.page(size, page);

        let (_rows, total) = self.load(&bound.target, &bound.opts, request).await?;

        let state = self
            .pagers
            .lock()
            .await
            .apply_response(pager_id, page, size, total)?;
        notify(
            self.sink
                .refresh_pager(pager_id, state.total, state.page, state.size)
                .await,
        );
        Ok(state)
    }

    /// Post a request and show its rows
    async fn load(
        &self,
        target: &str,
        opts: &BindOptions,
        request: PagedRequest,
    ) -> Result<(Vec<Map<String, Value>>, i64), ServError> {
        let msg = request.message(&self.session);

        let shown = self.messenger.lock().await.progress();
        if shown {
            notify(self.sink.show_progress().await);
        }

        let result = self.session.post(&msg).await;

        if shown {
            self.messenger.lock().await.close();
            notify(self.sink.close_progress().await);
        }

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                self.report(&e).await;
                return Err(e);
            }
        };

        let rows = resp.rows(0);
        let total = resp.total(0, 0);
        notify(self.sink.bind_rows(target, &rows, total).await);

        if let (Some(pk), Some(select)) = (opts.rowpk.as_deref(), opts.select.as_deref()) {
            let hit = rows
                .iter()
                .position(|r| r.get(pk).map_or(false, |v| value_eq(v, select)));
            match hit {
                Some(ix) => notify(self.sink.select_row(target, ix).await),
                None => tracing::debug!("Row {}={} not on this page of {}", pk, select, target),
            }
        }

        if let Some(onload) = opts.onload.as_deref() {
            if let Err(e) = self
                .handlers
                .call(onload, &json!({"rows": rows, "total": total}))
            {
                tracing::error!("onload of {}: {}", target, e);
            }
        }

        Ok((rows, total))
    }

    async fn report(&self, err: &ServError) {
        let alert = self.messenger.lock().await.report_error(err);
        if let Some(text) = alert {
            notify(self.sink.alert(err.code, &text).await);
        }
    }
}

fn value_eq(v: &Value, s: &str) -> bool {
    match v {
        Value::String(v) => v == s,
        other => other.to_string() == s,
    }
}

fn notify(r: Result<(), String>) {
    if let Err(e) = r {
        tracing::warn!("UI sink failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::events::recording::{RecordingSink, UiCall};
    use crate::messenger::NETWORK_PROBLEM;
    use crate::protocol::MsgCode;
    use crate::session::Client;
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::TransportError;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn rows_resp(total: i64) -> Value {
        json!({
            "code": "ok",
            "port": "query",
            "msg": {"rs": [[["userId", "userName"], ["u1", "Alice"], ["u2", "Bob"]]], "total": [total]}
        })
    }

    async fn binder() -> (GridBinder, Arc<ScriptedTransport>, Arc<RecordingSink>) {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(json!({"code": "ok", "msg": {"ssid": "ss", "uid": "admin"}}));
        let client = Client::with_transport(ClientConfig::new().with_conn_id("sys"), transport.clone());
        let session = client.login("admin", "pw").await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        (GridBinder::new(session, sink.clone()), transport, sink)
    }

    fn users_opts() -> BindOptions {
        BindOptions::new()
            .with_t("a_users:u, j:a_roles:r r.roleId = u.roleId")
            .with_order("userName")
            .with_pagesize(20)
    }

    #[tokio::test]
    async fn test_page_select_reissues_request() {
        let (binder, transport, sink) = binder().await;

        transport.respond(rows_resp(45));
        let st = binder
            .bind_pager("irpager", "irlist", users_opts(), Vec::new())
            .await
            .unwrap();
        assert_eq!((st.page, st.size, st.total), (0, 20, 45));

        let first = transport.last_payload().unwrap();
        assert_eq!(first["body"][0]["page"], 0);
        assert_eq!(first["body"][0]["pgSize"], 20);

        transport.respond(rows_resp(45));
        let st = binder.select_page("irpager", 2, 20).await.unwrap();
        assert_eq!(st.page, 2);

        let (url, second) = transport.requests().pop().unwrap();
        assert!(url.ends_with("/r.serv?conn=sys"));
        assert_eq!(second["body"][0]["page"], 2);
        assert_eq!(second["body"][0]["pgSize"], 20);
        assert_eq!(second["body"][0]["j"], first["body"][0]["j"]);
        assert_eq!(second["header"]["ssid"], "ss");

        assert!(sink.calls().contains(&UiCall::Rows("irlist".to_string(), 2, 45)));
        assert_eq!(
            sink.calls().last(),
            Some(&UiCall::Pager("irpager".to_string(), 45, 2, 20))
        );
    }

    #[tokio::test]
    async fn test_registered_pager_loads_on_select() {
        let (binder, transport, sink) = binder().await;
        let sent = transport.requests().len();

        let st = binder
            .register_pager("irpager", "irlist", users_opts(), Vec::new())
            .await
            .unwrap();
        assert_eq!((st.page, st.size, st.total), (0, 20, 0));
        assert_eq!(transport.requests().len(), sent);
        assert!(sink.calls().is_empty());

        transport.respond(rows_resp(45));
        let st = binder.select_page("irpager", 2, 20).await.unwrap();
        assert_eq!((st.page, st.total), (2, 45));
        assert_eq!(transport.requests().len(), sent + 1);
        assert_eq!(transport.last_payload().unwrap()["body"][0]["page"], 2);

        let rows: Vec<_> = sink
            .calls()
            .into_iter()
            .filter(|c| matches!(c, UiCall::Rows(..)))
            .collect();
        assert_eq!(rows, vec![UiCall::Rows("irlist".to_string(), 2, 45)]);
    }

    #[tokio::test]
    async fn test_page_not_moved_before_response() {
        let (binder, transport, sink) = binder().await;

        transport.respond(rows_resp(45));
        binder
            .bind_pager("irpager", "irlist", users_opts(), Vec::new())
            .await
            .unwrap();

        transport.fail(TransportError::Http("connection reset".to_string()));
        let err = binder.select_page("irpager", 2, 20).await.unwrap_err();
        assert_eq!(err.code, MsgCode::ExIo);

        let st = binder.paging_state("irpager").await.unwrap();
        assert_eq!((st.page, st.total), (0, 45));
        assert!(sink
            .calls()
            .contains(&UiCall::Alert(MsgCode::ExIo, NETWORK_PROBLEM.to_string())));
    }

    #[tokio::test]
    async fn test_errors_alert_once_per_operation() {
        let (binder, transport, sink) = binder().await;
        let alerts = |sink: &RecordingSink| {
            sink.calls()
                .iter()
                .filter(|c| matches!(c, UiCall::Alert(..)))
                .count()
        };

        transport
            .fail(TransportError::Status(502))
            .fail(TransportError::Status(502));
        assert!(binder.load_grid("g1", users_opts(), Vec::new()).await.is_err());
        assert!(binder.load_grid("g2", users_opts(), Vec::new()).await.is_err());
        assert_eq!(alerts(sink.as_ref()), 1);

        binder.begin().await;
        transport.fail(TransportError::Status(502));
        assert!(binder.load_grid("g1", users_opts(), Vec::new()).await.is_err());
        assert_eq!(alerts(sink.as_ref()), 2);
    }

    #[tokio::test]
    async fn test_semantic_key_builds_dataset_request() {
        let (binder, transport, _sink) = binder().await;
        let binder = binder.with_ambient(ArgPool::new().with("org", "o-01"));

        let opts = BindOptions {
            sql_args: vec!["lit".to_string()],
            ..BindOptions::new()
                .with_sk("cbb.roles.ez, {@ form.flag}, {@org}")
                .with_args(json!({"form": {"flag": "1"}}))
        };
        transport.respond(rows_resp(2));
        let rows = binder.load_grid("cbb", opts, Vec::new()).await.unwrap();
        assert_eq!(rows.len(), 2);

        let (url, payload) = transport.requests().pop().unwrap();
        assert!(url.contains("/ds.serv"));
        let body = &payload["body"][0];
        assert_eq!(body["a"], "sqltree");
        assert_eq!(body["sk"], "roles.ez");
        assert_eq!(body["sqlArgs"], json!(["1", "o-01", "lit"]));
        assert_eq!(body["page"], -1);
    }

    #[tokio::test]
    async fn test_where_conditions_and_onload() {
        let (binder, transport, sink) = binder().await;

        let loaded = Arc::new(AtomicI64::new(-1));
        let l = loaded.clone();
        let mut handlers = HandlerRegistry::new();
        handlers.register("usersLoaded", move |v| {
            l.store(v["total"].as_i64().unwrap_or(0), Ordering::SeqCst);
        });
        let binder = binder.with_handlers(handlers);

        let opts = BindOptions {
            rowpk: Some("userId".to_string()),
            select: Some("u2".to_string()),
            ..users_opts().with_onload("usersLoaded")
        };
        let conds = crate::compiler::format_conds("u", &[("userName %", "Al")]);

        transport.respond(rows_resp(2));
        binder.load_grid("irlist", opts, conds).await.unwrap();

        let body = transport.last_payload().unwrap()["body"][0].clone();
        assert_eq!(body["conds"], json!([["%", "u.userName", "'Al'"]]));
        assert_eq!(body["orders"], json!([["u.userName", "asc"]]));
        assert_eq!(loaded.load(Ordering::SeqCst), 2);
        assert!(sink.calls().contains(&UiCall::Select("irlist".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_invalid_options_send_nothing() {
        let (binder, transport, _sink) = binder().await;
        let sent = transport.requests().len();

        let err = binder
            .bind_pager("p", "g", users_opts().with_onload("missing"), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, MsgCode::ExGeneral);

        let err = binder.select_page("never-bound", 1, 20).await.unwrap_err();
        assert!(err.message.contains("never-bound"));
        assert_eq!(transport.requests().len(), sent);
    }
}
