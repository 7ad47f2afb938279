//! Session protocol client
//!
//! [`Client`] logs in and posts envelopes; [`SessionClient`] is what a
//! successful login hands back, wrapping every request in a header built from
//! the session info the server returned.
//!
//! ```text
//! Unauthenticated --login()--> LoggingIn --ok--> Authenticated
//!        ^                         |
//!        +-------- failure --------+
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::crypto::CredentialToken;
use crate::error::{ClientError, ServError};
use crate::protocol::{AnsonResp, Crud, Header, JMessage, Port, SessionInfo, UserAct};
use crate::request::{
    DatasetAction, DatasetRequest, PkSpec, QueryRequest, RequestBody, SessionRequest,
    UpdateRequest,
};
use crate::transport::{HttpTransport, Transport};

/// Login state of a [`Client`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    LoggingIn,
    Authenticated(SessionInfo),
}

/// Success callback of [`Client::commit`]
pub type OnOk = Box<dyn FnOnce(AnsonResp) + Send>;

/// Error callback of [`Client::commit`]
pub type OnErr = Box<dyn FnOnce(ServError) + Send>;

/// Completion callbacks of a dispatch; either may be missing
#[derive(Default)]
pub struct Handlers {
    pub on_ok: Option<OnOk>,
    pub on_err: Option<OnErr>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ok<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AnsonResp) + Send + 'static,
    {
        self.on_ok = Some(Box::new(f));
        self
    }

    pub fn on_err<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ServError) + Send + 'static,
    {
        self.on_err = Some(Box::new(f));
        self
    }
}

/// Client of the semantic services
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<SessionState>>,
}

impl Client {
    /// Client posting over HTTP
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.timeout_ms)
            .map_err(|e| ClientError::ConfigError(e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            state: Arc::new(Mutex::new(SessionState::Unauthenticated)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Log in with a freshly encrypted credential
    ///
    /// The client is `Authenticated` only after the server answered `ok`
    /// with session info; on any failure it goes back to `Unauthenticated`.
    pub async fn login(&self, uid: &str, pswd: &str) -> Result<SessionClient, ServError> {
        *self.state.lock().await = SessionState::LoggingIn;

        match self.try_login(uid, pswd).await {
            Ok(info) => {
                tracing::info!("Logged in as {} (ssid {})", info.uid, info.ssid);
                *self.state.lock().await = SessionState::Authenticated(info.clone());
                Ok(SessionClient {
                    client: self.clone(),
                    info,
                    usr_act: None,
                })
            }
            Err(e) => {
                tracing::warn!("Login failed for {}: {}", uid, e);
                *self.state.lock().await = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }

    async fn try_login(&self, uid: &str, pswd: &str) -> Result<SessionInfo, ServError> {
        let credential = CredentialToken::new(uid, pswd)?;
        let msg = JMessage::new(Port::Session, None, SessionRequest::login(credential));

        let resp = self.post(&msg).await?;
        serde_json::from_value::<SessionInfo>(resp.msg.clone()).map_err(|e| ServError {
            code: resp.code,
            message: format!("Invalid session info: {e}"),
            response: Some(resp),
        })
    }

    /// Post an envelope and classify the response
    ///
    /// Anything that keeps a response from arriving (network failure, empty
    /// or unparsable body) becomes `exIo`. Result codes other than `ok` are
    /// returned with the raw response.
    pub async fn post(&self, msg: &JMessage) -> Result<AnsonResp, ServError> {
        let payload = msg.to_json()?;
        let url = self.config.serv_url(msg.port);

        if self.config.verbose {
            tracing::info!("POST {} {}", url, payload);
        }

        let value = self.transport.post(&url, &payload).await?;

        if self.config.verbose {
            tracing::info!("Response from {}: {}", msg.port, value);
        }

        if !value.is_object() {
            return Err(ServError::io(format!(
                "Unexpected response from {}: not a JSON object",
                msg.port
            )));
        }
        let resp: AnsonResp = serde_json::from_value(value)
            .map_err(|e| ServError::io(format!("Unexpected response from {}: {e}", msg.port)))?;

        if resp.code.is_ok() {
            Ok(resp)
        } else {
            Err(ServError::from_response(resp))
        }
    }

    /// Post an envelope and hand the outcome to the callbacks
    ///
    /// Nothing is returned; a missing callback means the outcome is logged.
    pub async fn commit(&self, msg: &JMessage, handlers: Handlers) {
        if handlers.on_ok.is_none() && handlers.on_err.is_none() {
            tracing::warn!("Request to {} committed without any callback", msg.port);
        }

        match self.post(msg).await {
            Ok(resp) => match handlers.on_ok {
                Some(f) => f(resp),
                None => tracing::info!("Unhandled response from {}: {:?}", msg.port, resp),
            },
            Err(e) => match handlers.on_err {
                Some(f) => f(e),
                None => tracing::error!("Unhandled error from {}: {}", msg.port, e),
            },
        }
    }
}

/// Logged-in client
///
/// Builds envelopes whose header carries the session id, the user id and
/// the current user action.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    info: SessionInfo,
    usr_act: Option<UserAct>,
}

impl SessionClient {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Set the user action recorded with following requests
    pub fn user_act(&mut self, act: UserAct) -> &mut Self {
        self.usr_act = Some(act);
        self
    }

    /// Replace only the command of the user action
    pub fn usr_cmd(&mut self, cmd: impl Into<String>) -> &mut Self {
        let cmd = cmd.into();
        match self.usr_act {
            Some(ref mut act) => act.cmd = cmd,
            None => self.usr_act = Some(UserAct::new("", "", cmd, "")),
        }
        self
    }

    /// Header of the next request
    pub fn header(&self) -> Header {
        let mut header = Header::from_session(&self.info);
        if let Some(ref act) = self.usr_act {
            header.user_act(act.clone());
        }
        header
    }

    /// Envelope for `port` around `body`
    pub fn message(&self, port: Port, body: impl Into<RequestBody>) -> JMessage {
        JMessage::new(port, Some(self.header()), body)
    }

    pub fn query(&self, req: QueryRequest) -> JMessage {
        self.message(Port::Query, req)
    }

    /// Update, insert or delete, on the port matching the request's action
    pub fn update(&self, req: UpdateRequest) -> JMessage {
        let port = match req.a {
            Crud::Insert => Port::Insert,
            Crud::Delete => Port::Delete,
            Crud::Update | Crud::Read => Port::Update,
        };
        self.message(port, req)
    }

    pub fn insert(&self, conn: Option<&str>, mtabl: &str, nvs: &[(&str, &str)]) -> JMessage {
        let mut req = UpdateRequest::insert(conn, mtabl);
        req.nvs(nvs);
        self.message(Port::Insert, req)
    }

    pub fn delete(&self, conn: Option<&str>, mtabl: &str, pk: PkSpec) -> JMessage {
        self.message(Port::Delete, UpdateRequest::delete(conn, mtabl, Some(pk)))
    }

    /// Dataset request; `sqltree` goes to `dataset`, tree maintenance to `stree`
    pub fn dataset(&self, req: DatasetRequest) -> JMessage {
        let port = match req.a {
            DatasetAction::SqlTree => Port::Dataset,
            _ => Port::Stree,
        };
        self.message(port, req)
    }

    /// Rebuild tree relationships of `mtabl` below `root_id`
    pub fn retree(
        &self,
        conn: Option<&str>,
        mtabl: &str,
        tree_semantics: Value,
        root_id: &str,
    ) -> JMessage {
        let mut req = DatasetRequest::new(conn, mtabl, None, DatasetAction::ReTree);
        req.tree_semantics(tree_semantics).root_id(root_id);
        self.message(Port::Stree, req)
    }

    /// Rebuild every tree of `mtabl`
    pub fn reforest(&self, conn: Option<&str>, mtabl: &str, tree_semantics: Value) -> JMessage {
        let mut req = DatasetRequest::new(conn, mtabl, None, DatasetAction::ReForest);
        req.tree_semantics(tree_semantics);
        self.message(Port::Stree, req)
    }

    /// Whether the client still holds this session
    ///
    /// False after `logout`, or once another login replaced the session.
    pub async fn is_current(&self) -> bool {
        matches!(
            &*self.client.state.lock().await,
            SessionState::Authenticated(info) if info.ssid == self.info.ssid
        )
    }

    async fn ensure_current(&self) -> Result<(), ServError> {
        if self.is_current().await {
            Ok(())
        } else {
            tracing::warn!("Session {} is no longer logged in", self.info.ssid);
            Err(ClientError::NotAuthenticated.into())
        }
    }

    /// Post an envelope of this session
    ///
    /// Fails with `NotAuthenticated` without sending anything once the
    /// session ended.
    pub async fn post(&self, msg: &JMessage) -> Result<AnsonResp, ServError> {
        self.ensure_current().await?;
        self.client.post(msg).await
    }

    pub async fn commit(&self, msg: &JMessage, handlers: Handlers) {
        if let Err(e) = self.ensure_current().await {
            match handlers.on_err {
                Some(f) => f(e),
                None => tracing::error!("Unhandled error from {}: {}", msg.port, e),
            }
            return;
        }
        self.client.commit(msg, handlers).await
    }

    /// Ask the server whether the session is still alive
    pub async fn heartbeat(&self) -> Result<AnsonResp, ServError> {
        let msg = self.message(Port::Heartbeat, SessionRequest::ping());
        self.post(&msg).await
    }

    /// End the session
    ///
    /// The client is `Unauthenticated` afterwards even if the server call
    /// failed.
    pub async fn logout(self) -> Result<AnsonResp, ServError> {
        let msg = self.message(Port::Session, SessionRequest::logout(Some(self.info.uid.clone())));
        let result = self.post(&msg).await;
        *self.client.state.lock().await = SessionState::Unauthenticated;
        result
    }
}
