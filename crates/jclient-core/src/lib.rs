//! jclient Core Library
//!
//! Client side of the semantic JSON services: a compiler for the
//! declarative join/order/variable mini-syntax, the request model, the
//! session protocol client and the paging / error bookkeeping that keeps
//! the UI consistent across asynchronous round trips. Nothing here depends
//! on a particular presentation layer.
//!
//! # Modules
//!
//! - [`compiler`] - Join/order grammar and variable resolution
//! - [`request`] - Query, update, delete and dataset request builders
//! - [`protocol`] - Envelope, header, ports and result codes
//! - [`crypto`] - Login credential encryption
//! - [`session`] - Login state machine and dispatch
//! - [`transport`] - Network collaborator trait and HTTP implementation
//! - [`paging`] - Per-pager state
//! - [`messenger`] - Error dedup, progress flag and message catalog
//! - [`handlers`] - Named callback registry
//! - [`options`] - Typed bind options
//! - [`binder`] - Grid and pager loading
//! - [`events`] - UI sink trait for decoupling from widget toolkits
//! - [`config`] - Client configuration
//! - [`error`] - Error types

pub mod binder;
pub mod compiler;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod handlers;
pub mod messenger;
pub mod options;
pub mod paging;
pub mod protocol;
pub mod request;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use binder::{GridBinder, PagedRequest};
pub use compiler::{compile, ArgPool, ArgValue, CompileError, Compiled, ResolveContext};
pub use config::ClientConfig;
pub use crypto::CredentialToken;
pub use error::{ClientError, Result, ServError};
pub use events::{NoOpSink, StdoutSink, UiSink};
pub use handlers::HandlerRegistry;
pub use messenger::Messenger;
pub use options::BindOptions;
pub use paging::{PagerRegistry, PagingState};
pub use protocol::{AnsonResp, Header, JMessage, MsgCode, Port, SessionInfo, UserAct};
pub use request::{
    Condition, DatasetAction, DatasetRequest, PkSpec, QueryBuilder, QueryRequest, UpdateRequest,
};
pub use session::{Client, Handlers, SessionClient, SessionState};
pub use transport::{HttpTransport, Transport, TransportError};
