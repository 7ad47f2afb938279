//! Subcommand implementations
//!
//! Each command logs in as needed, runs one request and prints the outcome
//! through a stdout sink.

use jclient_core::compiler::{compile as compile_spec, ArgPool, ResolveContext};
use jclient_core::{
    BindOptions, Client, ClientConfig, GridBinder, SessionClient, StdoutSink,
};
use std::sync::Arc;

use crate::{Credentials, Spec};

/// Print the query body compiled from a join spec and an order spec
pub fn compile(spec: &Spec, json_output: bool) -> Result<(), String> {
    let args = parse_args(spec.args.as_deref())?;
    let ambient = ArgPool::new();
    let ctx = ResolveContext::new(args.as_ref(), &ambient);

    let compiled = compile_spec(&spec.t, spec.order.as_deref(), &ctx)
        .map_err(|e| format!("Failed to compile: {e}"))?;
    for diag in &compiled.diagnostics {
        eprintln!("skipped: {diag}");
    }

    let query = compiled
        .into_query(None)
        .map_err(|e| format!("Failed to build query: {e}"))?;
    let body = if json_output {
        serde_json::to_string(&query)
    } else {
        serde_json::to_string_pretty(&query)
    }
    .map_err(|e| format!("Failed to serialize query: {e}"))?;

    println!("{body}");
    Ok(())
}

/// Log in and print the session info
pub async fn login(config: ClientConfig, cred: &Credentials, json_output: bool) -> Result<(), String> {
    let session = open_session(config, cred).await?;
    let info = session.info();
    if json_output {
        let json = serde_json::to_string(info).map_err(|e| format!("Failed to serialize: {e}"))?;
        println!("{json}");
    } else {
        println!("Logged in: {} (ssid {})", info.uid, info.ssid);
    }
    Ok(())
}

/// Log in and print the requested page of a query, and nothing else
pub async fn query(
    config: ClientConfig,
    cred: &Credentials,
    spec: &Spec,
    page: i64,
    size: i64,
    json_output: bool,
) -> Result<(), String> {
    let session = open_session(config, cred).await?;
    let binder = GridBinder::new(session, Arc::new(StdoutSink::new(json_output)));

    let mut opts = BindOptions::new().with_t(spec.t.clone()).with_pagesize(size);
    opts.order = spec.order.clone();
    if let Some(args) = spec.args.as_deref() {
        let args = serde_json::from_str(args).map_err(|e| format!("Invalid --args: {e}"))?;
        opts = opts.with_args(args);
    }

    binder
        .register_pager("cli", "rows", opts, Vec::new())
        .await
        .map_err(|e| e.to_string())?;
    binder
        .select_page("cli", page, size)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Log in and send a heartbeat
pub async fn ping(config: ClientConfig, cred: &Credentials) -> Result<(), String> {
    let session = open_session(config, cred).await?;
    let resp = session.heartbeat().await.map_err(|e| e.to_string())?;
    println!("{}", resp.code);
    Ok(())
}

async fn open_session(config: ClientConfig, cred: &Credentials) -> Result<SessionClient, String> {
    tracing::info!("Logging in to {} as {}", config.serv_root, cred.uid);
    let client = Client::new(config).map_err(|e| format!("Failed to create client: {e}"))?;
    client
        .login(&cred.uid, &cred.pswd)
        .await
        .map_err(|e| format!("Login failed: {e}"))
}

fn parse_args(args: Option<&str>) -> Result<Option<ArgPool>, String> {
    let Some(args) = args else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(args).map_err(|e| format!("Invalid --args: {e}"))?;
    ArgPool::from_json(&value)
        .map(Some)
        .ok_or_else(|| "--args must be a JSON object".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        assert!(parse_args(None).unwrap().is_none());
        let pool = parse_args(Some(r#"{"form": {"orgId": "o1"}}"#)).unwrap().unwrap();
        assert!(pool.contains("form"));
        assert!(parse_args(Some("[1, 2]")).is_err());
        assert!(parse_args(Some("{")).is_err());
    }

    #[test]
    fn test_compile_command() {
        let spec = Spec {
            t: "a_users:u, j:a_roles:r r.roleId = u.roleId".to_string(),
            order: Some("userName desc".to_string()),
            args: None,
        };
        assert!(compile(&spec, true).is_ok());

        let spec = Spec {
            t: "j:a_roles r.roleId = 1".to_string(),
            order: None,
            args: None,
        };
        assert!(compile(&spec, false).is_err());
    }
}
