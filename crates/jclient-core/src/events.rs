//! UI Sink Trait
//!
//! This module provides the UiSink trait for decoupling request outcomes
//! from the presentation layer. Implementations can drive widgets, write to
//! stdout (CLI), or record calls in tests.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::protocol::MsgCode;

/// Presentation-layer collaborator
///
/// The binder calls it once the messenger decided something should be
/// shown; it never sees duplicate alerts or nested progress indicators.
#[async_trait]
pub trait UiSink: Send + Sync {
    /// Show a progress indicator
    async fn show_progress(&self) -> Result<(), String>;

    /// Close the progress indicator
    async fn close_progress(&self) -> Result<(), String>;

    /// Alert the user about a failed request
    async fn alert(&self, code: MsgCode, text: &str) -> Result<(), String>;

    /// Show rows in a grid, list or tree
    async fn bind_rows(
        &self,
        target: &str,
        rows: &[Map<String, Value>],
        total: i64,
    ) -> Result<(), String>;

    /// Select the `ix`-th row shown in `target`
    async fn select_row(&self, target: &str, ix: usize) -> Result<(), String>;

    /// Refresh a pager's page links
    async fn refresh_pager(
        &self,
        pager_id: &str,
        total: i64,
        page: i64,
        size: i64,
    ) -> Result<(), String>;
}

/// No-op sink for testing or headless use
#[derive(Default, Clone)]
pub struct NoOpSink;

#[async_trait]
impl UiSink for NoOpSink {
    async fn show_progress(&self) -> Result<(), String> {
        Ok(())
    }

    async fn close_progress(&self) -> Result<(), String> {
        Ok(())
    }

    async fn alert(&self, _code: MsgCode, _text: &str) -> Result<(), String> {
        Ok(())
    }

    async fn bind_rows(
        &self,
        _target: &str,
        _rows: &[Map<String, Value>],
        _total: i64,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn select_row(&self, _target: &str, _ix: usize) -> Result<(), String> {
        Ok(())
    }

    async fn refresh_pager(
        &self,
        _pager_id: &str,
        _total: i64,
        _page: i64,
        _size: i64,
    ) -> Result<(), String> {
        Ok(())
    }
}

/// Stdout sink for CLI mode - prints outcomes to console
#[derive(Default, Clone)]
pub struct StdoutSink {
    /// Whether to print in JSON format
    pub json_output: bool,
}

impl StdoutSink {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }
}

#[async_trait]
impl UiSink for StdoutSink {
    async fn show_progress(&self) -> Result<(), String> {
        if !self.json_output {
            println!("...");
        }
        Ok(())
    }

    async fn close_progress(&self) -> Result<(), String> {
        Ok(())
    }

    async fn alert(&self, code: MsgCode, text: &str) -> Result<(), String> {
        if self.json_output {
            println!("{}", json!({"event": "alert", "code": code, "text": text}));
        } else {
            eprintln!("[{code}] {text}");
        }
        Ok(())
    }

    async fn bind_rows(
        &self,
        target: &str,
        rows: &[Map<String, Value>],
        total: i64,
    ) -> Result<(), String> {
        if self.json_output {
            println!(
                "{}",
                json!({"event": "rows", "target": target, "total": total, "rows": rows})
            );
            return Ok(());
        }

        println!("{target}: {} rows of {total}", rows.len());
        for row in rows {
            let cells: Vec<String> = row.iter().map(|(k, v)| format!("{k}={}", cell(v))).collect();
            println!("  {}", cells.join("  "));
        }
        Ok(())
    }

    async fn select_row(&self, target: &str, ix: usize) -> Result<(), String> {
        if self.json_output {
            println!("{}", json!({"event": "select", "target": target, "row": ix}));
        } else {
            println!("{target}: row {ix} selected");
        }
        Ok(())
    }

    async fn refresh_pager(
        &self,
        pager_id: &str,
        total: i64,
        page: i64,
        size: i64,
    ) -> Result<(), String> {
        if self.json_output {
            println!(
                "{}",
                json!({"event": "pager", "pager": pager_id, "total": total, "page": page, "size": size})
            );
        } else {
            println!("{pager_id}: page {} of {}", page + 1, page_count(total, size));
        }
        Ok(())
    }
}

fn cell(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn page_count(total: i64, size: i64) -> i64 {
    if size <= 0 || total <= 0 {
        return 1;
    }
    (total + size - 1) / size
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpSink;
        assert!(sink.show_progress().await.is_ok());
        assert!(sink.alert(MsgCode::ExIo, "Network Problem!").await.is_ok());
        assert!(sink.refresh_pager("irpager", 45, 2, 20).await.is_ok());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(45, 20), 3);
        assert_eq!(page_count(40, 20), 2);
        assert_eq!(page_count(0, 20), 1);
        assert_eq!(page_count(10, -1), 1);
    }

    #[test]
    fn test_cell() {
        assert_eq!(cell(&Value::String("a".to_string())), "a");
        assert_eq!(cell(&Value::Null), "-");
        assert_eq!(cell(&json!(3)), "3");
    }
}
