//! User message bookkeeping
//!
//! Decides what reaches the user: one alert per result code until the flag
//! is cleared, one progress indicator at a time, and user-facing texts
//! looked up from a replaceable catalog.

use std::collections::{HashMap, HashSet};

use crate::error::ServError;
use crate::protocol::MsgCode;

/// Alert text for connectivity failures
pub const NETWORK_PROBLEM: &str = "Network Problem!";

/// Error dedup flags, progress flag and message catalog
#[derive(Debug, Clone)]
pub struct Messenger {
    reported: HashSet<MsgCode>,
    progressing: bool,
    catalog: HashMap<String, String>,
}

impl Default for Messenger {
    fn default() -> Self {
        let catalog = [
            ("ok", "OK!"),
            ("saved", "Saving Successfully!"),
            ("none_selected", "Please select a record!"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            reported: HashSet::new(),
            progressing: false,
            catalog,
        }
    }
}

impl Messenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the flag of `code`, or every flag (progress included) for `None`
    pub fn init(&mut self, code: Option<MsgCode>) {
        match code {
            Some(code) => {
                self.reported.remove(&code);
            }
            None => {
                self.reported.clear();
                self.progressing = false;
            }
        }
    }

    /// Record a failure and decide whether the user should see it
    ///
    /// Returns the alert text the first time a code is reported after
    /// [`init`](Messenger::init); later reports of that code are only logged.
    pub fn report_error(&mut self, err: &ServError) -> Option<String> {
        if !self.reported.insert(err.code) {
            tracing::warn!("Error message ignored: {}", err);
            return None;
        }

        tracing::error!("{}", err);
        Some(match err.code {
            MsgCode::ExIo => NETWORK_PROBLEM.to_string(),
            _ => err.message.clone(),
        })
    }

    pub fn is_reported(&self, code: MsgCode) -> bool {
        self.reported.contains(&code)
    }

    /// Mark a progress indicator as shown
    ///
    /// Returns `false` if one is already up.
    pub fn progress(&mut self) -> bool {
        if self.progressing {
            return false;
        }
        self.progressing = true;
        true
    }

    pub fn close(&mut self) {
        self.progressing = false;
    }

    pub fn is_progressing(&self) -> bool {
        self.progressing
    }

    /// Replace or add a catalog message
    pub fn set_message(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.catalog.insert(name.into(), text.into());
    }

    /// Catalog message `name`
    pub fn message(&self, name: &str) -> Option<&str> {
        let m = self.catalog.get(name).map(String::as_str);
        if m.is_none() {
            tracing::warn!("No message named '{}' in the catalog, use set_message() to add it", name);
        }
        m
    }

    pub fn ok(&self) -> Option<&str> {
        self.message("ok")
    }
}
