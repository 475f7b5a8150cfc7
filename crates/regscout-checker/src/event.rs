//! Events of a streamed query and their `text/event-stream` encoding.
//!
//! A stream is `init`, one `result` per provider in completion order with
//! `heartbeat`s while idle, then exactly one `done`.

use crate::query::DomainQuery;
use crate::runner::TaskOutcome;
use regscout_core::ProviderId;
use regscout_provider::ProviderResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals sent with the terminal `done` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DoneSummary {
    /// At least one provider succeeded
    pub ok: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DoneSummary {
    pub(crate) fn record(&mut self, result: &ProviderResult) {
        self.total += 1;
        if result.ok {
            self.succeeded += 1;
            self.ok = true;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Init(DomainQuery),
    Result(TaskOutcome),
    Heartbeat,
    Done(DoneSummary),
}

#[derive(Serialize)]
struct ResultData<'a> {
    provider: ProviderId,
    #[serde(flatten)]
    result: &'a ProviderResult,
}

impl QueryEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Result(_) => "result",
            Self::Heartbeat => "heartbeat",
            Self::Done(_) => "done",
        }
    }

    /// JSON payload; heartbeats have none.
    pub fn data(&self) -> Option<String> {
        let data = match self {
            Self::Init(query) => serde_json::to_string(query),
            Self::Result(outcome) => serde_json::to_string(&ResultData {
                provider: outcome.provider,
                result: &outcome.result,
            }),
            Self::Heartbeat => return None,
            Self::Done(summary) => serde_json::to_string(summary),
        };
        // plain data types; encoding cannot fail
        data.ok()
    }

    /// Encode as one `text/event-stream` frame.
    ///
    /// Heartbeats are comment lines so clients ignore them.
    pub fn to_sse(&self) -> String {
        match self.data() {
            Some(data) => format!("event: {}\ndata: {}\n\n", self.name(), data),
            None => ": heartbeat\n\n".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Collect-all response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryReport {
    /// At least one provider succeeded
    pub ok: bool,
    pub domain: String,
    /// Exactly one entry per requested provider
    pub results: BTreeMap<ProviderId, ProviderResult>,
}
