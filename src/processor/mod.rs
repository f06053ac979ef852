//! Outbound and inbound processing chains.
//!
//! Both chains are explicit ordered loops over stage snapshots (filters,
//! then the codec boundary, then interceptors) with a shared
//! [`ProcessContext`] whose abort call is the only sanctioned early exit.
//!
//! Outbound: Filters → Serialize → Interceptors → Auth → Dispatch.
//! Inbound: Filters → Interceptors → Deserialize (2xx only) → Settle.

mod request;
mod response;

pub(crate) use request::{OutboundOutcome, RequestProcessor};
pub(crate) use response::{ResponseProcessor, Settlement};

use crate::error::Error;
use crate::response::RawResponse;

/// How an aborting stage wants the request settled.
#[derive(Debug)]
pub enum Interruption {
    /// Settle with this response, fed straight to the terminal
    /// deserialize/settle step.
    Response(RawResponse),
    /// Reject with this error.
    Error(Error),
}

/// Per-chain context handed to every filter and interceptor.
///
/// A stage may abort the in-flight message; the remaining chain is
/// skipped and the promise settles with the given response or error.
#[derive(Debug, Default)]
pub struct ProcessContext {
    interruption: Option<Interruption>,
}

impl ProcessContext {
    /// Creates a context for one chain run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the chain, settling with the given response.
    pub fn abort_with(&mut self, response: RawResponse) {
        self.interruption = Some(Interruption::Response(response));
    }

    /// Aborts the chain, rejecting with the given error.
    pub fn abort_with_error(&mut self, error: Error) {
        self.interruption = Some(Interruption::Error(error));
    }

    /// Whether a stage has aborted the chain.
    pub fn is_aborted(&self) -> bool {
        self.interruption.is_some()
    }

    pub(crate) fn take_interruption(&mut self) -> Option<Interruption> {
        self.interruption.take()
    }
}
