//! The outbound processing chain.

use super::{Interruption, ProcessContext};
use crate::error::Result;
use crate::filter::FilterManager;
use crate::interceptor::{InterceptorManager, RequestView};
use crate::request::MutableRequest;
use crate::serialization::SerializationEngine;
use std::sync::Arc;
use tracing::instrument;

/// What the outbound chain decided.
#[derive(Debug)]
pub(crate) enum OutboundOutcome {
    /// All stages passed; the request is ready for the transport.
    Proceed,
    /// A stage aborted the chain.
    Abort(Interruption),
}

/// Runs Filters → Serialize → Interceptors → Auth over a request.
#[derive(Clone)]
pub(crate) struct RequestProcessor {
    engine: SerializationEngine,
    filters: FilterManager,
    interceptors: InterceptorManager,
}

impl RequestProcessor {
    pub(crate) fn new(
        engine: SerializationEngine,
        filters: FilterManager,
        interceptors: InterceptorManager,
    ) -> Self {
        Self {
            engine,
            filters,
            interceptors,
        }
    }

    /// Processes the request in place. Stage errors propagate to the
    /// dispatch boundary; aborts are reported in the outcome.
    #[instrument(name = "outbound_process", skip_all, fields(method = %request.method(), uri = %request.uri()))]
    pub(crate) async fn process(&self, request: &mut MutableRequest) -> Result<OutboundOutcome> {
        let mut ctx = ProcessContext::new();

        for filter in self.filters.request_filters() {
            filter.filter(request, &mut ctx)?;
            if let Some(interruption) = ctx.take_interruption() {
                return Ok(OutboundOutcome::Abort(interruption));
            }
        }

        self.engine.serialize_request(request)?;

        for interceptor in self.interceptors.request_interceptors() {
            let mut view = RequestView::new(request);
            interceptor.intercept(&mut view, &mut ctx)?;
            if let Some(interruption) = ctx.take_interruption() {
                return Ok(OutboundOutcome::Abort(interruption));
            }
        }

        let auth = Arc::clone(request.auth());
        auth.authenticate(request).await?;

        Ok(OutboundOutcome::Proceed)
    }
}
