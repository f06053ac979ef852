//! The inbound processing chain.

use super::{Interruption, ProcessContext};
use crate::error::Result;
use crate::filter::FilterManager;
use crate::interceptor::{InterceptorManager, ResponseView};
use crate::request::SerializedRequest;
use crate::response::{MutableResponse, RawResponse, Response, StatusFamily};
use crate::serialization::{
    DeserializationContext, PayloadReader, ProviderRegistry, SerializationEngine,
};
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, instrument};

/// How a processed response settles its deferred.
#[derive(Debug)]
pub(crate) enum Settlement<P> {
    /// Success status, payload deserialized.
    Resolved(Response<P>),
    /// Non-success status; payload left in wire form.
    Status(Arc<RawResponse>),
}

/// Runs Filters → Interceptors → Deserialize-if-2xx over a response.
#[derive(Clone)]
pub(crate) struct ResponseProcessor {
    engine: SerializationEngine,
    providers: ProviderRegistry,
    filters: FilterManager,
    interceptors: InterceptorManager,
}

impl ResponseProcessor {
    pub(crate) fn new(
        engine: SerializationEngine,
        providers: ProviderRegistry,
        filters: FilterManager,
        interceptors: InterceptorManager,
    ) -> Self {
        Self {
            engine,
            providers,
            filters,
            interceptors,
        }
    }

    /// Processes a received response. Stage errors propagate to the
    /// dispatch boundary and become rejections there.
    #[instrument(name = "inbound_process", skip_all, fields(status = raw.status().as_u16()))]
    pub(crate) fn process<P: Send + Sync + 'static>(
        &self,
        raw: RawResponse,
        request: &SerializedRequest,
        reader: &PayloadReader<P>,
        store: &Store,
    ) -> Result<Settlement<P>> {
        let mut response = MutableResponse::new(raw, store.clone());
        let mut ctx = ProcessContext::new();

        for filter in self.filters.response_filters() {
            filter.filter(&mut response, &mut ctx)?;
            if let Some(interruption) = ctx.take_interruption() {
                return self.interrupted(interruption, request, reader);
            }
        }

        for interceptor in self.interceptors.response_interceptors() {
            let mut view = ResponseView::new(&mut response);
            interceptor.intercept(&mut view, &mut ctx)?;
            if let Some(interruption) = ctx.take_interruption() {
                return self.interrupted(interruption, request, reader);
            }
        }

        self.settle(response.freeze(), request, reader)
    }

    /// Feeds a response straight to the terminal step, bypassing filters
    /// and interceptors. Used when an outbound stage aborts with a
    /// response.
    pub(crate) fn settle_direct<P: Send + Sync + 'static>(
        &self,
        raw: RawResponse,
        request: &SerializedRequest,
        reader: &PayloadReader<P>,
    ) -> Result<Settlement<P>> {
        self.settle(raw, request, reader)
    }

    fn interrupted<P: Send + Sync + 'static>(
        &self,
        interruption: Interruption,
        request: &SerializedRequest,
        reader: &PayloadReader<P>,
    ) -> Result<Settlement<P>> {
        match interruption {
            Interruption::Response(raw) => self.settle(raw, request, reader),
            Interruption::Error(error) => Err(error),
        }
    }

    fn settle<P: Send + Sync + 'static>(
        &self,
        raw: RawResponse,
        request: &SerializedRequest,
        reader: &PayloadReader<P>,
    ) -> Result<Settlement<P>> {
        let raw = Arc::new(raw);
        if StatusFamily::Successful.includes(raw.status()) {
            let media_type = SerializationEngine::negotiated_media_type(&raw);
            let ctx =
                DeserializationContext::new(request, &raw, &self.providers, &media_type);
            let payload = reader.read(self.engine.registry(), raw.payload(), &ctx)?;
            Ok(Settlement::Resolved(Response::new(raw, payload)))
        } else {
            debug!(
                status = raw.status().as_u16(),
                "non-success status; payload left undeserialized"
            );
            Ok(Settlement::Status(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::payload::SerializedPayload;
    use crate::request::{MutableRequest, RequestSnapshot};
    use crate::serialization::{JsonSerdes, SerdesRegistry};
    use http::{Method, StatusCode};
    use serde::{Deserialize, Serialize};
    use url::Url;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Note {
        text: String,
    }

    fn processor() -> (ResponseProcessor, FilterManager, InterceptorManager) {
        let registry = SerdesRegistry::new();
        registry.register_serdes::<Note, _>(JsonSerdes::new()).unwrap();
        let filters = FilterManager::new();
        let interceptors = InterceptorManager::new();
        let processor = ResponseProcessor::new(
            SerializationEngine::new(registry),
            ProviderRegistry::new(),
            filters.clone(),
            interceptors.clone(),
        );
        (processor, filters, interceptors)
    }

    fn serialized_request() -> SerializedRequest {
        let snapshot =
            RequestSnapshot::for_test(Method::GET, Url::parse("http://localhost/note").unwrap());
        MutableRequest::from_snapshot(&snapshot, Store::new().leaf()).freeze()
    }

    fn json_response(status: StatusCode, body: &str) -> RawResponse {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json");
        RawResponse::new(status, headers, SerializedPayload::Text(body.to_owned()))
    }

    #[test]
    fn success_response_is_deserialized() {
        let (processor, _, _) = processor();
        let settlement = processor
            .process(
                json_response(StatusCode::OK, r#"{"text":"hi"}"#),
                &serialized_request(),
                &PayloadReader::<Note>::single(),
                &Store::new().leaf(),
            )
            .unwrap();
        match settlement {
            Settlement::Resolved(response) => {
                assert_eq!(response.payload().text, "hi");
                assert_eq!(response.status(), StatusCode::OK);
            }
            Settlement::Status(_) => panic!("expected resolution"),
        }
    }

    #[test]
    fn non_success_skips_deserialization() {
        let (processor, _, _) = processor();
        let settlement = processor
            .process(
                json_response(StatusCode::NOT_FOUND, "not json at all"),
                &serialized_request(),
                &PayloadReader::<Note>::single(),
                &Store::new().leaf(),
            )
            .unwrap();
        match settlement {
            Settlement::Status(raw) => {
                assert_eq!(raw.status(), StatusCode::NOT_FOUND);
                assert_eq!(raw.payload().as_text(), Some("not json at all"));
            }
            Settlement::Resolved(_) => panic!("expected status rejection"),
        }
    }

    #[test]
    fn response_filters_run_before_deserialization() {
        let (processor, filters, _) = processor();
        filters.register_response_filter(
            |response: &mut MutableResponse, _: &mut ProcessContext| -> Result<()> {
                response.set_payload(SerializedPayload::Text(r#"{"text":"patched"}"#.to_owned()));
                Ok(())
            },
        );
        let settlement = processor
            .process(
                json_response(StatusCode::OK, r#"{"text":"original"}"#),
                &serialized_request(),
                &PayloadReader::<Note>::single(),
                &Store::new().leaf(),
            )
            .unwrap();
        match settlement {
            Settlement::Resolved(response) => assert_eq!(response.payload().text, "patched"),
            Settlement::Status(_) => panic!("expected resolution"),
        }
    }

    #[test]
    fn collection_reader_accumulates_into_container() {
        let (processor, _, _) = processor();
        let settlement = processor
            .process(
                json_response(StatusCode::OK, r#"[{"text":"a"},{"text":"b"}]"#),
                &serialized_request(),
                &PayloadReader::<Vec<Note>>::collection::<Note>(),
                &Store::new().leaf(),
            )
            .unwrap();
        match settlement {
            Settlement::Resolved(response) => {
                let texts: Vec<_> = response.payload().iter().map(|n| n.text.clone()).collect();
                assert_eq!(texts, vec!["a", "b"]);
            }
            Settlement::Status(_) => panic!("expected resolution"),
        }
    }

    #[test]
    fn missing_deserializer_is_a_serialization_fault() {
        let (processor, _, _) = processor();
        let err = processor
            .process(
                json_response(StatusCode::OK, "1"),
                &serialized_request(),
                &PayloadReader::<u64>::single(),
                &Store::new().leaf(),
            )
            .unwrap_err();
        assert!(err.as_serialization().is_some());
    }
}
