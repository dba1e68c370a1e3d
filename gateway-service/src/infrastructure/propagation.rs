use opentelemetry::global;
use opentelemetry::propagation::Injector;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Adapter to inject OpenTelemetry trace context into outgoing request headers.
struct HeaderMapInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderMapInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = HeaderName::from_bytes(key.as_bytes())
            && let Ok(val) = HeaderValue::from_str(&value)
        {
            self.0.insert(name, val);
        }
    }
}

/// Trace context headers for the current span.
pub fn trace_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cx = tracing::Span::current().context();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderMapInjector(&mut headers));
    });
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_names_are_skipped() {
        let mut headers = HeaderMap::new();
        let mut injector = HeaderMapInjector(&mut headers);

        injector.set("traceparent", "00-abc-def-01".into());
        injector.set("bad header", "x".into());

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["traceparent"], "00-abc-def-01");
    }
}
