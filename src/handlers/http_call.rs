//! `httpCallTests`: forwards the buffered request to a configured upstream
//! and answers the stream with whatever the upstream returned.

use std::time::Duration;

use crate::config::PluginConfig;
use crate::host::{self, Headers, Host};

use super::{read_body, BodyKind, Outcome, StreamHandler};

pub const HTTP_CALL_TIMEOUT: Duration = Duration::from_millis(5000);

const PSEUDO_HEADERS: [&str; 3] = [":method", ":authority", ":path"];

#[derive(Debug)]
pub struct HttpCall {
    context_id: u32,
    upstream: String,
    path: String,
    /// Outbound headers captured on request headers.
    headers: Headers,
}

impl HttpCall {
    pub fn new(context_id: u32, config: &PluginConfig) -> Self {
        Self {
            context_id,
            upstream: config.upstream.clone(),
            path: config.path.clone(),
            headers: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn property(&self, host: &dyn Host, path: &[&str]) -> String {
        host::property_string(host, path).unwrap_or_else(|status| {
            log::error!(
                "[unit-tester:{}] failed to get property {}: {:?}",
                self.context_id,
                path.join("."),
                status
            );
            String::new()
        })
    }
}

impl StreamHandler for HttpCall {
    fn on_request_headers(&mut self, host: &mut dyn Host) -> Outcome {
        let mut headers = host.get_http_request_headers().unwrap_or_else(|status| {
            log::error!(
                "[unit-tester:{}] failed to get request headers: {:?}",
                self.context_id,
                status
            );
            Vec::new()
        });
        headers.retain(|(name, _)| !PSEUDO_HEADERS.contains(&name.as_str()));

        let method = self.property(host, &["request", "method"]);
        let authority = self.property(host, &["request", "host"]);
        headers.push((":method".to_string(), method));
        headers.push((":authority".to_string(), authority));
        headers.push((":path".to_string(), self.path.clone()));

        self.headers = headers;
        Outcome::Continue
    }

    fn on_request_body(
        &mut self,
        host: &mut dyn Host,
        body_size: usize,
        end_of_stream: bool,
    ) -> Outcome {
        if !end_of_stream {
            return Outcome::AwaitBody;
        }

        let body = match read_body(host, BodyKind::Request, body_size) {
            Ok(body) => body,
            Err(status) => {
                log::error!(
                    "[unit-tester:{}] failed to get request body: {:?}",
                    self.context_id,
                    status
                );
                return Outcome::Done;
            }
        };

        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        log::debug!(
            "[unit-tester:{}] dispatching http call to {} ({} body bytes)",
            self.context_id,
            self.upstream,
            body.len()
        );
        let dispatched = host.dispatch_http_call(
            &self.upstream,
            headers,
            Some(&body),
            vec![],
            HTTP_CALL_TIMEOUT,
        );
        match dispatched {
            Ok(token) => Outcome::AwaitUpstream(token),
            Err(status) => {
                log::error!(
                    "[unit-tester:{}] failed to dispatch http call: {:?}",
                    self.context_id,
                    status
                );
                Outcome::Done
            }
        }
    }

    fn on_upstream_response(
        &mut self,
        host: &mut dyn Host,
        num_headers: usize,
        body_size: usize,
        _num_trailers: usize,
    ) {
        // The host reports a failed or timed out call with no headers at all.
        // The stream is still answered, with an empty 200.
        if num_headers == 0 {
            log::error!(
                "[unit-tester:{}] http call to {} failed or timed out",
                self.context_id,
                self.upstream
            );
        }

        let headers = host.get_http_call_response_headers().unwrap_or_else(|status| {
            log::error!(
                "[unit-tester:{}] failed to get response headers: {:?}",
                self.context_id,
                status
            );
            Vec::new()
        });
        let body = read_body(host, BodyKind::CallResponse, body_size).unwrap_or_else(|status| {
            log::error!(
                "[unit-tester:{}] failed to get response body: {:?}",
                self.context_id,
                status
            );
            Vec::new()
        });

        let headers: Vec<(&str, &str)> = headers
            .iter()
            .filter(|(name, _)| !name.starts_with(':'))
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        if let Err(status) = host.send_http_response(200, headers, Some(&body)) {
            log::error!(
                "[unit-tester:{}] failed to send local response: {:?}",
                self.context_id,
                status
            );
            if let Err(status) = host.resume_http_request() {
                log::error!(
                    "[unit-tester:{}] failed to resume request: {:?}",
                    self.context_id,
                    status
                );
            }
        }
    }
}
