//! In-memory host and event driver for the filter core.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use proxy_wasm::types::{Action, Bytes, Status};
use unit_tester::host::{Headers, Host};
use unit_tester::{ConfigError, PluginInstance, StreamContext, StreamState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResponse {
    pub status: u32,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedCall {
    pub token: u32,
    pub upstream: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub trailers: Headers,
    pub timeout: Duration,
}

pub fn reverse(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

fn owned(headers: Vec<(&str, &str)>) -> Headers {
    headers
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Host state for one stream plus the host-wide bits (timer, foreign
/// functions, upstream calls).
#[derive(Default)]
pub struct MockHost {
    pub request_headers: Headers,
    pub request_body: Vec<u8>,
    pub response_headers: Headers,
    pub response_body: Vec<u8>,
    pub properties: HashMap<String, Vec<u8>>,
    pub foreign_functions: HashMap<String, fn(&[u8]) -> Vec<u8>>,

    pub tick_period: Option<Duration>,
    pub dispatched: Vec<DispatchedCall>,
    pub call_response_headers: Headers,
    pub call_response_body: Vec<u8>,
    pub local_responses: Vec<LocalResponse>,
    pub resumed: usize,
    pub request_body_reads: Cell<usize>,
    pub response_body_reads: Cell<usize>,
    pub foreign_calls: Vec<(String, Vec<u8>)>,

    /// Host calls that fail with `Status::InternalFailure`.
    pub failing: HashSet<&'static str>,
    next_token: u32,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            next_token: 1,
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.properties
            .insert("request.path".to_string(), path.as_bytes().to_vec());
        self.request_headers.push((":path".to_string(), path.to_string()));
        self
    }

    pub fn with_property(mut self, path: &str, value: &str) -> Self {
        self.properties.insert(path.to_string(), value.as_bytes().to_vec());
        self
    }

    pub fn with_request_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_foreign_function(mut self, name: &str, function: fn(&[u8]) -> Vec<u8>) -> Self {
        self.foreign_functions.insert(name.to_string(), function);
        self
    }

    pub fn failing(mut self, call: &'static str) -> Self {
        self.failing.insert(call);
        self
    }

    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn check(&self, call: &'static str) -> Result<(), Status> {
        if self.failing.contains(call) {
            Err(Status::InternalFailure)
        } else {
            Ok(())
        }
    }

    fn slice(data: &[u8], start: usize, max_size: usize) -> Option<Bytes> {
        if start >= data.len() {
            return None;
        }
        let end = data.len().min(start.saturating_add(max_size));
        Some(data[start..end].to_vec())
    }
}

impl Host for MockHost {
    fn get_http_request_headers(&self) -> Result<Headers, Status> {
        self.check("get_http_request_headers")?;
        Ok(self.request_headers.clone())
    }

    fn get_http_request_header(&self, name: &str) -> Result<Option<String>, Status> {
        self.check("get_http_request_header")?;
        Ok(self.request_header(name).map(str::to_string))
    }

    fn add_http_request_header(&mut self, name: &str, value: &str) -> Result<(), Status> {
        self.check("add_http_request_header")?;
        self.request_headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn add_http_response_header(&mut self, name: &str, value: &str) -> Result<(), Status> {
        self.check("add_http_response_header")?;
        self.response_headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn get_http_request_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        self.check("get_http_request_body")?;
        self.request_body_reads.set(self.request_body_reads.get() + 1);
        Ok(Self::slice(&self.request_body, start, max_size))
    }

    fn get_http_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        self.check("get_http_response_body")?;
        self.response_body_reads.set(self.response_body_reads.get() + 1);
        Ok(Self::slice(&self.response_body, start, max_size))
    }

    fn set_http_response_body(
        &mut self,
        start: usize,
        size: usize,
        value: &[u8],
    ) -> Result<(), Status> {
        self.check("set_http_response_body")?;
        let end = self.response_body.len().min(start + size);
        self.response_body.splice(start..end, value.iter().copied());
        Ok(())
    }

    fn get_property(&self, path: &[&str]) -> Result<Option<Bytes>, Status> {
        self.check("get_property")?;
        Ok(self.properties.get(&path.join(".")).cloned())
    }

    fn set_tick_period(&mut self, period: Duration) -> Result<(), Status> {
        self.check("set_tick_period")?;
        self.tick_period = Some(period);
        Ok(())
    }

    fn call_foreign_function(
        &mut self,
        name: &str,
        arguments: &[u8],
    ) -> Result<Option<Bytes>, Status> {
        self.check("call_foreign_function")?;
        let function = *self.foreign_functions.get(name).ok_or(Status::NotFound)?;
        let result = function(arguments);
        self.foreign_calls.push((name.to_string(), arguments.to_vec()));
        Ok(Some(result))
    }

    fn dispatch_http_call(
        &mut self,
        upstream: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
        trailers: Vec<(&str, &str)>,
        timeout: Duration,
    ) -> Result<u32, Status> {
        self.check("dispatch_http_call")?;
        let token = self.next_token;
        self.next_token += 1;
        self.dispatched.push(DispatchedCall {
            token,
            upstream: upstream.to_string(),
            headers: owned(headers),
            body: body.unwrap_or_default().to_vec(),
            trailers: owned(trailers),
            timeout,
        });
        Ok(token)
    }

    fn get_http_call_response_headers(&self) -> Result<Headers, Status> {
        self.check("get_http_call_response_headers")?;
        Ok(self.call_response_headers.clone())
    }

    fn get_http_call_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        self.check("get_http_call_response_body")?;
        Ok(Self::slice(&self.call_response_body, start, max_size))
    }

    fn send_http_response(
        &mut self,
        status_code: u32,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
    ) -> Result<(), Status> {
        self.check("send_http_response")?;
        self.local_responses.push(LocalResponse {
            status: status_code,
            headers: owned(headers),
            body: body.unwrap_or_default().to_vec(),
        });
        Ok(())
    }

    fn resume_http_request(&mut self) -> Result<(), Status> {
        self.check("resume_http_request")?;
        self.resumed += 1;
        Ok(())
    }
}

/// Delivers host events to the streams of one plugin instance, one at a
/// time, and routes call completions back to the stream that dispatched.
pub struct Driver {
    pub plugin: PluginInstance,
    streams: HashMap<u32, StreamContext>,
    callouts: HashMap<u32, u32>,
    next_context_id: u32,
}

impl Driver {
    pub fn start(config: &str) -> Result<Self, ConfigError> {
        Self::start_with(Some(config.as_bytes()))
    }

    pub fn start_with(config: Option<&[u8]>) -> Result<Self, ConfigError> {
        let mut plugin = PluginInstance::new();
        plugin.on_plugin_start(config)?;
        Ok(Self {
            plugin,
            streams: HashMap::new(),
            callouts: HashMap::new(),
            next_context_id: 2,
        })
    }

    /// Creates a stream; `None` when the plugin has no behavior.
    pub fn new_stream(&mut self) -> Option<u32> {
        let context_id = self.next_context_id;
        let stream = self.plugin.new_stream(context_id)?;
        self.next_context_id += 1;
        self.streams.insert(context_id, stream);
        Some(context_id)
    }

    pub fn stream(&self, context_id: u32) -> &StreamContext {
        &self.streams[&context_id]
    }

    pub fn state(&self, context_id: u32) -> StreamState {
        self.stream(context_id).state()
    }

    fn stream_mut(&mut self, context_id: u32) -> &mut StreamContext {
        self.streams.get_mut(&context_id).expect("unknown stream")
    }

    pub fn request_headers(&mut self, context_id: u32, host: &mut MockHost) -> Action {
        self.stream_mut(context_id).on_request_headers(host)
    }

    /// Appends `chunk` to the buffered request body and delivers the event.
    pub fn request_body(
        &mut self,
        context_id: u32,
        host: &mut MockHost,
        chunk: &[u8],
        end_of_stream: bool,
    ) -> Action {
        host.request_body.extend_from_slice(chunk);
        let size = host.request_body.len();
        let action = self
            .stream_mut(context_id)
            .on_request_body(host, size, end_of_stream);
        if let StreamState::PausedAwaitingUpstream { token } = self.state(context_id) {
            self.callouts.insert(token, context_id);
        }
        action
    }

    pub fn response_headers(&mut self, context_id: u32, host: &mut MockHost) -> Action {
        self.stream_mut(context_id).on_response_headers(host)
    }

    pub fn response_body(
        &mut self,
        context_id: u32,
        host: &mut MockHost,
        chunk: &[u8],
        end_of_stream: bool,
    ) -> Action {
        host.response_body.extend_from_slice(chunk);
        let size = host.response_body.len();
        self.stream_mut(context_id)
            .on_response_body(host, size, end_of_stream)
    }

    /// Delivers a call completion. Returns whether a live stream received it.
    pub fn complete_call(
        &mut self,
        host: &mut MockHost,
        token: u32,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> bool {
        host.call_response_headers = owned(headers.to_vec());
        host.call_response_body = body.to_vec();

        let Some(context_id) = self.callouts.remove(&token) else {
            return false;
        };
        let Some(stream) = self.streams.get_mut(&context_id) else {
            return false;
        };
        stream.on_upstream_call_complete(host, token, headers.len(), body.len(), 0);
        true
    }

    /// Delivers a completion straight to a stream, bypassing token routing.
    pub fn complete_call_on(
        &mut self,
        context_id: u32,
        host: &mut MockHost,
        token: u32,
        headers: &[(&str, &str)],
        body: &[u8],
    ) {
        host.call_response_headers = owned(headers.to_vec());
        host.call_response_body = body.to_vec();
        self.stream_mut(context_id)
            .on_upstream_call_complete(host, token, headers.len(), body.len(), 0);
    }

    pub fn tick(&mut self) {
        self.plugin.on_tick();
    }

    /// Tears the stream down, as the host does when it finishes or resets.
    pub fn done(&mut self, context_id: u32) {
        self.streams.remove(&context_id);
    }
}
