//! Proxy-Wasm SDK binding: root and http contexts forwarding to the core.

use std::time::Duration;

use proxy_wasm::hostcalls;
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, BufferType, Bytes, ContextType, MapType, Status};

use crate::host::{Headers, Host};
use crate::plugin::PluginInstance;
use crate::stream::StreamContext;

/// Host backed by the Proxy-Wasm ABI of the current context.
struct ProxyHost;

impl Context for ProxyHost {}

impl Host for ProxyHost {
    fn get_http_request_headers(&self) -> Result<Headers, Status> {
        hostcalls::get_map(MapType::HttpRequestHeaders)
    }

    fn get_http_request_header(&self, name: &str) -> Result<Option<String>, Status> {
        hostcalls::get_map_value(MapType::HttpRequestHeaders, name)
    }

    fn add_http_request_header(&mut self, name: &str, value: &str) -> Result<(), Status> {
        hostcalls::add_map_value(MapType::HttpRequestHeaders, name, value)
    }

    fn add_http_response_header(&mut self, name: &str, value: &str) -> Result<(), Status> {
        hostcalls::add_map_value(MapType::HttpResponseHeaders, name, value)
    }

    fn get_http_request_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        hostcalls::get_buffer(BufferType::HttpRequestBody, start, max_size)
    }

    fn get_http_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        hostcalls::get_buffer(BufferType::HttpResponseBody, start, max_size)
    }

    fn set_http_response_body(
        &mut self,
        start: usize,
        size: usize,
        value: &[u8],
    ) -> Result<(), Status> {
        hostcalls::set_buffer(BufferType::HttpResponseBody, start, size, value)
    }

    fn get_property(&self, path: &[&str]) -> Result<Option<Bytes>, Status> {
        hostcalls::get_property(path.to_vec())
    }

    fn set_tick_period(&mut self, period: Duration) -> Result<(), Status> {
        hostcalls::set_tick_period(period)
    }

    fn call_foreign_function(
        &mut self,
        name: &str,
        arguments: &[u8],
    ) -> Result<Option<Bytes>, Status> {
        hostcalls::call_foreign_function(name, Some(arguments))
    }

    fn dispatch_http_call(
        &mut self,
        upstream: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
        trailers: Vec<(&str, &str)>,
        timeout: Duration,
    ) -> Result<u32, Status> {
        // Through the SDK so the callout is routed back to this stream.
        <Self as Context>::dispatch_http_call(&*self, upstream, headers, body, trailers, timeout)
    }

    fn get_http_call_response_headers(&self) -> Result<Headers, Status> {
        hostcalls::get_map(MapType::HttpCallResponseHeaders)
    }

    fn get_http_call_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status> {
        hostcalls::get_buffer(BufferType::HttpCallResponseBody, start, max_size)
    }

    fn send_http_response(
        &mut self,
        status_code: u32,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
    ) -> Result<(), Status> {
        hostcalls::send_http_response(status_code, headers, body)
    }

    fn resume_http_request(&mut self) -> Result<(), Status> {
        hostcalls::resume_http_request()
    }
}

pub(crate) struct Root {
    plugin: PluginInstance,
}

impl Root {
    pub(crate) fn new() -> Self {
        Self {
            plugin: PluginInstance::new(),
        }
    }
}

impl Context for Root {}

impl RootContext for Root {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        log::debug!("[unit-tester] loading plugin config");
        let configuration =
            match hostcalls::get_buffer(BufferType::PluginConfiguration, 0, usize::MAX) {
                Ok(configuration) => configuration,
                Err(status) => {
                    log::error!("[unit-tester] error reading plugin configuration: {:?}", status);
                    return false;
                }
            };

        match self.plugin.on_plugin_start(configuration.as_deref()) {
            Ok(()) => true,
            Err(e) => {
                log::error!("[unit-tester] {}", e);
                false
            }
        }
    }

    fn on_tick(&mut self) {
        self.plugin.on_tick();
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        let stream = self.plugin.new_stream(context_id)?;
        Some(Box::new(Filter { stream }))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

struct Filter {
    stream: StreamContext,
}

impl Context for Filter {
    fn on_http_call_response(
        &mut self,
        token_id: u32,
        num_headers: usize,
        body_size: usize,
        num_trailers: usize,
    ) {
        self.stream.on_upstream_call_complete(
            &mut ProxyHost,
            token_id,
            num_headers,
            body_size,
            num_trailers,
        );
    }
}

impl HttpContext for Filter {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        self.stream.on_request_headers(&mut ProxyHost)
    }

    fn on_http_request_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        self.stream.on_request_body(&mut ProxyHost, body_size, end_of_stream)
    }

    fn on_http_response_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        self.stream.on_response_headers(&mut ProxyHost)
    }

    fn on_http_response_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        self.stream.on_response_body(&mut ProxyHost, body_size, end_of_stream)
    }

    fn on_log(&mut self) {
        log::debug!(
            "[unit-tester:{}] {} stream finished in state {:?}",
            self.stream.context_id(),
            self.stream.handler_type().as_str(),
            self.stream.state()
        );
    }
}
