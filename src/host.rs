//! The slice of the Proxy-Wasm host API the filter depends on.
//!
//! Each method mirrors a `proxy_wasm::hostcalls` function and reports host
//! failures as a [`Status`]. The wasm build implements it on top of the SDK;
//! tests drive the filter with an in-memory host.

use std::time::Duration;

use proxy_wasm::types::{Bytes, Status};

pub type Headers = Vec<(String, String)>;

pub trait Host {
    fn get_http_request_headers(&self) -> Result<Headers, Status>;

    /// Reads a single request header, `None` when absent.
    fn get_http_request_header(&self, name: &str) -> Result<Option<String>, Status>;

    fn add_http_request_header(&mut self, name: &str, value: &str) -> Result<(), Status>;

    fn add_http_response_header(&mut self, name: &str, value: &str) -> Result<(), Status>;

    fn get_http_request_body(&self, start: usize, max_size: usize) -> Result<Option<Bytes>, Status>;

    fn get_http_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status>;

    /// Replaces `size` bytes of the response body starting at `start`.
    fn set_http_response_body(
        &mut self,
        start: usize,
        size: usize,
        value: &[u8],
    ) -> Result<(), Status>;

    /// Reads a stream property such as `["request", "path"]`.
    fn get_property(&self, path: &[&str]) -> Result<Option<Bytes>, Status>;

    /// Zero disables the timer.
    fn set_tick_period(&mut self, period: Duration) -> Result<(), Status>;

    fn call_foreign_function(
        &mut self,
        name: &str,
        arguments: &[u8],
    ) -> Result<Option<Bytes>, Status>;

    /// Starts an upstream call and returns its token. The host later
    /// reports completion (or timeout) on the dispatching stream.
    fn dispatch_http_call(
        &mut self,
        upstream: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
        trailers: Vec<(&str, &str)>,
        timeout: Duration,
    ) -> Result<u32, Status>;

    fn get_http_call_response_headers(&self) -> Result<Headers, Status>;

    fn get_http_call_response_body(
        &self,
        start: usize,
        max_size: usize,
    ) -> Result<Option<Bytes>, Status>;

    /// Answers the stream locally instead of forwarding it.
    fn send_http_response(
        &mut self,
        status_code: u32,
        headers: Vec<(&str, &str)>,
        body: Option<&[u8]>,
    ) -> Result<(), Status>;

    fn resume_http_request(&mut self) -> Result<(), Status>;
}

/// Reads a property as UTF-8 text, lossily.
pub fn property_string(host: &dyn Host, path: &[&str]) -> Result<String, Status> {
    Ok(host
        .get_property(path)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default())
}

/// Path of the current request, from the `request.path` property or the
/// `:path` header when the property is unavailable.
pub fn request_path(host: &dyn Host) -> Result<String, Status> {
    match host.get_property(&["request", "path"]) {
        Ok(Some(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Ok(None) | Err(_) => Ok(host.get_http_request_header(":path")?.unwrap_or_default()),
    }
}
