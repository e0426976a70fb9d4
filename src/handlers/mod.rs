//! The four stream behaviors a plugin instance can be configured with.

use std::rc::Rc;

use proxy_wasm::types::{Bytes, Status};

use crate::config::{HandlerType, PluginConfig};
use crate::counters::Counters;
use crate::host::Host;

mod ffi;
mod header;
mod http_call;
mod tick;

pub use ffi::{FfiMode, ForeignCall, FFI_PATH_PREFIX};
pub use header::{HeaderCounter, REQUEST_COUNTER_HEADER, RESPONSE_COUNTER_HEADER};
pub use http_call::{HttpCall, HTTP_CALL_TIMEOUT};
pub use tick::{TickAction, TickControl, TICK_PERIOD};

/// What a phase did, and therefore where the stream goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to wait for; let the pipeline run.
    Continue,
    /// Body is incomplete; hold the stream until end of stream.
    AwaitBody,
    /// An upstream call is in flight under this token.
    AwaitUpstream(u32),
    /// A local response was sent; hold the stream, it is finished.
    Responded,
    /// The behavior's work is done; let the remaining pipeline run.
    Done,
}

/// Phase callbacks a behavior may hook. Everything defaults to passing the
/// stream through.
pub trait StreamHandler {
    fn on_request_headers(&mut self, _host: &mut dyn Host) -> Outcome {
        Outcome::Continue
    }

    fn on_request_body(
        &mut self,
        _host: &mut dyn Host,
        _body_size: usize,
        _end_of_stream: bool,
    ) -> Outcome {
        Outcome::Continue
    }

    fn on_response_headers(&mut self, _host: &mut dyn Host) -> Outcome {
        Outcome::Continue
    }

    fn on_response_body(
        &mut self,
        _host: &mut dyn Host,
        _body_size: usize,
        _end_of_stream: bool,
    ) -> Outcome {
        Outcome::Continue
    }

    /// Completion of the upstream call this stream dispatched.
    fn on_upstream_response(
        &mut self,
        _host: &mut dyn Host,
        _num_headers: usize,
        _body_size: usize,
        _num_trailers: usize,
    ) {
    }
}

/// One configured behavior, owning only the state it needs.
#[derive(Debug)]
pub enum Handler {
    Header(HeaderCounter),
    Tick(TickControl),
    HttpCall(HttpCall),
    Ffi(ForeignCall),
}

impl Handler {
    pub fn as_stream_handler(&mut self) -> &mut dyn StreamHandler {
        match self {
            Handler::Header(h) => h,
            Handler::Tick(h) => h,
            Handler::HttpCall(h) => h,
            Handler::Ffi(h) => h,
        }
    }

    pub fn handler_type(&self) -> HandlerType {
        match self {
            Handler::Header(_) => HandlerType::HeaderTests,
            Handler::Tick(_) => HandlerType::TickTests,
            Handler::HttpCall(_) => HandlerType::HttpCallTests,
            Handler::Ffi(_) => HandlerType::FfiTests,
        }
    }
}

/// Builds the behavior for a new stream.
pub type HandlerFactory = fn(u32, &PluginConfig, &Rc<Counters>) -> Handler;

impl HandlerType {
    /// The constructor for this handler type's streams.
    pub fn factory(self) -> HandlerFactory {
        match self {
            HandlerType::HeaderTests => header_tests,
            HandlerType::TickTests => tick_tests,
            HandlerType::HttpCallTests => http_call_tests,
            HandlerType::FfiTests => ffi_tests,
        }
    }
}

fn header_tests(context_id: u32, _config: &PluginConfig, counters: &Rc<Counters>) -> Handler {
    Handler::Header(HeaderCounter::new(context_id, Rc::clone(counters)))
}

fn tick_tests(context_id: u32, _config: &PluginConfig, counters: &Rc<Counters>) -> Handler {
    Handler::Tick(TickControl::new(context_id, Rc::clone(counters)))
}

fn http_call_tests(context_id: u32, config: &PluginConfig, _counters: &Rc<Counters>) -> Handler {
    Handler::HttpCall(HttpCall::new(context_id, config))
}

fn ffi_tests(context_id: u32, config: &PluginConfig, _counters: &Rc<Counters>) -> Handler {
    Handler::Ffi(ForeignCall::new(context_id, config))
}

/// Which buffered body to read.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BodyKind {
    Request,
    Response,
    CallResponse,
}

/// Reads a complete body. An empty body never touches the host.
pub(crate) fn read_body(host: &dyn Host, kind: BodyKind, body_size: usize) -> Result<Bytes, Status> {
    if body_size == 0 {
        return Ok(Vec::new());
    }
    let body = match kind {
        BodyKind::Request => host.get_http_request_body(0, body_size)?,
        BodyKind::Response => host.get_http_response_body(0, body_size)?,
        BodyKind::CallResponse => host.get_http_call_response_body(0, body_size)?,
    };
    Ok(body.unwrap_or_default())
}

/// Sends a local `200` with no headers.
///
/// A failed send leaves nothing to wait for, so the stream continues instead
/// of staying paused.
pub(crate) fn respond_ok(host: &mut dyn Host, context_id: u32, body: &[u8]) -> Outcome {
    match host.send_http_response(200, vec![], Some(body)) {
        Ok(()) => Outcome::Responded,
        Err(status) => {
            log::error!("[unit-tester:{}] failed to send local response: {:?}", context_id, status);
            Outcome::Done
        }
    }
}
