//! `ffiTests`: runs a host-provided foreign function over a complete body.
//!
//! Requests to `/ffiTests/<name>` have their body passed to `<name>` and are
//! answered locally with the result. Any other stream has its response body
//! rewritten by the function named in the configuration, if any.

use crate::config::PluginConfig;
use crate::host::{self, Host};

use super::{read_body, respond_ok, BodyKind, Outcome, StreamHandler};

pub const FFI_PATH_PREFIX: &str = "/ffiTests/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfiMode {
    /// Not decided until request headers arrive.
    Pending,
    /// Answer the request with `function(request body)`.
    Request(String),
    /// Replace the response body with `function(response body)`.
    Response(String),
    Passthrough,
}

#[derive(Debug)]
pub struct ForeignCall {
    context_id: u32,
    function: String,
    mode: FfiMode,
}

/// Function name addressed by a request path, if any.
pub fn function_from_path(path: &str) -> Option<&str> {
    let name = path.strip_prefix(FFI_PATH_PREFIX)?;
    let name = name.split('?').next().unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

impl ForeignCall {
    pub fn new(context_id: u32, config: &PluginConfig) -> Self {
        Self {
            context_id,
            function: config.function.clone(),
            mode: FfiMode::Pending,
        }
    }

    pub fn mode(&self) -> &FfiMode {
        &self.mode
    }

    fn call(&self, host: &mut dyn Host, name: &str, body: &[u8]) -> Option<Vec<u8>> {
        log::info!("[unit-tester:{}] calling ffi: {}", self.context_id, name);
        match host.call_foreign_function(name, body) {
            Ok(result) => Some(result.unwrap_or_default()),
            Err(status) => {
                log::error!(
                    "[unit-tester:{}] failed to call FFI {}: {:?}",
                    self.context_id,
                    name,
                    status
                );
                None
            }
        }
    }
}

impl StreamHandler for ForeignCall {
    fn on_request_headers(&mut self, host: &mut dyn Host) -> Outcome {
        let path = host::request_path(host).unwrap_or_else(|status| {
            log::error!("[unit-tester:{}] failed to get :path: {:?}", self.context_id, status);
            String::new()
        });

        self.mode = match function_from_path(&path) {
            Some(name) => FfiMode::Request(name.to_string()),
            None if !self.function.is_empty() => FfiMode::Response(self.function.clone()),
            None => FfiMode::Passthrough,
        };
        Outcome::Continue
    }

    fn on_request_body(
        &mut self,
        host: &mut dyn Host,
        body_size: usize,
        end_of_stream: bool,
    ) -> Outcome {
        let FfiMode::Request(name) = &self.mode else {
            return Outcome::Continue;
        };
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

        match self.call(host, name, &body) {
            Some(result) => respond_ok(host, self.context_id, &result),
            None => Outcome::Done,
        }
    }

    fn on_response_body(
        &mut self,
        host: &mut dyn Host,
        body_size: usize,
        end_of_stream: bool,
    ) -> Outcome {
        let FfiMode::Response(name) = &self.mode else {
            return Outcome::Continue;
        };
        if !end_of_stream {
            return Outcome::AwaitBody;
        }

        let body = match read_body(host, BodyKind::Response, body_size) {
            Ok(body) => body,
            Err(status) => {
                log::error!(
                    "[unit-tester:{}] failed to get response body: {:?}",
                    self.context_id,
                    status
                );
                return Outcome::Done;
            }
        };

        let Some(result) = self.call(host, name, &body) else {
            return Outcome::Done;
        };

        if let Err(status) = host.set_http_response_body(0, body_size, &result) {
            log::error!(
                "[unit-tester:{}] failed to replace the response: {:?}",
                self.context_id,
                status
            );
        }
        Outcome::Done
    }
}
