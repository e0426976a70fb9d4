//! Proxy-Wasm test filter.
//!
//! One plugin instance runs exactly one behavior, chosen by the `type` field
//! of its JSON configuration:
//! - `headerTests`: numbers requests with `x-request-counter` and
//!   `x-response-counter` headers
//! - `tickTests`: `/tickTests/enable`, `/tickTests/disable` and
//!   `/tickTests/get` control and read a periodic timer counter
//! - `httpCallTests`: replays the request to an upstream and answers with the
//!   upstream's response
//! - `ffiTests`: runs a host foreign function over a request or response body

pub mod config;
pub mod counters;
pub mod handlers;
pub mod host;
pub mod plugin;
pub mod stream;

#[cfg(target_arch = "wasm32")]
mod filter;

pub use config::{ConfigError, HandlerType, PluginConfig};
pub use counters::Counters;
pub use host::Host;
pub use plugin::PluginInstance;
pub use stream::{StreamContext, StreamState};

#[cfg(target_arch = "wasm32")]
proxy_wasm::main! {{
    proxy_wasm::set_log_level(proxy_wasm::types::LogLevel::Info);
    proxy_wasm::set_root_context(|_| -> Box<dyn proxy_wasm::traits::RootContext> {
        Box::new(filter::Root::new())
    });
}}
