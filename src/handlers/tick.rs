//! `tickTests`: turns the plugin timer on and off and reports how often it
//! fired.

use std::rc::Rc;
use std::time::Duration;

use crate::counters::Counters;
use crate::host::{self, Host};

use super::{respond_ok, Outcome, StreamHandler};

/// Timer period installed by `/tickTests/enable`.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Enable,
    Disable,
    Get,
}

impl TickAction {
    /// Recognizes the control paths. The whole path must match.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/tickTests/enable" => Some(TickAction::Enable),
            "/tickTests/disable" => Some(TickAction::Disable),
            "/tickTests/get" => Some(TickAction::Get),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct TickControl {
    context_id: u32,
    counters: Rc<Counters>,
}

impl TickControl {
    pub fn new(context_id: u32, counters: Rc<Counters>) -> Self {
        Self { context_id, counters }
    }

    fn set_period(&self, host: &mut dyn Host, period: Duration) -> Outcome {
        if let Err(status) = host.set_tick_period(period) {
            log::error!(
                "[unit-tester:{}] failed to set tick period to {:?}: {:?}",
                self.context_id,
                period,
                status
            );
            return Outcome::Continue;
        }
        respond_ok(host, self.context_id, b"ok")
    }
}

impl StreamHandler for TickControl {
    fn on_request_headers(&mut self, host: &mut dyn Host) -> Outcome {
        let path = match host::request_path(host) {
            Ok(path) => path,
            Err(status) => {
                log::error!("[unit-tester:{}] failed to get :path: {:?}", self.context_id, status);
                return Outcome::Continue;
            }
        };

        match TickAction::from_path(&path) {
            Some(TickAction::Enable) => {
                log::info!(
                    "[unit-tester:{}] enabling tick every {:?}",
                    self.context_id,
                    TICK_PERIOD
                );
                self.set_period(host, TICK_PERIOD)
            }
            Some(TickAction::Disable) => {
                log::info!("[unit-tester:{}] disabling tick", self.context_id);
                self.set_period(host, Duration::ZERO)
            }
            Some(TickAction::Get) => {
                let ticks = self.counters.ticks();
                respond_ok(host, self.context_id, ticks.to_string().as_bytes())
            }
            None => Outcome::Continue,
        }
    }
}
