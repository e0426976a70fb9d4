//! `headerTests`: stamps every request and response with a per-instance
//! request number.

use std::rc::Rc;

use crate::counters::Counters;
use crate::host::Host;

use super::{Outcome, StreamHandler};

pub const REQUEST_COUNTER_HEADER: &str = "x-request-counter";
pub const RESPONSE_COUNTER_HEADER: &str = "x-response-counter";

#[derive(Debug)]
pub struct HeaderCounter {
    context_id: u32,
    counters: Rc<Counters>,
    /// Set once on request headers; later streams never change it.
    counter: Option<u64>,
}

impl HeaderCounter {
    pub fn new(context_id: u32, counters: Rc<Counters>) -> Self {
        Self {
            context_id,
            counters,
            counter: None,
        }
    }

    pub fn counter(&self) -> Option<u64> {
        self.counter
    }
}

impl StreamHandler for HeaderCounter {
    fn on_request_headers(&mut self, host: &mut dyn Host) -> Outcome {
        let counter = match self.counter {
            Some(counter) => counter,
            None => {
                let counter = self.counters.next_request();
                self.counter = Some(counter);
                counter
            }
        };

        let value = counter.to_string();
        if let Err(status) = host.add_http_request_header(REQUEST_COUNTER_HEADER, &value) {
            log::error!(
                "[unit-tester:{}] failed to set request counter header: {:?}",
                self.context_id,
                status
            );
        }
        Outcome::Continue
    }

    fn on_response_headers(&mut self, host: &mut dyn Host) -> Outcome {
        let Some(counter) = self.counter else {
            log::warn!("[unit-tester:{}] response headers before request headers", self.context_id);
            return Outcome::Done;
        };

        let value = counter.to_string();
        if let Err(status) = host.add_http_response_header(RESPONSE_COUNTER_HEADER, &value) {
            log::error!(
                "[unit-tester:{}] failed to set response counter header: {:?}",
                self.context_id,
                status
            );
        }
        Outcome::Done
    }
}
