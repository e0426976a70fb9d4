//! Per-stream execution state.
//!
//! A stream only ever suspends in two places: while its body is still
//! arriving, and while an upstream call it dispatched is in flight. Both are
//! expressed by returning [`Action::Pause`] to the host, which later resumes
//! the stream with the next body chunk or the call completion.

use proxy_wasm::types::Action;

use crate::config::HandlerType;
use crate::handlers::{Handler, Outcome};
use crate::host::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Running,
    PausedAwaitingBody,
    PausedAwaitingUpstream { token: u32 },
    /// Terminal. Later events are ignored.
    Completed,
}

#[derive(Debug)]
pub struct StreamContext {
    context_id: u32,
    handler: Handler,
    state: StreamState,
}

impl StreamContext {
    pub fn new(context_id: u32, handler: Handler) -> Self {
        Self {
            context_id,
            handler,
            state: StreamState::Running,
        }
    }

    pub fn context_id(&self) -> u32 {
        self.context_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn handler_type(&self) -> HandlerType {
        self.handler.handler_type()
    }

    pub fn on_request_headers(&mut self, host: &mut dyn Host) -> Action {
        if let Some(action) = self.suspended_action() {
            return action;
        }
        let outcome = self.handler.as_stream_handler().on_request_headers(host);
        self.apply(outcome)
    }

    pub fn on_request_body(
        &mut self,
        host: &mut dyn Host,
        body_size: usize,
        end_of_stream: bool,
    ) -> Action {
        if let Some(action) = self.suspended_action() {
            return action;
        }
        let outcome = self
            .handler
            .as_stream_handler()
            .on_request_body(host, body_size, end_of_stream);
        self.apply(outcome)
    }

    pub fn on_response_headers(&mut self, host: &mut dyn Host) -> Action {
        if let Some(action) = self.suspended_action() {
            return action;
        }
        let outcome = self.handler.as_stream_handler().on_response_headers(host);
        self.apply(outcome)
    }

    pub fn on_response_body(
        &mut self,
        host: &mut dyn Host,
        body_size: usize,
        end_of_stream: bool,
    ) -> Action {
        if let Some(action) = self.suspended_action() {
            return action;
        }
        let outcome = self
            .handler
            .as_stream_handler()
            .on_response_body(host, body_size, end_of_stream);
        self.apply(outcome)
    }

    /// Completion of an upstream call. Runs at most once per dispatched
    /// call; anything that does not match the outstanding token is dropped.
    pub fn on_upstream_call_complete(
        &mut self,
        host: &mut dyn Host,
        token: u32,
        num_headers: usize,
        body_size: usize,
        num_trailers: usize,
    ) {
        match self.state {
            StreamState::PausedAwaitingUpstream { token: pending } if pending == token => {}
            state => {
                log::warn!(
                    "[unit-tester:{}] ignoring completion of call {} in state {:?}",
                    self.context_id,
                    token,
                    state
                );
                return;
            }
        }

        log::debug!(
            "[unit-tester:{}] call {} completed: {} headers, {} body bytes",
            self.context_id,
            token,
            num_headers,
            body_size
        );
        self.state = StreamState::Completed;
        self.handler
            .as_stream_handler()
            .on_upstream_response(host, num_headers, body_size, num_trailers);
    }

    /// Action for events that arrive while the stream must not progress.
    fn suspended_action(&self) -> Option<Action> {
        match self.state {
            StreamState::Running | StreamState::PausedAwaitingBody => None,
            StreamState::PausedAwaitingUpstream { .. } => Some(Action::Pause),
            StreamState::Completed => Some(Action::Continue),
        }
    }

    fn apply(&mut self, outcome: Outcome) -> Action {
        let (state, action) = match outcome {
            Outcome::Continue => (StreamState::Running, Action::Continue),
            Outcome::AwaitBody => (StreamState::PausedAwaitingBody, Action::Pause),
            Outcome::AwaitUpstream(token) => {
                (StreamState::PausedAwaitingUpstream { token }, Action::Pause)
            }
            Outcome::Responded => (StreamState::Completed, Action::Pause),
            Outcome::Done => (StreamState::Completed, Action::Continue),
        };
        self.state = state;
        action
    }
}
