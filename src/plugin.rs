//! Plugin instance: configuration, shared counters and the stream factory.

use std::rc::Rc;

use crate::config::{ConfigError, HandlerType, PluginConfig};
use crate::counters::Counters;
use crate::handlers::HandlerFactory;
use crate::stream::StreamContext;

#[derive(Debug, Default)]
pub struct PluginInstance {
    config: Option<PluginConfig>,
    factory: Option<HandlerFactory>,
    counters: Rc<Counters>,
}

impl PluginInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the configuration and selects the stream behavior.
    ///
    /// Without configuration the plugin starts but never creates streams.
    pub fn on_plugin_start(&mut self, configuration: Option<&[u8]>) -> Result<(), ConfigError> {
        let Some(config) = PluginConfig::parse(configuration)? else {
            log::info!("[unit-tester] no plugin configuration, no handler selected");
            return Ok(());
        };

        log::debug!("[unit-tester] using handlerType: {}", config.handler_type.as_str());
        self.factory = Some(config.handler_type.factory());
        self.config = Some(config);
        Ok(())
    }

    pub fn handler_type(&self) -> Option<HandlerType> {
        self.config.as_ref().map(|config| config.handler_type)
    }

    pub fn config(&self) -> Option<&PluginConfig> {
        self.config.as_ref()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Builds the context for a new stream, or `None` when no behavior was
    /// configured.
    pub fn new_stream(&self, context_id: u32) -> Option<StreamContext> {
        let (factory, config) = match (self.factory, self.config.as_ref()) {
            (Some(factory), Some(config)) => (factory, config),
            _ => return None,
        };
        Some(StreamContext::new(context_id, factory(context_id, config, &self.counters)))
    }

    /// Timer callback.
    pub fn on_tick(&self) {
        self.counters.tick();
    }
}
