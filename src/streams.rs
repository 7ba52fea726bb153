//! One alarm engine per stream
//!
//! Hosts that process several video streams (or workflow executions) keep
//! an exclusive [`AlarmEngine`] per stream id. Engines are built lazily from
//! a shared [`AlarmConfig`] the first time a stream is seen. The map sits
//! behind a single mutex, which also serializes ticks on the same stream.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use crate::config::AlarmConfig;
use crate::engine::{AlarmEngine, AlarmResult, AlarmSettings, AlarmState};
use crate::error::Result;
use crate::params::Params;

/// Keyed collection of per-stream engines sharing one definition
pub struct AlarmStreams {
    config: AlarmConfig,
    settings: AlarmSettings,
    engines: Mutex<HashMap<String, AlarmEngine>>,
}

impl AlarmStreams {
    /// Validate `config` and start with no streams
    pub fn new(config: AlarmConfig) -> Result<Self> {
        let settings = config.settings()?;
        // Surface condition errors now rather than on the first tick
        config.build_engine()?;

        Ok(Self {
            config,
            settings,
            engines: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    /// Evaluate one tick for `stream_id` at the current instant
    pub fn evaluate(&self, stream_id: &str, params: &Params) -> Result<AlarmResult> {
        self.evaluate_at(stream_id, params, Instant::now())
    }

    /// Evaluate one tick for `stream_id` at `now`
    pub fn evaluate_at(
        &self,
        stream_id: &str,
        params: &Params,
        now: Instant,
    ) -> Result<AlarmResult> {
        let mut engines = self.engines.lock();

        let engine = match engines.entry(stream_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("Alarm '{}': new stream '{}'", self.config.name, stream_id);
                entry.insert(self.config.build_engine()?)
            }
        };

        engine.evaluate_at(params, &self.settings, now)
    }

    /// Current state of a stream, if it has been seen
    pub fn state(&self, stream_id: &str) -> Option<AlarmState> {
        self.engines.lock().get(stream_id).map(|e| e.state())
    }

    /// Fire count of a stream, if it has been seen
    pub fn fire_count(&self, stream_id: &str) -> Option<u64> {
        self.engines.lock().get(stream_id).map(|e| e.fire_count())
    }

    /// Reset a stream's engine; returns false for unknown streams
    pub fn reset(&self, stream_id: &str) -> bool {
        match self.engines.lock().get_mut(stream_id) {
            Some(engine) => {
                engine.reset();
                true
            }
            None => false,
        }
    }

    /// Drop a stream's engine when the stream ends
    pub fn remove(&self, stream_id: &str) -> bool {
        self.engines.lock().remove(stream_id).is_some()
    }

    /// Ids of all live streams
    pub fn stream_ids(&self) -> Vec<String> {
        self.engines.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().is_empty()
    }
}
