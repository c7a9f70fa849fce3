//! Reader strategy resolution.
//!
//! [`StrategyResolver::resolve`] is a pure function of its inputs plus the
//! registry and capability flags it was built with. Rules, first match wins:
//!
//! 1. no input format → [`ReaderStrategy::Default`];
//! 2. format not in the registry → [`ReaderStrategy::Default`];
//! 3. [`ReaderStrategy::ColumnarNative`] → native prerequisites are checked
//!    (fatal on failure), then upgraded to
//!    [`ReaderStrategy::ColumnarVectorized`] iff vectorization is enabled,
//!    the layout has not drifted and no transactional deltas are pending;
//! 4. any other mapped strategy is returned unchanged.
//!
//! Every call is counted so callers (and tests) can observe how often the
//! pipeline resolves per split.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    capability::{self, CapabilityError, NativeCapabilities},
    config::JobConf,
    formats::{FormatRegistry, ReaderStrategy},
};

/// Picks the reader strategy for a given format and split state.
#[derive(Debug)]
pub struct StrategyResolver {
    registry: FormatRegistry,
    capabilities: NativeCapabilities,
    calls: AtomicU64,
}

impl StrategyResolver {
    /// Resolver over `registry` with the process' native `capabilities`.
    pub fn new(registry: FormatRegistry, capabilities: NativeCapabilities) -> Self {
        StrategyResolver {
            registry,
            capabilities,
            calls: AtomicU64::new(0),
        }
    }

    /// The registry consulted by [`StrategyResolver::resolve`].
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// The native capabilities consulted for zero-copy ORC.
    pub fn capabilities(&self) -> &NativeCapabilities {
        &self.capabilities
    }

    /// Resolve the strategy for one split.
    ///
    /// `format` is the input format class name of the table or partition;
    /// `schema_drifted` is whether the partition layout differs from the
    /// table layout (always `false` at table level).
    pub fn resolve(
        &self,
        format: Option<&str>,
        vectorization_enabled: bool,
        schema_drifted: bool,
        is_transactional: bool,
        has_pending_deltas: bool,
        job_conf: &JobConf,
    ) -> Result<ReaderStrategy, CapabilityError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let Some(format) = format else {
            return Ok(ReaderStrategy::Default);
        };
        let Some(strategy) = self.registry.lookup(format) else {
            return Ok(ReaderStrategy::Default);
        };

        match strategy {
            ReaderStrategy::ColumnarNative => {
                capability::validate(strategy, job_conf, &self.capabilities)?;
                let merge_required = is_transactional && has_pending_deltas;
                if vectorization_enabled && !schema_drifted && !merge_required {
                    Ok(ReaderStrategy::ColumnarVectorized)
                } else {
                    Ok(ReaderStrategy::ColumnarNative)
                }
            }
            other => Ok(other),
        }
    }

    /// Number of [`StrategyResolver::resolve`] invocations so far.
    pub fn resolve_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for StrategyResolver {
    fn default() -> Self {
        StrategyResolver::new(FormatRegistry::hive_defaults(), NativeCapabilities::all_loaded())
    }
}
