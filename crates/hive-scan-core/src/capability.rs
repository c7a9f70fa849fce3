//! Native capability checks for accelerated decoding paths.
//!
//! Zero-copy ORC decoding needs the Hadoop native library plus native Snappy
//! and Zlib codecs. Which of them are available is an environment-wide fact,
//! captured once in [`NativeCapabilities`] and consulted by [`validate`].
//! A missing capability is a configuration error; it never causes a silent
//! fallback to a slower reader.

use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{config::JobConf, formats::ReaderStrategy};

/// One native capability a strategy may depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeCapability {
    /// The Hadoop native code library.
    NativeCode,
    /// Native Snappy codec.
    Snappy,
    /// Native Zlib codec.
    Zlib,
}

impl fmt::Display for NativeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeCapability::NativeCode => f.write_str("Hadoop"),
            NativeCapability::Snappy => f.write_str("Snappy"),
            NativeCapability::Zlib => f.write_str("Zlib"),
        }
    }
}

/// Native capabilities available to the process.
///
/// JSON layout example: `{"native_code": true, "snappy": false, "zlib": true}`
/// (absent fields default to loaded).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeCapabilities {
    /// Hadoop native code is loaded.
    pub native_code: bool,
    /// Native Snappy is loaded.
    pub snappy: bool,
    /// Native Zlib is loaded.
    pub zlib: bool,
}

impl Default for NativeCapabilities {
    fn default() -> Self {
        NativeCapabilities::all_loaded()
    }
}

impl NativeCapabilities {
    /// Every capability present.
    pub fn all_loaded() -> Self {
        NativeCapabilities {
            native_code: true,
            snappy: true,
            zlib: true,
        }
    }

    /// No capability present.
    pub fn none_loaded() -> Self {
        NativeCapabilities {
            native_code: false,
            snappy: false,
            zlib: false,
        }
    }

    /// Builder-style override of a single capability.
    pub fn with(mut self, capability: NativeCapability, loaded: bool) -> Self {
        match capability {
            NativeCapability::NativeCode => self.native_code = loaded,
            NativeCapability::Snappy => self.snappy = loaded,
            NativeCapability::Zlib => self.zlib = loaded,
        }
        self
    }

    /// Whether `capability` is loaded.
    pub fn is_loaded(&self, capability: NativeCapability) -> bool {
        match capability {
            NativeCapability::NativeCode => self.native_code,
            NativeCapability::Snappy => self.snappy,
            NativeCapability::Zlib => self.zlib,
        }
    }

    /// First missing capability in check order (native code, Snappy, Zlib).
    pub fn first_missing(&self) -> Option<NativeCapability> {
        [
            NativeCapability::NativeCode,
            NativeCapability::Snappy,
            NativeCapability::Zlib,
        ]
        .into_iter()
        .find(|c| !self.is_loaded(*c))
    }
}

/// A strategy's native prerequisite is not available.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CapabilityError {
    /// Required native library is not loaded.
    #[snafu(display("{capability} native library is required for Hive ORC data, but is not loaded"))]
    NotLoaded {
        /// The capability that is missing.
        capability: NativeCapability,
    },
}

impl CapabilityError {
    /// The missing capability.
    pub fn capability(&self) -> NativeCapability {
        match self {
            CapabilityError::NotLoaded { capability } => *capability,
        }
    }
}

/// Check the native prerequisites of `strategy`.
///
/// Only the native ORC strategy has prerequisites, and only when the job
/// configuration asks for zero-copy decoding.
pub fn validate(
    strategy: ReaderStrategy,
    job_conf: &JobConf,
    capabilities: &NativeCapabilities,
) -> Result<(), CapabilityError> {
    if strategy != ReaderStrategy::ColumnarNative || !job_conf.orc_zero_copy_requested() {
        return Ok(());
    }

    match capabilities.first_missing() {
        Some(capability) => NotLoadedSnafu { capability }.fail(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ORC_ZEROCOPY_KEY;

    fn zero_copy() -> JobConf {
        JobConf::new().with(ORC_ZEROCOPY_KEY, "true")
    }

    #[test]
    fn missing_capability_is_ignored_without_zero_copy() {
        let caps = NativeCapabilities::none_loaded();
        assert_eq!(
            validate(ReaderStrategy::ColumnarNative, &JobConf::new(), &caps),
            Ok(())
        );
    }

    #[test]
    fn other_strategies_have_no_prerequisites() {
        let caps = NativeCapabilities::none_loaded();
        for strategy in ReaderStrategy::ALL {
            if strategy == ReaderStrategy::ColumnarNative {
                continue;
            }
            assert_eq!(validate(strategy, &zero_copy(), &caps), Ok(()));
        }
    }

    #[test]
    fn each_missing_capability_is_named() {
        for capability in [
            NativeCapability::NativeCode,
            NativeCapability::Snappy,
            NativeCapability::Zlib,
        ] {
            let caps = NativeCapabilities::all_loaded().with(capability, false);
            let err = validate(ReaderStrategy::ColumnarNative, &zero_copy(), &caps)
                .expect_err("missing capability must fail");
            assert_eq!(err.capability(), capability);
        }
    }

    #[test]
    fn native_code_is_reported_before_codecs() {
        let caps = NativeCapabilities::none_loaded();
        let err = validate(ReaderStrategy::ColumnarNative, &zero_copy(), &caps)
            .expect_err("nothing is loaded");
        assert_eq!(
            err.to_string(),
            "Hadoop native library is required for Hive ORC data, but is not loaded"
        );
    }

    #[test]
    fn capabilities_default_to_loaded_when_omitted() -> Result<(), serde_json::Error> {
        let caps: NativeCapabilities = serde_json::from_str(r#"{"snappy": false}"#)?;
        assert_eq!(caps.first_missing(), Some(NativeCapability::Snappy));
        Ok(())
    }
}
