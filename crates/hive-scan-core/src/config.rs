//! Scan configuration: job-level key/value settings and engine options.
//!
//! [`JobConf`] mirrors the Hadoop job configuration the format decoders
//! receive. A scan builds one base configuration (engine settings plus table
//! properties) and every split works on its own clone of it, so split-level
//! mutation (partition properties, input format) never leaks into sibling
//! splits.
//!
//! [`ScanOptions`] carries engine-level switches that are not part of the
//! Hadoop configuration, such as whether vectorized ORC decoding is allowed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metadata::Properties;

/// Key recording the input format class of the split being read.
pub const INPUT_FORMAT_KEY: &str = "mapred.input.format.class";

/// Table property marking a table as transactional.
pub const TRANSACTIONAL_KEY: &str = "transactional";

/// ORC zero-copy read switch.
pub const ORC_ZEROCOPY_KEY: &str = "orc.use.zerocopy";

/// Legacy Hive name of [`ORC_ZEROCOPY_KEY`].
pub const ORC_ZEROCOPY_LEGACY_KEY: &str = "hive.exec.orc.zerocopy";

/// Engine option name for vectorized ORC decoding.
pub const ORC_VECTORIZE_OPTION: &str = "store.hive.orc.vectorize";

/// Job-level configuration handed to reader constructors.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct JobConf {
    entries: BTreeMap<String, String>,
}

impl JobConf {
    /// Create an empty configuration.
    pub fn new() -> Self {
        JobConf::default()
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style [`JobConf::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Copy every property into the configuration, replacing existing keys.
    pub fn add_properties(&mut self, properties: &Properties) {
        self.entries
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Boolean value for `key` using Hadoop rules: surrounding whitespace is
    /// ignored and only `true` / `false` (any case) are recognized.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let raw = self.get(key)?.trim();
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    /// Input format recorded for the split, if any.
    pub fn input_format(&self) -> Option<&str> {
        self.get(INPUT_FORMAT_KEY)
    }

    /// Record the input format the split is read with.
    pub fn set_input_format(&mut self, format: impl Into<String>) {
        self.set(INPUT_FORMAT_KEY, format);
    }

    /// Whether the table properties folded into this configuration mark the
    /// table as transactional.
    ///
    /// Both `transactional` and its upper-case spelling are honoured; the
    /// value comparison is case-insensitive.
    pub fn is_transactional_table(&self) -> bool {
        self.get(TRANSACTIONAL_KEY)
            .or_else(|| self.get(&TRANSACTIONAL_KEY.to_ascii_uppercase()))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Whether ORC zero-copy decoding is requested (defaults to `false`).
    ///
    /// The first key present wins, even when its value is not a boolean;
    /// anything other than `true` then reads as `false`.
    pub fn orc_zero_copy_requested(&self) -> bool {
        self.get(ORC_ZEROCOPY_KEY)
            .or_else(|| self.get(ORC_ZEROCOPY_LEGACY_KEY))
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobConf {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        JobConf {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Engine options visible to a scan through its operator context.
///
/// JSON layout example: `{"store.hive.orc.vectorize": false}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanOptions {
    /// Allow upgrading ORC reads to the vectorized decoder.
    #[serde(rename = "store.hive.orc.vectorize")]
    pub vectorize_orc: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            vectorize_orc: true,
        }
    }
}

impl ScanOptions {
    /// Builder-style setter for [`ScanOptions::vectorize_orc`].
    pub fn with_vectorize_orc(mut self, enabled: bool) -> Self {
        self.vectorize_orc = enabled;
        self
    }
}
