//! Reader resolution for Hive table scans.
//!
//! This crate decides, per split, which record-decoding strategy a Hive scan
//! uses and builds the corresponding reader:
//!
//! - [`formats`] maps input format classes to [`formats::ReaderStrategy`];
//! - [`capability`] checks native prerequisites of accelerated strategies;
//! - [`acid`] detects pending transactional deltas;
//! - [`resolver`] combines these into one strategy per split;
//! - [`scan`] runs the lazy per-split pipeline (parse, derive, check deltas,
//!   resolve, construct, wrap) and owns reader release;
//! - [`layout`] and [`serialization`] derive object layouts from SerDe
//!   properties;
//! - [`composite`] appends partition-value columns to reader output.
//!
//! Format decoders themselves are supplied by the host through
//! [`reader::StrategyConstructors`].
#![deny(missing_docs)]

pub mod acid;
pub mod capability;
pub mod composite;
pub mod config;
pub mod formats;
pub mod layout;
pub mod metadata;
pub mod reader;
pub mod resolver;
pub mod scan;
pub mod serialization;
pub mod storage;

pub use capability::{CapabilityError, NativeCapabilities, NativeCapability};
pub use config::{JobConf, ScanOptions};
pub use formats::{FormatRegistry, ReaderStrategy};
pub use reader::{RecordReader, StrategyConstructors};
pub use resolver::StrategyResolver;
pub use scan::{HiveScanner, ScanError, ScanReaders};
