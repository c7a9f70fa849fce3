use std::path::PathBuf;

use hive_scan_core::scan::SplitError;
use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Scan description not found or not readable: {}", path.display()))]
    ReadDescription {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "Invalid scan description {}: {source}. \
         Expected a JSON object with `table` and `splits`.",
        path.display()
    ))]
    ParseDescription {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to encode extended properties of split {split}: {source}"))]
    EncodeSplit {
        split: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to resolve split {split}: {source}"))]
    PlanSplit {
        split: String,
        #[snafu(source(from(SplitError, Box::new)))]
        source: Box<SplitError>,
    },

    #[snafu(display("Failed to render plan as JSON: {source}"))]
    RenderJson { source: serde_json::Error },
}
