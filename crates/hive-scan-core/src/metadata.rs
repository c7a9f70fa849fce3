//! Table, partition and split metadata handed to a scan by the planner.
//!
//! Everything in this module is **pure data**: no storage IO and no
//! reader construction. The catalog collaborator is expected to build these
//! values (or decode them from persisted state) and lend them to a scan for
//! its whole duration.

pub mod split;
pub mod table;

pub use split::{
    AcidSplit, DatasetSplit, DeltaMeta, FileSplit, InputSplit, PartitionValue, SplitXattr,
};
pub use table::{PartitionId, PartitionOverride, Properties, TableDescriptor};
