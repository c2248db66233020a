//! Library side of the `deid` command: logging setup, job manifests and
//! the manifest-level check and run operations.

pub mod logging;
pub mod manifest;
pub mod pipeline;
