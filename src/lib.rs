//! # Cobalt S3 copy
//!
//! Copy a single object between two S3 locations, in the same region or
//! across regions.
//!
//! Small objects are copied with one `CopyObject` request. Objects at least
//! as large as the configured part size are copied with a multipart upload,
//! its parts copied concurrently by a bounded pool of workers. The source can
//! be deleted once the copy has succeeded, which turns the copy into a move.
//!
//! See [s3::Copier] for the entry point, and the `s3cp` binary for a command
//! line front end.

// Public modules

pub mod config;
pub mod s3;
pub mod types;
// Internal shared modules
mod localstack;
