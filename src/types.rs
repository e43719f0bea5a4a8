//! Types shared across the crate.

use std::error::Error as StdError;

/// A boxed, thread-safe error returned by remote calls.
///
/// Errors raised by the AWS SDK keep their concrete type inside the box, so
/// callers can `downcast_ref` to the specific `SdkError` when they need to.
pub type BoxError = Box<dyn StdError + Send + Sync>;
