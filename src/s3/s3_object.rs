use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised when a `bucket/key` locator can not be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("got no copy source")]
    MissingSource,
    #[error("locator {0:?} must be of the form bucket/key")]
    Malformed(String),
    #[error("destination bucket and key must not be empty, got {0:?}")]
    EmptyDestination(String),
}

/// A bucket key pair for a S3Object, with conversion from `bucket/key`
/// locators and S3 urls.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct S3Object {
    /// The bucket the object is in.
    pub bucket: String,
    /// The key the in the bucket for the object.
    pub key: String,
}

impl S3Object {
    /// Create a new [S3Object] using anything which can be
    /// treated as [&str].  Any leading `/` will be trimmed from
    /// the key.  No validation is done against the bucket or key
    /// to ensure they meet the AWS requirements.
    pub fn new(bucket: impl AsRef<str>, key: impl AsRef<str>) -> Self {
        S3Object {
            bucket: bucket.as_ref().to_owned(),
            key: key.as_ref().trim_start_matches('/').to_owned(),
        }
    }

    /// Parse a `bucket/key` locator, splitting on the first `/`.
    ///
    /// The key is kept verbatim, so `bucket/a/b` has the key `a/b`.
    ///
    /// ```
    /// use cobalt_s3cp::s3::S3Object;
    ///
    /// let object = S3Object::from_locator("my-bucket/path/to/key").unwrap();
    /// assert_eq!(object, S3Object::new("my-bucket", "path/to/key"));
    /// ```
    pub fn from_locator(locator: &str) -> Result<Self, LocatorError> {
        match locator.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(S3Object {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            }),
            _ => Err(LocatorError::Malformed(locator.to_owned())),
        }
    }

    /// The `bucket/key` form used as the `CopySource` of copy requests.
    pub fn copy_source(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }

    /// Check that the object can be written to.
    pub(crate) fn validate_destination(&self) -> Result<(), LocatorError> {
        if self.bucket.is_empty() || self.key.is_empty() {
            Err(LocatorError::EmptyDestination(self.copy_source()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for S3Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Convert from an [Url] into a [S3Object]. The scheme
/// must be `s3` and the `path` must not be empty.
impl TryFrom<Url> for S3Object {
    type Error = Error;

    fn try_from(value: Url) -> Result<Self, Self::Error> {
        if value.scheme() != "s3" {
            bail!("S3 URL must have a scheme of s3")
        }
        let bucket = value.host_str().context("S3 URL must have host")?;
        let key = value.path().trim_start_matches('/');

        if key.is_empty() {
            bail!("S3 URL must have a path")
        }
        Ok(S3Object::new(bucket, key))
    }
}

/// Parse either an `s3://bucket/key` URL or a plain `bucket/key` locator.
impl FromStr for S3Object {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.starts_with("s3://") {
            value.parse::<Url>()?.try_into()
        } else {
            Ok(S3Object::from_locator(value)?)
        }
    }
}

/// Converts from a [S3Object] into a [Url].
/// If the [S3Object] holds an invalid path or
/// domain the conversion will fail.
impl TryFrom<&S3Object> for Url {
    type Error = url::ParseError;
    fn try_from(obj: &S3Object) -> std::result::Result<Self, Self::Error> {
        Url::parse(&obj.to_string())
    }
}
