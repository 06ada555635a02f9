//! Serialization strategies for cached artifacts.
//!
//! A [`Codec`] turns a computed value into bytes on disk and back. Decoding
//! may yield `Ok(None)` for an artifact that exists but holds nothing usable
//! (JSON `null`, an empty file, whitespace-only markup); the cache treats
//! that exactly like a miss.

use super::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub trait Codec: Send + Sync {
    type Value;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CacheError>;

    fn decode(&self, bytes: &[u8]) -> Result<Option<Self::Value>, CacheError>;
}

/// Structured data stored as pretty-printed JSON.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Codec for JsonCodec<T> {
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<T>, CacheError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Opaque byte payloads, e.g. downloaded images.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CacheError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }
}

/// Markup documents stored as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCodec;

impl Codec for HtmlCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Vec<u8>, CacheError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<String>, CacheError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| CacheError::Build(format!("cached document is not UTF-8: {e}")))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

/// Rebuilds a domain record from its plain JSON form.
pub trait Builder<T>: Send + Sync {
    fn build(&self, value: &serde_json::Value) -> Result<T, CacheError>;
}

impl<T, F> Builder<T> for F
where
    F: Fn(&serde_json::Value) -> Result<T, serde_json::Error> + Send + Sync,
{
    fn build(&self, value: &serde_json::Value) -> Result<T, CacheError> {
        self(value).map_err(CacheError::Json)
    }
}

/// A cached value that is either one record or an ordered sequence of them.
///
/// Mappings on disk come back as [`Records::One`], arrays as
/// [`Records::Many`] with the builder applied to each element.
#[derive(Debug, Clone, PartialEq)]
pub enum Records<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Records<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(records) => records,
        }
    }
}

/// Domain records stored as plain JSON and rebuilt through a [`Builder`].
pub struct BuilderCodec<T> {
    builder: Arc<dyn Builder<T>>,
}

impl<T> BuilderCodec<T> {
    pub fn new(builder: Arc<dyn Builder<T>>) -> Self {
        Self { builder }
    }

    /// Fails at construction time when no builder is supplied, so a
    /// misconfigured cache never gets as far as its first read.
    pub fn require(label: &str, builder: Option<Arc<dyn Builder<T>>>) -> Result<Self, CacheError> {
        builder
            .map(Self::new)
            .ok_or_else(|| CacheError::MissingBuilder(label.to_string()))
    }
}

impl<T> fmt::Debug for BuilderCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderCodec").finish_non_exhaustive()
    }
}

impl<T: Serialize> Codec for BuilderCodec<T> {
    type Value = Records<T>;

    fn encode(&self, value: &Records<T>) -> Result<Vec<u8>, CacheError> {
        let plain = match value {
            Records::One(record) => serde_json::to_value(record)?,
            Records::Many(records) => serde_json::Value::Array(
                records
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(serde_json::to_vec_pretty(&plain)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<Records<T>>, CacheError> {
        let plain: serde_json::Value = serde_json::from_slice(bytes)?;
        match plain {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Array(items) => {
                let records = items
                    .iter()
                    .map(|item| self.builder.build(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Records::Many(records)))
            }
            other => Ok(Some(Records::One(self.builder.build(&other)?))),
        }
    }
}
