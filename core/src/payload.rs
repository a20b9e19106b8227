//! Request bodies as an explicit variant chosen by the caller.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;

/// A request body.
///
/// `Bytes` and `Text` are sent verbatim (a string is not JSON-quoted);
/// `Json` is serialized on dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
    Json(Value),
}

impl Payload {
    /// Converts any serializable value into a `Json` payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(DispatchError::Marshal)
    }

    /// The exact bytes that go on the wire.
    pub fn marshal(&self) -> Result<Bytes, DispatchError> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Payload::Json(value) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(DispatchError::Marshal),
        }
    }
}

/// No payload means no body.
pub fn marshal(payload: Option<&Payload>) -> Result<Option<Bytes>, DispatchError> {
    payload.map(Payload::marshal).transpose()
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}
