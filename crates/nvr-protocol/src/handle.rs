//! Remote object handles
//!
//! Neovim returns buffers, windows and tabpages as msgpack EXT values whose
//! payload is itself a msgpack-encoded integer handle.

use rmpv::Value;
use std::fmt;

/// EXT type code Neovim uses for buffer handles
pub const BUFFER_EXT_TYPE: i8 = 0;

/// Handle of a remote buffer (equal to its `bufnr()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub i64);

impl BufferId {
    /// Create a new buffer id
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw handle value
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Decode a buffer handle from an EXT value or a plain integer
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ext(BUFFER_EXT_TYPE, data) => {
                let mut bytes = &data[..];
                rmpv::decode::read_value(&mut bytes)
                    .ok()
                    .and_then(|inner| inner.as_i64())
                    .map(Self)
            }
            other => other.as_i64().map(Self),
        }
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

impl From<i64> for BufferId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
