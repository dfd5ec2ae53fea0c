//! Message types for the msgpack-rpc protocol
//!
//! Every message on the wire is a msgpack array whose first element is a
//! type tag:
//!
//! - Request: `[0, msgid, method, params]`
//! - Response: `[1, msgid, error, result]`
//! - Notification: `[2, method, params]`
//!
//! # Message Flow
//!
//! 1. Client sends a `Request` and remembers its `msgid`
//! 2. Neovim answers with a `Response` carrying the same `msgid`; exactly one
//!    of `error`/`result` is non-nil
//! 3. At any point Neovim may push a `Notification` (for example one raised
//!    by `rpcnotify()` inside an autocommand)

use rmpv::Value;

use crate::error::ProtocolError;

/// Message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Method call expecting a response
    Request = 0x00,
    /// Answer to a request
    Response = 0x01,
    /// One-way event
    Notification = 0x02,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Response),
            0x02 => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Method call
    Request {
        /// Correlation id echoed back in the response
        id: u32,
        /// Remote method name (e.g. `nvim_command`)
        method: String,
        /// Positional arguments
        params: Vec<Value>,
    },

    /// Method result
    Response {
        /// Id of the request this answers
        id: u32,
        /// `Ok(result)` or `Err(error payload)`
        result: Result<Value, Value>,
    },

    /// Event pushed without a correlation id
    Notification {
        /// Event name
        method: String,
        /// Event arguments
        params: Vec<Value>,
    },
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Request { .. } => MessageType::Request,
            Message::Response { .. } => MessageType::Response,
            Message::Notification { .. } => MessageType::Notification,
        }
    }

    /// Build a request message
    pub fn request(id: u32, method: impl Into<String>, params: Vec<Value>) -> Self {
        Message::Request {
            id,
            method: method.into(),
            params,
        }
    }

    /// Build a notification message
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }

    /// Convert into the msgpack array representation
    pub fn into_value(self) -> Value {
        let tag = Value::from(self.message_type().as_u8());
        match self {
            Message::Request { id, method, params } => Value::Array(vec![
                tag,
                Value::from(id),
                Value::from(method),
                Value::Array(params),
            ]),
            Message::Response { id, result } => {
                let (error, result) = match result {
                    Ok(value) => (Value::Nil, value),
                    Err(error) => (error, Value::Nil),
                };
                Value::Array(vec![tag, Value::from(id), error, result])
            }
            Message::Notification { method, params } => {
                Value::Array(vec![tag, Value::from(method), Value::Array(params)])
            }
        }
    }

    /// Parse a decoded msgpack value into a message
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "expected array, got {}",
                    other
                )))
            }
        };

        let mut items = items.into_iter();
        let tag = items
            .next()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ProtocolError::InvalidMessage("missing type tag".into()))?;
        let message_type = u8::try_from(tag)
            .ok()
            .and_then(MessageType::from_u8)
            .ok_or(ProtocolError::UnknownMessageType(tag))?;

        match message_type {
            MessageType::Request => {
                let id = take_id(items.next())?;
                let method = take_method(items.next())?;
                let params = take_params(items.next())?;
                Ok(Message::Request { id, method, params })
            }
            MessageType::Response => {
                let id = take_id(items.next())?;
                let error = items.next().unwrap_or(Value::Nil);
                let result = items.next().unwrap_or(Value::Nil);
                let result = if error.is_nil() { Ok(result) } else { Err(error) };
                Ok(Message::Response { id, result })
            }
            MessageType::Notification => {
                let method = take_method(items.next())?;
                let params = take_params(items.next())?;
                Ok(Message::Notification { method, params })
            }
        }
    }
}

fn take_id(value: Option<Value>) -> Result<u32, ProtocolError> {
    value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| ProtocolError::InvalidMessage("missing or invalid msgid".into()))
}

fn take_method(value: Option<Value>) -> Result<String, ProtocolError> {
    match value {
        Some(Value::String(s)) => s
            .into_str()
            .ok_or_else(|| ProtocolError::InvalidMessage("method name is not utf-8".into())),
        _ => Err(ProtocolError::InvalidMessage("missing method name".into())),
    }
}

fn take_params(value: Option<Value>) -> Result<Vec<Value>, ProtocolError> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        // Tolerate peers that omit params entirely
        None | Some(Value::Nil) => Ok(Vec::new()),
        Some(other) => Err(ProtocolError::InvalidMessage(format!(
            "params must be an array, got {}",
            other
        ))),
    }
}
