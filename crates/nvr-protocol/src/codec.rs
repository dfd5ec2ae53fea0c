//! Tokio codec for msgpack-rpc messages
//!
//! msgpack values are self-delimiting, so there is no frame header: the
//! decoder attempts to read one complete value from the front of the buffer
//! and asks for more bytes when the value is truncated.

use std::io::{self, Cursor};

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::Message;

/// Maximum number of buffered bytes tolerated for a single incomplete message (16MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Codec for encoding/decoding msgpack-rpc messages
#[derive(Debug, Default)]
pub struct MessageCodec {
    _private: (),
}

impl MessageCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let decoded = {
            let mut cursor = Cursor::new(&src[..]);
            match rmpv::decode::read_value(&mut cursor) {
                Ok(value) => Ok((value, cursor.position() as usize)),
                Err(e) => Err(e),
            }
        };

        match decoded {
            Ok((value, consumed)) => {
                src.advance(consumed);
                tracing::trace!(bytes = consumed, "decoded msgpack-rpc message");
                Message::from_value(value).map(Some)
            }
            Err(e) if is_incomplete(&e) => {
                if src.len() > MAX_MESSAGE_SIZE {
                    return Err(ProtocolError::MessageTooLarge {
                        size: src.len(),
                        max: MAX_MESSAGE_SIZE,
                    });
                }
                // Need more data
                Ok(None)
            }
            Err(e) => Err(ProtocolError::Decode(e.to_string())),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let value = message.into_value();

        let mut payload = Vec::new();
        rmpv::encode::write_value(&mut payload, &value)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// A truncated value surfaces as an EOF while reading a marker or its data
fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e) => {
            e.kind() == io::ErrorKind::UnexpectedEof
        }
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    #[test]
    fn test_codec_request() {
        let mut codec = MessageCodec::new();

        let message = Message::request(1, "nvim_eval", vec![Value::from("getline(1)")]);

        let mut buf = BytesMut::new();
        codec.encode(message.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = MessageCodec::new();

        let message = Message::notification("BufDelete", vec![Value::from(4)]);

        let mut full_buf = BytesMut::new();
        codec.encode(message, &mut full_buf).unwrap();

        // Split the buffer to simulate partial read
        let mut partial = full_buf.split_to(full_buf.len() - 2);

        // Should return None (need more data)
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Add the rest
        partial.extend_from_slice(&full_buf);

        // Now it should decode
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        if let Message::Notification { method, params } = decoded {
            assert_eq!(method, "BufDelete");
            assert_eq!(params, vec![Value::from(4)]);
        } else {
            panic!("Expected Notification message");
        }
    }

    #[test]
    fn test_codec_back_to_back_messages() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Message::notification("first", vec![]), &mut buf)
            .unwrap();
        codec
            .encode(
                Message::Response {
                    id: 2,
                    result: Ok(Value::from("abc")),
                },
                &mut buf,
            )
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Message::notification("first", vec![]));
        assert!(matches!(second, Message::Response { id: 2, result: Ok(_) }));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_rejects_scalar_message() {
        let mut codec = MessageCodec::new();

        let mut raw = Vec::new();
        rmpv::encode::write_value(&mut raw, &Value::from(42)).unwrap();
        let mut buf = BytesMut::from(&raw[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_framed_read_byte_by_byte() {
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;
        use tokio_util::codec::FramedRead;

        let message = Message::request(7, "nvim_command", vec![Value::from("edit a.txt")]);
        let mut bytes = BytesMut::new();
        MessageCodec::new()
            .encode(message.clone(), &mut bytes)
            .unwrap();

        // One byte of pipe capacity forces a decode attempt per byte
        let (mut tx, rx) = tokio::io::duplex(1);
        let writer = tokio::spawn(async move {
            for byte in bytes.iter() {
                tx.write_all(&[*byte]).await.unwrap();
            }
        });

        let mut frames = FramedRead::new(rx, MessageCodec::new());
        assert_eq!(frames.next().await.unwrap().unwrap(), message);

        writer.await.unwrap();
        assert!(frames.next().await.is_none());
    }
}
