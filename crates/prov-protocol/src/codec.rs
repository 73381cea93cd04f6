use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{TransferMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding transfer protocol messages.
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &TransferMessage) -> ProtocolResult<Bytes> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32((payload.len() + 1) as u32);
        buf.put_u8(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(TransferMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = Self::frame_len([data[0], data[1], data[2], data[3]])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(&data[4..total])?;
        Ok((msg, total))
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &TransferMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<TransferMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Write one framed message.
    pub async fn write_frame<W>(writer: &mut W, msg: &TransferMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message. Returns `Ok(None)` on a clean end of stream
    /// between frames.
    pub async fn read_frame<R>(reader: &mut R) -> ProtocolResult<Option<TransferMessage>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = Self::frame_len(header)?;
        let mut body = BytesMut::zeroed(len);
        reader.read_exact(&mut body).await?;
        Self::decode_body(&body).map(Some)
    }

    fn frame_len(header: [u8; 4]) -> ProtocolResult<usize> {
        let len = u32::from_be_bytes(header) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(len)
    }

    /// `body` is `[tag][payload]`; the tag must agree with the payload.
    fn decode_body(body: &[u8]) -> ProtocolResult<TransferMessage> {
        let tag = body[0];
        let msg = Self::decode_payload(&body[1..])?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::message::*;
    use crate::wire_error::{ErrorCode, WireError};

    fn request() -> TransferMessage {
        let mut secret_ids = BTreeMap::new();
        secret_ids.insert(
            "hash".to_string(),
            SecretIdMsg {
                this_id: "prov:a".into(),
                this_secret: "s".into(),
                this_hash: Some("hash".into()),
                other_id: "prov:b".into(),
                other_secret: String::new(),
                other_hash: None,
            },
        );
        TransferMessage::RequestToAcceptAsset(RequestToAcceptAssetMsg {
            time_ms: 42,
            asset_id: "prov:b".into(),
            owner_public_key: "pk-a".into(),
            new_owner_public_key: "pk-b".into(),
            secret_ids,
            candidates: vec![CandidateMsg {
                id: "prov:c".into(),
                secret: "cs".into(),
                signature: "sig".into(),
            }],
        })
    }

    #[test]
    fn frame_round_trip() {
        let msg = request();
        let encoded = FrameCodec::encode(&msg).unwrap();
        let (decoded, consumed) = FrameCodec::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn type_tags_unique() {
        let msgs = [
            request(),
            TransferMessage::RequestToAcceptAssetReply(RequestToAcceptAssetReply {
                ack_id: String::new(),
                error: None,
            }),
            TransferMessage::AcceptAsset(AcceptAssetMsg {
                ack_id: String::new(),
                accepted: true,
                message: String::new(),
                new_id: String::new(),
                new_secret: String::new(),
                old_id: String::new(),
                old_secret: String::new(),
            }),
            TransferMessage::AcceptAssetReply(AcceptAssetReply { error: None }),
            TransferMessage::Error(WireError::new(ErrorCode::GeneralError, "x")),
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn decode_truncated() {
        let err = FrameCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = FrameCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_rejects_mismatched_tag() {
        let mut encoded = FrameCodec::encode(&request()).unwrap().to_vec();
        encoded[4] = 3;
        let err = FrameCodec::decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageType(3)));
    }

    #[tokio::test]
    async fn async_frames_over_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let msg = request();
        FrameCodec::write_frame(&mut client, &msg).await.unwrap();
        drop(client);
        assert_eq!(FrameCodec::read_frame(&mut server).await.unwrap(), Some(msg));
        assert_eq!(FrameCodec::read_frame(&mut server).await.unwrap(), None);
    }
}
