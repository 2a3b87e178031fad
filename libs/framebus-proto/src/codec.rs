use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::message::{Buffer, Message, Tag};

fn tag_part(tag: Tag) -> Bytes {
    Bytes::copy_from_slice(&[tag.byte()])
}

fn json_part<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn parse_json<T: DeserializeOwned>(slot: &Bytes) -> Result<T, CodecError> {
    let text = std::str::from_utf8(slot).map_err(|_| CodecError::Utf8)?;
    Ok(serde_json::from_str(text)?)
}

/// Decode one 2-part inner meta window of a Buffer frame.
///
/// All-placeholder (leading slot zero-length) means the meta is absent;
/// anything in between is a partial encoding and therefore malformed.
fn decode_inner<T: DeserializeOwned>(tag: Tag, window: &[Bytes]) -> Result<Option<T>, CodecError> {
    let (lead, body) = (&window[0], &window[1]);
    if lead.is_empty() {
        if !body.is_empty() {
            return Err(CodecError::PartialMeta(tag));
        }
        return Ok(None);
    }
    if lead.len() != 1 {
        return Err(CodecError::TagSlot(lead.len()));
    }
    if lead[0] != tag.byte() {
        return Err(CodecError::InnerTag {
            expected: tag,
            actual: lead[0],
        });
    }
    Ok(Some(parse_json(body)?))
}

impl Message {
    /// Serialize into the ordered multipart frame of the variant.
    ///
    /// Consumes the message: a Buffer payload is moved into its part, not
    /// copied, so the transport can hand it to the socket as-is.
    pub fn encode(self) -> Result<Vec<Bytes>, CodecError> {
        match self {
            Message::Caps(caps) => Ok(vec![tag_part(Tag::Caps), json_part(&caps)?]),
            Message::BufferMeta(meta) => Ok(vec![tag_part(Tag::BufferMeta), json_part(&meta)?]),
            Message::CustomMeta(meta) => Ok(vec![tag_part(Tag::CustomMeta), json_part(&meta)?]),
            Message::EndOfStream => Ok(vec![tag_part(Tag::EndOfStream)]),
            Message::Buffer(Buffer {
                meta,
                custom,
                payload,
            }) => {
                let mut parts = Vec::with_capacity(Tag::Buffer.part_count());
                parts.push(tag_part(Tag::Buffer));
                match &meta {
                    Some(meta) => {
                        parts.push(tag_part(Tag::BufferMeta));
                        parts.push(json_part(meta)?);
                    }
                    None => {
                        parts.push(Bytes::new());
                        parts.push(Bytes::new());
                    }
                }
                match &custom {
                    Some(custom) => {
                        parts.push(tag_part(Tag::CustomMeta));
                        parts.push(json_part(custom)?);
                    }
                    None => {
                        parts.push(Bytes::new());
                        parts.push(Bytes::new());
                    }
                }
                parts.push(payload);
                Ok(parts)
            }
        }
    }

    /// Parse an ordered multipart frame back into a message.
    ///
    /// Reads byte 0 of part 0, dispatches on the tag, validates the part
    /// count, then parses the variant. The Buffer payload part is shared
    /// out of the input by refcount, never copied.
    pub fn decode(parts: &[Bytes]) -> Result<Message, CodecError> {
        let first = parts.first().ok_or(CodecError::Empty)?;
        if first.len() != 1 {
            return Err(CodecError::TagSlot(first.len()));
        }
        let tag = Tag::from_byte(first[0]).ok_or(CodecError::UnknownTag(first[0]))?;
        if parts.len() != tag.part_count() {
            return Err(CodecError::PartCount {
                tag,
                expected: tag.part_count(),
                actual: parts.len(),
            });
        }

        match tag {
            Tag::Caps => Ok(Message::Caps(parse_json(&parts[1])?)),
            Tag::BufferMeta => Ok(Message::BufferMeta(parse_json(&parts[1])?)),
            Tag::CustomMeta => Ok(Message::CustomMeta(parse_json(&parts[1])?)),
            Tag::EndOfStream => Ok(Message::EndOfStream),
            Tag::Buffer => {
                let meta = decode_inner(Tag::BufferMeta, &parts[1..3])?;
                let custom = decode_inner(Tag::CustomMeta, &parts[3..5])?;
                Ok(Message::Buffer(Buffer {
                    meta,
                    custom,
                    payload: parts[5].clone(),
                }))
            }
        }
    }
}
