use bytes::{Buf, BytesMut};
use tokio_util::codec;

use crate::{
    frame::{Frame, Message, OpCode, MAX_HEAD_SIZE},
    WebSocketError,
};

/// Represents the reading state of a WebSocket frame.
enum ReadState {
    /// The first two bytes are consumed; waiting for the extended length and mask.
    Header(Header),
    /// The whole header is consumed; waiting for the payload.
    Payload(HeaderAndMask),
}

/// The fields carried by the first two header bytes.
struct Header {
    /// Indicates if this is the final fragment in a message.
    fin: bool,
    /// Indicates if the frame is masked.
    masked: bool,
    /// The operation code of the frame.
    opcode: OpCode,
    /// Size of the extended length field: 0, 2 or 8 bytes.
    extra: usize,
    /// The 7-bit length code from the second byte.
    length_code: u8,
    /// Bytes still needed to finish the header.
    header_size: usize,
}

/// Header and mask data once every byte before the payload has been read.
struct HeaderAndMask {
    header: Header,
    mask: Option<[u8; 4]>,
    payload_len: usize,
}

/// Server-side codec: decodes inbound bytes into [`Message`]s and encodes outbound [`Frame`]s.
///
/// Used with [`tokio_util::codec::Framed`] over the upgraded connection. Each call to the
/// stream yields one message per inbound frame, in arrival order.
pub struct Codec {
    decoder: Decoder,
    encoder: Encoder,
}

impl Codec {
    /// Creates a codec whose decoder rejects payloads longer than `max_payload_read` bytes.
    pub fn new(max_payload_read: usize) -> Self {
        Self {
            decoder: Decoder::new(max_payload_read),
            encoder: Encoder,
        }
    }
}

impl codec::Decoder for Codec {
    type Item = Message;
    type Error = WebSocketError;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(codec::Decoder::decode(&mut self.decoder, src)?.map(Message::from))
    }

    #[inline]
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(codec::Decoder::decode_eof(&mut self.decoder, src)?.map(Message::from))
    }
}

impl codec::Encoder<Frame> for Codec {
    type Error = WebSocketError;

    #[inline]
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        codec::Encoder::encode(&mut self.encoder, item, dst)
    }
}

/// Frame decoder, handling the header → payload state transitions.
///
/// Frames come out unmasked. The decoder never rejects a frame for its opcode, its
/// reserved bits or its FIN flag; the only failure is a payload over the size limit.
pub struct Decoder {
    /// Current reading state (header or payload).
    state: Option<ReadState>,
    /// Maximum allowed size for the frame payload.
    max_payload_size: usize,
}

impl Decoder {
    /// Creates a new `Decoder` with a specified maximum payload size.
    ///
    /// Pass `usize::MAX` to only be bounded by available memory.
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            state: None,
            max_payload_size,
        }
    }
}

impl codec::Decoder for Decoder {
    type Item = Frame;
    type Error = WebSocketError;

    /// Decodes one frame from `src`, keeping partial progress across calls.
    ///
    /// # Returns
    /// - `Ok(Some(Frame))`: a complete, unmasked frame.
    /// - `Ok(None)`: more data is needed.
    /// - `Err(WebSocketError::FrameTooLarge)`: the declared length is over the limit.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state.take() {
                None => {
                    if src.remaining() < 2 {
                        return Ok(None);
                    }

                    let fin = src[0] & 0b10000000 != 0;
                    let opcode = OpCode::from(src[0] & 0b00001111);
                    let masked = src[1] & 0b10000000 != 0;
                    let length_code = src[1] & 0x7F;

                    let extra = match length_code {
                        126 => 2,
                        127 => 8,
                        _ => 0,
                    };
                    let header_size = extra + masked as usize * 4;
                    src.advance(2);

                    self.state = Some(ReadState::Header(Header {
                        fin,
                        masked,
                        opcode,
                        extra,
                        length_code,
                        header_size,
                    }));
                }
                Some(ReadState::Header(header)) => {
                    if src.remaining() < header.header_size {
                        self.state = Some(ReadState::Header(header));
                        return Ok(None);
                    }

                    // extended length first, then the mask
                    let payload_len = match header.extra {
                        0 => usize::from(header.length_code),
                        2 => usize::from(src.get_u16()),
                        _ => usize::try_from(src.get_u64())
                            .map_err(|_| WebSocketError::FrameTooLarge)?,
                    };

                    let mask = if header.masked {
                        Some(src.get_u32().to_be_bytes())
                    } else {
                        None
                    };

                    if payload_len > self.max_payload_size {
                        return Err(WebSocketError::FrameTooLarge);
                    }

                    self.state = Some(ReadState::Payload(HeaderAndMask {
                        header,
                        mask,
                        payload_len,
                    }));
                }
                Some(ReadState::Payload(header_and_mask)) => {
                    if src.remaining() < header_and_mask.payload_len {
                        self.state = Some(ReadState::Payload(header_and_mask));
                        return Ok(None);
                    }

                    let HeaderAndMask {
                        header,
                        mask,
                        payload_len,
                    } = header_and_mask;

                    let payload = src.split_to(payload_len);
                    let mut frame = Frame::new(header.fin, header.opcode, mask, payload);
                    frame.unmask();

                    break Ok(Some(frame));
                }
            }
        }
    }

    /// Like [`decode`](codec::Decoder::decode), but a stream that ends partway through a
    /// frame is reported as a clean end-of-stream rather than an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = codec::Decoder::decode(self, src)? {
            return Ok(Some(frame));
        }

        if self.state.take().is_some() || !src.is_empty() {
            #[cfg(feature = "logging")]
            log::debug!("stream ended mid-frame with {} bytes buffered", src.len());
            src.clear();
        }

        Ok(None)
    }
}

/// Serializes a [`Frame`] header and payload.
///
/// The payload is written as stored: server frames carry no mask, and a client frame
/// must already have been passed through [`Frame::mask`]. Frames are never split.
pub struct Encoder;

impl codec::Encoder<Frame> for Encoder {
    type Error = WebSocketError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut header = [0; MAX_HEAD_SIZE];
        let size = frame.fmt_head(&mut header[..]);

        dst.reserve(size + frame.payload.len());
        dst.extend_from_slice(&header[..size]);
        dst.extend_from_slice(&frame.payload);

        Ok(())
    }
}
