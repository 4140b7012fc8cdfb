//! # Frame
//!
//! The `frame` module implements the base framing of [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2).
//!
//! ### Frame Binary Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! :                     Payload Data continued ...                :
//! +---------------------------------------------------------------+
//! ```
//!
//! A [`Frame`] is the wire-level unit. The echo loop never looks at frames directly: the
//! codec folds every decoded frame into a [`Message`], which is all the server acts upon.
//!
//! ```rust
//! use wsecho::frame::{Frame, Message, OpCode};
//!
//! let frame = Frame::new(true, OpCode::Text, None, "hello");
//! assert_eq!(Message::from(frame), Message::Text("hello".into()));
//!
//! let ping = Frame::new(true, OpCode::Ping, None, "are you there?");
//! assert_eq!(Message::from(ping), Message::Ignored(OpCode::Ping));
//! ```
use bytes::{Bytes, BytesMut};

/// WebSocket operation code, the low nibble of the first header byte.
///
/// Only [`OpCode::Text`] and [`OpCode::Close`] are acted upon by the server. Every other
/// opcode, including the ones RFC 6455 leaves reserved, is decoded and then ignored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// One of the reserved values 0x3-0x7 or 0xB-0xF.
    Reserved(u8),
}

impl OpCode {
    /// Returns `true` if the `OpCode` represents a control frame (`Close`, `Ping`, or `Pong`).
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl From<u8> for OpCode {
    /// Interprets the low four bits of `value`. Never fails: unknown values map to
    /// [`OpCode::Reserved`].
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(val: OpCode) -> Self {
        match val {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(value) => value & 0x0F,
        }
    }
}

/// The logical unit produced for every decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text frame's payload, already unmasked. The payload is not UTF-8 validated.
    Text(Bytes),
    /// The peer sent a close frame; its payload is discarded.
    Close,
    /// Any other frame. The payload is dropped and the connection carries on.
    Ignored(OpCode),
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame.opcode {
            OpCode::Close => Message::Close,
            OpCode::Text => Message::Text(frame.payload.freeze()),
            other => Message::Ignored(other),
        }
    }
}

/// A single WebSocket frame.
///
/// Frames are built fresh for every decode call and handed off by value; nothing keeps
/// them around afterwards.
///
/// # Fields
/// - `fin`: Final fragment flag. Decoded but not used for reassembly.
/// - `opcode`: Defines the frame type.
/// - `mask`: Optional 32-bit XOR masking key, present on client-to-server frames.
/// - `payload`: Frame payload data.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Indicates if this is the final frame in a message.
    pub fin: bool,
    /// The opcode of the frame, defining its type.
    pub opcode: OpCode,
    /// The masking key for the frame, if any.
    mask: Option<[u8; 4]>,
    /// The payload of the frame.
    pub payload: BytesMut,
}

/// Largest possible header: 2 bytes, 8 bytes of extended length and a 4 byte mask.
pub(crate) const MAX_HEAD_SIZE: usize = 14;

impl Frame {
    /// Creates a new WebSocket `Frame`.
    ///
    /// # Parameters
    /// - `fin`: Indicates if this frame is the final fragment in a message.
    /// - `opcode`: The operation code of the frame.
    /// - `mask`: Optional 4-byte masking key. The payload is stored as given; call
    ///   [`Frame::mask`] to apply the key before encoding.
    /// - `payload`: The frame payload data.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: impl Into<BytesMut>,
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload: payload.into(),
        }
    }

    /// Creates a final, unmasked text frame, the only data frame a server sends.
    pub fn text(payload: impl Into<BytesMut>) -> Self {
        Self::new(true, OpCode::Text, None, payload)
    }

    /// Creates the empty close frame that encodes to exactly `0x88 0x00`.
    pub fn close() -> Self {
        Self::new(true, OpCode::Close, None, BytesMut::new())
    }

    /// Returns the masking key, if the frame carries one.
    #[inline(always)]
    pub fn mask_key(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Returns whether the frame is masked.
    #[inline(always)]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// XORs the payload with the frame's masking key. Does nothing for unmasked frames.
    ///
    /// The key is kept, so the encoder still sets the MASK bit. This is how a client
    /// produces a frame; servers never call it.
    pub fn mask(&mut self) {
        if let Some(mask) = self.mask {
            crate::mask::apply_mask(&mut self.payload, mask);
        }
    }

    /// Reverses the masking and drops the key.
    pub(crate) fn unmask(&mut self) {
        if let Some(mask) = self.mask.take() {
            crate::mask::apply_mask(&mut self.payload, mask);
        }
    }

    /// Formats the frame header into `head` and returns its size in bytes.
    ///
    /// # Panics
    /// Panics if `head` is shorter than [`MAX_HEAD_SIZE`].
    pub(crate) fn fmt_head(&self, head: &mut [u8]) -> usize {
        head[0] = (self.fin as u8) << 7 | u8::from(self.opcode);

        let len = self.payload.len();
        let size = if len < 126 {
            head[1] = len as u8;
            2
        } else if len < 65536 {
            head[1] = 126;
            head[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            head[1] = 127;
            head[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        };

        if let Some(mask) = self.mask {
            head[1] |= 0x80;
            head[size..size + 4].copy_from_slice(&mask);
            size + 4
        } else {
            size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod opcode_tests {
        use super::*;

        #[test]
        fn test_is_control() {
            assert!(OpCode::Close.is_control());
            assert!(OpCode::Ping.is_control());
            assert!(OpCode::Pong.is_control());

            assert!(!OpCode::Continuation.is_control());
            assert!(!OpCode::Text.is_control());
            assert!(!OpCode::Binary.is_control());
            assert!(!OpCode::Reserved(0x3).is_control());
        }

        #[test]
        fn test_known_values() {
            assert_eq!(OpCode::from(0x0), OpCode::Continuation);
            assert_eq!(OpCode::from(0x1), OpCode::Text);
            assert_eq!(OpCode::from(0x2), OpCode::Binary);
            assert_eq!(OpCode::from(0x8), OpCode::Close);
            assert_eq!(OpCode::from(0x9), OpCode::Ping);
            assert_eq!(OpCode::from(0xA), OpCode::Pong);
        }

        #[test]
        fn test_reserved_values_are_kept() {
            for code in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
                let opcode = OpCode::from(code);
                assert_eq!(opcode, OpCode::Reserved(code));
                assert_eq!(u8::from(opcode), code);
            }
        }

        #[test]
        fn test_high_bits_ignored() {
            // FIN and RSV bits share the byte with the opcode
            assert_eq!(OpCode::from(0x81), OpCode::Text);
            assert_eq!(OpCode::from(0xF8), OpCode::Close);
        }
    }

    mod message_tests {
        use super::*;

        #[test]
        fn test_text_keeps_payload() {
            let frame = Frame::new(true, OpCode::Text, None, "Hello");
            assert_eq!(Message::from(frame), Message::Text(Bytes::from("Hello")));
        }

        #[test]
        fn test_close_discards_payload() {
            let frame = Frame::new(true, OpCode::Close, None, &b"\x03\xE8bye"[..]);
            assert_eq!(Message::from(frame), Message::Close);
        }

        #[test]
        fn test_other_opcodes_ignored() {
            for opcode in [
                OpCode::Continuation,
                OpCode::Binary,
                OpCode::Ping,
                OpCode::Pong,
                OpCode::Reserved(0xB),
            ] {
                let frame = Frame::new(true, opcode, None, "payload");
                assert_eq!(Message::from(frame), Message::Ignored(opcode));
            }
        }

        #[test]
        fn test_fragment_is_still_text() {
            let frame = Frame::new(false, OpCode::Text, None, "part");
            assert_eq!(Message::from(frame), Message::Text(Bytes::from("part")));
        }
    }

    mod frame_tests {
        use super::*;

        #[test]
        fn test_text_frame() {
            let frame = Frame::text("Test payload");

            assert!(frame.fin);
            assert_eq!(frame.opcode, OpCode::Text);
            assert!(!frame.is_masked());
            assert_eq!(frame.payload, BytesMut::from("Test payload"));
        }

        #[test]
        fn test_close_frame_head() {
            let frame = Frame::close();
            let mut head = [0u8; MAX_HEAD_SIZE];
            let size = frame.fmt_head(&mut head);

            assert_eq!(&head[..size], &[0x88, 0x00]);
        }

        #[test]
        fn test_mask_unmask() {
            let payload = BytesMut::from("Mask me");
            let mut frame = Frame::new(
                true,
                OpCode::Text,
                Some([0x01, 0x02, 0x03, 0x04]),
                payload.clone(),
            );

            frame.mask();
            assert_ne!(frame.payload, payload);
            assert_eq!(frame.mask_key(), Some([0x01, 0x02, 0x03, 0x04]));

            frame.unmask();
            assert_eq!(frame.payload, payload);
            assert_eq!(frame.mask_key(), None);
        }

        #[test]
        fn test_mask_without_key_is_noop() {
            let mut frame = Frame::text("plain");
            frame.mask();
            assert_eq!(frame.payload, BytesMut::from("plain"));
        }

        #[test]
        fn test_fmt_head_masked() {
            let mask_key = [0xAA, 0xBB, 0xCC, 0xDD];
            let frame = Frame::new(true, OpCode::Text, Some(mask_key), "Header test");

            let mut head = [0u8; MAX_HEAD_SIZE];
            let head_size = frame.fmt_head(&mut head);

            assert_eq!(head_size, 2 + 4);
            assert_eq!(head[0], 0x81);
            assert_eq!(head[1], 0x80 | 11);
            assert_eq!(&head[2..6], &mask_key);
        }

        #[test]
        fn test_fmt_head_length_boundaries() {
            let mut head = [0u8; MAX_HEAD_SIZE];

            let frame = Frame::text(&vec![0u8; 125][..]);
            assert_eq!(frame.fmt_head(&mut head), 2);
            assert_eq!(head[1], 125);

            let frame = Frame::text(&vec![0u8; 126][..]);
            assert_eq!(frame.fmt_head(&mut head), 4);
            assert_eq!(&head[1..4], &[126, 0x00, 0x7E]);

            let frame = Frame::text(&vec![0u8; 65535][..]);
            assert_eq!(frame.fmt_head(&mut head), 4);
            assert_eq!(&head[1..4], &[126, 0xFF, 0xFF]);

            let frame = Frame::text(&vec![0u8; 65536][..]);
            assert_eq!(frame.fmt_head(&mut head), 10);
            assert_eq!(head[1], 127);
            assert_eq!(&head[2..10], &65536u64.to_be_bytes());
        }

        #[test]
        fn test_fmt_head_fragment() {
            let frame = Frame::new(false, OpCode::Binary, None, "x");
            let mut head = [0u8; MAX_HEAD_SIZE];
            frame.fmt_head(&mut head);
            assert_eq!(head[0], 0x02);
        }
    }
}
