//! RFC6455 frame layout: opcodes, header bytes and payload masking.
//!
//! Only the subset this engine speaks is modelled: final (unfragmented)
//! frames with a 7-bit or 16-bit payload length.
//!
//! ```text
//!  byte 0     byte 1        [2 bytes]       [4 bytes]    payload
//! ┌────────┬─────────────┬──────────────┬────────────┬───────────┐
//! │FIN|op  │MASK|len7    │ext len (BE)  │ mask (BE)  │ masked    │
//! └────────┴─────────────┴──────────────┴────────────┴───────────┘
//! ```

// ============================================================================
// Constants
// ============================================================================

/// FIN flag in the first header byte.
pub const FIN_BIT: u8 = 0x80;

/// Mask flag in the second header byte.
pub const MASK_BIT: u8 = 0x80;

/// Low nibble of the first header byte.
pub const OPCODE_MASK: u8 = 0x0F;

/// Low seven bits of the second header byte.
pub const LENGTH_MASK: u8 = 0x7F;

/// Largest payload that fits the 7-bit length field.
pub const MAX_SHORT_PAYLOAD: usize = 125;

/// Length code announcing a 16-bit extended length.
pub const LENGTH_EXT16: u8 = 126;

/// Length code announcing a 64-bit extended length (unsupported).
pub const LENGTH_EXT64: u8 = 127;

/// Size of a masking key on the wire.
pub const MASK_KEY_LEN: usize = 4;

/// Largest header this engine emits: 2 + 2 extended + 4 mask.
pub const MAX_HEADER_LEN: usize = 8;

// ============================================================================
// OpCode
// ============================================================================

/// Frame opcodes the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// UTF-8 text payload.
    Text = 0x1,
    /// Binary payload.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping.
    Ping = 0x9,
    /// Pong.
    Pong = 0xA,
}

// ============================================================================
// FrameKind
// ============================================================================

/// Classification of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// Text, binary, or any opcode without a control meaning.
    #[default]
    Data,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// Close control frame.
    Close,
}

impl FrameKind {
    /// Classifies the low nibble of the first header byte.
    #[inline]
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & OPCODE_MASK {
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            _ => Self::Data,
        }
    }
}

// ============================================================================
// LengthCode
// ============================================================================

/// Meaning of the 7-bit length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthCode {
    /// Payload length fits in the field (0..=125).
    Short(usize),
    /// A 16-bit big-endian length follows.
    Extended16,
    /// A 64-bit length follows.
    Extended64,
}

// ============================================================================
// FrameHead
// ============================================================================

/// The two fixed header bytes of an inbound frame, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    /// FIN flag.
    pub fin: bool,
    /// Frame classification.
    pub kind: FrameKind,
    /// Whether a masking key follows the length.
    pub masked: bool,
    /// Length field.
    pub length: LengthCode,
}

impl FrameHead {
    /// Decodes the two fixed header bytes.
    #[must_use]
    pub const fn parse(bytes: [u8; 2]) -> Self {
        let length = match bytes[1] & LENGTH_MASK {
            LENGTH_EXT16 => LengthCode::Extended16,
            LENGTH_EXT64 => LengthCode::Extended64,
            len => LengthCode::Short(len as usize),
        };

        Self {
            fin: bytes[0] & FIN_BIT != 0,
            kind: FrameKind::from_opcode(bytes[0]),
            masked: bytes[1] & MASK_BIT != 0,
            length,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Splits a 32-bit masking key into wire order.
#[inline]
#[must_use]
pub const fn mask_key(mask: u32) -> [u8; MASK_KEY_LEN] {
    mask.to_be_bytes()
}

/// Number of header bytes a masked frame of `payload_len` needs.
#[inline]
#[must_use]
pub const fn header_len(payload_len: usize) -> usize {
    if payload_len > MAX_SHORT_PAYLOAD {
        2 + 2 + MASK_KEY_LEN
    } else {
        2 + MASK_KEY_LEN
    }
}

/// Total on-wire size of a masked frame of `payload_len`.
#[inline]
#[must_use]
pub const fn frame_len(payload_len: usize) -> usize {
    header_len(payload_len) + payload_len
}

/// Writes a masked, final frame header into `out` and returns its length.
///
/// `payload_len` must not exceed `u16::MAX`; callers cap it far lower.
pub fn encode_header(
    opcode: OpCode,
    payload_len: usize,
    key: [u8; MASK_KEY_LEN],
    out: &mut [u8; MAX_HEADER_LEN],
) -> usize {
    out[0] = FIN_BIT | opcode as u8;

    let mut pos = 2;
    if payload_len > MAX_SHORT_PAYLOAD {
        out[1] = MASK_BIT | LENGTH_EXT16;
        let ext = u16::try_from(payload_len).unwrap_or(u16::MAX);
        out[2..4].copy_from_slice(&ext.to_be_bytes());
        pos = 4;
    } else {
        out[1] = MASK_BIT | payload_len as u8;
    }

    out[pos..pos + MASK_KEY_LEN].copy_from_slice(&key);
    pos + MASK_KEY_LEN
}

/// XORs `buf` with the key, byte `i` against `key[i % 4]`.
///
/// Masking and unmasking are the same operation.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; MASK_KEY_LEN]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % MASK_KEY_LEN];
    }
}

// ============================================================================
// Tests
// ============================================================================
