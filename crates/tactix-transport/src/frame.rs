//! WebSocket frame codec.
//!
//! Implements the subset of RFC 6455 framing the server speaks: single
//! unfragmented text frames, plus the close opcode as an end-of-stream
//! signal. Ping/pong, binary frames, extensions and fragmentation are
//! rejected.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                      Masking-key (if MASK set)                |
//! +---------------------------------------------------------------+
//! |                          Payload Data                         |
//! +---------------------------------------------------------------+
//! ```
//!
//! Decoding works over any [`AsyncRead`], so the codec can be exercised
//! against in-memory buffers without a socket.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::FrameError;

/// Continuation frame opcode.
pub const OPCODE_CONTINUATION: u8 = 0x0;
/// Text frame opcode.
pub const OPCODE_TEXT: u8 = 0x1;
/// Binary frame opcode.
pub const OPCODE_BINARY: u8 = 0x2;
/// Close frame opcode.
pub const OPCODE_CLOSE: u8 = 0x8;
/// Ping frame opcode.
pub const OPCODE_PING: u8 = 0x9;

/// Default upper bound on a single frame payload (1 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 1 << 20;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes `payload` as a single unmasked, final text frame.
///
/// This is the server-to-client direction: RFC 6455 forbids servers from
/// masking, so no masking key is written.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 10);
    push_header(&mut buf, FIN_BIT | OPCODE_TEXT, 0, payload.len());
    buf.extend_from_slice(payload);
    buf
}

/// Encodes a masked frame, as a client would send it.
///
/// `opcode` and `fin` are written as given, which lets callers build
/// frames the server is expected to reject.
pub fn encode_masked_frame(
    opcode: u8,
    fin: bool,
    payload: &[u8],
    mask_key: [u8; 4],
) -> Vec<u8> {
    let fin_bit = if fin { FIN_BIT } else { 0 };
    let first = fin_bit | (opcode & OPCODE_BITS);
    let mut buf = Vec::with_capacity(payload.len() + 14);
    push_header(&mut buf, first, MASK_BIT, payload.len());
    buf.extend_from_slice(&mask_key);
    let start = buf.len();
    buf.extend_from_slice(payload);
    apply_mask(&mut buf[start..], mask_key);
    buf
}

/// Encodes an empty close frame.
pub fn encode_close_frame() -> Vec<u8> {
    vec![FIN_BIT | OPCODE_CLOSE, 0]
}

/// Writes `payload` as a text frame and flushes the writer.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_frame(payload)).await?;
    writer.flush().await
}

fn push_header(buf: &mut Vec<u8>, first: u8, mask: u8, len: usize) {
    buf.push(first);
    if len < LEN_16 as usize {
        buf.push(mask | len as u8);
    } else if len <= u16::MAX as usize {
        buf.push(mask | LEN_16);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(mask | LEN_64);
        buf.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reads one frame from `reader` and returns its unmasked payload.
///
/// Returns `Ok(None)` when the peer sent a close frame or the stream
/// ended cleanly before a new frame started. The whole frame is consumed
/// before the opcode and FIN checks run, so the stream is left at a frame
/// boundary even when an error is returned.
pub async fn decode_frame<R>(
    reader: &mut R,
    max_payload: usize,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; 2];
    match reader.read(&mut head[..1]).await {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(FrameError::Truncated(e)),
    }
    reader
        .read_exact(&mut head[1..])
        .await
        .map_err(FrameError::Truncated)?;

    if head[0] & RSV_BITS != 0 {
        return Err(FrameError::MalformedHeader("reserved bits set"));
    }
    let fin = head[0] & FIN_BIT != 0;
    let opcode = head[0] & OPCODE_BITS;
    let masked = head[1] & MASK_BIT != 0;

    let len = match head[1] & LEN_BITS {
        LEN_16 => u64::from(
            reader.read_u16().await.map_err(FrameError::Truncated)?,
        ),
        LEN_64 => {
            let len =
                reader.read_u64().await.map_err(FrameError::Truncated)?;
            if len >> 63 != 0 {
                return Err(FrameError::MalformedHeader(
                    "most significant length bit set",
                ));
            }
            len
        }
        short => u64::from(short),
    };
    if len > max_payload as u64 {
        return Err(FrameError::PayloadTooLarge {
            len,
            max: max_payload,
        });
    }

    let mask_key = if masked {
        let mut key = [0u8; 4];
        reader
            .read_exact(&mut key)
            .await
            .map_err(FrameError::Truncated)?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(FrameError::Truncated)?;
    if let Some(key) = mask_key {
        apply_mask(&mut payload, key);
    }

    if opcode == OPCODE_CLOSE {
        return Ok(None);
    }
    if opcode != OPCODE_TEXT {
        return Err(FrameError::UnsupportedOpcode(opcode));
    }
    if !fin {
        return Err(FrameError::Fragmented);
    }
    Ok(Some(payload))
}
