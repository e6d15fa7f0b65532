//! Line codec for the gateway byte stream.
//!
//! `GatewayCodec` wraps a length-limited `LinesCodec` and only yields frames
//! that parse into a [`Message`]. Garbage lines (boot banners, line noise,
//! invalid UTF-8) are logged and skipped so a noisy serial link never ends
//! the read loop.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

use crate::protocol::message::Message;
use crate::utils::GatewayError;

/// Longest line accepted from the gateway. MySensors frames are far shorter.
pub const MAX_LINE_LENGTH: usize = 256;

/// Parse one line, logging and dropping it if it is not a valid frame.
pub fn decode_line(line: &str) -> Option<Message> {
    match line.parse::<Message>() {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(line = %line.trim_end(), "Dropping frame: {e}");
            None
        }
    }
}

/// Serialize a message to its wire form, newline included.
pub fn encode(message: &Message) -> String {
    format!("{message}\n")
}

#[derive(Debug)]
pub struct GatewayCodec {
    lines: LinesCodec,
}

impl Default for GatewayCodec {
    fn default() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl GatewayCodec {
    /// A codec limited to [`MAX_LINE_LENGTH`] byte lines.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for GatewayCodec {
    type Item = Message;
    type Error = GatewayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, GatewayError> {
        loop {
            match self.lines.decode(src) {
                Ok(Some(line)) => {
                    if let Some(message) = decode_line(&line) {
                        return Ok(Some(message));
                    }
                }
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!("Discarding line longer than {MAX_LINE_LENGTH} bytes");
                }
                Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!("Discarding line that is not valid UTF-8");
                }
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, GatewayError> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        match self.lines.decode_eof(src) {
            Ok(Some(line)) => Ok(decode_line(&line)),
            Ok(None) => Ok(None),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(None),
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => Ok(None),
            Err(LinesCodecError::Io(e)) => Err(e.into()),
        }
    }
}

impl Encoder<Message> for GatewayCodec {
    type Error = GatewayError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), GatewayError> {
        let line = encode(&message);
        dst.reserve(line.len());
        dst.extend_from_slice(line.as_bytes());
        Ok(())
    }
}
