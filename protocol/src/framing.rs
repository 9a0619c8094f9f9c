//! Length-prefixed framing for session streams.
//!
//! Each frame is a 4-byte big-endian payload length followed by the payload.

use thiserror::Error;

/// Largest payload accepted in a single frame (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("message too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),
    #[error("invalid frame: length prefix indicates {0} bytes")]
    InvalidFrame(usize),
}

/// Prefix `payload` with its length.
///
/// ```
/// use hangman_lobby_protocol::frame_message;
///
/// let framed = frame_message(b"lobby").unwrap();
/// assert_eq!(&framed[..4], &[0, 0, 0, 5]);
/// assert_eq!(&framed[4..], b"lobby");
/// ```
pub fn frame_message(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(payload.len()));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Payload length announced by the header at the front of `bytes`, once
/// the whole header has arrived.
fn declared_len(bytes: &[u8]) -> Option<usize> {
    let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(header) as usize)
}

/// Accumulates bytes read from a stream and yields complete payloads.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buffer: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` and iterate over every payload now complete.
    pub fn push<'a>(&'a mut self, data: &[u8]) -> MessageIterator<'a> {
        self.buffer.extend_from_slice(data);
        MessageIterator { buffer: self }
    }

    fn try_extract(&mut self) -> Option<Result<Vec<u8>, FramingError>> {
        let len = declared_len(&self.buffer)?;
        if len > MAX_MESSAGE_SIZE {
            // Out of sync; nothing buffered can be trusted.
            self.buffer.clear();
            return Some(Err(FramingError::InvalidFrame(len)));
        }

        let end = HEADER_LEN + len;
        if self.buffer.len() < end {
            return None;
        }
        Some(Ok(self.buffer.drain(..end).skip(HEADER_LEN).collect()))
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

pub struct MessageIterator<'a> {
    buffer: &'a mut MessageBuffer,
}

impl Iterator for MessageIterator<'_> {
    type Item = Result<Vec<u8>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.try_extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_message() {
        let framed = frame_message(b"game").unwrap();
        assert_eq!(framed, vec![0, 0, 0, 4, b'g', b'a', b'm', b'e']);
    }

    #[test]
    fn test_oversized_payload_is_refused() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            frame_message(&payload),
            Err(FramingError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn test_split_across_reads() {
        let mut buffer = MessageBuffer::new();

        assert_eq!(buffer.push(&[0, 0]).count(), 0);
        assert_eq!(buffer.push(&[0, 5, b'a', b'l']).count(), 0);

        let messages: Vec<_> = buffer.push(b"pha").collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].as_ref().unwrap(), b"alpha");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_several_frames_in_one_read() {
        let mut buffer = MessageBuffer::new();

        let mut data = frame_message(b"alpha").unwrap();
        data.extend(frame_message(b"beta").unwrap());
        data.extend_from_slice(&[0, 0]);

        let messages: Vec<_> = buffer.push(&data).map(Result::unwrap).collect();
        assert_eq!(messages, vec![b"alpha".to_vec(), b"beta".to_vec()]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_corrupt_length_clears_buffer() {
        let mut buffer = MessageBuffer::new();
        let messages: Vec<_> = buffer.push(&[0xff, 0xff, 0xff, 0xff, 1, 2]).collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Err(FramingError::InvalidFrame(_))));
        assert!(buffer.is_empty());
    }
}
