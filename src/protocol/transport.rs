use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

use super::{Request, RequestError, Response};

/// Largest payload a frame may carry. Part of the wire protocol.
pub const MAX_FRAME_LEN: u32 = 1024;

const HEADER_LEN: usize = size_of::<u32>();

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed before a full frame was read")]
    ConnectionClosed,
    #[error("invalid frame length {0}, expected 1..=1024")]
    InvalidLength(u32),
    #[error("frame IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("failed to encode message: {0}")]
    Serialize(serde_json::Error),
    #[error("failed to decode response: {0}")]
    Deserialize(serde_json::Error),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Fill `buf` completely, retrying partial and interrupted reads.
///
/// A stream that ends early, or fails, yields [`FrameError::ConnectionClosed`].
fn read_exact_or_closed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => return Err(FrameError::ConnectionClosed),
        }
    }
    Ok(())
}

/// Read one `[u32 BE length][payload]` frame and return its payload.
///
/// The length is checked before any payload byte is consumed.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_closed(reader, &mut header)?;

    let len = u32::from_be_bytes(header);
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }

    let mut payload = vec![0u8; len as usize];
    read_exact_or_closed(reader, &mut payload)?;
    Ok(payload)
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> T {
        self.stream
    }

    /// Send a raw JSON document as one frame.
    pub fn write_request(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        write_frame(&mut self.stream, payload)?;
        Ok(())
    }

    pub fn read_request(&mut self) -> Result<Request, TransportError> {
        let payload = read_frame(&mut self.stream)?;
        Ok(Request::parse(&payload)?)
    }

    /// Responses are written as a bare JSON object; the close marks the end.
    pub fn write_response(&mut self, resp: Response) -> Result<(), TransportError> {
        serde_json::to_writer(&mut self.stream, &resp).map_err(TransportError::Serialize)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read until the server closes the connection and decode the reply.
    ///
    /// A server running without replies closes without writing; that is `None`.
    pub fn read_response(&mut self) -> Result<Option<Response>, TransportError> {
        let mut body = Vec::new();
        self.stream.read_to_end(&mut body)?;
        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(TransportError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Reader that hands out at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn framed(len: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = len.to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reads_whole_frame() {
        let payload = br#"{"cmd":"START"}"#;
        let mut stream = Cursor::new(framed(payload.len() as u32, payload));

        assert_eq!(read_frame(&mut stream).unwrap(), payload);
    }

    #[test]
    fn reads_frame_delivered_byte_by_byte() {
        let payload = vec![b'x'; MAX_FRAME_LEN as usize];
        let bytes = framed(MAX_FRAME_LEN, &payload);
        let mut stream = Trickle {
            data: &bytes,
            chunk: 1,
        };

        assert_eq!(read_frame(&mut stream).unwrap(), payload);
    }

    #[test]
    fn rejects_out_of_bounds_lengths_without_reading_payload() {
        for len in [0, MAX_FRAME_LEN + 1, u32::MAX] {
            let mut stream = Cursor::new(framed(len, b"leftover"));

            let err = read_frame(&mut stream).unwrap_err();
            assert!(matches!(err, FrameError::InvalidLength(l) if l == len));
            assert_eq!(stream.position(), HEADER_LEN as u64);
        }
    }

    #[test]
    fn short_header_is_connection_closed() {
        let mut stream = Cursor::new(vec![0u8, 0]);

        let err = read_frame(&mut stream).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn truncated_payload_is_connection_closed() {
        let mut stream = Cursor::new(framed(10, b"abc"));

        let err = read_frame(&mut stream).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_frame_enforces_bounds() {
        let mut out = Vec::new();

        assert!(matches!(
            write_frame(&mut out, &[]),
            Err(FrameError::InvalidLength(0))
        ));
        assert!(matches!(
            write_frame(&mut out, &[0; MAX_FRAME_LEN as usize + 1]),
            Err(FrameError::InvalidLength(_))
        ));
        assert!(out.is_empty());

        write_frame(&mut out, b"hi").unwrap();
        assert_eq!(out, framed(2, b"hi"));
    }

    #[test]
    fn response_is_bare_json() {
        let mut transport = ProtocolTransport::new(Cursor::new(Vec::new()));

        transport.write_response(Response::Fail).unwrap();
        let written = transport.into_inner().into_inner();
        assert_eq!(written, br#"{"result":"FAIL"}"#);
    }

    #[test]
    fn read_response_decodes_reply() {
        let mut transport = ProtocolTransport::new(Cursor::new(br#"{"result": "OK"}"#.to_vec()));

        assert_eq!(transport.read_response().unwrap(), Some(Response::Ok));
    }

    #[test]
    fn closed_without_reply_is_none() {
        let mut transport = ProtocolTransport::new(Cursor::new(Vec::new()));

        assert_eq!(transport.read_response().unwrap(), None);
    }

    #[test]
    fn garbled_reply_is_an_error() {
        let mut transport = ProtocolTransport::new(Cursor::new(b"{\"res".to_vec()));

        assert!(matches!(
            transport.read_response(),
            Err(TransportError::Deserialize(_))
        ));
    }
}
