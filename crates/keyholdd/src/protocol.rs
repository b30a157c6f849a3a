//! One-line request protocol
//!
//! Grammar: `<cmd:1 byte><payload:0..=buffer_size bytes>\n`. The
//! payload is binary-safe except for the delimiter byte. The overall
//! length window is checked before the command byte is inspected, so an
//! empty or oversized line is always a length error regardless of what
//! it starts with.

use crate::error::RequestError;

/// Command byte for "get the secret".
pub const CMD_GET: u8 = b'G';
/// Command byte for "put a new secret".
pub const CMD_PUT: u8 = b'P';

/// A parsed request line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Disclose the stored secret
    Get,
    /// Replace the stored secret with the payload
    Put(&'a [u8]),
    /// Unrecognized command byte: accepted, produces no action and no
    /// response
    Unknown(u8),
}

/// Parse one request line, delimiter included.
///
/// `line` must end with the `\n` delimiter; the caller is responsible
/// for turning a missing delimiter into a read error.
pub fn parse(line: &[u8], buffer_size: usize) -> Result<Command<'_>, RequestError> {
    let actual = line.len();
    if actual < 2 || actual > buffer_size + 2 {
        return Err(RequestError::Length { actual });
    }

    let body = &line[..actual - 1];
    let payload = &body[1..];
    match body[0] {
        CMD_GET => {
            // Get carries no payload; the valid length for a get line
            // is exactly the command byte plus the delimiter.
            if !payload.is_empty() {
                return Err(RequestError::Length { actual });
            }
            Ok(Command::Get)
        }
        CMD_PUT => Ok(Command::Put(payload)),
        cmd => Ok(Command::Unknown(cmd)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUFFER_SIZE: usize = 8;

    #[test]
    fn test_get() {
        assert_eq!(parse(b"G\n", BUFFER_SIZE).unwrap(), Command::Get);
    }

    #[test]
    fn test_put_with_payload() {
        assert_eq!(
            parse(b"Phunter2\n", BUFFER_SIZE).unwrap(),
            Command::Put(b"hunter2")
        );
    }

    #[test]
    fn test_put_empty_payload() {
        assert_eq!(parse(b"P\n", BUFFER_SIZE).unwrap(), Command::Put(b""));
    }

    #[test]
    fn test_bare_delimiter_is_length_error() {
        match parse(b"\n", BUFFER_SIZE) {
            Err(RequestError::Length { actual }) => assert_eq!(actual, 1),
            other => panic!("expected length error, got {other:?}"),
        }
    }

    #[test]
    fn test_line_at_maximum_length() {
        // 1 command byte + buffer_size payload + delimiter
        let line = b"P12345678\n";
        assert_eq!(line.len(), BUFFER_SIZE + 2);
        assert_eq!(
            parse(line, BUFFER_SIZE).unwrap(),
            Command::Put(b"12345678")
        );
    }

    #[test]
    fn test_line_over_maximum_length() {
        let line = b"P123456789\n";
        match parse(line, BUFFER_SIZE) {
            Err(RequestError::Length { actual }) => assert_eq!(actual, line.len()),
            other => panic!("expected length error, got {other:?}"),
        }
    }

    #[test]
    fn test_get_with_payload_is_length_error() {
        match parse(b"Gx\n", BUFFER_SIZE) {
            Err(RequestError::Length { actual }) => assert_eq!(actual, 3),
            other => panic!("expected length error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_accepted() {
        assert_eq!(parse(b"X\n", BUFFER_SIZE).unwrap(), Command::Unknown(b'X'));
        assert_eq!(
            parse(b"Zpayload\n", BUFFER_SIZE).unwrap(),
            Command::Unknown(b'Z')
        );
    }

    #[test]
    fn test_binary_payload_preserved() {
        assert_eq!(
            parse(b"P\x00\xff\x7f\n", BUFFER_SIZE).unwrap(),
            Command::Put(b"\x00\xff\x7f")
        );
    }
}
