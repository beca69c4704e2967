//! The concrete transport: a line-oriented duplex over TCP. Kept behind
//! a small trait so the command loop — and its tests — can swap in an
//! in-memory duplex without touching a single socket.

pub mod listener;

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use libbst::MAX_LINE_LEN;

/// A line-oriented, bidirectional stream. Reading yields one line at a
/// time with the trailing newline stripped; `None` means the peer closed
/// its write side. Writing is plain `std::io::Write` — the interpreter
/// already appends the newline to every response it produces.
pub trait Connection: Write {
    fn receive_line(&mut self) -> std::io::Result<Option<String>>;
}

pub struct TcpConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> std::io::Result<TcpConnection> {
        let writer = stream.try_clone()?;
        Ok(TcpConnection {
            reader: BufReader::new(stream),
            writer,
        })
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Connection for TcpConnection {
    fn receive_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        // A socket shut down from the supervisor side surfaces here either
        // as a zero-byte read or as an I/O error; both are treated as EOF
        // by the worker loop. The request line is bounded to
        // `MAX_LINE_LEN` bytes (plus the trailing newline); a `Take`
        // adapter caps how much a single `read_line` will pull off the
        // socket so an oversized line can't be read in full and processed.
        let read = {
            let mut capped = (&mut self.reader).take(MAX_LINE_LEN as u64 + 1);
            capped.read_line(&mut line)?
        };
        if read == 0 {
            return Ok(None);
        }
        if line.len() > MAX_LINE_LEN && !line.ends_with('\n') {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("request line exceeds {MAX_LINE_LEN} bytes"),
            ));
        }
        while matches!(line.chars().last(), Some('\n') | Some('\r')) {
            line.pop();
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn receive_line_strips_crlf_and_reports_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"q hello\r\n").unwrap();
        });
        let (server_stream, _) = listener.accept().unwrap();
        let mut conn = TcpConnection::new(server_stream).unwrap();
        assert_eq!(conn.receive_line().unwrap(), Some("q hello".to_string()));
        client.join().unwrap();
        assert_eq!(conn.receive_line().unwrap(), None);
    }

    #[test]
    fn receive_line_rejects_a_line_over_the_maximum_length() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let oversized = vec![b'x'; MAX_LINE_LEN + 1];
            stream.write_all(&oversized).unwrap();
            stream.write_all(b"\n").unwrap();
        });
        let (server_stream, _) = listener.accept().unwrap();
        let mut conn = TcpConnection::new(server_stream).unwrap();
        assert!(conn.receive_line().is_err());
        client.join().unwrap();
    }
}
