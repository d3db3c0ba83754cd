use encoding_rs::{Decoder, Encoding, UTF_8};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A byte producer that can be read incrementally and told to stop early.
pub trait ByteSource {
    /// Fills `buf` with the next chunk. Returns 0 once the source is exhausted.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Stops the source. Sources that cannot stop early may ignore this.
    fn cancel(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts any `Read` into a `ByteSource`; cancelling drops the reader.
pub struct ReaderSource<R: Read> {
    inner: Option<R>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_none()
    }
}

impl ReaderSource<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(reader) => loop {
                match reader.read(buf) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => return other,
                }
            },
            None => Ok(0),
        }
    }

    fn cancel(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// Serves a memory-mapped file in chunks; cancelling unmaps it.
pub struct MmapSource {
    mmap: Option<Mmap>,
    pos: usize,
}

impl MmapSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // Mapping a zero-length file fails on some platforms.
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None, pos: 0 });
        }
        // Safety: the file must not be truncated by another process while mapped.
        // Only the first line is read, and the map is dropped as soon as it is found.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Some(mmap),
            pos: 0,
        })
    }
}

impl ByteSource for MmapSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mmap) = self.mmap.as_ref() else {
            return Ok(0);
        };
        let remaining = &mmap[self.pos.min(mmap.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn cancel(&mut self) -> io::Result<()> {
        self.mmap = None;
        Ok(())
    }
}

/// Holds a source for the duration of a read and cancels it exactly once,
/// whichever way the read ends.
pub struct SourceGuard<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    released: bool,
}

impl<'a, S: ByteSource + ?Sized> SourceGuard<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            released: false,
        }
    }

    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.released {
            return Ok(0);
        }
        self.source.read_chunk(buf)
    }

    /// Best effort: failures are logged, never returned.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.source.cancel() {
            debug!("Source cancellation failed: {}", e);
        }
    }
}

impl<S: ByteSource + ?Sized> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolves an encoding label, falling back to UTF-8 for unknown labels.
pub fn resolve_encoding(label: &str) -> &'static Encoding {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!("Unknown encoding {:?}, falling back to UTF-8", label);
            UTF_8
        }
    }
}

/// Decodes a source chunk by chunk and stops at the first line feed.
pub struct FirstLineReader {
    decoder: Decoder,
    chunk_size: usize,
    line: String,
    seen_text: bool,
    replaced: bool,
}

impl FirstLineReader {
    pub fn new(encoding: &'static Encoding, chunk_size: usize) -> Self {
        Self {
            // BOM handling is done on the decoded text so it is stripped at most once.
            decoder: encoding.new_decoder_without_bom_handling(),
            chunk_size: chunk_size.max(1),
            line: String::new(),
            seen_text: false,
            replaced: false,
        }
    }

    pub fn with_label(label: &str, chunk_size: usize) -> Self {
        Self::new(resolve_encoding(label), chunk_size)
    }

    /// Reads up to the first `\n` and returns the line without BOM or trailing `\r`.
    /// If the source ends first, everything that was read is the line.
    pub fn read<S: ByteSource + ?Sized>(mut self, source: &mut S) -> io::Result<String> {
        let mut guard = SourceGuard::new(source);
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0usize;

        loop {
            let n = guard.read_chunk(&mut buf)?;
            total += n;
            let last = n == 0;
            debug!("Read {} bytes ({} total)", n, total);

            if self.push_chunk(&buf[..n], last) {
                guard.release();
                debug!("Header line found after {} bytes, source cancelled", total);
                break;
            }
            if last {
                debug!("Source exhausted after {} bytes without a line feed", total);
                break;
            }
        }
        drop(guard);

        if self.replaced {
            debug!("Undecodable bytes in header line were replaced");
        }
        if self.line.ends_with('\r') {
            self.line.pop();
        }
        Ok(self.line)
    }

    /// Decodes one chunk and appends it. Returns true once a line feed was seen.
    fn push_chunk(&mut self, bytes: &[u8], last: bool) -> bool {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 16);
        let mut decoded = String::with_capacity(capacity);
        let (_, _, replaced) = self.decoder.decode_to_string(bytes, &mut decoded, last);
        self.replaced |= replaced;

        let mut chunk = decoded.as_str();
        if !self.seen_text && !chunk.is_empty() {
            chunk = chunk.strip_prefix('\u{FEFF}').unwrap_or(chunk);
            self.seen_text = true;
        }

        match chunk.find('\n') {
            Some(nl) => {
                self.line.push_str(&chunk[..nl]);
                true
            }
            None => {
                self.line.push_str(chunk);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    /// Hands out pre-split chunks and records cancellation.
    struct ScriptedSource {
        chunks: Vec<Vec<u8>>,
        next: usize,
        cancels: usize,
        fail_at: Option<usize>,
    }

    impl ScriptedSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                next: 0,
                cancels: 0,
                fail_at: None,
            }
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.fail_at == Some(self.next) {
                return Err(io::Error::other("connection reset"));
            }
            let Some(chunk) = self.chunks.get(self.next) else {
                return Ok(0);
            };
            assert!(chunk.len() <= buf.len());
            buf[..chunk.len()].copy_from_slice(chunk);
            self.next += 1;
            Ok(chunk.len())
        }

        fn cancel(&mut self) -> io::Result<()> {
            self.cancels += 1;
            Err(io::Error::new(io::ErrorKind::Unsupported, "cannot cancel"))
        }
    }

    fn read_utf8<S: ByteSource>(source: &mut S) -> io::Result<String> {
        FirstLineReader::new(UTF_8, 64).read(source)
    }

    #[test]
    fn test_stops_at_first_line_feed() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"Name,Tick", b"et\nAda,1\n", b"Bob,2\n"]);
        assert_eq!(read_utf8(&mut source)?, "Name,Ticket");
        assert_eq!(source.next, 2);
        assert_eq!(source.cancels, 1);
        Ok(())
    }

    #[test]
    fn test_strips_crlf() -> Result<()> {
        let mut source = ReaderSource::new(Cursor::new(b"a,b\r\n1,2\r\n".to_vec()));
        assert_eq!(read_utf8(&mut source)?, "a,b");
        assert!(source.is_cancelled());
        Ok(())
    }

    #[test]
    fn test_cr_split_from_lf_across_chunks() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"a,b\r", b"\nc,d"]);
        assert_eq!(read_utf8(&mut source)?, "a,b");
        Ok(())
    }

    #[test]
    fn test_bom_stripped_once() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"\xEF\xBB\xBF\xEF\xBB\xBFa,b"]);
        assert_eq!(read_utf8(&mut source)?, "\u{FEFF}a,b");
        Ok(())
    }

    #[test]
    fn test_bom_split_across_chunks() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"\xEF", b"\xBB", b"\xBFa,b\n"]);
        assert_eq!(read_utf8(&mut source)?, "a,b");
        Ok(())
    }

    #[test]
    fn test_bom_only_checked_on_first_text() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"a,", b"\xEF\xBB\xBFb\n"]);
        assert_eq!(read_utf8(&mut source)?, "a,\u{FEFF}b");
        Ok(())
    }

    #[test]
    fn test_multibyte_split_across_chunks() -> Result<()> {
        // "é" is C3 A9
        let mut source = ScriptedSource::new(&[b"caf\xC3", b"\xA9;prix\n"]);
        assert_eq!(read_utf8(&mut source)?, "café;prix");
        Ok(())
    }

    #[test]
    fn test_invalid_bytes_are_replaced() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"a\xFF,b"]);
        assert_eq!(read_utf8(&mut source)?, "a\u{FFFD},b");
        Ok(())
    }

    #[test]
    fn test_truncated_sequence_at_eof_is_flushed() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"a,b\xC3"]);
        assert_eq!(read_utf8(&mut source)?, "a,b\u{FFFD}");
        Ok(())
    }

    #[test]
    fn test_no_line_feed_returns_everything() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"a,b", b",c"]);
        assert_eq!(read_utf8(&mut source)?, "a,b,c");
        assert_eq!(source.cancels, 1);
        Ok(())
    }

    #[test]
    fn test_empty_source() -> Result<()> {
        let mut source = ScriptedSource::new(&[]);
        assert_eq!(read_utf8(&mut source)?, "");
        Ok(())
    }

    #[test]
    fn test_read_error_still_cancels() {
        let mut source = ScriptedSource::new(&[b"a,b", b"c"]);
        source.fail_at = Some(1);
        assert!(read_utf8(&mut source).is_err());
        assert_eq!(source.cancels, 1);
    }

    #[test]
    fn test_latin1_decoding() -> Result<()> {
        let mut source = ScriptedSource::new(&[b"Pr\xE9nom;Nom\n"]);
        let line = FirstLineReader::with_label("latin1", 64).read(&mut source)?;
        assert_eq!(line, "Prénom;Nom");
        Ok(())
    }

    #[test]
    fn test_unknown_label_falls_back_to_utf8() {
        assert_eq!(resolve_encoding("not-a-charset"), UTF_8);
        assert_eq!(resolve_encoding(" UTF-8 "), UTF_8);
    }

    #[test]
    fn test_tiny_chunks() -> Result<()> {
        let mut source = ReaderSource::new(Cursor::new("\u{FEFF}Größe|Ticket\nx|y".as_bytes()));
        let line = FirstLineReader::new(UTF_8, 1).read(&mut source)?;
        assert_eq!(line, "Größe|Ticket");
        Ok(())
    }

    #[test]
    fn test_mmap_source() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "first,second\nthird,fourth\n")?;

        let mut source = MmapSource::open(file.path())?;
        let line = FirstLineReader::new(UTF_8, 4).read(&mut source)?;
        assert_eq!(line, "first,second");
        assert!(source.mmap.is_none());
        Ok(())
    }

    #[test]
    fn test_mmap_empty_file() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut source = MmapSource::open(file.path())?;
        assert_eq!(read_utf8(&mut source)?, "");
        Ok(())
    }
}
