//! Encoding-aware text writer over a response byte stream.
//!
//! [`ResponseStreamWriter`] accumulates text in a pooled character buffer
//! and, once the buffer fills, transcodes it into a pooled byte buffer and
//! writes it through to the body. It implements [`std::io::Write`] so a
//! `serde_json` serializer can write into it directly.
//!
//! Characters the target charset cannot represent are written as `\uXXXX`
//! escapes (a surrogate pair above U+FFFF). Non-ASCII text only reaches the
//! writer inside JSON strings or the callback identifier, and both JSON and
//! JavaScript decode that escape back to the original character.
//!
//! The writer always gives its buffers back to the pool. Dropping a writer
//! that was not [`finish`](ResponseStreamWriter::finish)ed flushes what it
//! holds on a best-effort basis; a write that failed at the transport is not
//! retried on drop.

use std::io::{self, Write};

use encoding_rs::{Encoder, EncoderResult, UTF_8, UTF_16BE, UTF_16LE, mem};
use tracing::debug;

use crate::media::Charset;
use crate::pool::{BufferPool, Pooled};

enum Transcode {
    Utf8,
    Utf16 { big_endian: bool },
    Latin1,
    Encoder(Encoder),
}

impl Transcode {
    fn for_charset(charset: Charset) -> Self {
        match charset {
            Charset::Latin1 => Transcode::Latin1,
            Charset::Encoding(encoding) if encoding == UTF_16LE => {
                Transcode::Utf16 { big_endian: false }
            }
            Charset::Encoding(encoding) if encoding == UTF_16BE => {
                Transcode::Utf16 { big_endian: true }
            }
            Charset::Encoding(encoding) if encoding.output_encoding() == UTF_8 => {
                Transcode::Utf8
            }
            Charset::Encoding(encoding) => Transcode::Encoder(encoding.new_encoder()),
        }
    }
}

/// A buffered, transcoding text writer bound to an output byte stream.
pub struct ResponseStreamWriter<'p, W: Write> {
    inner: W,
    charset: Charset,
    transcode: Transcode,
    chars: Pooled<'p, String>,
    bytes: Pooled<'p, Vec<u8>>,
    char_limit: usize,
    /// Tail of a UTF-8 sequence split across `io::Write::write` calls.
    pending: [u8; 4],
    pending_len: usize,
    written: u64,
    finished: bool,
    failed: bool,
}

impl<'p, W: Write> ResponseStreamWriter<'p, W> {
    pub fn new(inner: W, charset: impl Into<Charset>, pool: &'p BufferPool) -> Self {
        let charset = charset.into();
        Self {
            inner,
            charset,
            transcode: Transcode::for_charset(charset),
            chars: pool.rent_chars(),
            bytes: pool.rent_bytes(),
            char_limit: pool.config().char_buffer_size.max(1),
            pending: [0; 4],
            pending_len: 0,
            written: 0,
            finished: false,
            failed: false,
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Bytes written through to the underlying stream so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append text, draining to the stream whenever the buffer fills.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        let mut rest = text;
        while !rest.is_empty() {
            if self.chars.len() >= self.char_limit {
                self.drain(false)?;
            }
            let room = self.char_limit - self.chars.len();
            let mut cut = room.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                if !self.chars.is_empty() {
                    self.drain(false)?;
                    continue;
                }
                // Buffer smaller than one character; take the whole character.
                cut = rest
                    .char_indices()
                    .nth(1)
                    .map_or(rest.len(), |(index, _)| index);
            }
            let (head, tail) = rest.split_at(cut);
            self.chars.push_str(head);
            rest = tail;
        }
        Ok(())
    }

    /// Drain everything, flush the stream, and return the total byte count.
    pub fn finish(mut self) -> io::Result<u64> {
        if self.pending_len > 0 {
            self.failed = true;
            return Err(invalid_utf8());
        }
        self.drain(true)?;
        self.inner.flush().inspect_err(|_| self.failed = true)?;
        self.finished = true;
        Ok(self.written)
    }

    fn drain(&mut self, last: bool) -> io::Result<()> {
        if self.chars.is_empty() && !last {
            return Ok(());
        }

        let result = match &mut self.transcode {
            Transcode::Utf8 => self
                .inner
                .write_all(self.chars.as_bytes())
                .map(|()| self.chars.len()),
            Transcode::Utf16 { big_endian } => {
                let bytes = &mut *self.bytes;
                bytes.clear();
                for unit in self.chars.encode_utf16() {
                    if *big_endian {
                        bytes.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        bytes.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                self.inner.write_all(bytes).map(|()| bytes.len())
            }
            Transcode::Latin1 => {
                let bytes = &mut *self.bytes;
                bytes.clear();
                encode_latin1(&self.chars, bytes);
                self.inner.write_all(bytes).map(|()| bytes.len())
            }
            Transcode::Encoder(encoder) => {
                let bytes = &mut *self.bytes;
                bytes.clear();
                encode_escaping(encoder, &self.chars, bytes, last);
                self.inner.write_all(bytes).map(|()| bytes.len())
            }
        };
        self.chars.clear();

        match result {
            Ok(count) => {
                self.written += count as u64;
                Ok(())
            }
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }
}

impl<W: Write> Write for ResponseStreamWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let total = buf.len();
        let mut buf = buf;

        while self.pending_len > 0 && !buf.is_empty() {
            self.pending[self.pending_len] = buf[0];
            self.pending_len += 1;
            buf = &buf[1..];
            let pending = self.pending;
            match std::str::from_utf8(&pending[..self.pending_len]) {
                Ok(text) => {
                    self.pending_len = 0;
                    self.write_str(text)?;
                }
                Err(err) if err.error_len().is_some() => return Err(invalid_utf8()),
                Err(_) => {}
            }
        }

        if buf.is_empty() {
            return Ok(total);
        }

        match std::str::from_utf8(buf) {
            Ok(text) => self.write_str(text)?,
            Err(err) if err.error_len().is_none() => {
                let (valid, tail) = buf.split_at(err.valid_up_to());
                let text = std::str::from_utf8(valid).map_err(|_| invalid_utf8())?;
                self.write_str(text)?;
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
            }
            Err(_) => return Err(invalid_utf8()),
        }
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain(false)?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for ResponseStreamWriter<'_, W> {
    fn drop(&mut self) {
        if self.finished || self.failed {
            return;
        }
        let flushed = self.drain(true).and_then(|()| self.inner.flush());
        if let Err(err) = flushed {
            debug!(error = %err, "flush of abandoned response writer failed");
        }
    }
}

/// One byte per code point up to U+00FF; anything above is escaped.
fn encode_latin1(mut src: &str, dst: &mut Vec<u8>) {
    while !src.is_empty() {
        let up_to = mem::str_latin1_up_to(src);
        dst.extend_from_slice(&mem::encode_latin1_lossy(&src[..up_to]));
        src = &src[up_to..];
        if let Some(c) = src.chars().next() {
            dst.extend_from_slice(unicode_escape(c).as_bytes());
            src = &src[c.len_utf8()..];
        }
    }
}

/// Encode `src`, escaping every character the encoder cannot map.
fn encode_escaping(encoder: &mut Encoder, mut src: &str, dst: &mut Vec<u8>, last: bool) {
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        dst.reserve(needed);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(src, dst, last);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return,
            EncoderResult::OutputFull => {}
            // The escape is ASCII, which every encoder maps.
            EncoderResult::Unmappable(c) => {
                encode_escaping(encoder, &unicode_escape(c), dst, false);
            }
        }
    }
}

fn unicode_escape(c: char) -> String {
    let mut units = [0u16; 2];
    c.encode_utf16(&mut units)
        .iter()
        .map(|unit| format!("\\u{unit:04x}"))
        .collect()
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PoolConfig;
    use encoding_rs::{SHIFT_JIS, WINDOWS_1252};

    fn pool(char_buffer_size: usize) -> BufferPool {
        BufferPool::new(PoolConfig {
            max_retained: 4,
            char_buffer_size,
            max_buffer_capacity: 1024 * 1024,
        })
    }

    /// Records each `write` call separately so drain boundaries are visible.
    #[derive(Default)]
    struct Chunks(Vec<Vec<u8>>);

    impl Write for Chunks {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn utf8_passthrough() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
        writer.write_str("héllo ").unwrap();
        writer.write_str("wörld").unwrap();
        let written = writer.finish().unwrap();

        assert_eq!(out, "héllo wörld".as_bytes());
        assert_eq!(written, out.len() as u64);
    }

    #[test]
    fn drains_when_buffer_fills() {
        let pool = pool(4);
        let mut sink = Chunks::default();
        let mut writer = ResponseStreamWriter::new(&mut sink, UTF_8, &pool);
        writer.write_str("abcdefghij").unwrap();
        writer.finish().unwrap();

        let chunks: Vec<&[u8]> = sink.0.iter().map(Vec::as_slice).collect();
        assert_eq!(chunks, vec![&b"abcd"[..], b"efgh", b"ij"]);
    }

    #[test]
    fn never_splits_a_character() {
        let pool = pool(3);
        let mut sink = Chunks::default();
        let mut writer = ResponseStreamWriter::new(&mut sink, UTF_8, &pool);
        writer.write_str("aéb€").unwrap();
        writer.finish().unwrap();

        for chunk in &sink.0 {
            assert!(std::str::from_utf8(chunk).is_ok(), "chunk {chunk:?} split a character");
        }
        let joined: Vec<u8> = sink.0.concat();
        assert_eq!(joined, "aéb€".as_bytes());
    }

    #[test]
    fn buffer_smaller_than_character() {
        let pool = pool(1);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
        writer.write_str("€€").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, "€€".as_bytes());
    }

    #[test]
    fn windows_1252_transcoding() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, WINDOWS_1252, &pool);
        writer.write_str("café").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, b"caf\xE9");
    }

    #[test]
    fn unmappable_becomes_unicode_escape() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, WINDOWS_1252, &pool);
        writer.write_str("a\u{2603}b").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, br"a\u2603b");
    }

    #[test]
    fn latin1_is_one_byte_per_code_point() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, Charset::Latin1, &pool);
        writer.write_str("\u{41}\u{80}\u{9f}\u{e9}\u{ff}").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, [0x41, 0x80, 0x9F, 0xE9, 0xFF]);
    }

    #[test]
    fn latin1_escapes_above_u00ff() {
        let pool = pool(4);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, Charset::Latin1, &pool);
        writer.write_str("\u{e9}\u{20ac}\u{1f600}!").unwrap();
        writer.finish().unwrap();

        let mut expected = vec![0xE9];
        expected.extend_from_slice(br"\u20ac\ud83d\ude00!");
        assert_eq!(out, expected);
    }

    #[test]
    fn shift_jis_escapes_unmappable() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, SHIFT_JIS, &pool);
        writer.write_str("a\u{1f600}b").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, br"a\ud83d\ude00b");
    }

    #[test]
    fn shift_jis_transcoding() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, SHIFT_JIS, &pool);
        writer.write_str("日本").unwrap();
        writer.finish().unwrap();
        let (expected, _, _) = SHIFT_JIS.encode("日本");
        assert_eq!(out, &expected[..]);
    }

    #[test]
    fn utf16_transcoding() {
        let pool = pool(64);

        let mut le = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut le, UTF_16LE, &pool);
        writer.write_str("a€").unwrap();
        writer.finish().unwrap();
        assert_eq!(le, vec![0x61, 0x00, 0xAC, 0x20]);

        let mut be = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut be, UTF_16BE, &pool);
        writer.write_str("a€").unwrap();
        writer.finish().unwrap();
        assert_eq!(be, vec![0x00, 0x61, 0x20, 0xAC]);
    }

    #[test]
    fn io_write_reassembles_split_sequences() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
        let euro = "€".as_bytes();
        writer.write_all(&euro[..1]).unwrap();
        writer.write_all(&euro[1..2]).unwrap();
        writer.write_all(&euro[2..]).unwrap();
        writer.write_all(b"!").unwrap();
        writer.finish().unwrap();
        assert_eq!(out, "€!".as_bytes());
    }

    #[test]
    fn io_write_rejects_invalid_utf8() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
        let err = writer.write(&[0x61, 0xFF, 0x62]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn finish_rejects_truncated_sequence() {
        let pool = pool(64);
        let mut out = Vec::new();
        let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
        writer.write_all(&"€".as_bytes()[..2]).unwrap();
        assert!(writer.finish().is_err());
    }

    #[test]
    fn drop_flushes_partial_output() {
        let pool = pool(64);
        let mut out = Vec::new();
        {
            let mut writer = ResponseStreamWriter::new(&mut out, UTF_8, &pool);
            writer.write_str("cb([1").unwrap();
        }
        assert_eq!(out, b"cb([1");
        assert_eq!(pool.stats().returned, 2);
    }

    #[test]
    fn transport_failure_surfaces_and_returns_buffers() {
        let pool = pool(2);
        let mut writer = ResponseStreamWriter::new(Broken, UTF_8, &pool);
        let err = writer.write_str("abcdef").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        drop(writer);

        let stats = pool.stats();
        assert_eq!(stats.rented, stats.returned);
    }
}
