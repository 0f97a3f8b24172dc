// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token Stream - paged, append-only byte tape
//!
//! All line data of one model lives on a single tape. The tape is split into
//! fixed-size pages so that appending never moves bytes that were already
//! written: an offset handed out once stays valid for the lifetime of the
//! tape, and so does every [`StringView`].
//!
//! Writes always go to the end of the tape. Reads go through a seekable read
//! cursor, which is how the line directory jumps straight to a line.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::token::TokenKind;

/// Default page size (64 KiB)
pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024;

/// Smallest accepted page size
pub const MIN_PAGE_SIZE: usize = 16;

/// Destination for encoded tokens.
///
/// Implemented by the tape itself and by `Vec<u8>`, which the model uses to
/// stage a line before committing it in one append.
pub trait TokenSink {
    fn push_bytes(&mut self, bytes: &[u8]);

    #[inline]
    fn push_kind(&mut self, kind: TokenKind) {
        self.push_bytes(&[kind.as_byte()]);
    }

    #[inline]
    fn push_u32(&mut self, value: u32) {
        self.push_bytes(&value.to_le_bytes());
    }

    #[inline]
    fn push_f64(&mut self, value: f64) {
        self.push_bytes(&value.to_le_bytes());
    }
}

impl TokenSink for Vec<u8> {
    #[inline]
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Fixed-size values that can be read off the tape
pub trait TapeValue: Sized {
    const SIZE: usize;

    /// Decode from exactly `SIZE` little-endian bytes
    fn from_le(bytes: &[u8]) -> Self;
}

impl TapeValue for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl TapeValue for u32 {
    const SIZE: usize = 4;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(raw)
    }
}

impl TapeValue for f64 {
    const SIZE: usize = 8;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(raw)
    }
}

/// Non-owning reference to a length-prefixed payload on the tape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringView {
    pub offset: usize,
    pub len: usize,
}

/// Growable, paged token tape with a seekable read cursor
#[derive(Debug)]
pub struct TokenStream {
    pages: Vec<Box<[u8]>>,
    page_size: usize,
    /// Write cursor; always the end of the written data
    len: usize,
    read_pos: usize,
}

impl Default for TokenStream {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStream {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a tape with a custom page size (clamped to [`MIN_PAGE_SIZE`])
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_size: page_size.max(MIN_PAGE_SIZE),
            len: 0,
            read_pos: 0,
        }
    }

    /// Number of bytes written
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Offset the next append will land at
    #[inline]
    pub fn write_position(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// True when the read cursor has consumed every written byte
    #[inline]
    pub fn at_end(&self) -> bool {
        self.read_pos >= self.len
    }

    /// Move the read cursor
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.len {
            return Err(Error::TruncatedTape {
                offset,
                needed: offset - self.len,
                available: self.len,
            });
        }
        self.read_pos = offset;
        Ok(())
    }

    /// Read a fixed-size value at the read cursor and advance
    #[inline]
    pub fn read<T: TapeValue>(&mut self) -> Result<T> {
        let offset = self.read_pos;
        self.ensure_available(offset, T::SIZE)?;

        let page = offset / self.page_size;
        let start = offset % self.page_size;
        let value = if start + T::SIZE <= self.page_size {
            T::from_le(&self.pages[page][start..start + T::SIZE])
        } else {
            let mut scratch = [0u8; 8];
            self.copy_out(offset, &mut scratch[..T::SIZE]);
            T::from_le(&scratch[..T::SIZE])
        };

        self.read_pos += T::SIZE;
        Ok(value)
    }

    /// Read a token kind tag at the read cursor
    #[inline]
    pub fn read_kind(&mut self) -> Result<TokenKind> {
        let offset = self.read_pos;
        let byte = self.read::<u8>()?;
        TokenKind::from_byte(byte).ok_or(Error::UnknownTokenKind { kind: byte, offset })
    }

    /// Read a one-byte length and return a view over that many payload bytes
    pub fn read_string_view(&mut self) -> Result<StringView> {
        let len = self.read::<u8>()? as usize;
        let offset = self.read_pos;
        self.ensure_available(offset, len)?;
        self.read_pos += len;
        Ok(StringView { offset, len })
    }

    /// Resolve a view. Borrows from the page unless the payload spans two pages.
    pub fn view(&self, view: &StringView) -> Cow<'_, [u8]> {
        if view.len == 0 {
            return Cow::Borrowed(&[][..]);
        }
        let page = view.offset / self.page_size;
        let start = view.offset % self.page_size;
        if start + view.len <= self.page_size {
            Cow::Borrowed(&self.pages[page][start..start + view.len])
        } else {
            let mut owned = vec![0u8; view.len];
            self.copy_out(view.offset, &mut owned);
            Cow::Owned(owned)
        }
    }

    /// Copy `out.len()` bytes starting at `offset`; caller checks bounds
    fn copy_out(&self, offset: usize, out: &mut [u8]) {
        let mut done = 0;
        while done < out.len() {
            let at = offset + done;
            let page = at / self.page_size;
            let start = at % self.page_size;
            let n = (self.page_size - start).min(out.len() - done);
            out[done..done + n].copy_from_slice(&self.pages[page][start..start + n]);
            done += n;
        }
    }

    fn ensure_available(&self, offset: usize, needed: usize) -> Result<()> {
        let available = self.len.saturating_sub(offset);
        if available < needed {
            return Err(Error::TruncatedTape {
                offset,
                needed,
                available,
            });
        }
        Ok(())
    }
}

impl TokenSink for TokenStream {
    fn push_bytes(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let page = self.len / self.page_size;
            let start = self.len % self.page_size;
            if page == self.pages.len() {
                self.pages.push(vec![0u8; self.page_size].into_boxed_slice());
            }
            let n = (self.page_size - start).min(bytes.len());
            self.pages[page][start..start + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            bytes = &bytes[n..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_scalars() {
        let mut tape = TokenStream::new();
        tape.push_kind(TokenKind::Ref);
        tape.push_u32(42);
        tape.push_kind(TokenKind::Real);
        tape.push_f64(-2.5);

        assert_eq!(tape.len(), 1 + 4 + 1 + 8);
        assert_eq!(tape.read_kind().unwrap(), TokenKind::Ref);
        assert_eq!(tape.read::<u32>().unwrap(), 42);
        assert_eq!(tape.read_kind().unwrap(), TokenKind::Real);
        assert_eq!(tape.read::<f64>().unwrap(), -2.5);
        assert!(tape.at_end());
    }

    #[test]
    fn test_truncated_read() {
        let mut tape = TokenStream::new();
        tape.push_bytes(&[1, 2]);

        let err = tape.read::<u32>().unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedTape {
                offset: 0,
                needed: 4,
                available: 2
            }
        );
        // Cursor does not move on failure
        assert_eq!(tape.read_position(), 0);
    }

    #[test]
    fn test_values_spanning_pages() {
        let mut tape = TokenStream::with_page_size(MIN_PAGE_SIZE);
        tape.push_bytes(&[0u8; 13]);
        tape.push_f64(std::f64::consts::PI);
        tape.push_u32(0xDEAD_BEEF);

        assert_eq!(tape.page_count(), 2);
        tape.seek(13).unwrap();
        assert_eq!(tape.read::<f64>().unwrap(), std::f64::consts::PI);
        assert_eq!(tape.read::<u32>().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_string_view_borrowed_and_spanning() {
        let mut tape = TokenStream::with_page_size(MIN_PAGE_SIZE);
        tape.push_bytes(&[5]);
        tape.push_bytes(b"hello");
        tape.push_bytes(&[0u8; 6]);
        // Crosses the boundary at 16
        tape.push_bytes(&[8]);
        tape.push_bytes(b"spanning");

        let first = tape.read_string_view().unwrap();
        let bytes = tape.view(&first);
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(&*bytes, b"hello");

        tape.seek(12).unwrap();
        let second = tape.read_string_view().unwrap();
        let bytes = tape.view(&second);
        assert!(matches!(bytes, Cow::Owned(_)));
        assert_eq!(&*bytes, b"spanning");
    }

    #[test]
    fn test_views_survive_later_appends() {
        let mut tape = TokenStream::with_page_size(MIN_PAGE_SIZE);
        tape.push_bytes(&[3]);
        tape.push_bytes(b"abc");
        let view = tape.read_string_view().unwrap();

        for _ in 0..100 {
            tape.push_u32(7);
        }
        assert!(tape.page_count() > 10);
        assert_eq!(&*tape.view(&view), b"abc");
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut tape = TokenStream::new();
        tape.push_kind(TokenKind::LineEnd);
        assert!(tape.seek(1).is_ok());
        assert!(tape.at_end());
        assert_eq!(
            tape.seek(5),
            Err(Error::TruncatedTape {
                offset: 5,
                needed: 4,
                available: 1
            })
        );
        assert_eq!(tape.read_position(), 1);
    }

    #[test]
    fn test_unknown_kind_byte() {
        let mut tape = TokenStream::new();
        tape.push_bytes(&[0x7f]);
        assert_eq!(
            tape.read_kind().unwrap_err(),
            Error::UnknownTokenKind {
                kind: 0x7f,
                offset: 0
            }
        );
    }

    #[test]
    fn test_vec_sink_matches_tape_bytes() {
        let mut staged: Vec<u8> = Vec::new();
        staged.push_kind(TokenKind::Ref);
        staged.push_u32(9);

        let mut tape = TokenStream::new();
        tape.push_bytes(&staged);
        assert_eq!(tape.read_kind().unwrap(), TokenKind::Ref);
        assert_eq!(tape.read::<u32>().unwrap(), 9);
    }
}
