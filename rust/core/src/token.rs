// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token kinds stored on the tape.
//!
//! Every token starts with a one-byte kind tag. The payload that follows
//! depends on the kind:
//!
//! | Kind | Payload |
//! |---|---|
//! | `LineEnd`, `Unknown`, `Empty`, `SetBegin`, `SetEnd` | none |
//! | `Ref` | `u32` little-endian |
//! | `Real` | `f64` little-endian |
//! | `String`, `Enum`, `Label` | `u8` length + raw bytes |
//!
//! A `Label` is always followed by `SetBegin`, one scalar token and `SetEnd`.

use std::fmt;

/// Longest text payload a `String`, `Enum` or `Label` token can carry
pub const MAX_SHORT_STRING: usize = u8::MAX as usize;

/// One-byte token kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    Unknown = 0,
    String = 1,
    Label = 2,
    Enum = 3,
    Real = 4,
    Ref = 5,
    Empty = 6,
    SetBegin = 7,
    SetEnd = 8,
    LineEnd = 9,
}

impl TokenKind {
    /// Decode a kind tag
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        let kind = match byte {
            0 => Self::Unknown,
            1 => Self::String,
            2 => Self::Label,
            3 => Self::Enum,
            4 => Self::Real,
            5 => Self::Ref,
            6 => Self::Empty,
            7 => Self::SetBegin,
            8 => Self::SetEnd,
            9 => Self::LineEnd,
            _ => return None,
        };
        Some(kind)
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Size of the fixed payload following the tag, `None` for length-prefixed kinds
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            Self::Ref => Some(4),
            Self::Real => Some(8),
            Self::String | Self::Enum | Self::Label => None,
            Self::Unknown | Self::Empty | Self::SetBegin | Self::SetEnd | Self::LineEnd => Some(0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::String => "STRING",
            Self::Label => "LABEL",
            Self::Enum => "ENUM",
            Self::Real => "REAL",
            Self::Ref => "REF",
            Self::Empty => "EMPTY",
            Self::SetBegin => "SET_BEGIN",
            Self::SetEnd => "SET_END",
            Self::LineEnd => "LINE_END",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
