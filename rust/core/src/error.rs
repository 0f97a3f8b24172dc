// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for tape, codec and model operations.

use thiserror::Error;

use crate::registry::ModelHandle;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, decoding or writing a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source text; the model is not created.
    #[error("Parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    /// A tape read ran past the written bytes.
    #[error("Tape truncated at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedTape {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A byte in token position that is not a known token kind.
    #[error("Unknown token kind 0x{kind:02x} at tape offset {offset}")]
    UnknownTokenKind { kind: u8, offset: usize },

    /// `LINE_END` reached while `depth` lists were still open.
    #[error("Line ended at tape offset {offset} with {depth} unclosed list(s)")]
    UnbalancedList { offset: usize, depth: usize },

    /// The tape header at a directory offset does not describe the expected line.
    #[error("Line #{id} is corrupt: {message}")]
    CorruptLine { id: u32, message: String },

    #[error("Line #{0} not found")]
    NotFound(u32),

    #[error("Invalid model handle: {0:?}")]
    InvalidHandle(ModelHandle),

    /// A value shape the codec does not model.
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("Unknown type code {0}")]
    UnknownTypeCode(u32),
}

impl Error {
    /// Create a parse error at a byte position of the source text
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an unsupported-value error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedValue(message.into())
    }
}
