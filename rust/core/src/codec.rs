// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Argument Codec - translate between tape tokens and [`ArgumentValue`] trees
//!
//! Both directions walk nested lists with an explicit stack so deeply nested
//! input cannot exhaust the call stack.
//!
//! A line is laid out on the tape as:
//!
//! ```text
//! REF <id>  LABEL <type name>  SET_BEGIN <arguments...> SET_END  LINE_END
//! ```
//!
//! The directory stores the offset of the leading `REF`.

use smallvec::SmallVec;

use crate::directory::LineEntry;
use crate::error::{Error, Result};
use crate::parser::is_step_keyword;
use crate::tape::{TokenSink, TokenStream};
use crate::token::{TokenKind, MAX_SHORT_STRING};
use crate::value::{ArgumentValue, TextKind};

/// Decoded line
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    pub id: u32,
    pub type_code: u32,
    /// Always an [`ArgumentValue::List`]
    pub arguments: ArgumentValue,
}

impl Line {
    /// Get argument by index
    pub fn get(&self, index: usize) -> Option<&ArgumentValue> {
        self.arguments.as_list().and_then(|args| args.get(index))
    }

    /// Number of top-level arguments
    pub fn len(&self) -> usize {
        self.arguments.as_list().map_or(0, |args| args.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_ref(&self, index: usize) -> Option<u32> {
        self.get(index).and_then(|v| v.as_reference())
    }

    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }
}

/// Write a length-prefixed text token
fn push_short_string<S: TokenSink + ?Sized>(sink: &mut S, kind: TokenKind, text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > MAX_SHORT_STRING {
        return Err(Error::unsupported(format!(
            "{} of {} bytes exceeds the {}-byte limit",
            kind,
            bytes.len(),
            MAX_SHORT_STRING
        )));
    }
    sink.push_kind(kind);
    sink.push_bytes(&[bytes.len() as u8]);
    sink.push_bytes(bytes);
    Ok(())
}

/// Write an enumeration, label or type name; only `[A-Za-z0-9_]` survives export
fn push_keyword<S: TokenSink + ?Sized>(sink: &mut S, kind: TokenKind, text: &str) -> Result<()> {
    if !is_step_keyword(text) {
        return Err(Error::unsupported(format!(
            "{} {:?} is not a valid STEP keyword",
            kind, text
        )));
    }
    push_short_string(sink, kind, text)
}

/// Encode one value; lists push their children iterator onto `stack`
fn encode_one<'v, S: TokenSink + ?Sized>(
    sink: &mut S,
    value: &'v ArgumentValue,
    stack: &mut SmallVec<[std::slice::Iter<'v, ArgumentValue>; 8]>,
) -> Result<()> {
    match value {
        ArgumentValue::List(items) => {
            sink.push_kind(TokenKind::SetBegin);
            stack.push(items.iter());
        }
        ArgumentValue::Reference(id) => {
            sink.push_kind(TokenKind::Ref);
            sink.push_u32(*id);
        }
        ArgumentValue::Real(x) => {
            sink.push_kind(TokenKind::Real);
            sink.push_f64(*x);
        }
        ArgumentValue::Text {
            value,
            kind: TextKind::String,
        } => push_short_string(sink, TokenKind::String, value)?,
        ArgumentValue::Text {
            value,
            kind: TextKind::Enum,
        } => push_keyword(sink, TokenKind::Enum, value)?,
        ArgumentValue::Labeled { label, value } => {
            if !value.is_label_scalar() {
                return Err(Error::unsupported(format!(
                    "labeled value {} must wrap a string, enumeration or real",
                    label
                )));
            }
            push_keyword(sink, TokenKind::Label, label)?;
            sink.push_kind(TokenKind::SetBegin);
            // Scalars never touch the stack
            encode_one(sink, value.as_ref(), stack)?;
            sink.push_kind(TokenKind::SetEnd);
        }
        ArgumentValue::Null => sink.push_kind(TokenKind::Empty),
        ArgumentValue::Unresolved => sink.push_kind(TokenKind::Unknown),
    }
    Ok(())
}

/// Encode a value tree.
///
/// On error the sink may hold a partial encoding; callers stage into a
/// scratch buffer and discard it.
pub fn encode_value<S: TokenSink + ?Sized>(sink: &mut S, value: &ArgumentValue) -> Result<()> {
    let mut stack: SmallVec<[std::slice::Iter<'_, ArgumentValue>; 8]> = SmallVec::new();
    encode_one(sink, value, &mut stack)?;

    while let Some(frame) = stack.last_mut() {
        match frame.next() {
            Some(child) => encode_one(sink, child, &mut stack)?,
            None => {
                stack.pop();
                sink.push_kind(TokenKind::SetEnd);
            }
        }
    }
    Ok(())
}

/// Encode a full line. `arguments` must be a list.
pub fn encode_line<S: TokenSink + ?Sized>(
    sink: &mut S,
    id: u32,
    type_name: &str,
    arguments: &ArgumentValue,
) -> Result<()> {
    if !matches!(arguments, ArgumentValue::List(_)) {
        return Err(Error::unsupported("line arguments must be a list"));
    }
    sink.push_kind(TokenKind::Ref);
    sink.push_u32(id);
    push_keyword(sink, TokenKind::Label, type_name)?;
    encode_value(sink, arguments)?;
    sink.push_kind(TokenKind::LineEnd);
    Ok(())
}

fn expect_kind(tape: &mut TokenStream, expected: TokenKind, context: &str) -> Result<()> {
    let offset = tape.read_position();
    let kind = tape.read_kind()?;
    if kind != expected {
        return Err(Error::unsupported(format!(
            "{}: expected {} at tape offset {}, found {}",
            context, expected, offset, kind
        )));
    }
    Ok(())
}

/// Read a `STRING`/`ENUM`/`REAL` payload whose kind tag was already consumed
fn read_scalar(tape: &mut TokenStream, kind: TokenKind) -> Result<ArgumentValue> {
    match kind {
        TokenKind::String | TokenKind::Enum => {
            let view = tape.read_string_view()?;
            let value = String::from_utf8_lossy(&tape.view(&view)).into_owned();
            let kind = if kind == TokenKind::Enum {
                TextKind::Enum
            } else {
                TextKind::String
            };
            Ok(ArgumentValue::Text { value, kind })
        }
        TokenKind::Real => Ok(ArgumentValue::Real(tape.read::<f64>()?)),
        other => Err(Error::unsupported(format!(
            "unsupported labeled-value inner type {}",
            other
        ))),
    }
}

/// Decode an argument list starting at the read cursor.
///
/// The cursor must sit just inside the line's opening `SET_BEGIN`. Decoding
/// ends at `LINE_END`, or at a `SET_END` met with only the top-level frame
/// open. That second rule is lenient: a stray `SET_END` at depth one also
/// ends the line instead of being reported.
///
/// Running off the end of the tape is [`Error::TruncatedTape`]; a `LINE_END`
/// inside an open nested list is [`Error::UnbalancedList`]. No partial tree
/// is returned in either case.
pub fn decode_arguments(tape: &mut TokenStream) -> Result<Vec<ArgumentValue>> {
    let mut frames: SmallVec<[Vec<ArgumentValue>; 8]> = SmallVec::new();
    frames.push(Vec::new());

    loop {
        let offset = tape.read_position();
        let kind = tape.read_kind()?;

        let value = match kind {
            TokenKind::LineEnd => {
                if frames.len() > 1 {
                    return Err(Error::UnbalancedList {
                        offset,
                        depth: frames.len() - 1,
                    });
                }
                break;
            }
            TokenKind::SetBegin => {
                frames.push(Vec::new());
                continue;
            }
            TokenKind::SetEnd => {
                if frames.len() == 1 {
                    break;
                }
                match frames.pop() {
                    Some(done) => ArgumentValue::List(done),
                    None => break,
                }
            }
            TokenKind::Unknown => ArgumentValue::Unresolved,
            TokenKind::Empty => ArgumentValue::Null,
            TokenKind::Ref => ArgumentValue::Reference(tape.read::<u32>()?),
            TokenKind::Real | TokenKind::String | TokenKind::Enum => read_scalar(tape, kind)?,
            TokenKind::Label => {
                let view = tape.read_string_view()?;
                let label = String::from_utf8_lossy(&tape.view(&view)).into_owned();
                expect_kind(tape, TokenKind::SetBegin, "labeled value")?;
                let inner_kind = tape.read_kind()?;
                let inner = read_scalar(tape, inner_kind)?;
                expect_kind(tape, TokenKind::SetEnd, "labeled value")?;
                ArgumentValue::labeled(label, inner)
            }
        };

        if let Some(top) = frames.last_mut() {
            top.push(value);
        }
    }

    Ok(frames.into_iter().next().unwrap_or_default())
}

/// Header read from the tape at a line's offset
#[derive(Debug, Clone, PartialEq)]
pub struct LineHeader {
    pub id: u32,
    pub type_name: String,
}

/// Read `REF <id> LABEL <name>` at the read cursor
pub fn read_line_header(tape: &mut TokenStream) -> Result<LineHeader> {
    expect_kind(tape, TokenKind::Ref, "line header")?;
    let id = tape.read::<u32>()?;
    expect_kind(tape, TokenKind::Label, "line header")?;
    let view = tape.read_string_view()?;
    let type_name = String::from_utf8_lossy(&tape.view(&view)).into_owned();
    Ok(LineHeader { id, type_name })
}

/// Decode the line a directory entry points at
pub fn decode_line(tape: &mut TokenStream, entry: &LineEntry) -> Result<Line> {
    tape.seek(entry.offset)?;

    let corrupt = |message: String| Error::CorruptLine {
        id: entry.id,
        message,
    };

    let header = read_line_header(tape).map_err(|e| corrupt(e.to_string()))?;
    if header.id != entry.id {
        return Err(corrupt(format!("tape header names #{}", header.id)));
    }
    expect_kind(tape, TokenKind::SetBegin, "argument list").map_err(|e| corrupt(e.to_string()))?;

    let arguments = decode_arguments(tape)?;
    Ok(Line {
        id: entry.id,
        type_code: entry.type_code,
        arguments: ArgumentValue::List(arguments),
    })
}
