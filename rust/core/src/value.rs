// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Argument values - the decoded, tree-shaped form of a line's arguments

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::parser::Token;

/// Which text token a [`ArgumentValue::Text`] is written as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TextKind {
    /// Quoted string: 'text'
    String,
    /// Enumeration: .ELEMENT.
    Enum,
}

/// Line argument value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value"))]
pub enum ArgumentValue {
    /// Omitted optional argument ($)
    Null,
    /// Reference to another line (#123)
    Reference(u32),
    /// Numeric scalar
    Real(f64),
    /// String or enumeration text
    Text { value: String, kind: TextKind },
    /// Domain-typed scalar, e.g. IFCLENGTHMEASURE(12.3)
    Labeled {
        label: String,
        value: Box<ArgumentValue>,
    },
    /// Ordered, arbitrarily nested list
    List(Vec<ArgumentValue>),
    /// Present in the source but not modelled (*)
    Unresolved,
}

impl ArgumentValue {
    /// Quoted string value
    pub fn string(value: impl Into<String>) -> Self {
        ArgumentValue::Text {
            value: value.into(),
            kind: TextKind::String,
        }
    }

    /// Enumeration value (without the surrounding dots)
    pub fn enumeration(value: impl Into<String>) -> Self {
        ArgumentValue::Text {
            value: value.into(),
            kind: TextKind::Enum,
        }
    }

    /// Labeled scalar
    pub fn labeled(label: impl Into<String>, value: ArgumentValue) -> Self {
        ArgumentValue::Labeled {
            label: label.into(),
            value: Box::new(value),
        }
    }

    /// Convert a parsed STEP token.
    ///
    /// Integers become reals, `*` becomes [`ArgumentValue::Unresolved`] and
    /// typed values must wrap exactly one string, enumeration or number.
    pub fn from_token(token: &Token) -> Result<Self> {
        // Explicit stack: lists in STEP files can nest deeply
        let mut frames: Vec<(std::slice::Iter<'_, Token>, Vec<ArgumentValue>)> = Vec::new();

        let mut current = match token {
            Token::List(items) => {
                frames.push((items.iter(), Vec::with_capacity(items.len())));
                None
            }
            other => Some(Self::from_scalar_token(other)?),
        };

        while let Some((iter, values)) = frames.last_mut() {
            match iter.next() {
                Some(Token::List(items)) => {
                    frames.push((items.iter(), Vec::with_capacity(items.len())));
                }
                Some(other) => values.push(Self::from_scalar_token(other)?),
                None => {
                    let done = frames.pop().map(|(_, values)| values).unwrap_or_default();
                    match frames.last_mut() {
                        Some((_, parent)) => parent.push(ArgumentValue::List(done)),
                        None => current = Some(ArgumentValue::List(done)),
                    }
                }
            }
        }

        current.ok_or_else(|| Error::unsupported("empty token"))
    }

    fn from_scalar_token(token: &Token) -> Result<Self> {
        let value = match token {
            Token::EntityRef(id) => ArgumentValue::Reference(*id),
            Token::String(s) => ArgumentValue::string(unescape_step_string(s)),
            Token::Integer(i) => ArgumentValue::Real(*i as f64),
            Token::Float(f) => ArgumentValue::Real(*f),
            Token::Enum(e) => ArgumentValue::enumeration(*e),
            Token::Null => ArgumentValue::Null,
            Token::Derived => ArgumentValue::Unresolved,
            Token::TypedValue(type_name, args) => {
                let inner = match args.as_slice() {
                    [inner @ (Token::String(_)
                    | Token::Enum(_)
                    | Token::Integer(_)
                    | Token::Float(_))] => Self::from_scalar_token(inner)?,
                    _ => {
                        return Err(Error::unsupported(format!(
                            "typed value {} must wrap exactly one scalar",
                            type_name
                        )))
                    }
                };
                ArgumentValue::labeled(*type_name, inner)
            }
            Token::List(_) => return Self::from_token(token),
        };
        Ok(value)
    }

    /// Get as entity reference
    #[inline]
    pub fn as_reference(&self) -> Option<u32> {
        match self {
            ArgumentValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Get string or enumeration text
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Get as quoted string only
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text {
                value,
                kind: TextKind::String,
            } => Some(value),
            _ => None,
        }
    }

    /// Get as enumeration only
    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text {
                value,
                kind: TextKind::Enum,
            } => Some(value),
            _ => None,
        }
    }

    /// Get as float; looks through labeled values
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgumentValue::Real(f) => Some(*f),
            ArgumentValue::Labeled { value, .. } => value.as_float(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[ArgumentValue]> {
        match self {
            ArgumentValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check if null/unresolved
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, ArgumentValue::Null | ArgumentValue::Unresolved)
    }

    /// True for the values a labeled wrapper may hold
    #[inline]
    pub fn is_label_scalar(&self) -> bool {
        matches!(self, ArgumentValue::Real(_) | ArgumentValue::Text { .. })
    }
}

/// Collapse STEP's doubled quotes (`''`) into one
pub fn unescape_step_string(raw: &str) -> Cow<'_, str> {
    if raw.contains("''") {
        Cow::Owned(raw.replace("''", "'"))
    } else {
        Cow::Borrowed(raw)
    }
}
