// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP/IFC tokenizer using nom
//!
//! Turns the text of a model file into entity statements. The model loader
//! converts each statement to argument values and encodes it onto the tape.

use memchr::memmem;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// STEP/IFC Token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Entity reference: #123
    EntityRef(u32),
    /// String literal: 'text' (raw, quotes still doubled)
    String(&'a str),
    /// Integer: 42
    Integer(i64),
    /// Float: 3.14
    Float(f64),
    /// Enum: .TRUE., .FALSE., .UNKNOWN.
    Enum(&'a str),
    /// List: (1, 2, 3)
    List(Vec<Token<'a>>),
    /// Typed value: IFCPARAMETERVALUE(0.), IFCBOOLEAN(.T.)
    TypedValue(&'a str, Vec<Token<'a>>),
    /// Null value: $
    Null,
    /// Asterisk (derived value): *
    Derived,
}

/// One `#id=TYPE(args);` statement
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatement<'a> {
    pub id: u32,
    pub type_name: &'a str,
    pub arguments: Vec<Token<'a>>,
    /// Byte position of the statement in the source text
    pub position: usize,
}

/// Parse entity reference: #123
fn entity_ref(input: &str) -> IResult<&str, Token> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
        Token::EntityRef,
    )(input)
}

/// Parse string literal: 'text' or "text"
/// IFC uses '' to escape a single quote within a string
fn string_literal(input: &str) -> IResult<&str, Token> {
    fn parse_string_content(input: &str, quote: u8) -> IResult<&str, &str> {
        let bytes = input.as_bytes();
        let mut i = 0;

        while let Some(found) = memchr::memchr(quote, &bytes[i..]) {
            let at = i + found;
            if bytes.get(at + 1) == Some(&quote) {
                i = at + 2;
                continue;
            }
            return Ok((&input[at..], &input[..at]));
        }

        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }

    alt((
        map(
            delimited(char('\''), |i| parse_string_content(i, b'\''), char('\'')),
            Token::String,
        ),
        map(
            delimited(char('"'), |i| parse_string_content(i, b'"'), char('"')),
            Token::String,
        ),
    ))(input)
}

/// Parse integer: 42, -42
fn integer(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(pair(opt(one_of("+-")), digit1)),
        |s: &str| match s.parse::<i64>() {
            Ok(i) => Ok(Token::Integer(i)),
            // Out of i64 range; still a valid number
            Err(_) => fast_float::parse::<f64, _>(s).map(Token::Float),
        },
    )(input)
}

/// Parse float: 3.14, -3.14, 1.5E-10, 0., 1.
/// IFC allows floats like "0." without decimal digits
fn float(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| fast_float::parse::<f64, _>(s).map(Token::Float),
    )(input)
}

/// Parse enum: .TRUE., .FALSE., .UNKNOWN., .ELEMENT.
fn enum_value(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('.'),
            take_while1(is_keyword_char),
            char('.'),
        ),
        Token::Enum,
    )(input)
}

fn null(input: &str) -> IResult<&str, Token> {
    value(Token::Null, char('$'))(input)
}

fn derived(input: &str) -> IResult<&str, Token> {
    value(Token::Derived, char('*'))(input)
}

/// Parse typed value: IFCPARAMETERVALUE(0.), IFCBOOLEAN(.T.)
fn typed_value(input: &str) -> IResult<&str, Token> {
    map(
        pair(keyword, argument_list),
        |(type_name, args)| Token::TypedValue(type_name, args),
    )(input)
}

/// Entity or type keyword: IFCWALL
fn keyword(input: &str) -> IResult<&str, &str> {
    take_while1(is_keyword_char)(input)
}

#[inline]
fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True if `text` can be written as a STEP keyword or enumeration body
pub fn is_step_keyword(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_keyword_char)
}

/// Block comment: /* ... */
fn comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(input)
}

/// Skip whitespace and comments
fn ws(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

/// Parse a token with optional surrounding whitespace
fn token(input: &str) -> IResult<&str, Token> {
    delimited(
        ws,
        alt((
            float, // Try float before integer (float includes '.')
            integer,
            entity_ref,
            string_literal,
            enum_value,
            list,
            typed_value,
            null,
            derived,
        )),
        ws,
    )(input)
}

/// Parenthesised, comma separated tokens
fn argument_list(input: &str) -> IResult<&str, Vec<Token>> {
    delimited(
        terminated(char('('), ws),
        separated_list0(char(','), token),
        preceded(ws, char(')')),
    )(input)
}

/// Parse list: (1, 2, 3) or nested lists
fn list(input: &str) -> IResult<&str, Token> {
    map(argument_list, Token::List)(input)
}

/// Parse `#123 = IFCWALL(...);` with leading whitespace
fn entity_statement(input: &str) -> IResult<&str, (u32, &str, Vec<Token>)> {
    tuple((
        delimited(
            ws,
            preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
            ws,
        ),
        preceded(char('='), delimited(ws, keyword, ws)),
        terminated(argument_list, pair(ws, char(';'))),
    ))(input)
}

/// Parse a complete entity line
/// Example: #123=IFCWALL('guid','owner',$,$,'name',$,$,$);
pub fn parse_entity(input: &str) -> Result<(u32, &str, Vec<Token>)> {
    match entity_statement(input) {
        Ok((_, (id, type_name, args))) => Ok((id, type_name, args)),
        Err(e) => Err(Error::parse(0, format!("Failed to parse entity: {}", e))),
    }
}

fn skip_ws(input: &str) -> &str {
    ws(input).map_or(input, |(rest, ())| rest)
}

/// First occurrence of `needle` outside single-quoted strings
fn find_unquoted(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let mut pos = 0;
    let mut in_string = false;
    loop {
        let quote = memchr::memchr(b'\'', &haystack[pos..]).map(|i| pos + i);
        if !in_string {
            let end = quote.unwrap_or(haystack.len());
            if let Some(found) = memmem::find(&haystack[pos..end], needle) {
                return Some(pos + found);
            }
        }
        // '' inside a string toggles twice over an empty segment
        pos = quote? + 1;
        in_string = !in_string;
    }
}

/// Sequential reader over the entity statements of a STEP file.
///
/// Accepts a full exchange file (`ISO-10303-21; HEADER; ... DATA; ... ENDSEC;`)
/// or a bare list of entity statements.
pub struct StepReader<'a> {
    content: &'a str,
    header: Option<&'a str>,
    position: usize,
    finished: bool,
}

impl<'a> StepReader<'a> {
    pub fn new(content: &'a str) -> Self {
        let mut rest = skip_ws(content);
        if let Some(after) = rest.strip_prefix("ISO-10303-21;") {
            rest = skip_ws(after);
        }

        let mut header = None;
        if let Some(body) = rest.strip_prefix("HEADER;") {
            // Unterminated header: leave it for next_entity to report
            rest = body;
            if let Some(end) = find_unquoted(body.as_bytes(), b"ENDSEC;") {
                header = Some(body[..end].trim());
                rest = skip_ws(&body[end + "ENDSEC;".len()..]);
            }
        }

        if let Some(after) = rest.strip_prefix("DATA;") {
            rest = after;
        }

        Self {
            content,
            header,
            position: content.len() - rest.len(),
            finished: false,
        }
    }

    /// Text between `HEADER;` and its `ENDSEC;`, trimmed
    pub fn header(&self) -> Option<&'a str> {
        self.header
    }

    /// Current byte position in the source
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read the next entity statement; `None` at `ENDSEC;` or end of input
    pub fn next_entity(&mut self) -> Option<Result<EntityStatement<'a>>> {
        if self.finished {
            return None;
        }

        let remaining = &self.content[self.position..];
        let rest = match ws(remaining) {
            Ok((rest, ())) => rest,
            Err(_) => remaining,
        };
        let start = self.content.len() - rest.len();

        if rest.is_empty() || rest.starts_with("ENDSEC;") {
            self.finished = true;
            return None;
        }

        match entity_statement(rest) {
            Ok((after, (id, type_name, arguments))) => {
                self.position = self.content.len() - after.len();
                Some(Ok(EntityStatement {
                    id,
                    type_name,
                    arguments,
                    position: start,
                }))
            }
            Err(_) => {
                self.finished = true;
                let snippet: String = rest.chars().take(60).collect();
                Some(Err(Error::parse(
                    start,
                    format!("malformed entity statement: {:?}", snippet),
                )))
            }
        }
    }
}

impl<'a> Iterator for StepReader<'a> {
    type Item = Result<EntityStatement<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref() {
        assert_eq!(entity_ref("#123"), Ok(("", Token::EntityRef(123))));
        assert_eq!(entity_ref("#0"), Ok(("", Token::EntityRef(0))));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("'hello'"), Ok(("", Token::String("hello"))));
        assert_eq!(string_literal("'It''s'"), Ok(("", Token::String("It''s"))));
        assert_eq!(string_literal("'a;b'"), Ok(("", Token::String("a;b"))));
        assert!(string_literal("'open").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(integer("-42"), Ok(("", Token::Integer(-42))));
        assert_eq!(float("3.14"), Ok(("", Token::Float(3.14))));
        assert_eq!(float("0."), Ok(("", Token::Float(0.0))));
        assert_eq!(float("1.5E-10"), Ok(("", Token::Float(1.5e-10))));
    }

    #[test]
    fn test_integer_beyond_i64() {
        assert_eq!(
            integer("99999999999999999999"),
            Ok(("", Token::Float(99999999999999999999.0)))
        );
        let (_, _, args) = parse_entity("#1=IFCWALL(99999999999999999999);").unwrap();
        assert_eq!(args, vec![Token::Float(1e20)]);
    }

    #[test]
    fn test_keyword_check() {
        assert!(is_step_keyword("NOTDEFINED"));
        assert!(is_step_keyword("T_1"));
        assert!(!is_step_keyword(""));
        assert!(!is_step_keyword("A B"));
        assert!(!is_step_keyword("A.B"));
    }

    #[test]
    fn test_enum() {
        assert_eq!(enum_value(".TRUE."), Ok(("", Token::Enum("TRUE"))));
        assert_eq!(enum_value(".ELEMENT."), Ok(("", Token::Enum("ELEMENT"))));
    }

    #[test]
    fn test_nested_list() {
        let (_, token) = list("(1,(2., 3.),$, *)").unwrap();
        assert_eq!(
            token,
            Token::List(vec![
                Token::Integer(1),
                Token::List(vec![Token::Float(2.0), Token::Float(3.0)]),
                Token::Null,
                Token::Derived,
            ])
        );
        assert_eq!(list("()"), Ok(("", Token::List(vec![]))));
    }

    #[test]
    fn test_typed_value() {
        let (_, token) = token("IFCBOOLEAN(.T.)").unwrap();
        assert_eq!(token, Token::TypedValue("IFCBOOLEAN", vec![Token::Enum("T")]));
    }

    #[test]
    fn test_parse_entity() {
        let (id, type_name, args) =
            parse_entity("#123=IFCWALL('guid','owner',$,$,'name',$,$,$);").unwrap();
        assert_eq!(id, 123);
        assert_eq!(type_name, "IFCWALL");
        assert_eq!(args.len(), 8);

        let (id, _, args) = parse_entity("#9 = IFCDIRECTION ( (0.,0.,1.) ) ;").unwrap();
        assert_eq!(id, 9);
        assert_eq!(args.len(), 1);

        assert!(matches!(parse_entity("#9=IFCDIRECTION("), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_reader_full_file() {
        let content = "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n\
                       #1=IFCPROJECT('guid',$,$,$,$,$,$,$,$);\n/* comment */\n\
                       #2=IFCWALL($,$,'Wall-1');\nENDSEC;\nEND-ISO-10303-21;\n";
        let mut reader = StepReader::new(content);
        assert_eq!(reader.header(), Some("FILE_SCHEMA(('IFC4'));"));

        let first = reader.next_entity().unwrap().unwrap();
        assert_eq!((first.id, first.type_name), (1, "IFCPROJECT"));
        assert_eq!(&content[first.position..first.position + 3], "#1=");

        let second = reader.next_entity().unwrap().unwrap();
        assert_eq!((second.id, second.type_name), (2, "IFCWALL"));
        assert!(reader.next_entity().is_none());
        assert!(reader.next_entity().is_none());
    }

    #[test]
    fn test_reader_bare_statements() {
        let reader = StepReader::new("#1=IFCWALL($);\n#2=IFCDOOR($);\n");
        assert_eq!(reader.header(), None);
        let ids: Vec<u32> = reader.map(|s| s.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_reader_ignores_data_marker_in_header_string() {
        let content = "ISO-10303-21;\nHEADER;\nFILE_NAME('DATA;.ifc','',(''),(''),'','','');\n\
                       FILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCWALL($);\nENDSEC;\n\
                       END-ISO-10303-21;\n";
        let mut reader = StepReader::new(content);
        assert_eq!(
            reader.header(),
            Some("FILE_NAME('DATA;.ifc','',(''),(''),'','','');\nFILE_SCHEMA(('IFC4'));")
        );
        let first = reader.next_entity().unwrap().unwrap();
        assert_eq!((first.id, first.type_name), (1, "IFCWALL"));
        assert!(reader.next_entity().is_none());
    }

    #[test]
    fn test_reader_header_string_with_endsec_and_quotes() {
        let content = "HEADER;\nFILE_NAME('It''s ENDSEC; here');\nENDSEC;\nDATA;\n#4=IFCDOOR($);\nENDSEC;\n";
        let mut reader = StepReader::new(content);
        assert_eq!(reader.header(), Some("FILE_NAME('It''s ENDSEC; here');"));
        assert_eq!(reader.next_entity().unwrap().unwrap().id, 4);
    }

    #[test]
    fn test_reader_bare_statement_with_data_marker_in_string() {
        let content = "#1=IFCWALL($,$,'DATA;');\n#2=IFCDOOR($);\n";
        let reader = StepReader::new(content);
        assert_eq!(reader.header(), None);
        let statements: Vec<EntityStatement> = reader.map(|s| s.unwrap()).collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].arguments[2], Token::String("DATA;"));
        assert_eq!(statements[0].position, 0);
    }

    #[test]
    fn test_reader_data_section_without_header() {
        let reader = StepReader::new("DATA;\n#7=IFCWALL($);\nENDSEC;\n");
        let ids: Vec<u32> = reader.map(|s| s.unwrap().id).collect();
        assert_eq!(ids, vec![7]);
    }

    #[test]
    fn test_reader_reports_position() {
        let content = "#1=IFCWALL($);\n#2=IFCWALL($,;\n";
        let mut reader = StepReader::new(content);
        assert!(reader.next_entity().unwrap().is_ok());
        match reader.next_entity().unwrap() {
            Err(Error::Parse { position, .. }) => assert_eq!(position, 15),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(reader.next_entity().is_none());
    }
}
