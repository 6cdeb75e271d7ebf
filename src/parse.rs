//! Purpose: Hand-written recursive-descent parser from character streams to `Value` trees.
//! Exports: `parse_str`, `parse_chars`, `Parsed`, `Scanner`.
//! Role: The only path from JSON text into the value model; no platform parser involved.
//! Invariants: The source is consumed strictly forward with one character of look-ahead.
//! Invariants: Every syntax violation goes through the error sink with a character position.
//! Invariants: In collect mode a best-effort partial tree is still returned.

use crate::error::{Error, ErrorKind};
use crate::options::{ErrorSink, JsonOptions};
use crate::value::{Decimal, Map, Value};

/// Forward-only character source with one-character look-ahead and a
/// running position (characters consumed).
pub struct Scanner<I: Iterator<Item = char>> {
    source: I,
    peeked: Option<char>,
    position: u64,
}

impl<I: Iterator<Item = char>> Scanner<I> {
    pub fn new(source: I) -> Self {
        Self {
            source,
            peeked: None,
            position: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.source.next();
        }
        self.peeked
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peeked.take().or_else(|| self.source.next());
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Result of one top-level parse: the value (absent for empty input) and
/// the errors collected along the way (empty in raise mode).
#[derive(Debug)]
pub struct Parsed {
    pub value: Option<Value>,
    pub errors: Vec<Error>,
}

/// Parses JSON text into a value tree.
pub fn parse_str(text: &str, options: &JsonOptions) -> Result<Parsed, Error> {
    parse_chars(text.chars(), options)
}

/// Parses any forward-only character source into a value tree.
pub fn parse_chars<I: Iterator<Item = char>>(
    source: I,
    options: &JsonOptions,
) -> Result<Parsed, Error> {
    let mut scanner = Scanner::new(source);
    let mut sink = ErrorSink::new(options);
    let outcome = read_value(&mut scanner, options, &mut sink)?;
    Ok(Parsed {
        value: outcome,
        errors: sink.into_errors(),
    })
}

pub(crate) fn read_value<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<Option<Value>, Error> {
    let outcome = read_value_in(scanner, options, sink, false)?;
    Ok(outcome.value)
}

struct ReadOutcome {
    value: Option<Value>,
    /// The read hit a separator with no value (array mode only).
    skip: bool,
    /// The read consumed the closing `]` of the enclosing array.
    array_end: bool,
}

impl ReadOutcome {
    fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            skip: false,
            array_end: false,
        }
    }

    fn nothing() -> Self {
        Self {
            value: None,
            skip: false,
            array_end: false,
        }
    }
}

fn read_value_in<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    options: &JsonOptions,
    sink: &mut ErrorSink,
    array_mode: bool,
) -> Result<ReadOutcome, Error> {
    loop {
        match scanner.peek() {
            None => return Ok(ReadOutcome::nothing()),
            Some(' ' | '\t' | '\r' | '\n') => {
                scanner.next();
            }
            Some(_) => break,
        }
    }

    let c = match scanner.peek() {
        Some(c) => c,
        None => return Ok(ReadOutcome::nothing()),
    };

    if c == '"' {
        scanner.next();
        let text = read_string(scanner, sink)?;
        return Ok(match text {
            Some(text) => ReadOutcome::value(Value::Str(text)),
            None => ReadOutcome::nothing(),
        });
    }

    if c == '{' {
        let map = read_object(scanner, options, sink)?;
        return Ok(ReadOutcome::value(Value::Object(map)));
    }

    if c == '[' {
        let items = read_array(scanner, options, sink)?;
        return Ok(ReadOutcome::value(Value::Array(items)));
    }

    if c == 'n' {
        return read_null_or_js_date(scanner, sink);
    }

    if c.is_alphanumeric() || c == '.' || c == '-' || c == '+' {
        return read_number_or_literal(scanner, sink);
    }

    if array_mode && c == ']' {
        scanner.next();
        return Ok(ReadOutcome {
            value: None,
            skip: true,
            array_end: true,
        });
    }

    if array_mode && c == ',' {
        scanner.next();
        return Ok(ReadOutcome {
            value: None,
            skip: true,
            array_end: false,
        });
    }

    sink.report(unexpected_char(scanner.position(), c))?;
    if array_mode || c != '}' {
        // Consume the offender so lenient parsing always makes progress;
        // a closing brace belongs to the enclosing object.
        scanner.next();
    }
    Ok(ReadOutcome::nothing())
}

fn read_object<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<Map, Error> {
    scanner.next(); // consume '{'
    let mut map = Map::new();
    loop {
        let c = match scanner.next() {
            Some(c) => c,
            None => {
                sink.report(eof_expecting(scanner.position(), '}'))?;
                return Ok(map);
            }
        };
        match c {
            '}' => return Ok(map),
            '"' => {
                let key = match read_string(scanner, sink)? {
                    Some(key) => key,
                    None => return Ok(map),
                };
                skip_whitespace(scanner);
                match scanner.peek() {
                    Some(':') => {
                        scanner.next();
                    }
                    _ => {
                        sink.report(expected_char(scanner.position(), ':'))?;
                        return Ok(map);
                    }
                }
                let value = read_value(scanner, options, sink)?.unwrap_or(Value::Null);
                map.insert(key, value);
            }
            ',' | '\r' | '\n' | '\t' | ' ' => {}
            other => {
                sink.report(unexpected_char(scanner.position(), other))?;
                return Ok(map);
            }
        }
    }
}

fn read_array<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<Vec<Value>, Error> {
    scanner.next(); // consume '['
    let mut items = Vec::new();
    loop {
        let outcome = read_value_in(scanner, options, sink, true)?;
        if !outcome.skip {
            items.push(outcome.value.unwrap_or(Value::Null));
        }
        if outcome.array_end {
            return Ok(items);
        }
        if scanner.peek().is_none() {
            sink.report(eof_expecting(scanner.position(), ']'))?;
            return Ok(items);
        }
    }
}

fn read_string<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    sink: &mut ErrorSink,
) -> Result<Option<String>, Error> {
    let mut out = String::new();
    loop {
        let c = match scanner.next() {
            Some(c) => c,
            None => {
                sink.report(eof_expecting(scanner.position(), '"'))?;
                return Ok(None);
            }
        };
        if c == '"' {
            return Ok(Some(out));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match scanner.next() {
            Some(c) => c,
            None => {
                sink.report(eof_expecting(scanner.position(), '"'))?;
                return Ok(None);
            }
        };
        match escaped {
            'b' => out.push('\u{0008}'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'f' => out.push('\u{000c}'),
            'r' => out.push('\r'),
            '/' | '\\' | '"' => out.push(escaped),
            'u' => out.push(read_unicode_escape(scanner, sink)?),
            // Unrecognized escapes pass through literally.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
}

/// Reads the `XXXX` of a `\uXXXX` escape, combining surrogate pairs. A
/// lone surrogate half cannot inhabit a string and is a syntax error.
fn read_unicode_escape<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    sink: &mut ErrorSink,
) -> Result<char, Error> {
    let unit = read_hex4(scanner, sink)?;
    if (0xD800..0xDC00).contains(&unit) {
        // High surrogate: a low surrogate escape must follow.
        if scanner.peek() == Some('\\') {
            scanner.next();
            if scanner.peek() == Some('u') {
                scanner.next();
                let low = read_hex4(scanner, sink)?;
                if (0xDC00..0xE000).contains(&low) {
                    let combined =
                        0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
                    if let Some(c) = char::from_u32(combined) {
                        return Ok(c);
                    }
                }
            }
        }
        sink.report(
            Error::new(ErrorKind::Syntax)
                .with_message("lone surrogate in unicode escape")
                .with_position(scanner.position()),
        )?;
        return Ok('\u{FFFD}');
    }
    if (0xDC00..0xE000).contains(&unit) {
        sink.report(
            Error::new(ErrorKind::Syntax)
                .with_message("lone surrogate in unicode escape")
                .with_position(scanner.position()),
        )?;
        return Ok('\u{FFFD}');
    }
    Ok(char::from_u32(unit as u32).unwrap_or('\u{FFFD}'))
}

fn read_hex4<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    sink: &mut ErrorSink,
) -> Result<u16, Error> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let c = match scanner.next() {
            Some(c) => c,
            None => {
                sink.report(
                    Error::new(ErrorKind::Syntax)
                        .with_message("expecting hexadecimal character at end of stream")
                        .with_position(scanner.position()),
                )?;
                return Ok(0);
            }
        };
        match c.to_digit(16) {
            Some(digit) => value = value * 16 + digit,
            None => {
                sink.report(expected_hex(scanner.position()))?;
                return Ok(0);
            }
        }
    }
    Ok(value as u16)
}

/// Reads a token starting with `n`: the `null` literal or a `new Date(N)`
/// construct. The latter is normalized to its `/Date(N)/` string form so
/// the value tree stays a pure JSON union.
fn read_null_or_js_date<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    sink: &mut ErrorSink,
) -> Result<ReadOutcome, Error> {
    let mut array_end = false;
    let mut token = String::new();
    loop {
        match scanner.peek() {
            None => break,
            Some('}') => break,
            Some(_) => {}
        }
        let c = match scanner.next() {
            Some(c) => c,
            None => break,
        };
        if c == ',' {
            break;
        }
        if c == ']' {
            array_end = true;
            break;
        }
        token.push(c);
    }

    let trimmed = token.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(ReadOutcome {
            value: Some(Value::Null),
            skip: false,
            array_end,
        });
    }

    if let Some(body) = trimmed
        .strip_prefix("new Date(")
        .and_then(|rest| rest.strip_suffix(')'))
        && let Ok(millis) = body.trim().parse::<i64>()
    {
        return Ok(ReadOutcome {
            value: Some(Value::Str(format!("/Date({millis})/"))),
            skip: false,
            array_end,
        });
    }

    sink.report(unexpected_char(
        scanner.position(),
        token.chars().next().unwrap_or('n'),
    ))?;
    Ok(ReadOutcome {
        value: None,
        skip: false,
        array_end,
    })
}

fn read_number_or_literal<I: Iterator<Item = char>>(
    scanner: &mut Scanner<I>,
    sink: &mut ErrorSink,
) -> Result<ReadOutcome, Error> {
    let mut array_end = false;
    let mut token = String::new();
    loop {
        match scanner.peek() {
            None => break,
            Some('}') => break,
            Some(_) => {}
        }
        let c = match scanner.next() {
            Some(c) => c,
            None => break,
        };
        if c.is_whitespace() || c == ',' {
            break;
        }
        if c == ']' {
            array_end = true;
            break;
        }
        token.push(c);
    }

    let value = literal_value(&token);
    match value {
        Some(value) => Ok(ReadOutcome {
            value: Some(value),
            skip: false,
            array_end,
        }),
        None => {
            sink.report(unexpected_char(
                scanner.position(),
                token.chars().next().unwrap_or('?'),
            ))?;
            Ok(ReadOutcome {
                value: None,
                skip: false,
                array_end,
            })
        }
    }
}

/// The numeric rule: exponent means double, point means decimal,
/// otherwise the narrowest of i32, i64, decimal that fits.
fn literal_value(token: &str) -> Option<Value> {
    if token.eq_ignore_ascii_case("null") {
        return Some(Value::Null);
    }
    if token.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if token.is_empty() {
        return None;
    }

    if token.contains(['e', 'E']) {
        return token.parse::<f64>().ok().map(Value::F64);
    }
    if token.contains('.') {
        return token.parse::<Decimal>().ok().map(Value::Decimal);
    }
    if let Ok(small) = token.parse::<i32>() {
        return Some(Value::I32(small));
    }
    if let Ok(wide) = token.parse::<i64>() {
        return Some(Value::I64(wide));
    }
    token.parse::<Decimal>().ok().map(Value::Decimal)
}

fn skip_whitespace<I: Iterator<Item = char>>(scanner: &mut Scanner<I>) {
    while let Some(c) = scanner.peek() {
        if !c.is_whitespace() {
            return;
        }
        scanner.next();
    }
}

fn expected_char(position: u64, c: char) -> Error {
    Error::new(ErrorKind::Syntax)
        .with_message(format!("expecting '{c}' character"))
        .with_position(position)
}

fn unexpected_char(position: u64, c: char) -> Error {
    Error::new(ErrorKind::Syntax)
        .with_message(format!("unexpected '{c}' character"))
        .with_position(position)
}

fn expected_hex(position: u64) -> Error {
    Error::new(ErrorKind::Syntax)
        .with_message("expecting hexadecimal character")
        .with_position(position)
}

fn eof_expecting(position: u64, c: char) -> Error {
    Error::new(ErrorKind::Syntax)
        .with_message(format!("expecting '{c}' character at end of stream"))
        .with_position(position)
}
