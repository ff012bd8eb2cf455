//! Parsing of raw LPEC lines into structured [`Line`] values.

use crate::error::{ParseError, Result};
use crate::record::{EventRecord, Line};

/// Parse one line of text received from an LPEC connection.
///
/// Leading and trailing whitespace (including the `\r` left over from
/// `\r\n` line endings) is ignored. A line that does not match the grammar
/// yields a [`ParseError`]; callers treat that as non-fatal and keep reading.
///
/// # Example
///
/// ```
/// use lpec_protocol::{parse_line, Line};
///
/// let line = parse_line(r#"EVENT 1 Ds/Receiver TransportState="Playing""#).unwrap();
/// match line {
///     Line::Event(record) => {
///         assert_eq!(record.seq, 1);
///         assert_eq!(record.value("TransportState"), Some("Playing"));
///     }
///     other => panic!("expected event, got {:?}", other),
/// }
/// ```
pub fn parse_line(line: &str) -> Result<Line> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let (keyword, rest) = split_token(line).ok_or(ParseError::EmptyLine)?;
    match keyword {
        "ALIVE" => {
            let (service, _) = split_token(rest).ok_or(ParseError::MissingService)?;
            Ok(Line::Alive {
                service: service.to_string(),
            })
        }
        "SUBSCRIBE" => {
            let (service, _) = split_token(rest).ok_or(ParseError::MissingService)?;
            Ok(Line::SubscriptionAck {
                service: service.to_string(),
            })
        }
        "EVENT" => parse_event(rest),
        other => Err(ParseError::UnknownKeyword(other.to_string())),
    }
}

/// Parse the remainder of an `EVENT` line: `<seq> <service> <pairs...>`.
fn parse_event(rest: &str) -> Result<Line> {
    let (seq_token, rest) = split_token(rest).ok_or(ParseError::MissingSequence)?;
    let seq: u64 = seq_token
        .parse()
        .map_err(|_| ParseError::InvalidSequence(seq_token.to_string()))?;

    let (service, rest) = split_token(rest).ok_or(ParseError::MissingService)?;

    let changes = parse_pairs(rest)?;
    Ok(Line::Event(EventRecord {
        seq,
        service: service.to_string(),
        changes,
    }))
}

/// Parse zero or more `name="value"` pairs, unescaping `\"` and `\\`
/// inside values.
fn parse_pairs(mut input: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();

    loop {
        input = input.trim_start();
        if input.is_empty() {
            break;
        }

        let eq = input
            .find('=')
            .ok_or_else(|| ParseError::MalformedAssignment(snippet(input)))?;
        let name = input[..eq].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ParseError::MalformedAssignment(snippet(input)));
        }

        let after = &input[eq + 1..];
        if !after.starts_with('"') {
            return Err(ParseError::MalformedAssignment(snippet(input)));
        }

        // Scan the quoted value. A backslash escapes the next character,
        // which covers the `\"` and `\\` forms devices emit.
        let quoted = &after[1..];
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        let mut close = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(ParseError::UnterminatedValue(name.to_string())),
                },
                '"' => {
                    close = Some(i);
                    break;
                }
                other => value.push(other),
            }
        }
        let close = close.ok_or_else(|| ParseError::UnterminatedValue(name.to_string()))?;

        pairs.push((name.to_string(), value));
        input = &quoted[close + 1..];
    }

    Ok(pairs)
}

/// Split off the next whitespace-delimited token, returning it together
/// with the rest of the input (leading whitespace stripped).
fn split_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest.trim_start())),
        None => Some((input, "")),
    }
}

/// Short prefix of the offending input for error messages.
fn snippet(input: &str) -> String {
    const MAX: usize = 24;
    if input.len() <= MAX {
        input.to_string()
    } else {
        let mut end = MAX;
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &input[..end])
    }
}
