use super::error::ParseError;
use super::tuple::{Tuple, Tuples};
use bytes::Bytes;

/// Typical l2met lines carry a handful of pairs.
const EXPECTED_TUPLES: usize = 8;

/// Decode one logfmt line into ordered tuples.
///
/// Unquoted keys and values are zero-copy slices of `line`. Quoted values
/// are only copied when they contain escapes. Any malformed input rejects
/// the whole line.
pub fn decode(line: impl Into<Bytes>) -> Result<Tuples, ParseError> {
    let line: Bytes = line.into();
    let buf = line.as_ref();
    let len = buf.len();
    let mut tuples = Tuples::with_capacity(EXPECTED_TUPLES);
    let mut pos = 0;

    while pos < len {
        let c = buf[pos];
        if is_space(c) {
            pos += 1;
            continue;
        }
        if c == b'=' || c == b'"' {
            return Err(unexpected(pos, c));
        }

        let key_start = pos;
        while pos < len && is_key_byte(buf[pos]) {
            pos += 1;
        }
        let key = line.slice(key_start..pos);

        // Bare key: `measure.hits` is shorthand for `measure.hits=`.
        if pos == len || is_space(buf[pos]) {
            tuples.push(Tuple::new(key, Bytes::new()));
            continue;
        }
        if buf[pos] == b'"' {
            return Err(unexpected(pos, b'"'));
        }

        // Skip '='.
        pos += 1;
        if pos == len || is_space(buf[pos]) {
            tuples.push(Tuple::new(key, Bytes::new()));
            continue;
        }

        let value = if buf[pos] == b'"' {
            let (value, next) = scan_quoted(&line, pos)?;
            pos = next;
            if pos < len && !is_space(buf[pos]) {
                return Err(unexpected(pos, buf[pos]));
            }
            value
        } else {
            let value_start = pos;
            while pos < len && !is_space(buf[pos]) {
                if buf[pos] == b'"' {
                    return Err(unexpected(pos, b'"'));
                }
                pos += 1;
            }
            line.slice(value_start..pos)
        };

        tuples.push(Tuple::new(key, value));
    }

    Ok(tuples)
}

/// Scan a quoted value whose opening quote sits at `open`. Returns the
/// unescaped value and the position just past the closing quote.
fn scan_quoted(line: &Bytes, open: usize) -> Result<(Bytes, usize), ParseError> {
    let buf = line.as_ref();
    let mut pos = open + 1;
    let mut unescaped: Option<Vec<u8>> = None;

    while pos < buf.len() {
        match buf[pos] {
            b'"' => {
                let value = match unescaped {
                    Some(owned) => Bytes::from(owned),
                    None => line.slice(open + 1..pos),
                };
                return Ok((value, pos + 1));
            }
            b'\\' if pos + 1 < buf.len() => {
                let owned = unescaped.get_or_insert_with(|| buf[open + 1..pos].to_vec());
                let escaped = buf[pos + 1];
                if escaped == b'u'
                    && let Some(c) = unicode_escape(&buf[pos + 2..])
                {
                    let mut utf8 = [0; 4];
                    owned.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                    pos += 6;
                } else {
                    owned.push(unescape(escaped));
                    pos += 2;
                }
            }
            b'\\' => break,
            b => {
                if let Some(owned) = unescaped.as_mut() {
                    owned.push(b);
                }
                pos += 1;
            }
        }
    }

    Err(ParseError::UnterminatedQuote { position: open })
}

fn unescape(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        other => other,
    }
}

/// `\uXXXX` with exactly four hex digits. Surrogates are rejected.
fn unicode_escape(rest: &[u8]) -> Option<char> {
    let digits = rest.get(..4)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let code = digits
        .iter()
        .fold(0_u32, |acc, &d| acc * 16 + (d as char).to_digit(16).unwrap_or(0));
    char::from_u32(code)
}

#[inline]
fn is_space(b: u8) -> bool {
    b <= b' '
}

#[inline]
fn is_key_byte(b: u8) -> bool {
    !is_space(b) && b != b'=' && b != b'"'
}

fn unexpected(position: usize, byte: u8) -> ParseError {
    ParseError::UnexpectedByte {
        position,
        character: byte as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(tuples: &Tuples) -> Vec<(String, String)> {
        tuples
            .iter()
            .map(|t| (t.name(), t.as_str().into_owned()))
            .collect()
    }

    #[test]
    fn test_decode_simple_pairs_in_order() {
        let tuples = decode("measure=db.query val=42ms source=web.1").unwrap();
        assert_eq!(
            pairs(&tuples),
            vec![
                ("measure".to_string(), "db.query".to_string()),
                ("val".to_string(), "42ms".to_string()),
                ("source".to_string(), "web.1".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_keeps_duplicate_keys() {
        let tuples = decode("val=1 val=2").unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples.iter().nth(1).unwrap().as_str(), "2");
    }

    #[test]
    fn test_decode_bare_key_and_empty_value() {
        let tuples = decode("measure.hits  flag= other").unwrap();
        let decoded = pairs(&tuples);
        assert_eq!(decoded[0], ("measure.hits".to_string(), String::new()));
        assert_eq!(decoded[1], ("flag".to_string(), String::new()));
        assert_eq!(decoded[2], ("other".to_string(), String::new()));
    }

    #[test]
    fn test_decode_quoted_values() {
        let tuples = decode(r#"msg="hello world" path="/a \"b\"\\c" at=info"#).unwrap();
        let decoded = pairs(&tuples);
        assert_eq!(decoded[0].1, "hello world");
        assert_eq!(decoded[1].1, r#"/a "b"\c"#);
        assert_eq!(decoded[2].1, "info");
    }

    #[test]
    fn test_decode_unicode_escapes() {
        let line = r#"msg="caf\u00e9 \u2603" q="\u0022x\u0022" bad="\u12" lone="\ud800""#;
        let tuples = decode(line).unwrap();
        let decoded = pairs(&tuples);
        assert_eq!(decoded[0].1, "café ☃");
        assert_eq!(decoded[1].1, r#""x""#);
        assert_eq!(decoded[2].1, "u12");
        assert_eq!(decoded[3].1, "ud800");
    }

    #[test]
    fn test_decode_allows_equals_in_unquoted_value() {
        let tuples = decode("path=/search?q=rust status=200").unwrap();
        assert_eq!(tuples.iter().next().unwrap().as_str(), "/search?q=rust");
    }

    #[test]
    fn test_decode_empty_line() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("   \t ").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_lines() {
        assert!(matches!(
            decode("=value"),
            Err(ParseError::UnexpectedByte { position: 0, character: '=' })
        ));
        assert!(matches!(
            decode(r#"msg="never closed"#),
            Err(ParseError::UnterminatedQuote { position: 4 })
        ));
        assert!(decode(r#"msg="closed"trailing"#).is_err());
        assert!(decode(r#"val=4"2"#).is_err());
        assert!(decode(r#"key"=1"#).is_err());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let line = r#"measure=a.b val=10 source="x y" host=h"#;
        assert_eq!(pairs(&decode(line).unwrap()), pairs(&decode(line).unwrap()));
    }
}
