//! Text codecs shared by colormode payloads and the debug surface
//!
//! Tables travel as comma separated integers. Tokens follow the kernel's
//! `kstrtou32(.., 0, ..)` rules (`0x` prefix for hex, leading `0` for octal,
//! one trailing newline allowed) with a signed fallback for negatives. The
//! last token is cut at the first character that is not part of an optional
//! `-` followed by decimal digits.
//!
//! CGC17 rows are 17 x 5 words of 8 hex digits with no separators.

use crate::context::CgcEncoded;
use crate::error::{DqeError, DqeResult};
use crate::regs::{CGC_ENC_WORDS, CGC_GRID};
use std::fmt::Write as _;

/// Hex digits per CGC17 word
const CGC_WORD_CHARS: usize = 8;
/// Characters per CGC17 row
const CGC_ROW_CHARS: usize = CGC_WORD_CHARS * CGC_ENC_WORDS;
/// Exact CGC17 payload length, one trailing character tolerated
pub const CGC_TEXT_LEN: usize = CGC_ROW_CHARS * CGC_GRID;

#[derive(Debug, PartialEq, Eq)]
enum IntError {
    Invalid,
    Range,
}

/// Parse digits in `radix` (`None` = auto-detect) up to `limit`
fn parse_radix(s: &str, radix: Option<u32>, limit: u64) -> Result<u64, IntError> {
    let s = s.strip_prefix('+').unwrap_or(s);
    let bytes = s.as_bytes();
    let has_hex_prefix = bytes.len() > 1 && bytes[0] == b'0' && bytes[1].to_ascii_lowercase() == b'x';

    let (digits, radix) = match radix {
        Some(16) if has_hex_prefix => (&s[2..], 16),
        Some(radix) => (s, radix),
        None if has_hex_prefix && bytes.get(2).is_some_and(u8::is_ascii_hexdigit) => (&s[2..], 16),
        None if bytes.first() == Some(&b'0') => (s, 8),
        None => (s, 10),
    };

    let mut value: u64 = 0;
    let mut consumed = 0;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        value = value
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or(IntError::Range)?;
        consumed += c.len_utf8();
    }
    if consumed == 0 {
        return Err(IntError::Invalid);
    }
    match &digits[consumed..] {
        "" | "\n" => {}
        _ => return Err(IntError::Invalid),
    }
    if value > limit {
        return Err(IntError::Range);
    }
    Ok(value)
}

fn parse_signed(token: &str) -> Result<i32, IntError> {
    match token.strip_prefix('-') {
        Some(rest) => parse_radix(rest, None, 1 << 31).map(|v| (v as i64).wrapping_neg() as i32),
        None => parse_radix(token, None, i32::MAX as u64).map(|v| v as i32),
    }
}

/// Parse one table token; negatives wrap to two's complement
pub fn parse_uint(token: &str) -> DqeResult<u32> {
    match parse_radix(token, None, u32::MAX as u64) {
        Ok(v) => Ok(v as u32),
        Err(IntError::Range) => Err(DqeError::token(token)),
        Err(IntError::Invalid) => parse_signed(token)
            .map(|v| v as u32)
            .map_err(|_| DqeError::token(token)),
    }
}

/// Fill `out` from a comma separated table.
///
/// Values are written only when the whole buffer parses.
pub fn parse_lut(buffer: &str, out: &mut [u32]) -> DqeResult<()> {
    if buffer.is_empty() {
        return Err(DqeError::token(buffer));
    }
    if out.is_empty() {
        return Ok(());
    }
    let last = out.len() - 1;

    let mut values = vec![0u32; out.len()];
    let mut rest = buffer;
    for value in values.iter_mut().take(last) {
        let (token, tail) = rest
            .split_once(',')
            .ok_or_else(|| DqeError::token(rest))?;
        *value = parse_uint(token)?;
        rest = tail;
    }

    let sign = usize::from(rest.starts_with('-'));
    let end = sign
        + rest[sign..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
    values[last] = parse_uint(&rest[..end])?;

    out.copy_from_slice(&values);
    Ok(())
}

/// Comma separated decimal form, values shown signed
pub fn lut_to_string(lut: &[u32]) -> String {
    let mut out = String::with_capacity(lut.len() * 5);
    for (i, v) in lut.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", *v as i32);
    }
    out
}

/// Parse one CGC17 row set (680 hex characters)
pub fn parse_cgc(buffer: &str) -> DqeResult<[CgcEncoded; CGC_GRID]> {
    if buffer.is_empty() {
        return Err(DqeError::token(buffer));
    }
    let bytes = buffer.as_bytes();
    if bytes.len() < CGC_TEXT_LEN || bytes.len() > CGC_TEXT_LEN + 1 {
        return Err(DqeError::range("cgc17 text length", bytes.len() as i64, CGC_TEXT_LEN as i64 + 1));
    }

    let mut rows = [[0u32; CGC_ENC_WORDS]; CGC_GRID];
    for (row, chunk) in rows.iter_mut().zip(bytes.chunks_exact(CGC_ROW_CHARS)) {
        for (word, hex) in row.iter_mut().zip(chunk.chunks_exact(CGC_WORD_CHARS)) {
            let hex = std::str::from_utf8(hex).map_err(|_| DqeError::token(buffer))?;
            let value = parse_radix(hex, Some(16), u64::MAX).map_err(|_| DqeError::token(hex))?;
            *word = value as u32;
        }
    }
    Ok(rows)
}

/// 85 words as `%08x` with no separators
pub fn cgc_to_string(rows: &[CgcEncoded; CGC_GRID]) -> String {
    let mut out = String::with_capacity(CGC_TEXT_LEN);
    for word in rows.iter().flatten() {
        let _ = write!(out, "{:08x}", word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", 42)]
    #[case("0x1F", 0x1f)]
    #[case("0X10", 16)]
    #[case("017", 15)]
    #[case("0", 0)]
    #[case("+5", 5)]
    #[case("7\n", 7)]
    #[case("4294967295", u32::MAX)]
    #[case("-1", u32::MAX)]
    #[case("-25", -25i32 as u32)]
    #[case("-0x10", -16i32 as u32)]
    #[case("-2147483648", 0x8000_0000)]
    fn test_parse_uint(#[case] token: &str, #[case] expected: u32) {
        assert_eq!(parse_uint(token).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(" 5")]
    #[case("5 ")]
    #[case("abc")]
    #[case("4294967296")]
    #[case("-2147483649")]
    #[case("08")]
    #[case("0x")]
    #[case("1\n\n")]
    fn test_parse_uint_rejects(#[case] token: &str) {
        assert!(matches!(parse_uint(token), Err(DqeError::ParseToken { .. })), "{:?}", token);
    }

    #[test]
    fn test_parse_lut() {
        let mut lut = [0u32; 4];
        parse_lut("1,-2,0x10,300", &mut lut).unwrap();
        assert_eq!(lut, [1, -2i32 as u32, 16, 300]);
    }

    #[test]
    fn test_last_token_is_digit_prefix() {
        let mut lut = [0u32; 3];
        parse_lut("1,2,3,4,5", &mut lut).unwrap();
        assert_eq!(lut, [1, 2, 3]);
        parse_lut("1,2,-7garbage", &mut lut).unwrap();
        assert_eq!(lut, [1, 2, -7i32 as u32]);
        // hex is not accepted in the last slot past its leading zero
        parse_lut("1,2,0x20", &mut lut).unwrap();
        assert_eq!(lut, [1, 2, 0]);
    }

    #[test]
    fn test_parse_lut_failure_keeps_output() {
        let mut lut = [9u32; 3];
        assert!(parse_lut("1,2", &mut lut).is_err());
        assert!(parse_lut("1,x,3", &mut lut).is_err());
        assert!(parse_lut("1,2,", &mut lut).is_err());
        assert!(parse_lut("", &mut lut).is_err());
        assert_eq!(lut, [9, 9, 9]);
    }

    #[test]
    fn test_lut_to_string() {
        assert_eq!(lut_to_string(&[0, 5, -3i32 as u32]), "0,5,-3");
        assert_eq!(lut_to_string(&[]), "");
    }

    #[test]
    fn test_cgc_text() {
        let mut rows = [[0u32; CGC_ENC_WORDS]; CGC_GRID];
        rows[0][0] = 0xdeadbeef;
        rows[16][4] = 0x1;
        let text = cgc_to_string(&rows);
        assert_eq!(text.len(), CGC_TEXT_LEN);
        assert!(text.starts_with("deadbeef00000000"));
        assert_eq!(parse_cgc(&text).unwrap(), rows);

        let with_newline = format!("{}\n", text);
        assert_eq!(parse_cgc(&with_newline).unwrap(), rows);
    }

    #[test]
    fn test_cgc_text_rejects() {
        assert!(parse_cgc("").is_err());
        assert!(parse_cgc(&"0".repeat(CGC_TEXT_LEN - 1)).is_err());
        assert!(parse_cgc(&"0".repeat(CGC_TEXT_LEN + 2)).is_err());
        let mut text = "0".repeat(CGC_TEXT_LEN);
        text.replace_range(100..101, "g");
        assert!(matches!(parse_cgc(&text), Err(DqeError::ParseToken { .. })));
    }
}
