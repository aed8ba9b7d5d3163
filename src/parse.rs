use anyhow::{bail, Result};
use bstr::ByteSlice;
use memchr::memchr;

pub(crate) const NEWLINE: u8 = 10;
pub(crate) const SEMICOLON: u8 = 59;
const MINUS: u8 = 45;
const PERIOD: u8 = 46;

#[inline]
pub fn parse_record(block: &[u8]) -> Option<(&[u8], i64, &[u8])> {
    let separator = memchr(SEMICOLON, block)?;
    let is_neg = block.get(separator + 1) == Some(&MINUS);

    let mut acc: i64 = 0;
    let mut position = separator + 1;
    while position < block.len() {
        let character = block[position];
        position += 1;
        match character {
            NEWLINE => break,
            b'0'..=b'9' => acc = acc * 10 + (character - b'0') as i64,
            _ => continue
        }
    }

    let value = match is_neg {
        true => -acc,
        false => acc,
    };
    Some((&block[..separator], value, &block[position..]))
}

pub fn parse_record_strict(block: &[u8]) -> Result<Option<(&[u8], i64, &[u8])>> {
    if block.is_empty() {
        return Ok(None);
    }
    let (line, rest) = match memchr(NEWLINE, block) {
        Some(end) => (&block[..end], &block[end + 1..]),
        None => (block, &block[block.len()..]),
    };

    let Some(separator) = line.find_byte(SEMICOLON) else {
        bail!("malformed record {:?}: missing ';'", line.as_bstr());
    };
    let key = &line[..separator];
    if key.is_empty() {
        bail!("malformed record {:?}: empty key", line.as_bstr());
    }
    let Some(value) = parse_value_strict(&line[separator + 1..]) else {
        bail!("malformed record {:?}: expected a number with one fractional digit", line.as_bstr());
    };
    Ok(Some((key, value, rest)))
}

pub fn parse_value_strict(buffer: &[u8]) -> Option<i64> {
    let (is_neg, digits) = match buffer.split_first() {
        Some((&MINUS, rest)) => (true, rest),
        _ => (false, buffer),
    };
    let [whole @ .., PERIOD, fraction] = digits else {
        return None;
    };
    if whole.is_empty() || !fraction.is_ascii_digit() {
        return None;
    }

    let mut acc: i64 = 0;
    for &val in whole {
        if !val.is_ascii_digit() {
            return None;
        }
        acc = acc.checked_mul(10)?.checked_add((val - b'0') as i64)?;
    }
    acc = acc.checked_mul(10)?.checked_add((fraction - b'0') as i64)?;

    match is_neg {
        true => Some(-acc),
        false => Some(acc),
    }
}

pub struct Records<'a> {
    rest: &'a [u8],
}

impl<'a> Records<'a> {
    pub fn new(block: &'a [u8]) -> Self {
        Self { rest: block }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (&'a [u8], i64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (key, value, rest) = parse_record(self.rest)?;
        self.rest = rest;
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_folds_digits() {
        let records: Vec<_> = Records::new(b"x;1.0\ny;2.5\nx;-3.0\n").collect();
        assert_eq!(
            records,
            vec![(&b"x"[..], 10), (&b"y"[..], 25), (&b"x"[..], -30)]
        );
    }

    #[test]
    fn lenient_last_record_without_newline() {
        let records: Vec<_> = Records::new(b"Hamburg;12.0\nBulawayo;8.9").collect();
        assert_eq!(records, vec![(&b"Hamburg"[..], 120), (&b"Bulawayo"[..], 89)]);
    }

    #[test]
    fn lenient_ignores_stray_characters() {
        let (key, value, rest) = parse_record(b"a; 1x2.3\r\nb;4.0").unwrap();
        assert_eq!(key, b"a");
        assert_eq!(value, 123);
        assert_eq!(rest, b"b;4.0");
    }

    #[test]
    fn lenient_minus_only_after_separator() {
        assert_eq!(parse_record(b"a;1-0.0").map(| r | r.1), Some(100));
        assert_eq!(parse_record(b"a;-0.1").map(| r | r.1), Some(-1));
    }

    #[test]
    fn lenient_separator_at_end() {
        let (key, value, rest) = parse_record(b"a;").unwrap();
        assert_eq!((key, value, rest), (&b"a"[..], 0, &b""[..]));
    }

    #[test]
    fn lenient_line_without_separator_joins_next_key() {
        let records: Vec<_> = Records::new(b"a;1.0\n\nb;2.0\n").collect();
        assert_eq!(records, vec![(&b"a"[..], 10), (&b"\nb"[..], 20)]);
    }

    #[test]
    fn lenient_stops_without_separator() {
        assert!(parse_record(b"").is_none());
        assert!(parse_record(b"no separator here").is_none());
    }

    #[test]
    fn strict_accepts_well_formed() {
        let (key, value, rest) = parse_record_strict(b"St. John's;-12.3\nx;0.0").unwrap().unwrap();
        assert_eq!(key, b"St. John's");
        assert_eq!(value, -123);
        assert_eq!(rest, b"x;0.0");
        assert_eq!(parse_record_strict(b"").unwrap(), None);
    }

    #[test]
    fn strict_rejects_malformed() {
        for bad in [
            &b"no separator"[..],
            &b";1.0"[..],
            &b"a;1"[..],
            &b"a;1.23"[..],
            &b"a;.5"[..],
            &b"a;1x.5"[..],
            &b"a;1.0\r"[..],
            &b"a;--1.0"[..],
            &b""[..],
        ] {
            let mut input = bad.to_vec();
            input.push(b'\n');
            assert!(parse_record_strict(&input).is_err(), "{:?}", bad.as_bstr());
        }
    }

    #[test]
    fn strict_error_names_record() {
        let err = parse_record_strict(b"Oslo;warm\n").unwrap_err();
        assert!(err.to_string().contains("Oslo;warm"));
    }
}
