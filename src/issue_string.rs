//! Issue-number parsing and natural ordering.
//!
//! Comic issue "numbers" are rarely just numbers: `"12"`, `"12.1"`, `"0"`,
//! `"-1"`, `"5AU"`, `"100-2"`, `"½"` and `"∞"` all appear in the wild. This
//! module splits them into a numeric prefix and a suffix, derives a comparable
//! [`IssueKey`], and provides the natural filename ordering used to sequence
//! pages inside an archive.

use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Tokens that stand for an infinite issue number.
    static ref INFINITY_TOKEN_REGEX: Regex = Regex::new(r"^(?i)(∞|inf|infinity)$").unwrap();
}

const HALF: &str = "½";

/// An issue number broken into its numeric part and trailing suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueString {
    num: Option<f64>,
    suffix: String,
}

impl IssueString {
    /// Parses an issue string. Never fails: text without a numeric prefix is
    /// kept entirely as suffix.
    pub fn new(text: &str) -> Self {
        let text = text.trim();
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Self {
                num: None,
                suffix: String::new(),
            };
        }

        // skip the minus sign if it's first
        let start = usize::from(bytes[0] == b'-');
        if start >= bytes.len() || !(bytes[start].is_ascii_digit() || bytes[start] == b'.') {
            return Self::suffix_only(text);
        }

        let mut idx = start;
        let mut decimal_count = 0;
        while idx < bytes.len() {
            let b = bytes[idx];
            if !(b.is_ascii_digit() || b == b'.') {
                break;
            }
            if b == b'.' {
                decimal_count += 1;
                if decimal_count > 1 {
                    break;
                }
            }
            idx += 1;
        }

        // a trailing decimal point belongs to the suffix when more text follows
        if bytes[idx - 1] == b'.' && idx != bytes.len() {
            idx -= 1;
        }
        // a lone minus sign belongs to the suffix
        if idx == 1 && start == 1 {
            idx = 0;
        }

        let (number, suffix) = text.split_at(idx);
        if number.is_empty() {
            return Self::suffix_only(text);
        }
        match number.parse::<f64>() {
            // digit runs too long for f64 stay finite so they sort after shorter numbers
            Ok(num) => Self {
                num: Some(if num == 0.0 { 0.0 } else { num.clamp(f64::MIN, f64::MAX) }),
                suffix: suffix.to_string(),
            },
            Err(_) => Self::suffix_only(text),
        }
    }

    fn suffix_only(text: &str) -> Self {
        Self {
            num: None,
            suffix: text.to_string(),
        }
    }

    pub fn num(&self) -> Option<f64> {
        self.num
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the issue with its integer part left-padded with zeroes to `pad` digits.
    pub fn as_string(&self, pad: usize) -> String {
        let Some(num) = self.num else {
            return self.suffix.clone();
        };

        let negative = num < 0.0;
        let num_f = num.abs();
        let num_int = num_f.trunc();
        let int_str = format!("{}", num_int as u64);

        let mut num_s = if num_int != num_f {
            num_f.to_string()
        } else {
            int_str.clone()
        };
        num_s.push_str(&self.suffix);

        if int_str.len() < pad {
            num_s.insert_str(0, &"0".repeat(pad - int_str.len()));
        }
        if negative {
            num_s.insert(0, '-');
        }
        num_s
    }

    /// Returns the numeric value, counting a `½` suffix as one half.
    pub fn as_float(&self) -> Option<f64> {
        if self.suffix == HALF {
            return Some(self.num.unwrap_or(0.0) + 0.5);
        }
        self.num
    }

    /// Returns the truncated integer value, if there is a numeric part.
    pub fn as_int(&self) -> Option<i64> {
        self.num.map(|n| n.trunc() as i64)
    }

    /// Derives the ordering key for this issue.
    pub fn key(&self) -> IssueKey {
        if self.num.is_none() && INFINITY_TOKEN_REGEX.is_match(&self.suffix) {
            return IssueKey {
                class: IssueClass::Infinite,
                value: f64::INFINITY,
                suffix: String::new(),
            };
        }

        match self.as_float() {
            Some(value) if value.is_finite() => {
                let suffix = if self.suffix == HALF {
                    String::new()
                } else {
                    self.suffix.to_lowercase()
                };
                IssueKey {
                    class: IssueClass::Finite,
                    value,
                    suffix,
                }
            }
            _ => IssueKey {
                class: IssueClass::Unparseable,
                value: 0.0,
                suffix: self.suffix.to_lowercase(),
            },
        }
    }
}

impl fmt::Display for IssueString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string(0))
    }
}

impl From<&str> for IssueString {
    fn from(text: &str) -> Self {
        IssueString::new(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IssueClass {
    Unparseable,
    Finite,
    Infinite,
}

/// Comparable value derived from an issue string. Only used for ordering.
///
/// Unparseable (including empty) issues sort before every number, `∞` sorts
/// after every finite number, and suffixes break ties case-insensitively.
#[derive(Debug, Clone)]
pub struct IssueKey {
    class: IssueClass,
    value: f64,
    suffix: String,
}

impl Ord for IssueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class
            .cmp(&other.class)
            .then_with(|| self.value.total_cmp(&other.value))
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for IssueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IssueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IssueKey {}

/// Compares two issue strings by their [`IssueKey`].
pub fn compare_issues(a: &str, b: &str) -> Ordering {
    IssueString::new(a).key().cmp(&IssueString::new(b).key())
}

/// Sorts issue strings in issue order.
pub fn sort_issues<S: AsRef<str>>(issues: &mut [S]) {
    issues.sort_by_cached_key(|issue| IssueString::new(issue.as_ref()).key());
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(text: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (idx, c) in text.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(current) if current != is_digit => {
                out.push(make_chunk(&text[start..idx], current));
                start = idx;
                in_digits = Some(is_digit);
            }
            None => in_digits = Some(is_digit),
            _ => {}
        }
    }
    if let Some(current) = in_digits {
        out.push(make_chunk(&text[start..], current));
    }
    out
}

fn make_chunk(text: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(text)
    } else {
        Chunk::Text(text)
    }
}

fn compare_chunks(a: &Chunk<'_>, b: &Chunk<'_>) -> Ordering {
    match (a, b) {
        (Chunk::Digits(x), Chunk::Digits(y)) => {
            let x = x.trim_start_matches('0');
            let y = y.trim_start_matches('0');
            x.len().cmp(&y.len()).then_with(|| x.cmp(y))
        }
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        (Chunk::Text(x), Chunk::Text(y)) => x
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(y.chars().flat_map(char::to_lowercase)),
    }
}

/// Natural, case-insensitive ordering for entry names: embedded digit runs
/// compare by magnitude, so `page2.jpg` sorts before `page10.jpg`.
///
/// Names that compare equal chunk by chunk (`"01.jpg"` and `"1.jpg"`) fall
/// back to a plain byte comparison, which keeps the order total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ordering = compare_chunks(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}
