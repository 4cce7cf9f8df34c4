//! Charset transform applied to every rendered line.
//!
//! The builtin PDF fonts only cover a Latin-1 subset, so by default each
//! line is NFKD-decomposed and reduced to printable ASCII: accented letters
//! keep their base letter, everything else outside `' '..='~'` is dropped.
//! This loss is accepted. [`CharsetPolicy::Passthrough`] disables it for
//! writers with wider fonts.

use crate::config::CharsetPolicy;
use unicode_normalization::UnicodeNormalization;

/// Reduce `text` to printable ASCII.
///
/// Tabs become a single space; all other control characters are dropped.
/// Never fails, whatever the input.
pub fn to_printable_ascii(text: &str) -> String {
    text.nfkd()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            ' '..='~' => Some(c),
            _ => None,
        })
        .collect()
}

/// Apply `policy` to one line of text.
pub fn apply_charset(line: &str, policy: CharsetPolicy) -> String {
    match policy {
        CharsetPolicy::Ascii => to_printable_ascii(line),
        CharsetPolicy::Passthrough => line
            .chars()
            .filter_map(|c| match c {
                '\t' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect(),
    }
}

/// Split on `\n`, `\r\n` or a lone `\r`.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .flat_map(|l| l.strip_suffix('\r').unwrap_or(l).split('\r'))
}
