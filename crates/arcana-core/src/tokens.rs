//! Tokenizer-free token estimation.
//!
//! Latin text averages about four characters per token; Hangul and other
//! non-ASCII scripts land closer to one token per one and a half characters.

/// Characters per token for ASCII text.
const ASCII_CHARS_PER_TOKEN: u64 = 4;

/// Estimates the token count of `text`.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    let (ascii, other) = text.chars().fold((0u64, 0u64), |(ascii, other), letter| {
        if letter.is_ascii() {
            (ascii + 1, other)
        } else {
            (ascii, other + 1)
        }
    });

    ascii.div_ceil(ASCII_CHARS_PER_TOKEN) + (other * 2).div_ceil(3)
}
