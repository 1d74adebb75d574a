use std::borrow::Cow;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// The cut always lands on a character boundary, so multi-byte characters
/// are never split. No ellipsis is appended: the result is a plain prefix of
/// the input, which keeps rendered lines deterministic.
///
/// Returns `Cow::Borrowed` when the string already fits.
///
/// # Examples
///
/// ```
/// use rss_to_hass::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello");
/// assert_eq!(truncate_chars("你好世界", 2), "你好");
/// assert_eq!(truncate_chars("Test", 0), "");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    // Fast path: byte length bounds char count from above
    if s.len() <= max_chars {
        return Cow::Borrowed(s);
    }

    match s.char_indices().nth(max_chars) {
        Some((byte_end, _)) => Cow::Owned(s[..byte_end].to_string()),
        None => Cow::Borrowed(s),
    }
}
