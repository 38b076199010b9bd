use std::borrow::Cow;

/// Escape text for inclusion in HTML element content or a quoted attribute.
///
/// Replaces `&`, `<`, `>`, `"` and `'`. Returns `Cow::Borrowed` when nothing
/// needs escaping.
///
/// ```
/// use atlas_utils::escape_html;
///
/// assert_eq!(escape_html("Caf\u{e9}"), "Caf\u{e9}");
/// assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
/// ```
#[must_use]
pub fn escape_html(input: &str) -> Cow<'_, str> {
    let Some(first) = input.find(['&', '<', '>', '"', '\'']) else {
        return Cow::Borrowed(input);
    };

    let mut out = String::with_capacity(input.len() + 16);
    out.push_str(&input[..first]);
    for ch in input[first..].chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
