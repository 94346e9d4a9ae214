use std::borrow::Cow;

/// Returns true for control characters that XML 1.0 forbids in documents.
///
/// Tab, LF and CR are legal and kept.
fn is_forbidden_xml_char(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Strips control characters that make strict XML parsers fail.
///
/// Removes `\x00-\x08`, `\x0B`, `\x0C` and `\x0E-\x1F`. Feeds generated by
/// careless CMS exports regularly contain these inside titles and
/// descriptions.
///
/// Returns `Cow::Borrowed` when nothing needs to be removed.
///
/// # Examples
///
/// ```
/// use feedcrawl::util::strip_xml_control_chars;
///
/// assert_eq!(strip_xml_control_chars("a\u{0}b\u{1F}c"), "abc");
/// assert_eq!(strip_xml_control_chars("tab\tand\nnewline"), "tab\tand\nnewline");
/// ```
pub fn strip_xml_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_forbidden_xml_char) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_forbidden_xml_char(c)).collect())
}

/// Escapes `&` characters that do not start an entity or character reference.
///
/// `AT&T` becomes `AT&amp;T`, while `&amp;`, `&nbsp;`, `&#38;` and `&#x26;`
/// are left untouched.
pub fn escape_bare_ampersands(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    let mut changed = false;

    for (i, c) in s.char_indices() {
        if c == '&' && !starts_reference(&s[i + 1..]) {
            out.push_str("&amp;");
            changed = true;
        } else {
            out.push(c);
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(s)
    }
}

/// Checks whether `rest` (the text right after an `&`) is `name;`, `#digits;`
/// or `#xhex;`.
fn starts_reference(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let body = &rest[..end];

    if let Some(num) = body.strip_prefix('#') {
        return match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        };
    }

    let mut chars = body.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

/// Prepares an untrusted feed body for a strict XML reader.
pub fn sanitize_xml(s: &str) -> Cow<'_, str> {
    match strip_xml_control_chars(s) {
        Cow::Borrowed(clean) => escape_bare_ampersands(clean),
        Cow::Owned(clean) => Cow::Owned(escape_bare_ampersands(&clean).into_owned()),
    }
}

/// True when the string is empty or only whitespace.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
