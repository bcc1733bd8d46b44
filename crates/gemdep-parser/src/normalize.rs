//! Strips quoting from the literal shapes the lexer hands back verbatim
//! (§4.4), splits `%w` word arrays into individual pieces (§4.5), and
//! formats version-constraint strings (§4.2 step 6).

/// Strip quoting from a raw `String` or `Symbol` token's text, producing the
/// logical value. Identifiers and anything else unrecognized pass through
/// unchanged.
pub fn normalize(text: &str) -> String {
    if text.starts_with("%q") || text.starts_with("%w") {
        return normalize_percent_literal(text);
    }
    if let Some(rest) = text.strip_prefix(':') {
        return normalize_symbol(rest);
    }
    if text.starts_with('\'') || text.starts_with('"') {
        return normalize_quoted_string(text);
    }
    text.to_string()
}

/// True when a raw `String` token is a `%w` word array.
pub fn is_word_array(text: &str) -> bool {
    text.starts_with("%w")
}

/// Split already-normalized `%w` content into individual non-empty pieces
/// on runs of space/tab/newline (§4.5).
pub fn expand_word_array(content: &str) -> Vec<String> {
    content
        .split(|c: char| c == ' ' || c == '\t' || c == '\n')
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_symbol(rest: &str) -> String {
    if rest.len() >= 2 {
        let first = rest.as_bytes()[0];
        let last = rest.as_bytes()[rest.len() - 1];
        if (first == b'\'' || first == b'"') && first == last {
            return rest[1..rest.len() - 1].to_string();
        }
    }
    rest.to_string()
}

fn normalize_quoted_string(text: &str) -> String {
    if text.len() < 2 {
        return text.to_string();
    }
    let outer = text.as_bytes()[0] as char;
    let mut content = &text[1..text.len() - 1];
    content = content.trim_matches(outer);
    loop {
        let bytes = content.as_bytes();
        if bytes.len() >= 2 {
            let first = bytes[0];
            let last = bytes[bytes.len() - 1];
            if (first == b'\'' || first == b'"') && first == last {
                content = &content[1..content.len() - 1];
                continue;
            }
        }
        break;
    }
    content.to_string()
}

fn normalize_percent_literal(text: &str) -> String {
    // text looks like "%q<...>" or "%w[...]"; bytes[2] is the opener.
    if text.len() < 4 {
        return String::new();
    }
    let opener = text.as_bytes()[2];
    let content_start = 3;
    let content_end = text.len().saturating_sub(1);
    if content_end < content_start {
        return String::new();
    }
    let mut content = text[content_start..content_end].trim();

    if opener == b'<' {
        loop {
            if let Some(stripped) = content.strip_prefix("><") {
                content = stripped;
                continue;
            }
            if let Some(stripped) = content.strip_suffix("><") {
                content = stripped;
                continue;
            }
            if let Some(stripped) = content.strip_suffix('>') {
                content = stripped;
                continue;
            }
            break;
        }
    }

    if content.len() >= 6 && content.starts_with("'''") && content.ends_with("'''") {
        content = &content[3..content.len() - 3];
    }

    content.to_string()
}

/// Insert a single space between a leading non-digit operator run and the
/// digit that follows, unless one is already there (§4.2 step 6). Idempotent.
pub fn format_version(raw: &str) -> String {
    let Some(digit_pos) = raw.find(|c: char| c.is_ascii_digit()) else {
        return raw.to_string();
    };
    if digit_pos == 0 {
        return raw.to_string();
    }
    if raw[..digit_pos].ends_with(' ') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 1);
    out.push_str(&raw[..digit_pos]);
    out.push(' ');
    out.push_str(&raw[digit_pos..]);
    out
}
