use crate::foundation::config::WRAP_WIDTH_CHARS;

/// Split a caption into display lines.
///
/// Explicit newlines always break. Each segment is then wrapped greedily at whitespace so no
/// line exceeds `WRAP_WIDTH_CHARS` scalars, except a single word that is longer than that, which
/// stays whole on its own line. Blank segments produce no line at all.
///
/// Two departures from a conventional word wrapper:
///
/// - An overlong word is never split across lines, so that line exceeds the limit instead.
/// - Whitespace runs collapse to one space, including runs in the middle of a line; doubled
///   spaces are not preserved.
///
/// This counts characters, not pixels: a wrapped line can still be wider than the canvas.
pub fn wrap(caption: &str) -> Vec<String> {
    wrap_to(caption, WRAP_WIDTH_CHARS)
}

pub fn wrap_to(caption: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for segment in caption.split('\n') {
        wrap_segment(segment, width, &mut lines);
    }
    lines
}

fn wrap_segment(segment: &str, width: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in segment.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
            continue;
        }
        if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if current_len > 0 {
        out.push(current);
    }
}
