//! Character-offset helpers for plain block content. Offsets count chars, not bytes.

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(text.len())
}

pub fn split_at_char(text: &str, offset: usize) -> (String, String) {
    let byte_idx = char_to_byte_idx(text, offset);
    (text[..byte_idx].to_string(), text[byte_idx..].to_string())
}

pub fn insert_char_at(text: &str, offset: usize, ch: char) -> String {
    let mut result = text.to_string();
    result.insert(char_to_byte_idx(text, offset), ch);
    result
}

pub fn insert_str_at(text: &str, offset: usize, insert: &str) -> String {
    let mut result = text.to_string();
    result.insert_str(char_to_byte_idx(text, offset), insert);
    result
}

/// Removes the char at `offset`; `None` when there is nothing there.
pub fn remove_char_at(text: &str, offset: usize) -> Option<String> {
    let start = text.char_indices().nth(offset)?.0;
    let mut result = text.to_string();
    result.remove(start);
    Some(result)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

pub fn previous_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut idx = offset.min(chars.len());
    while idx > 0 && chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    if idx > 0 && is_word_char(chars[idx - 1]) {
        while idx > 0 && is_word_char(chars[idx - 1]) {
            idx -= 1;
        }
    } else {
        while idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
    }
    idx
}

pub fn next_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut idx = offset.min(len);
    if idx < len && is_word_char(chars[idx]) {
        while idx < len && is_word_char(chars[idx]) {
            idx += 1;
        }
    } else {
        while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
            idx += 1;
        }
    }
    while idx < len && chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}
