use regex::Regex;
use std::sync::LazyLock;

static HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{L})-[ \t]*\r?\n[ \t]*(\p{Ll})").expect("hyphenation pattern is valid")
});

static PAGE_NUMBER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:page[ \t]+)?\d{1,4}(?:[ \t]+of[ \t]+\d{1,4})?[ \t]*\r?$")
        .expect("page number pattern is valid")
});

const LIGATURES: [(char, &str); 5] = [
    ('\u{fb00}', "ff"),
    ('\u{fb01}', "fi"),
    ('\u{fb02}', "fl"),
    ('\u{fb03}', "ffi"),
    ('\u{fb04}', "ffl"),
];

/// Cleans raw page text for chunking.
///
/// Rejoins words hyphenated across line breaks, expands typographic ligatures,
/// drops soft hyphens, control characters and bare page-number lines, then
/// collapses all whitespace runs to single spaces. Total on any input.
pub fn normalize_text(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\u{ad}' => {}
            '\u{fb00}'..='\u{fb04}' => {
                if let Some((_, expanded)) = LIGATURES.iter().find(|(lig, _)| *lig == ch) {
                    text.push_str(expanded);
                }
            }
            c if c.is_control() && !c.is_whitespace() => text.push(' '),
            c => text.push(c),
        }
    }

    let joined = HYPHEN_BREAK.replace_all(&text, "$1$2");
    let without_page_numbers = PAGE_NUMBER_LINE.replace_all(&joined, "");

    normalize_whitespace(&without_page_numbers)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
