use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Decorative symbol ranges stripped from titles: emoticons, pictographs,
    // transport, flags, dingbats, the astral planes and a few loose
    // modifiers (ZWJ, variation selector, eject, watch, wavy dash).
    static ref SYMBOL_RE: Regex = Regex::new(concat!(
        "[",
        "\u{1F600}-\u{1F64F}",
        "\u{1F300}-\u{1F5FF}",
        "\u{1F680}-\u{1F6FF}",
        "\u{1F1E0}-\u{1F1FF}",
        "\u{2702}-\u{27B0}",
        "\u{24C2}-\u{1F251}",
        "\u{1F926}-\u{1F937}",
        "\u{10000}-\u{10FFFF}",
        "\u{2640}-\u{2642}",
        "\u{2600}-\u{2B55}",
        "\u{200D}",
        "\u{23CF}",
        "\u{23E9}",
        "\u{231A}",
        "\u{FE0F}",
        "\u{3030}",
        "]+",
    ))
    .expect("symbol pattern must compile");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("whitespace pattern must compile");
}

/// Clean a raw video/series title: strip decorative symbols, collapse
/// whitespace and title-case the words, keeping short acronyms untouched.
pub fn clean_title(text: &str) -> String {
    let stripped = SYMBOL_RE.replace_all(text, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    collapsed
        .trim()
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(normalize_word)
        .collect::<Vec<String>>()
        .join(" ")
}

fn normalize_word(word: &str) -> String {
    if word.chars().count() <= 3 && is_acronym(word) {
        return word.to_string();
    }
    capitalize(word)
}

// All cased characters uppercase, and at least one of them.
fn is_acronym(word: &str) -> bool {
    word.chars().any(|c| c.is_uppercase()) && !word.chars().any(|c| c.is_lowercase())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
