use crate::kanji::{KanjiEntry, Mode};

/// Remove `( … )` and full-width `（ … ）` annotation segments, then trim.
/// An unclosed bracket keeps the rest of the text untouched.
pub fn strip_annotations(stored: &str) -> String {
    let mut out = String::with_capacity(stored.len());
    let mut rest = stored;
    while let Some(open) = rest.find(&['(', '（'][..]) {
        let close_char = if rest[open..].starts_with('(') { ')' } else { '）' };
        match rest[open..].find(close_char) {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + close_char.len_utf8()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Stored answers for `mode` as the player is expected to type them
pub fn expected_answers(kanji: &KanjiEntry, mode: Mode) -> Vec<String> {
    kanji
        .answers(mode)
        .iter()
        .map(|a| normalize(&strip_annotations(a)))
        .filter(|a| !a.is_empty())
        .collect()
}

/// Exact, case-insensitive match of `raw_input` against the accepted answers.
/// Annotations are stripped from stored answers only; input is taken literally.
pub fn is_correct(kanji: &KanjiEntry, mode: Mode, raw_input: &str) -> bool {
    let input = normalize(raw_input);
    if input.is_empty() {
        return false;
    }
    expected_answers(kanji, mode).iter().any(|a| *a == input)
}
