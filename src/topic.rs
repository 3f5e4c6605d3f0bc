//! Derives a short video-search query from free-form chat text.

/// Returned when nothing meaningful is left after stripping
pub const FALLBACK_TOPIC: &str = "benessere mentale";

/// Greetings and ways of addressing the assistant, matched case-insensitively
const WAKE_PHRASES: &[&str] = &[
    "ciao coach",
    "ciao",
    "salve",
    "buongiorno",
    "buonasera",
    "hey coach",
    "hey",
    "ehi",
    "coach",
];

/// Longer phrases come first so "come posso" wins over "come"
const QUESTION_PHRASES: &[&str] = &[
    "vorrei sapere",
    "mi sai dire",
    "puoi dirmi",
    "mi puoi dire",
    "potresti dirmi",
    "cosa posso fare per",
    "cosa devo fare per",
    "come posso",
    "come faccio a",
    "come faccio",
    "come si fa a",
    "che cos'è",
    "cos'è",
    "cosa significa",
    "quali sono",
    "perché",
    "come",
    "cosa",
];

/// Punctuation that may follow a greeting ("Ciao, ...", "Ehi! ...")
fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '!' | '.' | ':' | ';' | '-')
}

/// Case-insensitive `strip_prefix` that only matches whole words
fn strip_phrase<'a>(text: &'a str, phrase: &str) -> Option<&'a str> {
    let mut text_chars = text.char_indices();
    for expected in phrase.chars() {
        let (_, actual) = text_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let rest = match text_chars.next() {
        Some((idx, c)) if is_separator(c) => &text[idx..],
        Some(_) => return None,
        None => "",
    };
    Some(rest.trim_start_matches(is_separator))
}

fn strip_any<'a>(text: &'a str, phrases: &[&str]) -> Option<&'a str> {
    phrases.iter().find_map(|p| strip_phrase(text, p))
}

/// Strip greetings, then question forms, then trailing punctuation.
/// Always returns a non-empty topic.
pub fn extract_topic(text: &str) -> String {
    let mut rest = text.trim_start_matches(is_separator);

    while let Some(stripped) = strip_any(rest, WAKE_PHRASES) {
        rest = stripped;
    }
    while let Some(stripped) = strip_any(rest, QUESTION_PHRASES) {
        rest = stripped;
    }

    let topic = rest.trim().trim_end_matches(['?', '!', '.', ' ']).trim();
    if topic.is_empty() {
        FALLBACK_TOPIC.to_string()
    } else {
        topic.to_string()
    }
}
