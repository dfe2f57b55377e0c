//! Rule-based sentence segmentation for encyclopedia summaries.

const ABBREVIATIONS: &[&str] = &[
    "approx", "c", "ca", "cf", "dr", "e.g", "eg", "et al", "etc", "fig", "i.e", "ie", "inc",
    "jr", "ltd", "mr", "mrs", "ms", "no", "prof", "sr", "st", "vs", "u.s",
];

/// Split `text` into trimmed, non-empty sentences.
///
/// A boundary is a `.`, `!` or `?` (plus any closing quotes or brackets)
/// followed by whitespace and a token that does not start lowercase. Periods
/// after known abbreviations, single-letter initials and inside numbers never
/// end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let mut i = 0usize;
    while i < chars.len() {
        let (_, ch) = chars[i];
        if matches!(ch, '.' | '!' | '?') {
            let mut end = i + 1;
            while end < chars.len() && matches!(chars[end].1, '"' | '\'' | ')' | ']' | '”' | '’')
            {
                end += 1;
            }
            let next_is_space = end < chars.len() && chars[end].1.is_whitespace();
            if next_is_space && is_boundary(text, &chars, i, end) {
                let byte_end = chars[end].0;
                push_trimmed(&mut sentences, &text[start..byte_end]);
                start = byte_end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

/// First sentence of `text`, if any.
pub fn first_sentence(text: &str) -> Option<String> {
    split_sentences(text).into_iter().next()
}

fn push_trimmed(out: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn is_boundary(text: &str, chars: &[(usize, char)], punct: usize, after: usize) -> bool {
    let next_word = chars[after..]
        .iter()
        .map(|(_, c)| *c)
        .find(|c| !c.is_whitespace());
    match next_word {
        Some(c) if c.is_lowercase() => return false,
        None => return true,
        _ => {}
    }
    if chars[punct].1 != '.' {
        return true;
    }

    let word_start = chars[..punct]
        .iter()
        .rposition(|(_, c)| c.is_whitespace() || *c == '(')
        .map(|p| p + 1)
        .unwrap_or(0);
    if word_start >= punct {
        return true;
    }
    let word = &text[chars[word_start].0..chars[punct].0];
    let lowered = word.to_lowercase();
    let trimmed = lowered.trim_end_matches('.');

    if ABBREVIATIONS.contains(&trimmed) {
        return false;
    }
    // Initials such as "J." in "J. Smith".
    if trimmed.chars().count() == 1 && trimmed.chars().all(char::is_alphabetic) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let text = "Syncope is a loss of consciousness. It is also called fainting! Why? Blood flow.";
        assert_eq!(
            split_sentences(text),
            vec![
                "Syncope is a loss of consciousness.",
                "It is also called fainting!",
                "Why?",
                "Blood flow.",
            ]
        );
    }

    #[test]
    fn keeps_abbreviations_and_decimals_together() {
        let text = "Levels rise e.g. After meals by 1.5 mmol. Dr. Smith described it.";
        assert_eq!(
            first_sentence(text).as_deref(),
            Some("Levels rise e.g. After meals by 1.5 mmol.")
        );
    }

    #[test]
    fn lowercase_continuation_is_not_a_boundary() {
        let text = "Amylase (from Gk. amylon) is an enzyme. It catalyses hydrolysis.";
        assert_eq!(
            first_sentence(text).as_deref(),
            Some("Amylase (from Gk. amylon) is an enzyme.")
        );
    }

    #[test]
    fn empty_text_has_no_sentence() {
        assert!(first_sentence("   ").is_none());
    }
}
