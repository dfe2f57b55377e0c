use proptest::prelude::*;
use vaers_corpus::{
    config::parse_max_length,
    nlp::tokenizer::{Tokenizer, DATE_TOKEN},
};

#[test]
fn dates_are_masked_and_numbers_dropped() {
    let tokenizer = Tokenizer::new(true, None);
    let tokens = tokenizer.tokenize("Vaccinated 05-JAN-2020, fever 39 C on 7jan21.");
    assert_eq!(
        tokens,
        vec!["vaccinated", DATE_TOKEN, "fever", "on", DATE_TOKEN]
    );
}

#[test]
fn only_decimal_digit_tokens_are_dropped() {
    let tokenizer = Tokenizer::new(true, None);
    assert_eq!(
        tokenizer.tokenize("dose 2020 chapter ⅻⅰ ١٢ 3rd"),
        vec!["dose", "chapter", "ⅻⅰ", "3rd"]
    );
}

#[test]
fn unmasked_dates_keep_their_pieces() {
    let tokenizer = Tokenizer::new(false, None);
    assert_eq!(tokenizer.tokenize("05-JAN-2020"), vec!["jan"]);
}

#[test]
fn single_characters_are_not_tokens() {
    let tokenizer = Tokenizer::default();
    assert_eq!(tokenizer.tokenize("a b cd E"), vec!["cd"]);
}

#[test]
fn output_is_capped_at_max_length() {
    let tokenizer = Tokenizer::new(true, Some(3));
    assert_eq!(
        tokenizer.tokenize_joined("one two three four five"),
        "one two three"
    );
    assert_eq!(tokenizer.unbounded().tokenize("one two three four").len(), 4);
}

#[test]
fn max_length_setting_parses() {
    assert_eq!(parse_max_length("2500"), Some(Some(2500)));
    assert_eq!(parse_max_length("0"), Some(None));
    assert_eq!(parse_max_length("None"), Some(None));
    assert_eq!(parse_max_length("lots"), None);
}

proptest! {
    #[test]
    fn retokenizing_is_stable(text in "[a-zA-Z0-9 ,.\\-]{0,200}", cap in 1usize..50) {
        let tokenizer = Tokenizer::new(true, Some(cap));
        let once = tokenizer.tokenize_joined(&text);
        let twice = tokenizer.tokenize_joined(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(tokenizer.tokenize(&text).len() <= cap);
    }
}
