use vaers_corpus::{
    data::io::TextSource,
    nlp::{
        tokenizer::Tokenizer,
        vocab::{self, Vocabulary},
    },
};

const DOCS: [&str; 4] = [
    "Fever and rash after vaccine",
    "fever fever headache",
    "Rash resolved, no fever",
    "headache",
];

#[test]
fn min_df_counts_documents_not_occurrences() {
    let tokenizer = Tokenizer::default();
    let vocab = vocab::build_vocabulary(DOCS, &tokenizer, 2);
    insta::assert_snapshot!(vocab.tokens().join(","), @"fever,headache,rash");

    let strict = vocab::build_vocabulary(DOCS, &tokenizer, 3);
    assert_eq!(strict.tokens(), ["fever"]);
}

#[test]
fn indices_are_one_based_with_unknown_after_last() {
    let vocab = Vocabulary::from_tokens(["rash", "fever", "rash"]);
    assert_eq!(vocab.len(), 2);
    assert_eq!(vocab.index_of("fever"), 1);
    assert_eq!(vocab.index_of("rash"), 2);
    assert_eq!(vocab.index_of("syncope"), 3);
    assert_eq!(vocab.token(0), None);
    assert_eq!(vocab.token(2), Some("rash"));
}

#[test]
fn builds_from_csv_sources_and_reloads() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("train_raw.csv");
    let mut body = String::from("RAW_TEXT\n");
    for doc in DOCS {
        body.push_str(&format!("\"{doc}\"\n"));
    }
    std::fs::write(&csv_path, body).unwrap();

    let out = tmp.path().join("vocab.csv");
    let sources = [TextSource::new(&csv_path, "RAW_TEXT")];
    let built = vocab::build_from_sources(&sources, &Tokenizer::default(), 2, &out).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "fever\nheadache\nrash\n");
    assert_eq!(Vocabulary::load(&out).unwrap(), built);
}

#[test]
fn missing_source_column_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("device_data.csv");
    std::fs::write(&csv_path, "TEXT\nsomething here\n").unwrap();
    let sources = [TextSource::new(&csv_path, "RAW_TEXT")];
    let out = tmp.path().join("vocab.csv");
    assert!(vocab::build_from_sources(&sources, &Tokenizer::default(), 1, &out).is_err());
    assert!(!out.exists());
}

#[test]
fn text_source_parses_from_cli_form() {
    let source: TextSource = "vaersdata/wiki_data.csv:TEXT".parse().unwrap();
    assert_eq!(source.column, "TEXT");
    assert!("no-column".parse::<TextSource>().is_err());
}
