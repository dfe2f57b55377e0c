use std::collections::HashSet;

use std::path::Path;

use proptest::prelude::*;
use vaers_corpus::{
    config::{Settings, SplitProportions},
    data::{
        split::{self, split_indices},
        vaers::{self, PostProcessedRow, POST_PROCESSED_FILE},
    },
};

#[test]
fn default_proportions_on_twenty_records() {
    let split = split_indices(20, &SplitProportions::default(), 1234);
    assert_eq!(split.train.len(), 16);
    assert_eq!(split.test.len(), 3);
    assert_eq!(split.dev.len(), 1);
}

#[test]
fn empty_input_gives_empty_splits() {
    let split = split_indices(0, &SplitProportions::default(), 1);
    assert_eq!(split.total(), 0);
}

#[test]
fn proportions_must_sum_to_one() {
    assert!(SplitProportions::new(0.8, 0.15, 0.1).is_err());
    assert!(SplitProportions::new(1.2, -0.1, -0.1).is_err());
    assert!(SplitProportions::new(0.7, 0.2, 0.1).is_ok());
}

#[test]
fn different_seeds_shuffle_differently() {
    let p = SplitProportions::default();
    assert_ne!(split_indices(200, &p, 1), split_indices(200, &p, 2));
}

proptest! {
    #[test]
    fn splits_partition_and_repeat(n in 0usize..400, seed in any::<u64>()) {
        let p = SplitProportions::default();
        let split = split_indices(n, &p, seed);

        let all: HashSet<usize> = split
            .train
            .iter()
            .chain(&split.test)
            .chain(&split.dev)
            .copied()
            .collect();
        prop_assert_eq!(split.total(), n);
        prop_assert_eq!(all, (0..n).collect::<HashSet<_>>());
        prop_assert_eq!(split, split_indices(n, &p, seed));
    }
}

fn post_processed_rows() -> Vec<PostProcessedRow> {
    (0..20)
        .map(|i| {
            let words = 2 + (i * 7) % 9;
            let (text, labels) = match i % 4 {
                0 if i % 8 == 0 => ("lonely".to_string(), "Pyrexia".to_string()),
                0 => (vec!["word"; words].join(" "), String::new()),
                _ => (vec!["word"; words].join(" "), format!("Label{i};Rash")),
            };
            PostProcessedRow {
                vaers_id: i.to_string(),
                raw_text: format!("{text} raw"),
                text,
                labels,
            }
        })
        .collect()
}

fn read_table(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn stage_filters_and_writes_sorted_splits() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(tmp.path());
    settings.ensure_output_dirs().unwrap();
    let rows = post_processed_rows();
    vaers::write_post_processed(&rows, &settings.join_data(POST_PROCESSED_FILE)).unwrap();

    let outputs = split::run(&settings, true).await.unwrap();
    assert_eq!(outputs.sizes, (12, 2, 1));

    let (raw_header, raw_rows) = read_table(&outputs.train_raw);
    assert_eq!(raw_header, ["RAW_TEXT"]);
    assert_eq!(raw_rows.len(), 12);
    assert!(raw_rows.iter().all(|r| r[0].ends_with(" raw")));

    let mut seen = 0;
    for (path, expected) in [(&outputs.train, 12), (&outputs.test, 2), (&outputs.dev, 1)] {
        let (header, split_rows) = read_table(path);
        assert_eq!(header, ["VAERS_ID", "TEXT", "LABELS", "length"]);
        assert_eq!(split_rows.len(), expected);
        let lengths: Vec<usize> = split_rows.iter().map(|r| r[3].parse().unwrap()).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        for row in &split_rows {
            assert_eq!(row[1].split_whitespace().count(), row[3].parse::<usize>().unwrap());
            assert!(!row[2].is_empty());
            assert_ne!(row[1], "lonely");
        }
        seen += split_rows.len();
    }
    assert_eq!(seen, 15);
}

#[tokio::test]
async fn unsorted_stage_keeps_split_order() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(tmp.path());
    settings.ensure_output_dirs().unwrap();
    let rows = post_processed_rows();
    vaers::write_post_processed(&rows, &settings.join_data(POST_PROCESSED_FILE)).unwrap();

    let outputs = split::run(&settings, false).await.unwrap();

    let usable: Vec<&PostProcessedRow> = rows.iter().filter(|r| split::usable(r)).collect();
    let indices = split_indices(usable.len(), &settings.proportions, settings.split_seed);
    let expected: Vec<&str> = indices
        .train
        .iter()
        .map(|&i| usable[i].vaers_id.as_str())
        .collect();

    let (_, train_rows) = read_table(&outputs.train);
    let ids: Vec<&str> = train_rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn stage_requires_post_processed_file() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(tmp.path());
    assert!(split::run(&settings, true).await.is_err());
}
