use std::{fs::File, io::Write, path::Path};

use vaers_corpus::{
    config::Settings,
    data::{
        io::decode_field,
        vaers::{self, JoinedRow, LABELS_FILE, POST_PROCESSED_FILE},
    },
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

const SYMPTOMS: &str = "\
VAERS_ID,SYMPTOM1,SYMPTOM2,SYMPTOM3,SYMPTOM4,SYMPTOM5
1,Pyrexia,Headache,,,
1,Chills,,,,
2,Rash,Pruritus,,,
3,Syncope,,,,
4,Urticaria,,,,
";

fn narratives() -> Vec<u8> {
    let mut bytes = b"VAERS_ID,SYMPTOM_TEXT\n".to_vec();
    bytes.extend_from_slice(b"1,\"Fever on 05-JAN-2021 after dose, 2 days\"\n");
    bytes.extend_from_slice(b"2,Rash and itching\n");
    bytes.extend_from_slice(b"3,\n");
    bytes.extend_from_slice(b"4,Caf\xe9 reaction observed\n");
    bytes
}

fn write_archive(path: &Path, narratives: &[u8], symptoms: &str) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("2021VAERSDATA.csv", options).unwrap();
    zip.write_all(narratives).unwrap();
    zip.start_file("2021VAERSSYMPTOMS.csv", options).unwrap();
    zip.write_all(symptoms.as_bytes()).unwrap();
    zip.finish().unwrap();
}

fn settings_with_archive(root: &Path) -> Settings {
    let settings = Settings::rooted_at(root);
    std::fs::create_dir_all(&settings.raw_dir).unwrap();
    settings.ensure_output_dirs().unwrap();
    write_archive(
        &settings.raw_dir.join("2021VAERSData.zip"),
        &narratives(),
        SYMPTOMS,
    );
    settings
}

fn row(id: &str, text: Option<&str>, symptoms: &[&str]) -> JoinedRow {
    JoinedRow {
        vaers_id: id.to_string(),
        text: text.map(str::to_string),
        symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        source: "2021".to_string(),
    }
}

#[test]
fn codes_concatenate_in_row_order() {
    let rows = vec![
        row("7", Some("text"), &["A", "B"]),
        row("7", Some("text"), &["C"]),
        row("7", Some("text"), &[]),
        row("8", None, &["D"]),
    ];
    let records = vaers::aggregate(&rows);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].vaers_id, "7");
    assert_eq!(records[0].symptoms, ["A", "B", "C"]);
}

#[test]
fn first_narrative_wins() {
    let rows = vec![
        row("9", Some("first"), &["A"]),
        row("9", Some("second"), &["B"]),
    ];
    let records = vaers::aggregate(&rows);
    assert_eq!(records[0].text, "first");
    assert_eq!(records[0].symptoms, ["A", "B"]);
}

#[test]
fn latin1_fields_decode() {
    assert_eq!(decode_field(b"Caf\xe9"), "Café");
    assert_eq!(decode_field("Café".as_bytes()), "Café");
}

#[test]
fn source_tag_strips_archive_suffix() {
    assert_eq!(vaers::source_tag(Path::new("raw/2021VAERSData.zip")), "2021");
    assert_eq!(vaers::source_tag(Path::new("raw/NonDomestic.zip")), "NonDomestic");
}

#[tokio::test]
async fn assembles_archive_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings_with_archive(tmp.path());

    let summary = vaers::assemble(&settings, false).await.unwrap();
    assert_eq!(summary.archives, 1);
    assert_eq!(summary.records, 3);
    assert!(!summary.from_cache);

    let rows = vaers::read_post_processed(&settings.join_data(POST_PROCESSED_FILE)).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.vaers_id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "4"]);
    assert_eq!(rows[0].text, "fever on __date__ after dose days");
    assert_eq!(rows[0].labels, "Pyrexia;Headache;Chills");
    assert_eq!(rows[1].label_list(), ["Rash", "Pruritus"]);
    assert_eq!(rows[2].text, "café reaction observed");

    let labels = std::fs::read_to_string(settings.join_label(LABELS_FILE)).unwrap();
    assert_eq!(labels, "Chills\nHeadache\nPruritus\nPyrexia\nRash\nUrticaria\n");
}

#[tokio::test]
async fn combined_file_is_reused_until_archives_change() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings_with_archive(tmp.path());

    assert!(!vaers::assemble(&settings, false).await.unwrap().from_cache);
    let cached = vaers::assemble(&settings, false).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.records, 3);

    assert!(!vaers::assemble(&settings, true).await.unwrap().from_cache);

    let extra = format!("{SYMPTOMS}5,Nausea,,,,\n");
    let mut more = narratives();
    more.extend_from_slice(b"5,Felt sick afterwards\n");
    write_archive(&settings.raw_dir.join("2021VAERSData.zip"), &more, &extra);

    let rebuilt = vaers::assemble(&settings, false).await.unwrap();
    assert!(!rebuilt.from_cache);
    assert_eq!(rebuilt.records, 4);
}

#[tokio::test]
async fn missing_raw_dir_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(tmp.path());
    assert!(vaers::assemble(&settings, false).await.is_err());
}

#[test]
fn archives_concatenate_in_name_order() {
    let tmp = tempfile::tempdir().unwrap();
    write_archive(
        &tmp.path().join("2020VAERSData.zip"),
        b"VAERS_ID,SYMPTOM_TEXT\n20,later\n",
        "VAERS_ID,SYMPTOM1,SYMPTOM2,SYMPTOM3,SYMPTOM4,SYMPTOM5\n20,Rash,,,,\n",
    );
    write_archive(
        &tmp.path().join("2019VAERSData.zip"),
        b"VAERS_ID,SYMPTOM_TEXT\n19,earlier\n18,no codes\n",
        "VAERS_ID,SYMPTOM1,SYMPTOM2,SYMPTOM3,SYMPTOM4,SYMPTOM5\n19,Pyrexia,,,,\n",
    );

    let (rows, skipped) = vaers::assemble_rows(tmp.path()).unwrap();
    assert_eq!(skipped, 0);
    let tags: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.vaers_id.as_str(), r.source.as_str()))
        .collect();
    assert_eq!(tags, [("19", "2019"), ("18", "2019"), ("20", "2020")]);
    assert!(rows[1].symptoms.is_empty());
}
