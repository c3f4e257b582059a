use std::fs;
use std::path::PathBuf;

use fixturegen_core::{ColumnDescriptor, LogicalType, SchemaDescriptor, TableDescriptor};
use fixturegen_generate::{
    CsvSink, GeneratedValue, GenerationError, PersistenceSink, PopulateOptions, PopulationRequest,
    Populator, Row,
};

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("fixturegen_csv_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}

fn schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![
        TableDescriptor::new(
            "authors",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("pen_name", LogicalType::var_char(20)),
                ColumnDescriptor::new("born", LogicalType::Date),
            ],
        ),
        TableDescriptor::new(
            "books",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("author_id", LogicalType::Integer).references("authors", "id"),
                ColumnDescriptor::new("in_print", LogicalType::Boolean),
            ],
        ),
    ])
}

fn staging_dirs(dir: &PathBuf) -> usize {
    fs::read_dir(dir)
        .expect("read out dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".staging-"))
        .count()
}

#[tokio::test]
async fn committed_run_writes_one_file_per_table() {
    let out_dir = temp_out_dir("commit");
    let mut sink = CsvSink::new(&out_dir);
    let request = PopulationRequest::new().rows("authors", 3).rows("books", 5);

    Populator::new(PopulateOptions::default())
        .run(&schema(), &request, &mut sink)
        .await
        .expect("populate");

    let authors = fs::read_to_string(sink.table_path("authors")).expect("authors.csv");
    let lines: Vec<&str> = authors.lines().collect();
    assert_eq!(lines[0], "id,pen_name,born");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("1,"));

    let books = fs::read_to_string(sink.table_path("books")).expect("books.csv");
    let mut reader = csv::Reader::from_reader(books.as_bytes());
    let mut count = 0;
    for record in reader.records() {
        let record = record.expect("record");
        let author_id: i64 = record[1].parse().expect("author id");
        assert!((1..=3).contains(&author_id));
        assert!(matches!(&record[2], "true" | "false"));
        count += 1;
    }
    assert_eq!(count, 5);
    assert_eq!(staging_dirs(&out_dir), 0);
    assert!(sink.bytes_written() > 0);
}

#[tokio::test]
async fn failed_run_leaves_no_files_behind() {
    let out_dir = temp_out_dir("rollback");
    let mut sink = CsvSink::new(&out_dir);
    let request = PopulationRequest::new().rows("authors", 0).rows("books", 2);

    let err = Populator::new(PopulateOptions::default())
        .run(&schema(), &request, &mut sink)
        .await
        .expect_err("empty parent");
    assert!(matches!(err, GenerationError::EmptyReferencedTable { .. }));

    assert!(!sink.table_path("authors").exists());
    assert_eq!(staging_dirs(&out_dir), 0);
}

#[tokio::test]
async fn repeated_inserts_append_without_repeating_the_header() {
    let out_dir = temp_out_dir("append");
    let table = TableDescriptor::new(
        "notes",
        vec![ColumnDescriptor::new("body", LogicalType::var_char(8))],
    );
    let row = Row::from([("body".to_string(), GeneratedValue::from("hi"))]);

    let mut sink = CsvSink::new(&out_dir);
    sink.begin().await.expect("begin");
    sink.insert_all(&table, &[row.clone()]).await.expect("first");
    let keys = sink.insert_all(&table, &[row]).await.expect("second");
    assert_eq!(keys, vec![GeneratedValue::Null]);
    sink.commit().await.expect("commit");

    let contents = fs::read_to_string(sink.table_path("notes")).expect("notes.csv");
    assert_eq!(contents, "body\nhi\nhi\n");
}
