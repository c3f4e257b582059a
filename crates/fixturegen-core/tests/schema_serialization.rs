use fixturegen_core::{ColumnDescriptor, LogicalType, SchemaDescriptor, TableDescriptor};

#[test]
fn serializes_schema_deterministically() {
    let schema = SchemaDescriptor::new(vec![TableDescriptor::new(
        "users",
        vec![
            ColumnDescriptor::identity_key("id"),
            ColumnDescriptor::new("user_name", LogicalType::var_char(32)),
        ],
    )]);

    let json = serde_json::to_string_pretty(&schema).expect("serialize schema");
    let expected = r#"{
  "tables": [
    {
      "name": "users",
      "columns": [
        {
          "name": "id",
          "logical_type": {
            "kind": "integer"
          },
          "nullable": false,
          "primary_key": true,
          "identity": true
        },
        {
          "name": "user_name",
          "logical_type": {
            "kind": "var_char",
            "length": 32
          },
          "nullable": false,
          "primary_key": false,
          "identity": false
        }
      ]
    }
  ]
}"#;
    assert_eq!(json, expected);
}

#[test]
fn foreign_keys_round_trip_through_json() {
    let column = ColumnDescriptor::new("issued_by", LogicalType::Integer).references("users", "id");
    let json = serde_json::to_value(&column).expect("serialize column");
    assert_eq!(json["foreign_key"]["table"], "users");

    let parsed: ColumnDescriptor = serde_json::from_value(json).expect("parse column");
    assert!(parsed.is_foreign_key());
    assert_eq!(parsed, column);
}
