use fixturegen_core::{ColumnDescriptor, LogicalType, TableDescriptor};
use fixturegen_generate::{
    GeneratedValue, GeneratorConfig, KeyRegistry, OverrideMap, Row, build_row_factory,
};

fn child() -> TableDescriptor {
    TableDescriptor::new(
        "players",
        vec![
            ColumnDescriptor::identity_key("id"),
            ColumnDescriptor::new("team_id", LogicalType::Integer).references("teams", "id"),
            ColumnDescriptor::new("mentor_team", LogicalType::Integer)
                .nullable()
                .references("teams", "id"),
        ],
    )
}

fn registry_with(keys: &[GeneratedValue]) -> KeyRegistry {
    let parent = TableDescriptor::new("teams", vec![ColumnDescriptor::identity_key("id")]);
    let rows = vec![Row::new(); keys.len()];
    let mut registry = KeyRegistry::new();
    registry.record_table(&parent, &rows, keys).expect("record");
    registry
}

#[test]
fn foreign_keys_are_members_of_recorded_parent_keys() {
    let keys: Vec<GeneratedValue> = [4_i64, 8, 15, 16, 23, 42]
        .into_iter()
        .map(GeneratedValue::Int)
        .collect();
    let registry = registry_with(&keys);

    let factory = build_row_factory(
        &child(),
        &OverrideMap::new(),
        &registry,
        &GeneratorConfig::default().resolved(),
    )
    .expect("factory");

    let rows = factory.generate(500).expect("rows");
    for row in &rows {
        let team = row.get("team_id").expect("team_id");
        assert!(keys.contains(team), "{team:?} is not a recorded key");
    }
    let distinct: std::collections::BTreeSet<i64> = rows
        .iter()
        .filter_map(|row| row.get("team_id").and_then(GeneratedValue::as_i64))
        .collect();
    assert_eq!(distinct.len(), keys.len());
}

#[test]
fn nullable_references_can_be_null() {
    let registry = registry_with(&[GeneratedValue::Int(1)]);
    let config = GeneratorConfig {
        null_rate: 0.5,
        ..GeneratorConfig::default().resolved()
    };
    let factory =
        build_row_factory(&child(), &OverrideMap::new(), &registry, &config).expect("factory");

    let rows = factory.generate(200).expect("rows");
    assert!(rows.iter().all(|row| row.get("team_id") == Some(&GeneratedValue::Int(1))));
    assert!(rows.iter().any(|row| row.get("mentor_team") == Some(&GeneratedValue::Null)));
    assert!(rows.iter().any(|row| row.get("mentor_team") == Some(&GeneratedValue::Int(1))));
}
