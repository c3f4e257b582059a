use fixturegen_core::{SchemaDescriptor, TableDescriptor, build_dependency_report, validate_schema};

use crate::errors::GenerationError;

/// Tables ordered so every referenced table precedes its dependents.
#[derive(Debug, Clone)]
pub struct PopulationPlan {
    tables: Vec<TableDescriptor>,
}

impl PopulationPlan {
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    pub fn position(&self, table: &str) -> Option<usize> {
        self.tables.iter().position(|candidate| candidate.name == table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Build a deterministic population plan for a schema.
pub fn plan_population(schema: &SchemaDescriptor) -> Result<PopulationPlan, GenerationError> {
    validate_schema(schema)?;

    let report = build_dependency_report(schema);
    let order = match (report.topo_order, report.cycle) {
        (Some(order), _) => order,
        (None, cycle) => {
            return Err(GenerationError::CyclicDependency {
                tables: cycle.unwrap_or_default(),
            });
        }
    };

    let mut tables = Vec::with_capacity(order.len());
    for name in order {
        let table = schema
            .table(&name)
            .ok_or_else(|| GenerationError::UnknownTable(name.clone()))?;
        tables.push(table.clone());
    }

    Ok(PopulationPlan { tables })
}

#[cfg(test)]
mod tests {
    use fixturegen_core::{ColumnDescriptor, LogicalType};

    use super::*;

    #[test]
    fn two_table_cycle_is_rejected() {
        let schema = SchemaDescriptor::new(vec![
            TableDescriptor::new(
                "a",
                vec![
                    ColumnDescriptor::identity_key("id"),
                    ColumnDescriptor::new("b_id", LogicalType::Integer).references("b", "id"),
                ],
            ),
            TableDescriptor::new(
                "b",
                vec![
                    ColumnDescriptor::identity_key("id"),
                    ColumnDescriptor::new("a_id", LogicalType::Integer).references("a", "id"),
                ],
            ),
        ]);

        match plan_population(&schema) {
            Err(GenerationError::CyclicDependency { tables }) => {
                assert_eq!(tables, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn invalid_schema_surfaces_as_schema_error() {
        let schema = SchemaDescriptor::new(vec![TableDescriptor::new(
            "orders",
            vec![ColumnDescriptor::new("user_id", LogicalType::Integer).references("users", "id")],
        )]);
        assert!(matches!(
            plan_population(&schema),
            Err(GenerationError::Schema(_))
        ));
    }
}
