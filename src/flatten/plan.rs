//! Structure-only pre-pass for flattening
//!
//! The plan is computed once per schema and records, in order, every
//! column-splitting and row-splitting step a record has to go through.
//! Rows are then flattened by replaying the steps, so all workers agree on
//! the final column set before any row is emitted.

use crate::error::{FlattenError, Result};
use crate::flatten::types::{DataType, FlatColumn, FlatSchema, FlattenConfig, Schema};
use log::debug;
use std::collections::VecDeque;

/// One transformation applied to every row
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace the struct column at `index` by one column per child
    Expand {
        index: usize,
        path: String,
        children: Vec<String>,
    },
    /// Turn one row into one row per element of the list column at `index`
    Explode { index: usize, path: String },
}

/// A column while the plan is being built
#[derive(Debug, Clone)]
struct PlanColumn {
    name: String,
    path: String,
    data_type: DataType,
    depth: usize,
}

/// Pre-computed flattening plan for one schema
#[derive(Debug, Clone)]
pub struct FlattenPlan {
    /// The nested schema the plan was built from
    pub input: Schema,

    /// Steps to replay on each row
    pub steps: Vec<Step>,

    /// Resulting scalar columns
    pub flat_schema: FlatSchema,

    pub config: FlattenConfig,
}

impl FlattenPlan {
    /// Run the worklist over the schema until no complex column remains
    pub fn from_schema(schema: &Schema, config: FlattenConfig) -> Result<Self> {
        let mut columns: Vec<PlanColumn> = schema
            .fields()
            .iter()
            .map(|f| PlanColumn {
                name: f.name.clone(),
                path: f.name.clone(),
                data_type: f.data_type.clone(),
                depth: 0,
            })
            .collect();

        let mut pending: VecDeque<String> = columns
            .iter()
            .filter(|c| c.data_type.is_complex())
            .map(|c| c.name.clone())
            .collect();
        let mut steps = Vec::new();

        while let Some(name) = pending.pop_front() {
            let Some(index) = columns.iter().position(|c| c.name == name) else {
                continue;
            };
            let column = columns[index].clone();

            match column.data_type {
                DataType::Scalar => {}
                DataType::Struct { fields } => {
                    let depth = Self::descend(&column.path, column.depth, &config)?;
                    let replacements: Vec<PlanColumn> = fields
                        .iter()
                        .map(|child| PlanColumn {
                            name: format!("{}{}{}", column.name, config.separator, child.name),
                            path: format!("{}.{}", column.path, child.name),
                            data_type: child.data_type.clone(),
                            depth,
                        })
                        .collect();

                    Self::check_collisions(&columns, index, &replacements)?;
                    debug!(
                        "expand `{}` into {} columns at position {}",
                        column.path,
                        replacements.len(),
                        index
                    );

                    pending.extend(
                        replacements
                            .iter()
                            .filter(|c| c.data_type.is_complex())
                            .map(|c| c.name.clone()),
                    );
                    steps.push(Step::Expand {
                        index,
                        path: column.path.clone(),
                        children: fields.into_iter().map(|f| f.name).collect(),
                    });
                    columns.splice(index..=index, replacements);
                }
                DataType::List { element } => {
                    let depth = Self::descend(&column.path, column.depth, &config)?;
                    debug!("explode `{}` at position {}", column.path, index);

                    steps.push(Step::Explode {
                        index,
                        path: column.path.clone(),
                    });
                    let exploded = &mut columns[index];
                    exploded.path = format!("{}[]", column.path);
                    exploded.data_type = *element;
                    exploded.depth = depth;
                    if exploded.data_type.is_complex() {
                        pending.push_back(exploded.name.clone());
                    }
                }
            }
        }

        let flat_schema = FlatSchema {
            columns: columns
                .into_iter()
                .map(|c| FlatColumn {
                    name: c.name,
                    source: c.path,
                })
                .collect(),
        };

        Ok(FlattenPlan {
            input: schema.clone(),
            steps,
            flat_schema,
            config,
        })
    }

    /// Depth of the columns produced by unwrapping one level of `path`
    fn descend(path: &str, depth: usize, config: &FlattenConfig) -> Result<usize> {
        let next = depth + 1;
        if next > config.max_depth {
            return Err(FlattenError::DepthLimitExceeded {
                path: path.to_string(),
                limit: config.max_depth,
            });
        }
        Ok(next)
    }

    fn check_collisions(
        columns: &[PlanColumn],
        replaced: usize,
        replacements: &[PlanColumn],
    ) -> Result<()> {
        for (i, new) in replacements.iter().enumerate() {
            let existing = columns
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != replaced)
                .map(|(_, c)| c)
                .chain(replacements[..i].iter())
                .find(|c| c.name == new.name);

            if let Some(existing) = existing {
                return Err(FlattenError::NameCollision {
                    name: new.name.clone(),
                    first: existing.path.clone(),
                    second: new.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// True when the schema has no struct or list column
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::Field;

    fn names(plan: &FlattenPlan) -> Vec<&str> {
        plan.flat_schema.names().collect()
    }

    #[test]
    fn test_struct_children_take_parent_position() {
        let schema = Schema::new(vec![
            Field::scalar("id"),
            Field::structure("address", vec![Field::scalar("city"), Field::scalar("zip")]),
            Field::scalar("name"),
        ])
        .unwrap();

        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert_eq!(names(&plan), vec!["id", "address_city", "address_zip", "name"]);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.flat_schema.columns[1].source, "address.city");
    }

    #[test]
    fn test_nested_structs_take_one_pass_per_level() {
        let schema = Schema::new(vec![Field::structure(
            "a",
            vec![Field::structure("b", vec![Field::structure("c", vec![Field::scalar("d")])])],
        )])
        .unwrap();

        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert_eq!(names(&plan), vec!["a_b_c_d"]);
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.flat_schema.columns[0].source, "a.b.c.d");
    }

    #[test]
    fn test_list_of_structs_explodes_then_expands() {
        let schema = Schema::new(vec![
            Field::scalar("id"),
            Field::list(
                "items",
                DataType::Struct {
                    fields: vec![Field::scalar("sku")],
                },
            ),
        ])
        .unwrap();

        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert_eq!(names(&plan), vec!["id", "items_sku"]);
        assert!(matches!(plan.steps[0], Step::Explode { index: 1, .. }));
        assert!(matches!(plan.steps[1], Step::Expand { index: 1, .. }));
        assert_eq!(plan.flat_schema.columns[1].source, "items[].sku");
    }

    #[test]
    fn test_list_of_lists_keeps_name() {
        let schema = Schema::new(vec![Field::list(
            "matrix",
            DataType::list_of(DataType::Scalar),
        )])
        .unwrap();

        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert_eq!(names(&plan), vec!["matrix"]);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.flat_schema.columns[0].source, "matrix[][]");
    }

    #[test]
    fn test_collision_with_existing_column() {
        let schema = Schema::new(vec![
            Field::scalar("a_b"),
            Field::structure("a", vec![Field::scalar("b")]),
        ])
        .unwrap();

        let err = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap_err();
        match err {
            FlattenError::NameCollision { name, first, second } => {
                assert_eq!(name, "a_b");
                assert_eq!(first, "a_b");
                assert_eq!(second, "a.b");
            }
            other => panic!("Expected NameCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_collision_between_generated_columns() {
        // a.b_c and a_b.c both become a_b_c
        let schema = Schema::new(vec![
            Field::structure("a", vec![Field::scalar("b_c")]),
            Field::structure("a_b", vec![Field::scalar("c")]),
        ])
        .unwrap();

        let err = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap_err();
        assert!(matches!(err, FlattenError::NameCollision { .. }));
    }

    #[test]
    fn test_custom_separator_avoids_collision() {
        let schema = Schema::new(vec![
            Field::scalar("a_b"),
            Field::structure("a", vec![Field::scalar("b")]),
        ])
        .unwrap();

        let config = FlattenConfig {
            separator: String::from("__"),
            ..FlattenConfig::default()
        };
        let plan = FlattenPlan::from_schema(&schema, config).unwrap();
        assert_eq!(names(&plan), vec!["a_b", "a__b"]);
    }

    #[test]
    fn test_depth_limit() {
        let schema = Schema::new(vec![Field::structure(
            "a",
            vec![Field::list("b", DataType::Scalar)],
        )])
        .unwrap();

        let config = FlattenConfig {
            max_depth: 1,
            ..FlattenConfig::default()
        };
        match FlattenPlan::from_schema(&schema, config) {
            Err(FlattenError::DepthLimitExceeded { path, limit }) => {
                assert_eq!(path, "a.b");
                assert_eq!(limit, 1);
            }
            other => panic!("Expected DepthLimitExceeded, got {:?}", other),
        }

        let config = FlattenConfig {
            max_depth: 2,
            ..FlattenConfig::default()
        };
        assert!(FlattenPlan::from_schema(&schema, config).is_ok());
    }

    #[test]
    fn test_flat_schema_is_noop() {
        let schema = Schema::new(vec![Field::scalar("id"), Field::scalar("name")]).unwrap();
        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert!(plan.is_noop());
        assert_eq!(names(&plan), vec!["id", "name"]);
    }

    #[test]
    fn test_empty_struct_disappears() {
        let schema = Schema::new(vec![Field::scalar("id"), Field::structure("meta", vec![])]).unwrap();
        let plan = FlattenPlan::from_schema(&schema, FlattenConfig::default()).unwrap();
        assert_eq!(names(&plan), vec!["id"]);
    }
}
