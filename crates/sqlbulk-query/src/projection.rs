//! Explicit bindings from projection outputs to source expressions.

use crate::expr::Expr;
use sqlbulk_core::error::{Error, ProjectionShapeError};
use sqlbulk_core::{ProjectionField, Result};
use std::collections::HashSet;

/// One output of a projection bound to the expression that fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBinding {
    pub output: &'static str,
    pub source: Expr,
}

/// Check that every declared output is bound exactly once and that no
/// binding names an output the projection does not declare.
pub fn validate_bindings(
    projection: &'static str,
    table: &str,
    outputs: &[ProjectionField],
    bindings: &[ProjectionBinding],
) -> Result<()> {
    let shape_error = |message: String| {
        Error::ProjectionShape(ProjectionShapeError {
            projection,
            table: table.to_string(),
            expected: outputs.len(),
            actual: bindings.len(),
            message,
        })
    };

    let mut seen = HashSet::new();
    for binding in bindings {
        if !outputs.iter().any(|o| o.name == binding.output) {
            return Err(shape_error(format!(
                "binding targets undeclared output '{}'",
                binding.output
            )));
        }
        if !seen.insert(binding.output) {
            return Err(shape_error(format!(
                "output '{}' is bound more than once",
                binding.output
            )));
        }
    }

    let unbound: Vec<&str> = outputs
        .iter()
        .filter(|o| !seen.contains(o.name))
        .map(|o| o.name)
        .collect();
    if !unbound.is_empty() {
        return Err(shape_error(format!(
            "unbound output(s): {}",
            unbound.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUTS: &[ProjectionField] = &[
        ProjectionField::new("id", "id"),
        ProjectionField::new("label", "name"),
    ];

    fn bind(output: &'static str) -> ProjectionBinding {
        ProjectionBinding {
            output,
            source: Expr::lit(1),
        }
    }

    #[test]
    fn complete_bindings_pass() {
        validate_bindings("Row", "users", OUTPUTS, &[bind("label"), bind("id")]).unwrap();
    }

    #[test]
    fn shape_errors() {
        for bindings in [
            vec![bind("id")],
            vec![bind("id"), bind("id")],
            vec![bind("id"), bind("label"), bind("extra")],
        ] {
            let err = validate_bindings("Row", "users", OUTPUTS, &bindings).unwrap_err();
            match err {
                Error::ProjectionShape(e) => {
                    assert_eq!(e.expected, 2);
                    assert_eq!(e.actual, bindings.len());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
