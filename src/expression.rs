//! Vector ordering expressions and the indexed columns that serve them.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Similarity function a graph was built for. Scores are computed by the
/// traversal; this only decides whether a graph can serve an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFunction {
    Cosine,
    DotProduct,
    Euclidean,
}

/// A vector column as indexed by one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorColumn {
    pub name: String,
    pub similarity: SimilarityFunction,
    pub dimension: usize,
}

impl VectorColumn {
    pub fn new(name: impl Into<String>, similarity: SimilarityFunction, dimension: usize) -> Self {
        Self {
            name: name.into(),
            similarity,
            dimension,
        }
    }

    /// Whether a graph over this column can order by `exp`.
    ///
    /// `Ok(false)` for another column or similarity function; an error if
    /// the column matches but the target vector has the wrong dimension.
    pub fn supports(&self, exp: &VectorExpression) -> Result<bool> {
        if exp.column != self.name || exp.similarity != self.similarity {
            return Ok(false);
        }
        if exp.target.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: exp.target.len(),
            });
        }
        Ok(true)
    }
}

/// `ORDER BY <column> ANN OF <target>` for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorExpression {
    pub column: String,
    pub similarity: SimilarityFunction,
    pub target: Vec<f32>,
}

impl VectorExpression {
    pub fn new(column: impl Into<String>, similarity: SimilarityFunction, target: Vec<f32>) -> Self {
        Self {
            column: column.into(),
            similarity,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_matching_expression() {
        let col = VectorColumn::new("embedding", SimilarityFunction::Cosine, 3);
        let exp = VectorExpression::new("embedding", SimilarityFunction::Cosine, vec![0.0; 3]);
        assert!(col.supports(&exp).unwrap());
    }

    #[test]
    fn test_other_column_or_function_not_supported() {
        let col = VectorColumn::new("embedding", SimilarityFunction::Cosine, 3);
        let other_col = VectorExpression::new("title", SimilarityFunction::Cosine, vec![0.0; 3]);
        let other_fn = VectorExpression::new("embedding", SimilarityFunction::Euclidean, vec![0.0; 3]);
        assert!(!col.supports(&other_col).unwrap());
        assert!(!col.supports(&other_fn).unwrap());
    }

    #[test]
    fn test_wrong_dimension_is_error() {
        let col = VectorColumn::new("embedding", SimilarityFunction::DotProduct, 3);
        let exp = VectorExpression::new("embedding", SimilarityFunction::DotProduct, vec![0.0; 2]);
        assert!(matches!(
            col.supports(&exp),
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_column_json_shape() {
        let col = VectorColumn::new("v", SimilarityFunction::DotProduct, 8);
        let json = serde_json::to_string(&col).unwrap();
        assert!(json.contains("\"similarity\":\"dot_product\""));
        let back: VectorColumn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);
    }
}
