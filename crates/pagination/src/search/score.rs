//! Relevance score modifiers.
//!
//! Every boost clause and proximity clause can carry a [`Score`]. Field names
//! inside scores are logical names; they are resolved to storage paths when
//! the pipeline is rendered.

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityShape;
use crate::error::SearchResult;

use super::config::resolve_path;

/// How a matching clause modifies the relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Score {
    /// Multiply the clause score by a constant.
    Boost {
        /// Multiplier, must be positive.
        value: f64,
    },

    /// Multiply the clause score by a numeric field of the document.
    Path {
        /// Logical field holding the multiplier.
        field: String,
        /// Multiplier used when the field is missing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        undefined: Option<f64>,
    },

    /// Replace the clause score with a constant.
    Constant {
        /// Replacement score, must not be negative.
        value: f64,
    },

    /// Replace the clause score with a computed expression.
    Function {
        /// The expression.
        expression: ScoreExpression,
    },
}

impl Score {
    /// A constant multiplier.
    pub fn boost(value: f64) -> Self {
        Score::Boost { value }
    }

    /// A multiplier read from a document field.
    pub fn path(field: impl Into<String>) -> Self {
        Score::Path {
            field: field.into(),
            undefined: None,
        }
    }

    /// A fixed replacement score.
    pub fn constant(value: f64) -> Self {
        Score::Constant { value }
    }

    /// A computed score.
    pub fn function(expression: ScoreExpression) -> Self {
        Score::Function { expression }
    }

    /// Checks values and field references.
    pub fn validate(&self, shape: &EntityShape) -> SearchResult<()> {
        match self {
            Score::Boost { value } => positive("boost", *value),
            Score::Path { field, undefined } => {
                resolve_path(shape, field)?;
                match undefined {
                    Some(u) => finite("path undefined", *u),
                    None => Ok(()),
                }
            }
            Score::Constant { value } => non_negative("constant", *value),
            Score::Function { expression } => expression.validate(shape),
        }
    }

    /// Renders the `score` sub-document.
    pub fn to_document(&self, shape: &EntityShape) -> SearchResult<Document> {
        Ok(match self {
            Score::Boost { value } => doc! { "boost": { "value": *value } },
            Score::Path { field, undefined } => {
                let mut boost = doc! { "path": resolve_path(shape, field)? };
                if let Some(u) = undefined {
                    boost.insert("undefined", *u);
                }
                doc! { "boost": boost }
            }
            Score::Constant { value } => doc! { "constant": { "value": *value } },
            Score::Function { expression } => {
                doc! { "function": expression.to_document(shape)? }
            }
        })
    }

    /// Fields the score reads, as logical names.
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            Score::Path { field, .. } => vec![field.as_str()],
            Score::Function { expression } => expression.referenced_fields(),
            Score::Boost { .. } | Score::Constant { .. } => Vec::new(),
        }
    }
}

/// An arithmetic expression over the relevance score and document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreExpression {
    /// A constant number.
    Constant(f64),
    /// A numeric document field.
    Path {
        /// Logical field name.
        field: String,
        /// Value used when the field is missing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        undefined: Option<f64>,
    },
    /// The relevance score of the clause.
    Relevance,
    /// Sum of the operands.
    Add(Vec<ScoreExpression>),
    /// Product of the operands.
    Multiply(Vec<ScoreExpression>),
    /// Base-10 logarithm.
    Log(Box<ScoreExpression>),
    /// Base-10 logarithm of one plus the operand.
    Log1p(Box<ScoreExpression>),
    /// Gaussian decay of a numeric field around an origin.
    Gauss {
        /// Logical field name.
        field: String,
        /// Value at which the score is highest.
        origin: f64,
        /// Distance from `origin + offset` at which the score equals `decay`.
        scale: f64,
        /// Distance from origin with no decay.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<f64>,
        /// Score at `scale`, between 0 and 1 exclusive.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decay: Option<f64>,
    },
}

impl ScoreExpression {
    fn validate(&self, shape: &EntityShape) -> SearchResult<()> {
        match self {
            ScoreExpression::Constant(v) => finite("function constant", *v),
            ScoreExpression::Path { field, .. } => resolve_path(shape, field).map(|_| ()),
            ScoreExpression::Relevance => Ok(()),
            ScoreExpression::Add(operands) | ScoreExpression::Multiply(operands) => {
                if operands.len() < 2 {
                    return Err(invalid("arithmetic score expressions need two operands"));
                }
                operands.iter().try_for_each(|op| op.validate(shape))
            }
            ScoreExpression::Log(inner) | ScoreExpression::Log1p(inner) => inner.validate(shape),
            ScoreExpression::Gauss {
                field,
                scale,
                decay,
                ..
            } => {
                resolve_path(shape, field)?;
                positive("gauss scale", *scale)?;
                match decay {
                    Some(d) if !(*d > 0.0 && *d < 1.0) => {
                        Err(invalid("gauss decay must be between 0 and 1"))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn to_document(&self, shape: &EntityShape) -> SearchResult<Document> {
        Ok(match self {
            ScoreExpression::Constant(v) => doc! { "constant": *v },
            ScoreExpression::Path { field, undefined } => {
                let mut path = doc! { "value": resolve_path(shape, field)? };
                if let Some(u) = undefined {
                    path.insert("undefined", *u);
                }
                doc! { "path": path }
            }
            ScoreExpression::Relevance => doc! { "score": "relevance" },
            ScoreExpression::Add(operands) => doc! { "add": render_all(operands, shape)? },
            ScoreExpression::Multiply(operands) => {
                doc! { "multiply": render_all(operands, shape)? }
            }
            ScoreExpression::Log(inner) => doc! { "log": inner.to_document(shape)? },
            ScoreExpression::Log1p(inner) => doc! { "log1p": inner.to_document(shape)? },
            ScoreExpression::Gauss {
                field,
                origin,
                scale,
                offset,
                decay,
            } => {
                let mut gauss = doc! {
                    "path": { "value": resolve_path(shape, field)? },
                    "origin": *origin,
                    "scale": *scale,
                };
                if let Some(o) = offset {
                    gauss.insert("offset", *o);
                }
                if let Some(d) = decay {
                    gauss.insert("decay", *d);
                }
                doc! { "gauss": gauss }
            }
        })
    }

    fn referenced_fields(&self) -> Vec<&str> {
        match self {
            ScoreExpression::Path { field, .. } | ScoreExpression::Gauss { field, .. } => {
                vec![field.as_str()]
            }
            ScoreExpression::Add(operands) | ScoreExpression::Multiply(operands) => operands
                .iter()
                .flat_map(ScoreExpression::referenced_fields)
                .collect(),
            ScoreExpression::Log(inner) | ScoreExpression::Log1p(inner) => {
                inner.referenced_fields()
            }
            ScoreExpression::Constant(_) | ScoreExpression::Relevance => Vec::new(),
        }
    }
}

fn render_all(operands: &[ScoreExpression], shape: &EntityShape) -> SearchResult<Vec<Bson>> {
    operands
        .iter()
        .map(|op| op.to_document(shape).map(Bson::Document))
        .collect()
}

fn invalid(message: &str) -> crate::error::SearchError {
    crate::error::SearchError::InvalidConfiguration {
        message: message.to_string(),
    }
}

fn finite(what: &str, value: f64) -> SearchResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be a finite number", what)))
    }
}

fn positive(what: &str, value: f64) -> SearchResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be positive", what)))
    }
}

fn non_negative(what: &str, value: f64) -> SearchResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{} must not be negative", what)))
    }
}
