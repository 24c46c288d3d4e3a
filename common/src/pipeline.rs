//! Exported preprocessing + logistic regression pipeline.
//!
//! Transformers run in declaration order and their outputs are concatenated
//! into the feature vector the classifier was fitted on.

use crate::{Cell, Frame, Model, PipelineError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    Error,
    Ignore,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTransformer {
    StandardScaler {
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    OneHotEncoder {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        handle_unknown: HandleUnknown,
    },
    Passthrough {
        columns: Vec<String>,
    },
}

impl ColumnTransformer {
    pub fn columns(&self) -> &[String] {
        match self {
            ColumnTransformer::StandardScaler { columns, .. }
            | ColumnTransformer::OneHotEncoder { columns, .. }
            | ColumnTransformer::Passthrough { columns } => columns,
        }
    }

    /// Number of output features.
    pub fn width(&self) -> usize {
        match self {
            ColumnTransformer::OneHotEncoder { categories, .. } => {
                categories.iter().map(Vec::len).sum()
            }
            other => other.columns().len(),
        }
    }

    fn check(&self) -> Result<(), PipelineError> {
        match self {
            ColumnTransformer::StandardScaler {
                columns,
                mean,
                scale,
            } => {
                if mean.len() != columns.len() || scale.len() != columns.len() {
                    return Err(PipelineError::Inconsistent(format!(
                        "scaler has {} columns but {} means and {} scales",
                        columns.len(),
                        mean.len(),
                        scale.len()
                    )));
                }
                if let Some(i) = scale.iter().position(|s| *s == 0.0 || !s.is_finite()) {
                    return Err(PipelineError::Inconsistent(format!(
                        "scaler column '{}' has invalid scale {}",
                        columns[i], scale[i]
                    )));
                }
            }
            ColumnTransformer::OneHotEncoder {
                columns,
                categories,
                ..
            } => {
                if categories.len() != columns.len() {
                    return Err(PipelineError::Inconsistent(format!(
                        "encoder has {} columns but {} category lists",
                        columns.len(),
                        categories.len()
                    )));
                }
                if let Some(i) = categories.iter().position(Vec::is_empty) {
                    return Err(PipelineError::Inconsistent(format!(
                        "encoder column '{}' has no categories",
                        columns[i]
                    )));
                }
            }
            ColumnTransformer::Passthrough { .. } => {}
        }
        Ok(())
    }

    fn transform_into(&self, frame: &Frame, out: &mut Vec<f64>) -> Result<(), PipelineError> {
        match self {
            ColumnTransformer::StandardScaler {
                columns,
                mean,
                scale,
            } => {
                for (i, column) in columns.iter().enumerate() {
                    let x = numeric(frame, column)?;
                    out.push((x - mean[i]) / scale[i]);
                }
            }
            ColumnTransformer::OneHotEncoder {
                columns,
                categories,
                handle_unknown,
            } => {
                for (column, levels) in columns.iter().zip(categories) {
                    let value = categorical(frame, column)?;
                    let hit = levels.iter().position(|level| level == value);
                    if hit.is_none() && *handle_unknown == HandleUnknown::Error {
                        return Err(PipelineError::UnknownCategory {
                            column: column.clone(),
                            value: value.to_string(),
                        });
                    }
                    out.extend((0..levels.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                }
            }
            ColumnTransformer::Passthrough { columns } => {
                for column in columns {
                    out.push(numeric(frame, column)?);
                }
            }
        }
        Ok(())
    }
}

fn lookup<'a>(frame: &'a Frame, column: &str) -> Result<&'a Cell, PipelineError> {
    frame
        .get(column)
        .ok_or_else(|| PipelineError::MissingColumns(vec![column.to_string()]))
}

fn numeric(frame: &Frame, column: &str) -> Result<f64, PipelineError> {
    let cell = lookup(frame, column)?;
    cell.as_f64().ok_or_else(|| PipelineError::InvalidValue {
        column: column.to_string(),
        expected: "numeric",
        got: cell.to_string(),
    })
}

fn categorical<'a>(frame: &'a Frame, column: &str) -> Result<&'a str, PipelineError> {
    let cell = lookup(frame, column)?;
    cell.as_str().ok_or_else(|| PipelineError::InvalidValue {
        column: column.to_string(),
        expected: "categorical",
        got: cell.to_string(),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    pub coef: Vec<f64>,
    pub intercept: f64,
    /// Class labels; index 1 is the positive class.
    pub classes: [i64; 2],
}

impl LogisticRegression {
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + self.intercept
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub name: String,
    pub version: String,
    /// Input columns in the order the pipeline was fitted with.
    pub feature_columns: Vec<String>,
    pub transformers: Vec<ColumnTransformer>,
    pub classifier: LogisticRegression,
}

impl Pipeline {
    /// Width of the transformed feature vector.
    pub fn n_features_out(&self) -> usize {
        self.transformers.iter().map(ColumnTransformer::width).sum()
    }

    /// Structural checks run once after loading an artifact.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let [negative, positive] = self.classifier.classes;
        if negative == positive {
            return Err(PipelineError::Inconsistent(format!(
                "classifier classes must be distinct, got [{}, {}]",
                negative, positive
            )));
        }

        let declared: HashSet<&str> = self.feature_columns.iter().map(String::as_str).collect();
        for transformer in &self.transformers {
            transformer.check()?;
            if let Some(column) = transformer
                .columns()
                .iter()
                .find(|c| !declared.contains(c.as_str()))
            {
                return Err(PipelineError::Inconsistent(format!(
                    "transformer column '{}' is not a declared feature column",
                    column
                )));
            }
        }

        let width = self.n_features_out();
        if self.classifier.coef.len() != width {
            return Err(PipelineError::Inconsistent(format!(
                "classifier expects {} features but transformers produce {}",
                self.classifier.coef.len(),
                width
            )));
        }
        Ok(())
    }

    pub fn transform(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError> {
        let missing: Vec<String> = self
            .feature_columns
            .iter()
            .filter(|c| frame.get(c).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns(missing));
        }

        let mut features = Vec::with_capacity(self.n_features_out());
        for transformer in &self.transformers {
            transformer.transform_into(frame, &mut features)?;
        }
        Ok(features)
    }

    fn decision(&self, frame: &Frame) -> Result<f64, PipelineError> {
        let features = self.transform(frame)?;
        let z = self.classifier.decision_function(&features);
        if z.is_finite() {
            Ok(z)
        } else {
            Err(PipelineError::NonFinite)
        }
    }
}

impl Model for Pipeline {
    fn predict(&self, frame: &Frame) -> Result<i64, PipelineError> {
        let z = self.decision(frame)?;
        let [negative, positive] = self.classifier.classes;
        Ok(if z > 0.0 { positive } else { negative })
    }

    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError> {
        let p = sigmoid(self.decision(frame)?);
        Ok(vec![1.0 - p, p])
    }
}
