//! Request schema for `/predict` and the alias table onto the model's columns.
//!
//! The column names are a contract with the exported pipeline artifact.
//! `Hx Radiothreapy` is misspelled in the training data and must stay that way
//! until the artifact is re-exported.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{Cell, Frame};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::debug;
use validator::{ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key accepted in the request body.
    pub external: &'static str,
    /// Column name the pipeline was fitted with.
    pub column: &'static str,
    pub kind: FieldKind,
}

const fn field(external: &'static str, column: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        external,
        column,
        kind,
    }
}

/// Alias table, in the pipeline's column order.
pub const FIELDS: [FieldSpec; 16] = [
    field("Age", "Age", FieldKind::Integer),
    field("Gender", "Gender", FieldKind::Text),
    field("Smoking", "Smoking", FieldKind::Text),
    field("Hx Smoking", "Hx Smoking", FieldKind::Text),
    field("Hx Radiotherapy", "Hx Radiothreapy", FieldKind::Text),
    field("Thyroid Function", "Thyroid Function", FieldKind::Text),
    field("Physical Examination", "Physical Examination", FieldKind::Text),
    field("Adenopathy", "Adenopathy", FieldKind::Text),
    field("Pathology", "Pathology", FieldKind::Text),
    field("Focality", "Focality", FieldKind::Text),
    field("Risk", "Risk", FieldKind::Text),
    field("T", "T", FieldKind::Text),
    field("N", "N", FieldKind::Text),
    field("M", "M", FieldKind::Text),
    field("Stage", "Stage", FieldKind::Text),
    field("Response", "Response", FieldKind::Text),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Smoking")]
    pub smoking: String,
    #[serde(rename = "Hx Smoking")]
    pub hx_smoking: String,
    #[serde(rename = "Hx Radiotherapy")]
    pub hx_radiotherapy: String,
    #[serde(rename = "Thyroid Function")]
    pub thyroid_function: String,
    #[serde(rename = "Physical Examination")]
    pub physical_examination: String,
    #[serde(rename = "Adenopathy")]
    pub adenopathy: String,
    #[serde(rename = "Pathology")]
    pub pathology: String,
    #[serde(rename = "Focality")]
    pub focality: String,
    #[serde(rename = "Risk")]
    pub risk: String,
    #[serde(rename = "T")]
    pub t: String,
    #[serde(rename = "N")]
    pub n: String,
    #[serde(rename = "M")]
    pub m: String,
    #[serde(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "Response")]
    pub response: String,
}

impl PatientRecord {
    /// Checks every declared field of a raw body, then deserializes it.
    pub fn from_json(mut body: Value) -> Result<Self, SchemaRejection> {
        let Value::Object(map) = &mut body else {
            return Err(SchemaRejection::body(
                StatusCode::UNPROCESSABLE_ENTITY,
                "dict_type",
                "Input should be a valid dictionary",
            ));
        };
        coerce_integers(map);
        validate_fields(map).map_err(SchemaRejection::from)?;

        serde_json::from_value(body).map_err(|e| {
            SchemaRejection::body(StatusCode::UNPROCESSABLE_ENTITY, "value_error", e.to_string())
        })
    }

    /// Values in [`FIELDS`] order.
    fn cells(&self) -> [Cell; 16] {
        [
            Cell::Int(self.age),
            self.gender.as_str().into(),
            self.smoking.as_str().into(),
            self.hx_smoking.as_str().into(),
            self.hx_radiotherapy.as_str().into(),
            self.thyroid_function.as_str().into(),
            self.physical_examination.as_str().into(),
            self.adenopathy.as_str().into(),
            self.pathology.as_str().into(),
            self.focality.as_str().into(),
            self.risk.as_str().into(),
            self.t.as_str().into(),
            self.n.as_str().into(),
            self.m.as_str().into(),
            self.stage.as_str().into(),
            self.response.as_str().into(),
        ]
    }

    /// One-row frame keyed by the model's column names.
    pub fn to_frame(&self) -> Frame {
        FIELDS
            .iter()
            .zip(self.cells())
            .fold(Frame::with_capacity(FIELDS.len()), |frame, (spec, cell)| {
                frame.with(spec.column, cell)
            })
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Lax integer parsing: whole-valued floats and decimal strings are accepted.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rewrites integer fields that hold a coercible value as JSON integers.
fn coerce_integers(map: &mut Map<String, Value>) {
    for spec in FIELDS.iter().filter(|f| f.kind == FieldKind::Integer) {
        if let Some(value) = map.get_mut(spec.external) {
            if let Some(i) = as_integer(value) {
                *value = Value::from(i);
            }
        }
    }
}

pub fn validate_fields(map: &Map<String, Value>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for spec in &FIELDS {
        let problem = match (map.get(spec.external), spec.kind) {
            (None, _) => Some(field_error("missing", "Field required")),
            (Some(Value::Number(n)), FieldKind::Integer) if n.is_i64() => None,
            (Some(_), FieldKind::Integer) => {
                Some(field_error("int_type", "Input should be a valid integer"))
            }
            (Some(Value::String(_)), FieldKind::Text) => None,
            (Some(_), FieldKind::Text) => {
                Some(field_error("string_type", "Input should be a valid string"))
            }
        };
        if let Some(error) = problem {
            errors.add(spec.external, error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Protocol-level rejection of a `/predict` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRejection {
    pub status: StatusCode,
    pub detail: Vec<FieldIssue>,
}

#[derive(Serialize)]
struct RejectionBody<'a> {
    detail: &'a [FieldIssue],
}

impl SchemaRejection {
    fn body(status: StatusCode, kind: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            detail: vec![FieldIssue {
                loc: vec!["body".to_string()],
                msg: msg.into(),
                kind: kind.to_string(),
            }],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.detail
            .iter()
            .filter_map(|issue| issue.loc.get(1).map(String::as_str))
    }
}

impl From<ValidationErrors> for SchemaRejection {
    fn from(errors: ValidationErrors) -> Self {
        let by_field = errors.field_errors();
        let detail = FIELDS
            .iter()
            .filter_map(|spec| by_field.get(spec.external).map(|errs| (spec, errs)))
            .flat_map(|(spec, errs)| {
                errs.iter().map(move |e| FieldIssue {
                    loc: vec!["body".to_string(), spec.external.to_string()],
                    msg: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                    kind: e.code.to_string(),
                })
            })
            .collect();
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail,
        }
    }
}

impl From<JsonRejection> for SchemaRejection {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "content_type",
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            _ => "body",
        };
        let status = match &rejection {
            JsonRejection::JsonSyntaxError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            other => other.status(),
        };
        Self::body(status, kind, rejection.body_text())
    }
}

impl IntoResponse for SchemaRejection {
    fn into_response(self) -> Response {
        let fields: Vec<&str> = self.fields().collect();
        debug!(status = %self.status, ?fields, "Rejected predict body");
        (self.status, Json(RejectionBody { detail: &self.detail })).into_response()
    }
}

/// Extractor that yields a schema-checked [`PatientRecord`].
pub struct ValidatedRecord(pub PatientRecord);

#[async_trait]
impl<S> FromRequest<S> for ValidatedRecord
where
    S: Send + Sync,
{
    type Rejection = SchemaRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // an explicit content type must be JSON; a missing one is parsed as JSON anyway
        let body = if req.headers().contains_key(header::CONTENT_TYPE) {
            let Json(body) = Json::<Value>::from_request(req, state).await?;
            body
        } else {
            let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
                SchemaRejection::body(rejection.status(), "body", rejection.body_text())
            })?;
            serde_json::from_slice(&bytes).map_err(|e| {
                SchemaRejection::body(StatusCode::UNPROCESSABLE_ENTITY, "json_invalid", e.to_string())
            })?
        };
        PatientRecord::from_json(body).map(ValidatedRecord)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    pub(crate) fn example_body() -> Value {
        json!({
            "Age": 45,
            "Gender": "F",
            "Smoking": "No",
            "Hx Smoking": "No",
            "Hx Radiotherapy": "No",
            "Thyroid Function": "Euthyroid",
            "Physical Examination": "Single nodular goiter-left",
            "Adenopathy": "No",
            "Pathology": "Papillary",
            "Focality": "Uni-Focal",
            "Risk": "Low",
            "T": "T1a",
            "N": "N0",
            "M": "M0",
            "Stage": "I",
            "Response": "Excellent"
        })
    }

    #[test]
    fn test_alias_table_is_a_bijection() {
        let external: HashSet<_> = FIELDS.iter().map(|f| f.external).collect();
        let columns: HashSet<_> = FIELDS.iter().map(|f| f.column).collect();
        assert_eq!(external.len(), 16);
        assert_eq!(columns.len(), 16);
        assert!(columns.contains("Hx Radiothreapy"));
        assert!(!columns.contains("Hx Radiotherapy"));
        assert!(external.contains("Hx Radiotherapy"));
    }

    #[test]
    fn test_frame_uses_model_columns() {
        // distinct value per field so a swapped alias shows up
        let mut body = example_body();
        for spec in FIELDS.iter().skip(1) {
            body[spec.external] = Value::String(format!("v:{}", spec.external));
        }
        let record = PatientRecord::from_json(body).unwrap();
        let frame = record.to_frame();

        assert_eq!(frame.column_names().count(), 16);
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            FIELDS.iter().map(|f| f.column).collect::<Vec<_>>()
        );
        assert_eq!(frame.get("Age"), Some(&Cell::Int(45)));
        for spec in FIELDS.iter().skip(1) {
            let expected = format!("v:{}", spec.external);
            assert_eq!(frame.get(spec.column).and_then(Cell::as_str), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        for spec in &FIELDS {
            let mut body = example_body();
            body.as_object_mut().unwrap().remove(spec.external);
            let rejection = PatientRecord::from_json(body).unwrap_err();
            assert_eq!(rejection.status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(rejection.fields().collect::<Vec<_>>(), vec![spec.external]);
            assert_eq!(rejection.detail[0].kind, "missing");
        }
    }

    #[test]
    fn test_type_errors_in_field_order() {
        let mut body = example_body();
        body["Age"] = json!("forty");
        body["T"] = json!(1);
        body["Gender"] = Value::Null;
        let rejection = PatientRecord::from_json(body).unwrap_err();
        assert_eq!(rejection.fields().collect::<Vec<_>>(), vec!["Age", "Gender", "T"]);
        assert_eq!(rejection.detail[0].kind, "int_type");
        assert_eq!(rejection.detail[1].kind, "string_type");
    }

    #[test]
    fn test_age_is_coerced_when_whole() {
        for age in [json!("45"), json!(45.0), json!(" 45 ")] {
            let mut body = example_body();
            body["Age"] = age.clone();
            let record = PatientRecord::from_json(body).unwrap_or_else(|e| panic!("{}: {:?}", age, e));
            assert_eq!(record.age, 45);
        }
    }

    #[test]
    fn test_age_rejected_when_not_an_integer() {
        for age in [json!("forty"), json!(45.5), json!("45.5"), json!(true), json!([45])] {
            let mut body = example_body();
            body["Age"] = age.clone();
            let rejection = PatientRecord::from_json(body).unwrap_err();
            assert_eq!(rejection.fields().collect::<Vec<_>>(), vec!["Age"], "{}", age);
            assert_eq!(rejection.detail[0].kind, "int_type");
        }
    }

    #[test]
    fn test_non_object_body() {
        let rejection = PatientRecord::from_json(json!([1, 2])).unwrap_err();
        assert_eq!(rejection.detail[0].kind, "dict_type");
        assert_eq!(rejection.detail[0].loc, vec!["body"]);
    }

    #[test]
    fn test_extra_keys_and_any_string_are_accepted() {
        let mut body = example_body();
        body["Comment"] = json!("ignored");
        body["Stage"] = json!("not-a-stage");
        let record = PatientRecord::from_json(body).unwrap();
        assert_eq!(record.stage, "not-a-stage");
    }
}
