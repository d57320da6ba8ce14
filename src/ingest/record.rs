//! Loosely structured requirement records, as found in source data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    Code, Condition, InvalidCodeError, OfferingKind, TargetKind, UnknownTagError,
};

/// One node of a nested requirement record.
///
/// Groups carry a scope tag (`ALL`, `ANY`, `NONE`) in `kind`, an optional
/// `threshold` and `children`. Leaves have `kind: LEAF` and name their target
/// with `targetCode` and `targetKind`.
///
/// Records are deliberately untyped. Interpreting them is the builder's job,
/// and malformed records are reported rather than rejected by serde.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementRecord {
    /// Scope tag for groups, `LEAF` for leaves.
    pub kind: String,

    /// Minimum number of children an `ANY` group needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,

    /// Explicit sibling order. Array position is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    /// Free-text note attached to a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Child records of a group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RequirementRecord>,

    /// Code of the referenced subject or offering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_code: Option<String>,

    /// `SUBJECT` or `OFFERING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<String>,

    /// `APPROVED`, `ENROLLED` or `CREDITED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Program namespace for the code, when it is not the gated offering's
    /// own program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// `COURSE` or `EXAM`, for offering targets named by subject code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering_kind: Option<String>,

    /// Descriptive label, kept for auditing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RequirementRecord {
    /// A group record with the given scope tag.
    #[must_use]
    pub fn group(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// A leaf record.
    #[must_use]
    pub fn leaf(
        target_kind: impl Into<String>,
        target_code: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            kind: "LEAF".to_string(),
            target_kind: Some(target_kind.into()),
            target_code: Some(target_code.into()),
            condition: Some(condition.into()),
            ..Self::default()
        }
    }

    /// Sets the threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Sets the explicit order.
    #[must_use]
    pub const fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Appends a child record.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the program namespace.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Sets the offering kind hint.
    #[must_use]
    pub fn with_offering_kind(mut self, offering_kind: impl Into<String>) -> Self {
        self.offering_kind = Some(offering_kind.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Interprets the record.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the scope tag is unknown, or if a leaf is
    /// missing its target code, target kind or condition, or has an invalid
    /// one.
    pub fn shape(&self) -> Result<RecordShape<'_>, ParseError> {
        let tag = self.kind.trim().to_ascii_uppercase();
        let scope = match tag.as_str() {
            "ALL" => ScopeTag::All,
            "ANY" => ScopeTag::Any,
            "NONE" | "NOT" => ScopeTag::None,
            "LEAF" => return self.leaf_fields().map(RecordShape::Leaf),
            _ => return Err(ParseError::UnknownKind(self.kind.clone())),
        };

        Ok(RecordShape::Group {
            scope,
            threshold: self.threshold,
            note: self.note.as_deref(),
            children: &self.children,
        })
    }

    fn leaf_fields(&self) -> Result<LeafFields, ParseError> {
        let raw_code = self
            .target_code
            .as_deref()
            .ok_or(ParseError::MissingField("targetCode"))?;
        let code = Code::new(raw_code)?;

        let kind = self
            .target_kind
            .as_deref()
            .ok_or(ParseError::MissingField("targetKind"))?
            .parse()
            .map_err(ParseError::TargetKind)?;

        let condition = self
            .condition
            .as_deref()
            .ok_or(ParseError::MissingField("condition"))?
            .parse()
            .map_err(ParseError::Condition)?;

        let offering_kind = self
            .offering_kind
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(ParseError::OfferingKind)?;

        Ok(LeafFields {
            code,
            kind,
            condition,
            program: self.program.clone(),
            offering_kind,
            label: self.label.clone(),
        })
    }
}

/// The scope tag of a group record, before its threshold is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTag {
    /// Conjunction.
    All,
    /// Threshold disjunction.
    Any,
    /// Negated disjunction. Also written `NOT`.
    None,
}

/// An interpreted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordShape<'a> {
    /// A group record.
    Group {
        /// The scope tag.
        scope: ScopeTag,
        /// The raw threshold, unchecked.
        threshold: Option<i64>,
        /// The note, if any.
        note: Option<&'a str>,
        /// Child records in array order.
        children: &'a [RequirementRecord],
    },
    /// A leaf record.
    Leaf(LeafFields),
}

/// A parsed but unresolved leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafFields {
    /// The normalised target code.
    pub code: Code,
    /// Subject or offering.
    pub kind: TargetKind,
    /// The required status.
    pub condition: Condition,
    /// Program namespace override.
    pub program: Option<String>,
    /// Offering kind hint.
    pub offering_kind: Option<OfferingKind>,
    /// Descriptive label.
    pub label: Option<String>,
}

/// A record that could not be interpreted. The node is skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// `kind` is neither a scope tag nor `LEAF`.
    #[error("unknown record kind '{0}'")]
    UnknownKind(String),

    /// A leaf is missing a required field.
    #[error("leaf is missing '{0}'")]
    MissingField(&'static str),

    /// The target code is not a valid code.
    #[error(transparent)]
    Code(#[from] InvalidCodeError),

    /// The target kind tag is unknown.
    #[error(transparent)]
    TargetKind(UnknownTagError),

    /// The condition tag is unknown.
    #[error(transparent)]
    Condition(UnknownTagError),

    /// The offering kind tag is unknown.
    #[error(transparent)]
    OfferingKind(UnknownTagError),
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("ALL", ScopeTag::All)]
    #[test_case("any", ScopeTag::Any)]
    #[test_case(" None ", ScopeTag::None)]
    #[test_case("NOT", ScopeTag::None)]
    fn scope_tags(kind: &str, expected: ScopeTag) {
        let record = RequirementRecord::group(kind);
        assert!(matches!(
            record.shape().unwrap(),
            RecordShape::Group { scope, .. } if scope == expected
        ));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let record = RequirementRecord::group("SOME");
        assert_eq!(
            record.shape().unwrap_err(),
            ParseError::UnknownKind("SOME".to_string())
        );
    }

    #[test]
    fn leaf_fields_are_parsed() {
        let record = RequirementRecord::leaf("offering", "gal1", "enrolled")
            .with_offering_kind("EXAMEN")
            .with_label("GAL1 - Linear Algebra");

        let RecordShape::Leaf(fields) = record.shape().unwrap() else {
            panic!("expected a leaf");
        };
        assert_eq!(fields.code.as_str(), "GAL1");
        assert_eq!(fields.kind, TargetKind::Offering);
        assert_eq!(fields.condition, Condition::Enrolled);
        assert_eq!(fields.offering_kind, Some(OfferingKind::Exam));
        assert_eq!(fields.label.as_deref(), Some("GAL1 - Linear Algebra"));
    }

    #[test]
    fn leaf_without_condition_is_a_parse_error() {
        let mut record = RequirementRecord::leaf("SUBJECT", "GAL1", "APPROVED");
        record.condition = None;
        assert_eq!(
            record.shape().unwrap_err(),
            ParseError::MissingField("condition")
        );
    }

    #[test_case(RequirementRecord::leaf("COURSE", "GAL1", "APPROVED"); "bad target kind")]
    #[test_case(RequirementRecord::leaf("SUBJECT", "GAL1", "PASSED"); "bad condition")]
    #[test_case(RequirementRecord::leaf("SUBJECT", "GAL 1", "APPROVED"); "bad code")]
    #[test_case(RequirementRecord::leaf("OFFERING", "GAL1", "APPROVED").with_offering_kind("LAB"); "bad offering kind")]
    fn invalid_leaf_fields(record: RequirementRecord) {
        assert!(record.shape().is_err());
    }

    #[test]
    fn records_deserialize_from_camel_case_json() {
        let json = r#"{
            "kind": "ANY",
            "threshold": 2,
            "note": "two of three",
            "children": [
                {"kind": "LEAF", "targetCode": "P1", "targetKind": "SUBJECT", "condition": "APPROVED"},
                {"kind": "LEAF", "targetCode": "P2", "targetKind": "SUBJECT", "condition": "APPROVED", "order": 0},
                {"kind": "LEAF", "targetCode": "1030", "targetKind": "OFFERING", "condition": "ENROLLED", "offeringKind": "EXAM"}
            ]
        }"#;

        let record: RequirementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.threshold, Some(2));
        assert_eq!(record.children.len(), 3);
        assert_eq!(record.children[1].order, Some(0));
        assert_eq!(record.children[2].offering_kind.as_deref(), Some("EXAM"));
    }
}
