//! Filter Tree
//!
//! The canonical shape of a segment's predicate:
//!
//! - [`FilterCriterion`]: "contact's value for `field_key` is one of `values`"
//! - [`FilterGroup`]: one field-level constraint plus optional nested
//!   sub-conditions combined with an [`Operator`]
//! - [`Criterion`]: the evaluation tree every group lowers into
//!
//! Top-level groups of a segment are AND-combined. Evaluation is a plain
//! recursive fold over [`Criterion`], independent of any editing widget.

pub mod selection;

pub use selection::{FieldSelection, Hydration, KnownField, Selection, UnresolvedGroup, UnresolvedReason};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::value_objects::{ContactRecord, ScalarValue};

/// How sub-conditions of a group combine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// Atomic predicate: membership of one field's value in a set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriterion {
    pub field_key: String,
    pub values: HashSet<ScalarValue>,
}

impl FilterCriterion {
    pub fn new<I, V>(field_key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Self {
            field_key: field_key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn matches(&self, contact: &ContactRecord) -> bool {
        contact
            .value(&self.field_key)
            .map(|v| self.values.contains(v))
            .unwrap_or(false)
    }
}

/// One unit of a segment definition, in the shape the evaluator consumes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub field_key: String,
    #[serde(default)]
    pub values: Vec<ScalarValue>,
    #[serde(default)]
    pub conditions: Vec<FilterCriterion>,
    #[serde(default)]
    pub operator: Operator,
}

impl FilterGroup {
    /// Plain membership group with no sub-conditions
    pub fn new<I, V>(field_key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Self {
            field_id: None,
            field_key: field_key.into(),
            values: values.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
            operator: Operator::And,
        }
    }

    pub fn with_field_id(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    pub fn with_conditions(mut self, operator: Operator, conditions: Vec<FilterCriterion>) -> Self {
        self.operator = operator;
        self.conditions = conditions;
        self
    }

    /// A group with neither values nor conditions constrains nothing and
    /// must never reach the store
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.conditions.iter().all(FilterCriterion::is_empty)
    }

    /// Lower into the evaluation tree. An empty group matches nothing, so a
    /// stored definition that lost its values can never widen to everyone.
    pub fn criterion(&self) -> Criterion {
        if self.is_empty() {
            return Criterion::nothing();
        }

        let primary = (!self.values.is_empty()).then(|| Criterion::Leaf {
            field_key: self.field_key.clone(),
            values: self.values.iter().cloned().collect(),
        });
        let conditions: Vec<Criterion> = self
            .conditions
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| Criterion::Leaf {
                field_key: c.field_key.clone(),
                values: c.values.clone(),
            })
            .collect();

        match (primary, conditions.is_empty()) {
            (Some(leaf), true) => leaf,
            (primary, _) => Criterion::Compound {
                operator: self.operator,
                children: primary.into_iter().chain(conditions).collect(),
            },
        }
    }

    pub fn matches(&self, contact: &ContactRecord) -> bool {
        self.criterion().evaluate(contact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// No group survived normalization
    #[error("segment has no constraints; choose at least one field value or condition")]
    EmptySegment,

    /// A saved group references a field that no longer exists
    #[error("filter references unknown field '{field}'")]
    StaleField { field: String },
}

/// Evaluation tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Criterion {
    Leaf {
        field_key: String,
        values: HashSet<ScalarValue>,
    },
    Compound {
        operator: Operator,
        children: Vec<Criterion>,
    },
}

impl Criterion {
    /// AND of all non-empty groups: the predicate of one segment. Empty
    /// groups are skipped; with none left the predicate matches nothing.
    pub fn all_of(groups: &[FilterGroup]) -> Self {
        let children: Vec<Criterion> = groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(FilterGroup::criterion)
            .collect();
        if children.is_empty() {
            return Self::nothing();
        }
        Self::Compound {
            operator: Operator::And,
            children,
        }
    }

    /// Never holds
    pub fn nothing() -> Self {
        Self::Compound {
            operator: Operator::Or,
            children: Vec::new(),
        }
    }

    /// OR of several segment predicates: the audience union
    pub fn any_of(children: Vec<Criterion>) -> Self {
        Self::Compound {
            operator: Operator::Or,
            children,
        }
    }

    /// Recursive fold. An empty AND holds; an empty OR does not.
    pub fn evaluate(&self, contact: &ContactRecord) -> bool {
        match self {
            Self::Leaf { field_key, values } => contact
                .value(field_key)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Self::Compound { operator: Operator::And, children } => {
                children.iter().all(|c| c.evaluate(contact))
            }
            Self::Compound { operator: Operator::Or, children } => {
                children.iter().any(|c| c.evaluate(contact))
            }
        }
    }

    /// Field keys referenced anywhere in the tree
    pub fn field_keys(&self) -> Vec<&str> {
        match self {
            Self::Leaf { field_key, .. } => vec![field_key.as_str()],
            Self::Compound { children, .. } => {
                children.iter().flat_map(Criterion::field_keys).collect()
            }
        }
    }
}
