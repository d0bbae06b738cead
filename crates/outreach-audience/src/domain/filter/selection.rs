//! Editor selections
//!
//! Translation between what an operator ticks in the segment editor and the
//! canonical `FilterGroup` list, in both directions.

use serde::{Deserialize, Serialize};

use super::{FilterCriterion, FilterError, FilterGroup, Operator};
use crate::domain::value_objects::ScalarValue;

/// A contact field the editor can offer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownField {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub label: String,
}

impl KnownField {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: id.into(),
            label: key.clone(),
            key,
        }
    }
}

/// Editor state for one field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    #[serde(default)]
    pub field_id: Option<String>,
    pub field_key: String,
    #[serde(default)]
    pub checked: Vec<ScalarValue>,
    #[serde(default)]
    pub sub_conditions: Vec<FilterCriterion>,
    #[serde(default)]
    pub operator: Operator,
}

/// Whole editor state for one segment
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub fields: Vec<FieldSelection>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_mut(&mut self, field_key: &str) -> &mut FieldSelection {
        let pos = match self.fields.iter().position(|f| f.field_key == field_key) {
            Some(pos) => pos,
            None => {
                self.fields.push(FieldSelection {
                    field_key: field_key.to_string(),
                    ..Default::default()
                });
                self.fields.len() - 1
            }
        };
        &mut self.fields[pos]
    }

    /// Tick a value for a field
    pub fn check(mut self, field_key: &str, value: impl Into<ScalarValue>) -> Self {
        let value = value.into();
        let field = self.field_mut(field_key);
        if !field.checked.contains(&value) {
            field.checked.push(value);
        }
        self
    }

    pub fn uncheck(mut self, field_key: &str, value: &ScalarValue) -> Self {
        self.field_mut(field_key).checked.retain(|v| v != value);
        self
    }

    /// Attach a compound sub-condition to a field
    pub fn condition(mut self, field_key: &str, operator: Operator, criterion: FilterCriterion) -> Self {
        let field = self.field_mut(field_key);
        field.operator = operator;
        field.sub_conditions.push(criterion);
        self
    }

    /// Drop every value and sub-condition of a field
    pub fn deselect(mut self, field_key: &str) -> Self {
        self.fields.retain(|f| f.field_key != field_key);
        self
    }

    pub fn to_groups(&self) -> Result<Vec<FilterGroup>, FilterError> {
        to_groups(self)
    }
}

/// Build the canonical group list from editor state.
///
/// Groups without values and without (non-blank) sub-conditions are
/// dropped. If nothing is left the selection is rejected: an empty group
/// list would mean "everyone", which must never be chosen by omission.
pub fn to_groups(selection: &Selection) -> Result<Vec<FilterGroup>, FilterError> {
    let groups: Vec<FilterGroup> = selection
        .fields
        .iter()
        .filter_map(|field| {
            let mut values: Vec<ScalarValue> = Vec::with_capacity(field.checked.len());
            for value in &field.checked {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
            let conditions: Vec<FilterCriterion> = field
                .sub_conditions
                .iter()
                .filter(|c| !c.is_empty())
                .cloned()
                .collect();

            if values.is_empty() && conditions.is_empty() {
                return None;
            }

            Some(FilterGroup {
                field_id: field.field_id.clone(),
                field_key: field.field_key.clone(),
                values,
                operator: if conditions.is_empty() { Operator::And } else { field.operator },
                conditions,
            })
        })
        .collect();

    if groups.is_empty() {
        return Err(FilterError::EmptySegment);
    }
    Ok(groups)
}

/// Why a persisted group could not be mapped back onto the editor
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum UnresolvedReason {
    /// Neither the field id nor the field key is known any more
    UnknownField,
    /// A nested condition points at a deleted field
    UnknownConditionField(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnresolvedGroup {
    pub group: FilterGroup,
    pub reason: UnresolvedReason,
}

/// Result of hydrating a saved segment into the editor
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hydration {
    pub selection: Selection,
    pub unresolved: Vec<UnresolvedGroup>,
}

impl Hydration {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// The editable selection, or the first stale reference
    pub fn into_selection(self) -> Result<Selection, FilterError> {
        match self.unresolved.into_iter().next() {
            None => Ok(self.selection),
            Some(u) => Err(FilterError::StaleField {
                field: match u.reason {
                    UnresolvedReason::UnknownField => u.group.field_key,
                    UnresolvedReason::UnknownConditionField(key) => key,
                },
            }),
        }
    }
}

/// Rebuild editor state from persisted groups.
///
/// Fields are matched by id first and by key as a fallback; a matched field
/// takes the current key of the known field (it may have been renamed).
/// Groups that cannot be matched are reported, never silently dropped.
pub fn from_groups(groups: &[FilterGroup], known_fields: &[KnownField]) -> Hydration {
    let mut hydration = Hydration::default();

    for group in groups {
        let field = group
            .field_id
            .as_deref()
            .and_then(|id| known_fields.iter().find(|f| f.id == id))
            .or_else(|| known_fields.iter().find(|f| f.key == group.field_key));

        let Some(field) = field else {
            hydration.unresolved.push(UnresolvedGroup {
                group: group.clone(),
                reason: UnresolvedReason::UnknownField,
            });
            continue;
        };

        if let Some(stale) = group
            .conditions
            .iter()
            .find(|c| !known_fields.iter().any(|f| f.key == c.field_key))
        {
            hydration.unresolved.push(UnresolvedGroup {
                group: group.clone(),
                reason: UnresolvedReason::UnknownConditionField(stale.field_key.clone()),
            });
            continue;
        }

        hydration.selection.fields.push(FieldSelection {
            field_id: Some(field.id.clone()),
            field_key: field.key.clone(),
            checked: group.values.clone(),
            sub_conditions: group.conditions.clone(),
            operator: group.operator,
        });
    }

    hydration
}
