//! Identity Key Aggregate
//!
//! One instance per company. Three slots share a single lifecycle:
//!
//! ```text
//! UNSET -> CONFIGURED -> LOCKED <-> REVERT_PENDING
//!                          ^             |
//!                          |   approval  v
//!                          +-------- CONFIGURED
//! ```
//!
//! Finalize locks every slot in one transition. A revert request targets a
//! single slot and at most one may be pending per slot. Every transition is
//! all-or-nothing: a rejected call leaves the aggregate untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{DomainEvent, IdentityKeyEvent};
use crate::domain::filter::FilterGroup;
use crate::domain::value_objects::CompanyId;

/// The three independently revertible slots
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeySlot {
    PrimaryKey,
    EmailKey,
    Filters,
}

impl KeySlot {
    pub const ALL: [KeySlot; 3] = [KeySlot::PrimaryKey, KeySlot::EmailKey, KeySlot::Filters];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY_KEY",
            Self::EmailKey => "EMAIL_KEY",
            Self::Filters => "FILTERS",
        }
    }
}

impl std::fmt::Display for KeySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeySlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "PRIMARY_KEY" | "PRIMARY" => Ok(Self::PrimaryKey),
            "EMAIL_KEY" | "EMAIL" => Ok(Self::EmailKey),
            "FILTERS" => Ok(Self::Filters),
            other => Err(format!("unknown slot '{}'", other)),
        }
    }
}

/// Derived lifecycle state of one slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    Unset,
    Configured,
    Locked,
    RevertPending,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySlotConfig {
    pub field_key: Option<String>,
    pub locked: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSlotConfig {
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
    pub locked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevertStatus {
    Pending,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertRequest {
    #[serde(rename = "type")]
    pub slot: KeySlot,
    pub status: RevertStatus,
    pub requested_at: DateTime<Utc>,
}

/// Outcome of the finalize transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Slots that went from unlocked to locked
    Finalized { locked: Vec<KeySlot> },
    /// Every slot was already locked; nothing changed
    AlreadyFinalized,
}

/// "This change affects N contacts" preview for a key selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChangePreview {
    pub slot: KeySlot,
    pub field_key: String,
    /// Contacts carrying a value for the field
    pub affected_contacts: u64,
    pub distinct_values: u64,
    /// Values shared by more than one contact
    pub duplicate_values: u64,
}

/// Identity key aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKeyConfig {
    company_id: CompanyId,
    #[serde(default)]
    primary_key: KeySlotConfig,
    #[serde(default)]
    email_key: KeySlotConfig,
    #[serde(default)]
    filters: FilterSlotConfig,
    #[serde(default)]
    revert_requests: Vec<RevertRequest>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl PartialEq for IdentityKeyConfig {
    fn eq(&self, other: &Self) -> bool {
        self.company_id == other.company_id
            && self.primary_key == other.primary_key
            && self.email_key == other.email_key
            && self.filters == other.filters
            && self.revert_requests == other.revert_requests
    }
}

impl IdentityKeyConfig {
    /// Fresh configuration: every slot unset and unlocked
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            primary_key: KeySlotConfig::default(),
            email_key: KeySlotConfig::default(),
            filters: FilterSlotConfig::default(),
            revert_requests: vec![],
            events: vec![],
        }
    }

    pub fn company_id(&self) -> &CompanyId { &self.company_id }
    pub fn primary_key(&self) -> &KeySlotConfig { &self.primary_key }
    pub fn email_key(&self) -> &KeySlotConfig { &self.email_key }
    pub fn filters(&self) -> &FilterSlotConfig { &self.filters }
    pub fn revert_requests(&self) -> &[RevertRequest] { &self.revert_requests }

    pub fn is_locked(&self, slot: KeySlot) -> bool {
        match slot {
            KeySlot::PrimaryKey => self.primary_key.locked,
            KeySlot::EmailKey => self.email_key.locked,
            KeySlot::Filters => self.filters.locked,
        }
    }

    /// True once every slot is locked
    pub fn is_finalized(&self) -> bool {
        KeySlot::ALL.iter().all(|s| self.is_locked(*s))
    }

    pub fn pending_revert(&self, slot: KeySlot) -> Option<&RevertRequest> {
        self.revert_requests
            .iter()
            .find(|r| r.slot == slot && r.status == RevertStatus::Pending)
    }

    fn is_configured(&self, slot: KeySlot) -> bool {
        match slot {
            KeySlot::PrimaryKey => self.primary_key.field_key.is_some(),
            KeySlot::EmailKey => self.email_key.field_key.is_some(),
            KeySlot::Filters => !self.filters.groups.is_empty(),
        }
    }

    pub fn slot_state(&self, slot: KeySlot) -> SlotState {
        match (self.is_locked(slot), self.pending_revert(slot).is_some()) {
            (true, true) => SlotState::RevertPending,
            (true, false) => SlotState::Locked,
            (false, _) if self.is_configured(slot) => SlotState::Configured,
            (false, _) => SlotState::Unset,
        }
    }

    // =========================================================================
    // Selection (UNSET/CONFIGURED -> CONFIGURED)
    // =========================================================================

    pub fn set_primary_key(&mut self, field_key: impl Into<String>) -> Result<SlotState, IdentityKeyError> {
        self.select_key(KeySlot::PrimaryKey, field_key.into())
    }

    pub fn set_email_key(&mut self, field_key: impl Into<String>) -> Result<SlotState, IdentityKeyError> {
        self.select_key(KeySlot::EmailKey, field_key.into())
    }

    /// Replace the company-wide contact filters; an empty list unsets the slot
    pub fn set_filters(&mut self, groups: Vec<FilterGroup>) -> Result<SlotState, IdentityKeyError> {
        self.ensure_unlocked(KeySlot::Filters)?;
        self.filters.groups = groups.into_iter().filter(|g| !g.is_empty()).collect();
        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::FiltersChanged {
            company_id: self.company_id.clone(),
            group_count: self.filters.groups.len(),
        }));
        Ok(self.slot_state(KeySlot::Filters))
    }

    fn select_key(&mut self, slot: KeySlot, field_key: String) -> Result<SlotState, IdentityKeyError> {
        self.ensure_unlocked(slot)?;
        let field_key = field_key.trim().to_string();
        if field_key.is_empty() {
            return Err(IdentityKeyError::BlankFieldKey { slot });
        }

        let target = match slot {
            KeySlot::PrimaryKey => &mut self.primary_key,
            KeySlot::EmailKey => &mut self.email_key,
            KeySlot::Filters => return Err(IdentityKeyError::NotAKeySlot),
        };
        target.field_key = Some(field_key.clone());

        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::KeySelected {
            company_id: self.company_id.clone(),
            slot,
            field_key,
        }));
        Ok(self.slot_state(slot))
    }

    fn ensure_unlocked(&self, slot: KeySlot) -> Result<(), IdentityKeyError> {
        if self.is_locked(slot) {
            return Err(IdentityKeyError::KeyLocked { slot });
        }
        Ok(())
    }

    // =========================================================================
    // Finalize (CONFIGURED -> LOCKED, all slots at once)
    // =========================================================================

    /// Lock primary key, email key and filters together.
    ///
    /// Idempotent: when every slot is already locked nothing changes.
    pub fn finalize(&mut self) -> Result<FinalizeOutcome, IdentityKeyError> {
        if self.is_finalized() {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        for slot in [KeySlot::PrimaryKey, KeySlot::EmailKey] {
            if !self.is_configured(slot) {
                return Err(IdentityKeyError::SlotNotConfigured { slot });
            }
        }

        let locked: Vec<KeySlot> = KeySlot::ALL
            .iter()
            .copied()
            .filter(|s| !self.is_locked(*s))
            .collect();

        self.primary_key.locked = true;
        self.email_key.locked = true;
        self.filters.locked = true;

        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::Finalized {
            company_id: self.company_id.clone(),
            locked: locked.clone(),
            finalized_at: Utc::now(),
        }));

        Ok(FinalizeOutcome::Finalized { locked })
    }

    // =========================================================================
    // Revert (LOCKED <-> REVERT_PENDING -> CONFIGURED)
    // =========================================================================

    pub fn request_revert(&mut self, slot: KeySlot) -> Result<RevertRequest, IdentityKeyError> {
        if !self.is_locked(slot) {
            return Err(IdentityKeyError::SlotNotLocked { slot });
        }
        if self.pending_revert(slot).is_some() {
            return Err(IdentityKeyError::DuplicateRevertRequest { slot });
        }

        let request = RevertRequest {
            slot,
            status: RevertStatus::Pending,
            requested_at: Utc::now(),
        };
        self.revert_requests.retain(|r| r.slot != slot);
        self.revert_requests.push(request.clone());

        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::RevertRequested {
            company_id: self.company_id.clone(),
            slot,
            requested_at: request.requested_at,
        }));
        Ok(request)
    }

    /// Operator withdraws their own pending request
    pub fn cancel_revert(&mut self, slot: KeySlot) -> Result<SlotState, IdentityKeyError> {
        self.take_pending(slot)?;
        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::RevertCancelled {
            company_id: self.company_id.clone(),
            slot,
        }));
        Ok(self.slot_state(slot))
    }

    /// Administrative approval: the slot becomes editable again
    pub fn approve_revert(&mut self, slot: KeySlot) -> Result<SlotState, IdentityKeyError> {
        self.take_pending(slot)?;
        match slot {
            KeySlot::PrimaryKey => self.primary_key.locked = false,
            KeySlot::EmailKey => self.email_key.locked = false,
            KeySlot::Filters => self.filters.locked = false,
        }
        self.raise_event(DomainEvent::IdentityKey(IdentityKeyEvent::RevertApproved {
            company_id: self.company_id.clone(),
            slot,
        }));
        Ok(self.slot_state(slot))
    }

    fn take_pending(&mut self, slot: KeySlot) -> Result<RevertRequest, IdentityKeyError> {
        let pos = self
            .revert_requests
            .iter()
            .position(|r| r.slot == slot && r.status == RevertStatus::Pending)
            .ok_or(IdentityKeyError::NoPendingRevert { slot })?;
        Ok(self.revert_requests.remove(pos))
    }

    // =========================================================================
    // Domain Events
    // =========================================================================

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityKeyError {
    #[error("{slot} is locked; request a revert before changing it")]
    KeyLocked { slot: KeySlot },

    #[error("a revert request for {slot} is already pending")]
    DuplicateRevertRequest { slot: KeySlot },

    #[error("{slot} is not locked")]
    SlotNotLocked { slot: KeySlot },

    #[error("no pending revert request for {slot}")]
    NoPendingRevert { slot: KeySlot },

    #[error("{slot} must be configured before finalizing")]
    SlotNotConfigured { slot: KeySlot },

    #[error("field key for {slot} must not be blank")]
    BlankFieldKey { slot: KeySlot },

    #[error("filters are not selected by field key")]
    NotAKeySlot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> IdentityKeyConfig {
        let mut config = IdentityKeyConfig::new(CompanyId::new("acme"));
        config.set_primary_key("customer_id").unwrap();
        config.set_email_key("email").unwrap();
        config.take_events();
        config
    }

    fn finalized() -> IdentityKeyConfig {
        let mut config = configured();
        config.finalize().unwrap();
        config.take_events();
        config
    }

    #[test]
    fn test_unset_to_configured() {
        let mut config = IdentityKeyConfig::new(CompanyId::new("acme"));
        assert_eq!(config.slot_state(KeySlot::PrimaryKey), SlotState::Unset);
        assert_eq!(config.set_primary_key("customer_id"), Ok(SlotState::Configured));
        assert_eq!(config.set_primary_key("external_id"), Ok(SlotState::Configured));
        assert_eq!(config.primary_key().field_key.as_deref(), Some("external_id"));
        assert_eq!(config.take_events().len(), 2);
    }

    #[test]
    fn test_blank_key_rejected() {
        let mut config = IdentityKeyConfig::new(CompanyId::new("acme"));
        assert_eq!(
            config.set_email_key("  "),
            Err(IdentityKeyError::BlankFieldKey { slot: KeySlot::EmailKey })
        );
    }

    #[test]
    fn test_finalize_locks_all_slots() {
        let mut config = configured();
        let outcome = config.finalize().unwrap();

        assert_eq!(outcome, FinalizeOutcome::Finalized { locked: KeySlot::ALL.to_vec() });
        for slot in KeySlot::ALL {
            assert_eq!(config.slot_state(slot), SlotState::Locked);
        }
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut config = finalized();
        let before = config.clone();

        assert_eq!(config.finalize(), Ok(FinalizeOutcome::AlreadyFinalized));
        assert_eq!(config, before);
        assert!(config.take_events().is_empty());
    }

    #[test]
    fn test_finalize_requires_both_keys() {
        let mut config = IdentityKeyConfig::new(CompanyId::new("acme"));
        config.set_primary_key("customer_id").unwrap();
        assert_eq!(
            config.finalize(),
            Err(IdentityKeyError::SlotNotConfigured { slot: KeySlot::EmailKey })
        );
        assert!(!config.is_locked(KeySlot::PrimaryKey));
    }

    #[test]
    fn test_locked_slot_rejects_changes() {
        let mut config = finalized();
        assert_eq!(
            config.set_primary_key("email"),
            Err(IdentityKeyError::KeyLocked { slot: KeySlot::PrimaryKey })
        );
        assert_eq!(
            config.set_filters(vec![FilterGroup::new("country", ["US"])]),
            Err(IdentityKeyError::KeyLocked { slot: KeySlot::Filters })
        );
        assert_eq!(config.primary_key().field_key.as_deref(), Some("customer_id"));
    }

    #[test]
    fn test_one_pending_revert_per_slot() {
        let mut config = finalized();
        config.request_revert(KeySlot::PrimaryKey).unwrap();

        assert_eq!(
            config.request_revert(KeySlot::PrimaryKey),
            Err(IdentityKeyError::DuplicateRevertRequest { slot: KeySlot::PrimaryKey })
        );
        assert!(config.request_revert(KeySlot::EmailKey).is_ok());
        assert_eq!(config.slot_state(KeySlot::PrimaryKey), SlotState::RevertPending);
        assert_eq!(config.slot_state(KeySlot::Filters), SlotState::Locked);
    }

    #[test]
    fn test_revert_requires_lock() {
        let mut config = configured();
        assert_eq!(
            config.request_revert(KeySlot::EmailKey),
            Err(IdentityKeyError::SlotNotLocked { slot: KeySlot::EmailKey })
        );
    }

    #[test]
    fn test_cancel_returns_to_locked() {
        let mut config = finalized();
        config.request_revert(KeySlot::EmailKey).unwrap();
        assert_eq!(config.cancel_revert(KeySlot::EmailKey), Ok(SlotState::Locked));
        assert!(config.revert_requests().is_empty());
        assert_eq!(
            config.cancel_revert(KeySlot::EmailKey),
            Err(IdentityKeyError::NoPendingRevert { slot: KeySlot::EmailKey })
        );
        assert!(config.request_revert(KeySlot::EmailKey).is_ok());
    }

    #[test]
    fn test_approved_revert_reopens_only_that_slot() {
        let mut config = finalized();
        config.request_revert(KeySlot::PrimaryKey).unwrap();
        assert_eq!(config.approve_revert(KeySlot::PrimaryKey), Ok(SlotState::Configured));

        assert_eq!(config.set_primary_key("email"), Ok(SlotState::Configured));
        assert!(config.is_locked(KeySlot::EmailKey));
        assert!(config.is_locked(KeySlot::Filters));
        assert!(config.pending_revert(KeySlot::PrimaryKey).is_none());

        let outcome = config.finalize().unwrap();
        assert_eq!(outcome, FinalizeOutcome::Finalized { locked: vec![KeySlot::PrimaryKey] });
    }

    #[test]
    fn test_filters_slot_shares_vocabulary() {
        let mut config = configured();
        assert_eq!(config.slot_state(KeySlot::Filters), SlotState::Unset);
        assert_eq!(
            config.set_filters(vec![FilterGroup::new("country", ["US"])]),
            Ok(SlotState::Configured)
        );
        config.finalize().unwrap();
        config.request_revert(KeySlot::Filters).unwrap();
        assert_eq!(config.approve_revert(KeySlot::Filters), Ok(SlotState::Configured));
        assert_eq!(config.set_filters(vec![]), Ok(SlotState::Unset));
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "companyId": "acme",
            "primaryKey": {"fieldKey": "customer_id", "locked": true},
            "emailKey": {"fieldKey": "email", "locked": true},
            "filters": {"groups": [], "locked": true},
            "revertRequests": [{"type": "PRIMARY_KEY", "status": "PENDING", "requestedAt": "2024-05-01T00:00:00Z"}]
        }"#;
        let config: IdentityKeyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.slot_state(KeySlot::PrimaryKey), SlotState::RevertPending);
        assert_eq!(config.slot_state(KeySlot::EmailKey), SlotState::Locked);
        assert_eq!("email".parse::<KeySlot>(), Ok(KeySlot::EmailKey));
    }
}
