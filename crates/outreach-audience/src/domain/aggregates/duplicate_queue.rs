//! Duplicate Resolution Queue
//!
//! Client-side view over the server's duplicate pairs. The queue is a window:
//! `total_remaining` always comes from the server and is never derived from
//! the number of loaded items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ContactRecord, EntityId};

/// Two records judged to be the same real-world contact
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub id: EntityId,
    pub old: ContactRecord,
    pub new: ContactRecord,
}

impl DuplicatePair {
    pub fn new(id: impl Into<String>, old: ContactRecord, new: ContactRecord) -> Self {
        Self {
            id: EntityId::from_string(id),
            old,
            new,
        }
    }
}

/// Which record of one pair becomes canonical
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionChoice {
    Old,
    New,
}

impl std::str::FromStr for ResolutionChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "old" => Ok(Self::Old),
            "new" => Ok(Self::New),
            other => Err(format!("unknown choice '{}', expected old or new", other)),
        }
    }
}

/// One rule applied to every remaining pair, system-wide
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkChoice {
    AllOld,
    AllNew,
}

impl BulkChoice {
    pub fn per_pair(&self) -> ResolutionChoice {
        match self {
            Self::AllOld => ResolutionChoice::Old,
            Self::AllNew => ResolutionChoice::New,
        }
    }
}

impl From<ResolutionChoice> for BulkChoice {
    fn from(choice: ResolutionChoice) -> Self {
        match choice {
            ResolutionChoice::Old => Self::AllOld,
            ResolutionChoice::New => Self::AllNew,
        }
    }
}

/// One page as returned by the duplicate store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePage {
    pub pairs: Vec<DuplicatePair>,
    pub total_remaining: u64,
}

/// Scope confirmation for a bulk resolution.
///
/// Built from the queue so the operator is shown the server-wide total,
/// not the number of pairs currently loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResolutionPlan {
    pub choice: BulkChoice,
    pub total_remaining: u64,
    pub visible: usize,
    pub planned_at: DateTime<Utc>,
}

impl BulkResolutionPlan {
    pub fn describe(&self) -> String {
        let keep = match self.choice {
            BulkChoice::AllOld => "older",
            BulkChoice::AllNew => "newer",
        };
        format!(
            "Resolve ALL {} duplicate pairs by keeping the {} record (only {} loaded). This cannot be undone.",
            self.total_remaining, keep, self.visible
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("no pair at index {index} (queue holds {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("queue is out of sync with the server; refresh before resolving")]
    OutOfSync,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionQueue {
    items: Vec<DuplicatePair>,
    page: u32,
    page_size: u32,
    total_remaining: u64,
    cursor: Option<usize>,
    in_sync: bool,
}

impl ResolutionQueue {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: vec![],
            page: 0,
            page_size: page_size.max(1),
            total_remaining: 0,
            cursor: None,
            in_sync: true,
        }
    }

    pub fn items(&self) -> &[DuplicatePair] { &self.items }
    pub fn page(&self) -> u32 { self.page }
    pub fn page_size(&self) -> u32 { self.page_size }
    pub fn total_remaining(&self) -> u64 { self.total_remaining }
    pub fn cursor(&self) -> Option<usize> { self.cursor }
    pub fn is_in_sync(&self) -> bool { self.in_sync }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// More pairs exist on the server than are loaded
    pub fn has_more(&self) -> bool {
        (self.items.len() as u64) < self.total_remaining
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    /// Append a fetched page; pairs already present are skipped.
    /// Returns the number of pairs appended.
    pub fn apply_page(&mut self, page: u32, fetched: DuplicatePage) -> usize {
        let before = self.items.len();
        for pair in fetched.pairs {
            if !self.items.iter().any(|p| p.id == pair.id) {
                self.items.push(pair);
            }
        }
        self.page = page;
        self.total_remaining = fetched.total_remaining;
        if self.cursor.is_none() && !self.items.is_empty() {
            self.cursor = Some(0);
        }
        self.items.len() - before
    }

    /// Rebuild from page 1, discarding every local index
    pub fn reset(&mut self, first_page: DuplicatePage) {
        self.items.clear();
        self.cursor = None;
        self.in_sync = true;
        self.apply_page(1, first_page);
    }

    pub fn pair(&self, index: usize) -> Result<&DuplicatePair, QueueError> {
        self.items.get(index).ok_or(QueueError::InvalidIndex {
            index,
            len: self.items.len(),
        })
    }

    /// Move the cursor; resolution state is unaffected
    pub fn inspect(&mut self, index: usize) -> Result<&DuplicatePair, QueueError> {
        self.pair(index)?;
        self.cursor = Some(index);
        Ok(&self.items[index])
    }

    pub fn current(&self) -> Option<&DuplicatePair> {
        self.cursor.and_then(|i| self.items.get(i))
    }

    pub fn mark_out_of_sync(&mut self) {
        self.in_sync = false;
    }

    pub fn ensure_in_sync(&self) -> Result<(), QueueError> {
        if self.in_sync {
            Ok(())
        } else {
            Err(QueueError::OutOfSync)
        }
    }

    pub fn plan_resolve_all(&self, choice: BulkChoice) -> BulkResolutionPlan {
        BulkResolutionPlan {
            choice,
            total_remaining: self.total_remaining,
            visible: self.items.len(),
            planned_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(id: &str) -> DuplicatePair {
        DuplicatePair::new(
            id,
            ContactRecord::new(format!("{}-old", id)).with("email", "a@example.com"),
            ContactRecord::new(format!("{}-new", id)).with("email", "a@example.com"),
        )
    }

    fn page(ids: &[&str], total: u64) -> DuplicatePage {
        DuplicatePage {
            pairs: ids.iter().map(|id| pair(id)).collect(),
            total_remaining: total,
        }
    }

    #[test]
    fn test_total_comes_from_server() {
        let mut queue = ResolutionQueue::new(2);
        queue.apply_page(1, page(&["p1", "p2"], 40));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_remaining(), 40);
        assert!(queue.has_more());
        assert_eq!(queue.next_page(), 2);
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn test_append_skips_known_pairs() {
        let mut queue = ResolutionQueue::new(2);
        queue.apply_page(1, page(&["p1", "p2"], 3));
        let appended = queue.apply_page(2, page(&["p2", "p3"], 3));

        assert_eq!(appended, 1);
        assert_eq!(queue.len(), 3);
        assert!(!queue.has_more());
    }

    #[test]
    fn test_cursor_is_independent() {
        let mut queue = ResolutionQueue::new(10);
        queue.apply_page(1, page(&["p1", "p2", "p3"], 3));

        assert_eq!(queue.inspect(2).unwrap().id.as_str(), "p3");
        assert_eq!(queue.current().map(|p| p.id.as_str()), Some("p3"));
        assert_eq!(queue.inspect(7), Err(QueueError::InvalidIndex { index: 7, len: 3 }));
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn test_reset_repoints_cursor() {
        let mut queue = ResolutionQueue::new(10);
        queue.apply_page(1, page(&["p1", "p2", "p3"], 3));
        queue.inspect(2).unwrap();
        queue.mark_out_of_sync();

        queue.reset(page(&["p1", "p2"], 2));
        assert_eq!(queue.cursor(), Some(0));
        assert!(queue.is_in_sync());

        queue.reset(DuplicatePage::default());
        assert_eq!(queue.cursor(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_out_of_sync_guard() {
        let mut queue = ResolutionQueue::new(10);
        assert!(queue.ensure_in_sync().is_ok());
        queue.mark_out_of_sync();
        assert_eq!(queue.ensure_in_sync(), Err(QueueError::OutOfSync));
    }

    #[test]
    fn test_bulk_plan_reports_server_scope() {
        let mut queue = ResolutionQueue::new(2);
        queue.apply_page(1, page(&["p1", "p2"], 57));
        let plan = queue.plan_resolve_all(BulkChoice::AllNew);

        assert_eq!(plan.total_remaining, 57);
        assert_eq!(plan.visible, 2);
        assert!(plan.describe().contains("ALL 57"));
        assert_eq!(BulkChoice::AllNew.per_pair(), ResolutionChoice::New);
    }

    #[test]
    fn test_choice_wire_format() {
        assert_eq!(serde_json::to_string(&ResolutionChoice::Old).unwrap(), "\"OLD\"");
        assert_eq!(serde_json::to_string(&BulkChoice::AllNew).unwrap(), "\"ALL_NEW\"");
        assert_eq!("NEW".parse::<ResolutionChoice>(), Ok(ResolutionChoice::New));
    }
}
