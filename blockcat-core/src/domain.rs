// blockcat_core/src/domain.rs
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CategoryError;
use crate::path::{CategoryPath, LookupKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted taxonomy entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: CategoryId,
    pub display_name: String,
    pub path: CategoryPath,
    pub blocked_url_count: u64,
    pub block_count: u64,
}

impl CategoryRow {
    pub fn lookup_key(&self) -> LookupKey {
        self.path.lookup_key()
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// Import-time check: at least one segment, no gaps, counts within [`MAX_COUNT`].
    pub fn validate(&self) -> Result<(), CategoryError> {
        if self.depth() == 0 {
            return Err(CategoryError::InvalidInput(format!(
                "category {} has an empty path",
                self.id
            )));
        }
        if !self.path.is_contiguous() {
            return Err(CategoryError::InvalidInput(format!(
                "category {} has a gap in its path",
                self.id
            )));
        }
        for count in [self.blocked_url_count, self.block_count] {
            if count > MAX_COUNT {
                return Err(CategoryError::InvalidInput(format!(
                    "category {} has count {count} out of range",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn counts(&self) -> Counts {
        Counts {
            blocked_url_count_total: self.blocked_url_count,
            block_count_total: self.block_count,
        }
    }
}

/// Largest count a row or a subtree total may carry; SQLite stores signed 64-bit integers.
pub const MAX_COUNT: u64 = i64::MAX as u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub blocked_url_count_total: u64,
    pub block_count_total: u64,
}

impl Counts {
    /// `None` when either total would pass [`MAX_COUNT`].
    pub fn checked_add(self, rhs: Counts) -> Option<Counts> {
        let bounded = |a: u64, b: u64| a.checked_add(b).filter(|v| *v <= MAX_COUNT);
        Some(Counts {
            blocked_url_count_total: bounded(
                self.blocked_url_count_total,
                rhs.blocked_url_count_total,
            )?,
            block_count_total: bounded(self.block_count_total, rhs.block_count_total)?,
        })
    }
}

// Saturates at MAX_COUNT; stores use checked_add to report overflow instead.
impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Counts) -> Counts {
        let sat = |a: u64, b: u64| a.saturating_add(b).min(MAX_COUNT);
        Counts {
            blocked_url_count_total: sat(self.blocked_url_count_total, rhs.blocked_url_count_total),
            block_count_total: sat(self.block_count_total, rhs.block_count_total),
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

impl Sum for Counts {
    fn sum<I: Iterator<Item = Counts>>(iter: I) -> Counts {
        iter.fold(Counts::default(), Add::add)
    }
}

/// A node of the implied tree, re-derived from the base rows on every query.
///
/// `id`, `display_name` and `name` come from the representative row; `totals`
/// covers every row under `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedNode {
    pub id: CategoryId,
    pub display_name: String,
    pub name: String,
    pub key: LookupKey,
    pub totals: Counts,
}

/// Backend answer for one group of a [`crate::query::NodeQuery`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeGroup {
    pub node: AggregatedNode,
    /// Rows ending exactly at the node's depth. More than one is a data anomaly.
    pub materialized_rows: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    Root,
    Node(CategoryId),
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => f.write_str("0"),
            ParentRef::Node(id) => write!(f, "{id}"),
        }
    }
}

/// Several rows claim the same node; resolved by the `(display_name, id)` tie-break.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixCollision {
    pub key: LookupKey,
    pub rows: u64,
    pub groups: usize,
    pub chosen: CategoryId,
    pub chosen_display_name: String,
}

impl fmt::Display for PrefixCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows == 0 {
            return write!(
                f,
                "no row ends at node \"{}\"; chose descendant {} (\"{}\")",
                self.key, self.chosen, self.chosen_display_name
            );
        }
        write!(
            f,
            "{} rows in {} group(s) claim node \"{}\"; chose {} (\"{}\")",
            self.rows, self.groups, self.key, self.chosen, self.chosen_display_name
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedUrl {
    pub url: String,
    /// Distinct networks whose latest result for this URL is `blocked`.
    pub networks: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Ok,
    Blocked,
    Timeout,
    Error,
    DnsFail,
}

impl BlockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockStatus::Ok => "ok",
            BlockStatus::Blocked => "blocked",
            BlockStatus::Timeout => "timeout",
            BlockStatus::Error => "error",
            BlockStatus::DnsFail => "dnsfail",
        }
    }
}

impl FromStr for BlockStatus {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(BlockStatus::Ok),
            "blocked" => Ok(BlockStatus::Blocked),
            "timeout" => Ok(BlockStatus::Timeout),
            "error" => Ok(BlockStatus::Error),
            "dnsfail" => Ok(BlockStatus::DnsFail),
            other => Err(CategoryError::InvalidInput(format!(
                "unknown block status \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
