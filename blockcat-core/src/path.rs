//! Materialized category paths and the lookup keys derived from them.
//!
//! A category row stores its position in the taxonomy as up to [`MAX_DEPTH`]
//! optional segments. The tree itself is never stored; a [`LookupKey`] (the
//! occupied prefix of a path) names a node and everything else is derived
//! from prefix comparisons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CategoryError, Result};

pub const MAX_DEPTH: usize = 10;

/// Separator used when rendering a key as text.
pub const SEGMENT_SEPARATOR: &str = " > ";

fn occupied(segment: &Option<String>) -> Option<&str> {
    segment.as_deref().filter(|s| !s.trim().is_empty())
}

/// Fixed-capacity path of a category row. Blank segments count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryPath {
    segments: [Option<String>; MAX_DEPTH],
}

impl CategoryPath {
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = CategoryPath::default();
        for (i, s) in segments.into_iter().enumerate() {
            if i >= MAX_DEPTH {
                return Err(CategoryError::InvalidInput(format!(
                    "category path deeper than {MAX_DEPTH} segments"
                )));
            }
            path.segments[i] = Some(s.into());
        }
        Ok(path)
    }

    /// Build from raw column values, `raw[0]` being segment 1.
    pub fn from_raw(raw: [Option<String>; MAX_DEPTH]) -> Self {
        Self { segments: raw }
    }

    /// Occupied value of 1-based segment `index`.
    pub fn segment(&self, index: usize) -> Option<&str> {
        if index == 0 || index > MAX_DEPTH {
            return None;
        }
        occupied(&self.segments[index - 1])
    }

    /// Raw stored value of 1-based segment `index`, blank or not.
    pub fn raw(&self, index: usize) -> Option<&str> {
        if index == 0 || index > MAX_DEPTH {
            return None;
        }
        self.segments[index - 1].as_deref()
    }

    /// Number of leading occupied segments.
    pub fn depth(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| occupied(s).is_some())
            .count()
    }

    /// No occupied segment follows an absent one.
    pub fn is_contiguous(&self) -> bool {
        let depth = self.depth();
        self.segments[depth..].iter().all(|s| occupied(s).is_none())
    }

    /// Scans segments in order and stops at the first absent one. Contiguity is not checked.
    pub fn lookup_key(&self) -> LookupKey {
        LookupKey {
            segments: self
                .segments
                .iter()
                .map_while(|s| occupied(s).map(str::to_owned))
                .collect(),
        }
    }
}

/// The occupied prefix of a path; identifies one node of the implied tree.
///
/// Ordering is lexicographic over segments, so every key sharing a prefix
/// sorts contiguously right after that prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupKey {
    segments: Vec<String>,
}

impl LookupKey {
    /// The root sentinel: depth 0, parent of every top-level node.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.len() > MAX_DEPTH {
            return Err(CategoryError::InvalidInput(format!(
                "lookup key deeper than {MAX_DEPTH} segments"
            )));
        }
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(CategoryError::InvalidInput(
                "lookup key contains a blank segment".into(),
            ));
        }
        Ok(Self { segments })
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 1-based segment value.
    pub fn segment(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.segments.get(i))
            .map(String::as_str)
    }

    /// Deepest segment; `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn truncated(&self, depth: usize) -> LookupKey {
        LookupKey {
            segments: self.segments[..depth.min(self.depth())].to_vec(),
        }
    }

    /// Key with the deepest segment removed; `None` for the root.
    pub fn parent(&self) -> Option<LookupKey> {
        if self.is_root() {
            None
        } else {
            Some(self.truncated(self.depth() - 1))
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Result<LookupKey> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        LookupKey::new(segments)
    }

    pub fn is_prefix_of(&self, other: &LookupKey) -> bool {
        other.segments.starts_with(&self.segments)
    }

    pub fn is_ancestor_of(&self, other: &LookupKey) -> bool {
        self.depth() < other.depth() && self.is_prefix_of(other)
    }
}

impl From<&CategoryPath> for LookupKey {
    fn from(path: &CategoryPath) -> Self {
        path.lookup_key()
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        f.write_str(&self.segments.join(SEGMENT_SEPARATOR))
    }
}

impl FromStr for LookupKey {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "/" {
            return Ok(LookupKey::root());
        }
        LookupKey::new(s.split('>').map(str::trim))
    }
}
