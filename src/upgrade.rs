//! This module contains the upgrade validator, which compares the layout of an
//! implementation before and after an upgrade.
//!
//! Incompatibilities are reported as data rather than as errors, as choosing to
//! upgrade despite a warning is a legitimate decision for the caller to make.

use std::{
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::layout::{SlotAssignment, StorageLayout};

/// The configuration for the [`Validator`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// The paths of leaves whose removal the caller has signed off on, and that
    /// are hence not breaking when missing from the new layout.
    pub acknowledged_removals: HashSet<String>,
}

impl Config {
    /// Acknowledges the removal of the leaf at `path`.
    #[must_use]
    pub fn with_acknowledged_removal(mut self, path: impl Into<String>) -> Self {
        self.acknowledged_removals.insert(path.into());
        self
    }

    /// Acknowledges the removal of each leaf in `paths`.
    #[must_use]
    pub fn with_acknowledged_removals<S: Into<String>>(
        mut self,
        paths: impl IntoIterator<Item = S>,
    ) -> Self {
        self.acknowledged_removals.extend(paths.into_iter().map(Into::into));
        self
    }
}

/// The kinds of difference between two layouts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// The leaf only exists in the new layout.
    Added,

    /// The leaf only exists in the old layout.
    Removed,

    /// The leaf starts at a different slot or byte offset.
    SlotShifted,

    /// The leaf starts at the same position but has a different width.
    WidthChanged,

    /// The leaf occupies the same bytes but its type is different.
    TypeChanged,
}

impl Display for DiffKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::SlotShifted => "slot shifted",
            Self::WidthChanged => "width changed",
            Self::TypeChanged => "type changed",
        };
        write!(f, "{name}")
    }
}

/// A single difference between two layouts, for the leaf at `path`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiffEntry {
    /// The path of the leaf that differs.
    pub path: String,

    /// How the leaf differs.
    pub kind: DiffKind,

    /// The leaf in the old layout, if it was there.
    pub before: Option<SlotAssignment>,

    /// The leaf in the new layout, if it is there.
    pub after: Option<SlotAssignment>,

    /// Whether the difference makes existing state unreadable after the
    /// upgrade.
    pub breaking: bool,
}

impl Display for DiffEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let position = |a: &Option<SlotAssignment>| {
            a.as_ref().map_or_else(
                || "-".to_string(),
                |a| format!("{}:{}+{}", a.base_slot, a.byte_offset, a.width_bytes),
            )
        };
        write!(
            f,
            "{} {}: {} -> {}",
            if self.breaking { "BREAKING" } else { "ok" },
            self.path,
            position(&self.before),
            position(&self.after)
        )?;
        write!(f, " ({})", self.kind)
    }
}

/// The differences found between two layouts.
///
/// An empty diff means that the layouts are identical. A diff that only
/// contains non-breaking entries means that the upgrade is safe.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LayoutDiff {
    entries: Vec<DiffEntry>,
}

impl LayoutDiff {
    /// Gets every entry of the diff.
    #[must_use]
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    /// Gets the entry for the leaf at `path`, if there is one.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Iterates over the breaking entries of the diff.
    pub fn breaking(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(|e| e.breaking)
    }

    /// Checks whether the upgrade described by the diff keeps every existing
    /// leaf where it was.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.breaking().next().is_none()
    }

    /// Checks whether the layouts are identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets the number of entries in the diff.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serializes the diff as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<'a> IntoIterator for &'a LayoutDiff {
    type IntoIter = std::slice::Iter<'a, DiffEntry>;
    type Item = &'a DiffEntry;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Display for LayoutDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }

        Ok(())
    }
}

/// Compares layouts leaf by leaf, matching leaves by their paths.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    config: Config,
}

impl Validator {
    /// Creates a new validator with the provided `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Gets the validator's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Computes the differences that upgrading from `before` to `after` would
    /// introduce.
    ///
    /// Shared and removed leaves are reported in the order of `before`,
    /// followed by the added leaves in the order of `after`.
    #[must_use]
    pub fn diff(&self, before: &StorageLayout, after: &StorageLayout) -> LayoutDiff {
        let after_by_path: HashMap<&str, &SlotAssignment> =
            after.into_iter().map(|a| (a.path.as_str(), a)).collect();
        let before_paths: HashSet<&str> = before.paths().collect();

        let mut entries = Vec::new();
        for old in before {
            let change = match after_by_path.get(old.path.as_str()) {
                None => {
                    let breaking = !self.config.acknowledged_removals.contains(&old.path);
                    Some(entry(old, DiffKind::Removed, Some(old), None, breaking))
                }
                Some(new) => compare(old, new),
            };
            entries.extend(change);
        }

        // Appending is only safe when nothing that existed before moved.
        let anything_moved = entries.iter().any(|e: &DiffEntry| e.kind != DiffKind::Removed);
        let before_end = before.into_iter().map(SlotAssignment::end).max();
        for new in after {
            if before_paths.contains(new.path.as_str()) {
                continue;
            }

            let appended = before_end.map_or(true, |end| new.start() >= end);
            let breaking = anything_moved || !appended;
            entries.push(entry(new, DiffKind::Added, None, Some(new), breaking));
        }

        for e in entries.iter().filter(|e| e.breaking) {
            warn!(path = %e.path, kind = %e.kind, "breaking layout change");
        }
        debug!(entries = entries.len(), "compared layouts");

        LayoutDiff { entries }
    }
}

/// Computes the differences that upgrading from `before` to `after` would
/// introduce, with no removals acknowledged.
#[must_use]
pub fn diff(before: &StorageLayout, after: &StorageLayout) -> LayoutDiff {
    Validator::default().diff(before, after)
}

fn compare(old: &SlotAssignment, new: &SlotAssignment) -> Option<DiffEntry> {
    let kind = if !old.same_position(new) {
        DiffKind::SlotShifted
    } else if old.width_bytes != new.width_bytes {
        DiffKind::WidthChanged
    } else if old.field.ty != new.field.ty {
        DiffKind::TypeChanged
    } else {
        return None;
    };

    Some(entry(old, kind, Some(old), Some(new), true))
}

fn entry(
    leaf: &SlotAssignment,
    kind: DiffKind,
    before: Option<&SlotAssignment>,
    after: Option<&SlotAssignment>,
    breaking: bool,
) -> DiffEntry {
    DiffEntry {
        path: leaf.path.clone(),
        kind,
        before: before.cloned(),
        after: after.cloned(),
        breaking,
    }
}
