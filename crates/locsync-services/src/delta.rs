//! Per-key classification of one bucket file for one target locale.

use std::collections::BTreeSet;

use locsync_core::{checksum, ChecksumMap, KeyMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
    /// `(old key, new key)` pairs.
    pub renamed: Vec<(String, String)>,
    /// Source keys that need no work.
    pub complete: usize,
    /// The target could not be read; every source key was classified as added.
    pub target_missing: bool,
}

impl Delta {
    /// Keys the localizer (or a rename) has to produce a value for.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<&str> = self.added.iter().map(String::as_str).collect();
        keys.extend(self.updated.iter().map(String::as_str));
        keys.extend(self.renamed.iter().map(|(_, new)| new.as_str()));
        keys.into_iter().map(str::to_string).collect()
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && self.renamed.is_empty())
    }
}

/// Compare `source` against `target` (`None` when it could not be read) and the
/// checksums recorded at the last successful sync of this file.
///
/// "Updated" is decided against the recorded checksum only: a key counts as
/// updated when a checksum was recorded for it and the current source value
/// hashes differently. Keys with no record are trusted when the target has them.
pub fn compute_delta(source: &KeyMap, target: Option<&KeyMap>, recorded: Option<&ChecksumMap>) -> Delta {
    let Some(target) = target else {
        return Delta {
            added: source.keys().cloned().collect(),
            target_missing: true,
            ..Default::default()
        };
    };
    let empty = ChecksumMap::new();
    let recorded = recorded.unwrap_or(&empty);

    let mut added: Vec<String> = source
        .keys()
        .filter(|k| !target.contains_key(*k))
        .cloned()
        .collect();
    let mut removed: Vec<String> = target
        .keys()
        .filter(|k| !source.contains_key(*k))
        .cloned()
        .collect();

    let mut renamed = Vec::new();
    added.retain(|new_key| {
        let wanted = checksum(&source[new_key]);
        let hit = removed.iter().position(|old_key| match recorded.get(old_key) {
            Some(sum) => *sum == wanted,
            None => checksum(&target[old_key]) == wanted,
        });
        match hit {
            Some(idx) => {
                renamed.push((removed.remove(idx), new_key.clone()));
                false
            }
            None => true,
        }
    });

    let changed = |key: &String| {
        recorded
            .get(key)
            .is_some_and(|sum| *sum != checksum(&source[key]))
    };
    let mut updated: Vec<String> = source
        .keys()
        .filter(|k| target.contains_key(*k) && changed(k))
        .cloned()
        .collect();
    added.retain(|k| {
        if changed(k) {
            updated.push(k.clone());
            false
        } else {
            true
        }
    });
    updated.sort();

    let complete = source.len() - added.len() - updated.len() - renamed.len();
    Delta {
        added,
        removed,
        updated,
        renamed,
        complete,
        target_missing: false,
    }
}
