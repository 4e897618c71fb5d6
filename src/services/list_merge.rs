//! Replays pending list operations onto a base document
//!
//! Every operation is defined as a set operation against the document, so
//! replaying one twice gives the same result as replaying it once (except
//! for a whole-document overwrite). Operations that target lists missing
//! from the base are no-ops, with three exceptions that would otherwise lose
//! local data silently; those are reported as a [`StructuralConflict`].

use crate::models::{
    is_builtin_list, AddLocation, ListDataFull, ListOperation, MusicInfo, UserListInfoFull,
};
use std::collections::HashSet;
use std::fmt;

/// A local operation that cannot be expressed against the base document
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralConflict {
    /// Index of the offending operation in the folded log
    pub op_index: usize,
    pub op_kind: &'static str,
    pub list_id: String,
    pub reason: String,
}

impl fmt::Display for StructuralConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation #{} ({}) on list {}: {}",
            self.op_index, self.op_kind, self.list_id, self.reason
        )
    }
}

/// Result of folding a log onto a base document
#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    Merged(ListDataFull),
    Conflict(StructuralConflict),
}

/// Whether the fold should keep going after an operation
enum Step {
    Continue,
    /// The document was replaced wholesale; later operations are void
    Stop,
}

/// Conflict without its position in the log
struct Collision {
    list_id: String,
    reason: String,
}

impl Collision {
    fn missing_list(list_id: &str, reason: &str) -> Self {
        Self {
            list_id: list_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Applies one operation to a copy of `doc`
pub fn apply_operation(
    doc: &ListDataFull,
    op: &ListOperation,
) -> Result<ListDataFull, StructuralConflict> {
    let mut working = doc.clone();
    match apply_in_place(&mut working, op) {
        Ok(_) => Ok(working),
        Err(collision) => Err(conflict_at(0, op, collision)),
    }
}

/// Folds `ops` in order onto a copy of `base`.
///
/// The first conflicting operation stops the fold; the partially folded
/// document is discarded.
pub fn fold_operations(base: &ListDataFull, ops: &[ListOperation]) -> FoldOutcome {
    let mut working = base.clone();
    for (index, op) in ops.iter().enumerate() {
        match apply_in_place(&mut working, op) {
            Ok(Step::Continue) => {}
            Ok(Step::Stop) => {
                if index + 1 < ops.len() {
                    log::warn!(
                        "[Sync] Document overwrite at #{} voids {} later operations",
                        index,
                        ops.len() - index - 1
                    );
                }
                break;
            }
            Err(collision) => return FoldOutcome::Conflict(conflict_at(index, op, collision)),
        }
    }
    FoldOutcome::Merged(working)
}

fn conflict_at(op_index: usize, op: &ListOperation, collision: Collision) -> StructuralConflict {
    StructuralConflict {
        op_index,
        op_kind: op.kind(),
        list_id: collision.list_id,
        reason: collision.reason,
    }
}

/// Mutates `doc`. Conflicts are detected before anything is touched.
fn apply_in_place(doc: &mut ListDataFull, op: &ListOperation) -> Result<Step, Collision> {
    match op {
        ListOperation::ListDataOverwrite(data) => {
            *doc = data.clone();
            return Ok(Step::Stop);
        }

        ListOperation::ListCreate {
            position,
            list_infos,
        } => {
            let mut position = *position;
            for info in list_infos {
                if is_builtin_list(&info.id) || doc.user_list_index(&info.id).is_some() {
                    continue;
                }
                let at = position.min(doc.user_list.len());
                doc.user_list
                    .insert(at, UserListInfoFull::new(info.clone(), Vec::new()));
                position = at + 1;
            }
        }

        ListOperation::ListRemove(ids) => {
            let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
            doc.user_list.retain(|l| !ids.contains(l.id()));
        }

        ListOperation::ListUpdate(patches) => {
            for patch in patches {
                if !is_builtin_list(&patch.id) && doc.user_list_index(&patch.id).is_none() {
                    return Err(Collision::missing_list(
                        &patch.id,
                        "metadata update for a list removed remotely",
                    ));
                }
            }
            for patch in patches {
                if let Some(list) = doc.user_list_mut(&patch.id) {
                    list.info.apply_patch(patch);
                }
            }
        }

        ListOperation::ListUpdatePosition { position, ids } => {
            move_block(&mut doc.user_list, ids, *position, |l| l.id());
        }

        ListOperation::ListMusicOverwrite {
            list_id,
            music_infos,
        } => match doc.tracks_mut(list_id) {
            Some(tracks) => {
                tracks.clear();
                add_tracks(tracks, music_infos, AddLocation::Bottom);
            }
            None => {
                return Err(Collision::missing_list(
                    list_id,
                    "track overwrite for a list removed remotely",
                ))
            }
        },

        ListOperation::ListMusicAdd {
            id,
            music_infos,
            add_music_location_type,
        } => {
            if let Some(tracks) = doc.tracks_mut(id) {
                add_tracks(tracks, music_infos, *add_music_location_type);
            }
        }

        ListOperation::ListMusicMove {
            from_id,
            to_id,
            music_infos,
            add_music_location_type,
        } => {
            let moved: HashSet<&str> = music_infos.iter().map(|m| m.id.as_str()).collect();
            if !doc.has_list(to_id) {
                let source_holds_tracks = doc
                    .tracks(from_id)
                    .is_some_and(|tracks| tracks.iter().any(|t| moved.contains(t.id.as_str())));
                if source_holds_tracks {
                    return Err(Collision::missing_list(
                        to_id,
                        "track move into a list removed remotely",
                    ));
                }
                return Ok(Step::Continue);
            }
            if let Some(from) = doc.tracks_mut(from_id) {
                from.retain(|t| !moved.contains(t.id.as_str()));
            }
            if let Some(to) = doc.tracks_mut(to_id) {
                add_tracks(to, music_infos, *add_music_location_type);
            }
        }

        ListOperation::ListMusicRemove { list_id, ids } => {
            if let Some(tracks) = doc.tracks_mut(list_id) {
                let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
                tracks.retain(|t| !ids.contains(t.id.as_str()));
            }
        }

        ListOperation::ListMusicUpdate(updates) => {
            for update in updates {
                let Some(tracks) = doc.tracks_mut(&update.id) else {
                    continue;
                };
                if let Some(track) = tracks.iter_mut().find(|t| t.id == update.music_info.id) {
                    track.apply_patch(&update.music_info);
                }
            }
        }

        ListOperation::ListMusicUpdatePosition {
            list_id,
            position,
            ids,
        } => {
            if let Some(tracks) = doc.tracks_mut(list_id) {
                move_block(tracks, ids, *position, |t| t.id.as_str());
            }
        }

        ListOperation::ListMusicClear(ids) => {
            for id in ids {
                if let Some(tracks) = doc.tracks_mut(id) {
                    tracks.clear();
                }
            }
        }
    }

    Ok(Step::Continue)
}

/// Adds tracks whose id is not yet in `tracks` (nor earlier in `incoming`)
fn add_tracks(tracks: &mut Vec<MusicInfo>, incoming: &[MusicInfo], location: AddLocation) {
    let mut seen: HashSet<String> = tracks.iter().map(|t| t.id.clone()).collect();
    let fresh: Vec<MusicInfo> = incoming
        .iter()
        .filter(|t| seen.insert(t.id.clone()))
        .cloned()
        .collect();

    match location {
        AddLocation::Top => {
            tracks.splice(0..0, fresh);
        }
        AddLocation::Bottom => tracks.extend(fresh),
    }
}

/// Takes the items named by `ids` out of `items` (in `ids` order, absent ids
/// ignored) and re-inserts them as one contiguous block at `position`,
/// clamped to the length of what remains.
fn move_block<T>(items: &mut Vec<T>, ids: &[String], position: usize, id_of: impl Fn(&T) -> &str) {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let (mut taken, remaining): (Vec<T>, Vec<T>) =
        items.drain(..).partition(|item| wanted.contains(id_of(item)));

    let mut block = Vec::with_capacity(taken.len());
    for id in ids {
        if let Some(idx) = taken.iter().position(|item| id_of(item) == id.as_str()) {
            block.push(taken.remove(idx));
        }
    }

    *items = remaining;
    let at = position.min(items.len());
    items.splice(at..at, block);
}
