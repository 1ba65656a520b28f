//! Lecture-completion tracking for a single enrollment.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{Lecture, Progress},
};

/// `100 * |completed ∩ curriculum| / |curriculum|`, clamped to [0, 100].
///
/// Ids that are no longer in the curriculum do not count. An empty curriculum
/// yields 0.
pub fn completion_percentage(completed: &BTreeSet<Uuid>, curriculum: &[Lecture]) -> f64 {
    if curriculum.is_empty() {
        return 0.0;
    }
    let done = curriculum
        .iter()
        .filter(|l| completed.contains(&l.id))
        .count();
    (done as f64 / curriculum.len() as f64 * 100.0).clamp(0.0, 100.0)
}

/// Drops ids that left the curriculum and refreshes the percentage.
pub fn recompute(progress: &mut Progress, curriculum: &[Lecture]) {
    progress
        .completed_lectures
        .retain(|id| curriculum.iter().any(|l| l.id == *id));
    progress.completion_percentage = completion_percentage(&progress.completed_lectures, curriculum);
}

/// Idempotent: completing an already-completed lecture only bumps `lastAccessed`.
pub fn mark_lecture_complete(
    progress: &mut Progress,
    lecture_id: Uuid,
    curriculum: &[Lecture],
    now: DateTime<Utc>,
) -> Result<()> {
    if !curriculum.iter().any(|l| l.id == lecture_id) {
        return Err(Error::LectureNotFound(lecture_id));
    }
    progress.completed_lectures.insert(lecture_id);
    progress.last_accessed = Some(now);
    recompute(progress, curriculum);
    Ok(())
}

pub fn unmark_lecture_complete(
    progress: &mut Progress,
    lecture_id: Uuid,
    curriculum: &[Lecture],
    now: DateTime<Utc>,
) {
    progress.completed_lectures.remove(&lecture_id);
    progress.last_accessed = Some(now);
    recompute(progress, curriculum);
}

/// First lecture in curriculum order that has not been completed.
pub fn next_lecture<'a>(progress: &Progress, curriculum: &'a [Lecture]) -> Option<&'a Lecture> {
    curriculum
        .iter()
        .find(|l| !progress.completed_lectures.contains(&l.id))
}
