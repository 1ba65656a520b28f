//! Instructor-side course edits: lectures and publication.
//!
//! Every edit that changes the curriculum refreshes `totalHours` and the
//! progress of every enrolled student before returning.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{Course, Lecture, NewLecture},
    progress,
};

pub fn total_hours(curriculum: &[Lecture]) -> f64 {
    let minutes: u64 = curriculum.iter().map(|l| u64::from(l.duration)).sum();
    minutes as f64 / 60.0
}

pub(crate) fn recompute(course: &mut Course) {
    course.total_hours = total_hours(&course.curriculum);
    for enrollment in &mut course.students {
        progress::recompute(&mut enrollment.progress, &course.curriculum);
    }
}

/// Inserts a lecture at `position` (appends when `None` or past the end).
pub fn add_lecture(
    course: &mut Course,
    req: NewLecture,
    position: Option<usize>,
    now: DateTime<Utc>,
) -> Result<Uuid> {
    let lecture = Lecture::new(req, now)?;
    let id = lecture.id;
    let at = position
        .unwrap_or(course.curriculum.len())
        .min(course.curriculum.len());
    course.curriculum.insert(at, lecture);
    recompute(course);
    course.updated_at = now;
    tracing::debug!(course_id = %course.id, lecture_id = %id, position = at, "lecture added");
    Ok(id)
}

pub fn remove_lecture(course: &mut Course, lecture_id: Uuid, now: DateTime<Utc>) -> Result<Lecture> {
    let pos = course
        .curriculum
        .iter()
        .position(|l| l.id == lecture_id)
        .ok_or(Error::LectureNotFound(lecture_id))?;
    let removed = course.curriculum.remove(pos);
    recompute(course);
    course.updated_at = now;
    Ok(removed)
}

pub fn move_lecture(
    course: &mut Course,
    lecture_id: Uuid,
    position: usize,
    now: DateTime<Utc>,
) -> Result<()> {
    let from = course
        .curriculum
        .iter()
        .position(|l| l.id == lecture_id)
        .ok_or(Error::LectureNotFound(lecture_id))?;
    let lecture = course.curriculum.remove(from);
    let to = position.min(course.curriculum.len());
    course.curriculum.insert(to, lecture);
    course.updated_at = now;
    Ok(())
}

/// Publishing an empty course is refused.
pub fn publish(course: &mut Course, now: DateTime<Utc>) -> Result<()> {
    if course.curriculum.is_empty() {
        return Err(Error::validation(
            "a course needs at least one lecture before it can be published",
        ));
    }
    course.is_published = true;
    course.updated_at = now;
    Ok(())
}

pub fn unpublish(course: &mut Course, now: DateTime<Utc>) {
    course.is_published = false;
    course.updated_at = now;
}
