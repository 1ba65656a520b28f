//! Student enrollment on a course document.
//!
//! Lecture progress and ratings are delegated to [`crate::progress`] and
//! [`crate::rating`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{Course, Enrollment, Progress, StudentIdentity},
    progress, rating, validation,
};

/// Read-only view of a student's progress, derived against the current curriculum.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub completed_lectures: BTreeSet<Uuid>,
    pub total_lectures: usize,
    pub last_accessed: Option<DateTime<Utc>>,
    pub completion_percentage: f64,
    pub next_lecture: Option<Uuid>,
}

pub fn enroll(
    course: &mut Course,
    student: &StudentIdentity,
    paid_amount: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    if !course.is_published() {
        return Err(Error::CourseNotPublished(course.id));
    }
    if course.enrollment(student.id).is_some() {
        return Err(Error::AlreadyEnrolled {
            course_id: course.id,
            student_id: student.id,
        });
    }
    validation::validate_amount("paidAmount", paid_amount)?;

    course.students.push(Enrollment {
        student_id: student.id,
        student_name: student.name.clone(),
        student_email: student.email.clone(),
        paid_amount,
        enrollment_date: now,
        progress: Progress::default(),
    });
    course.updated_at = now;
    Ok(())
}

pub fn unenroll(course: &mut Course, student_id: Uuid, now: DateTime<Utc>) -> Result<Enrollment> {
    let pos = course
        .students
        .iter()
        .position(|e| e.student_id == student_id)
        .ok_or(Error::NotEnrolled {
            course_id: course.id,
            student_id,
        })?;
    course.updated_at = now;
    Ok(course.students.remove(pos))
}

pub fn get_progress(course: &Course, student_id: Uuid) -> Result<ProgressSnapshot> {
    let enrollment = require_enrollment(course, student_id)?;
    let mut progress = enrollment.progress.clone();
    progress::recompute(&mut progress, &course.curriculum);
    Ok(ProgressSnapshot {
        course_id: course.id,
        student_id,
        next_lecture: progress::next_lecture(&progress, &course.curriculum).map(|l| l.id),
        total_lectures: course.curriculum.len(),
        last_accessed: progress.last_accessed,
        completion_percentage: progress.completion_percentage,
        completed_lectures: progress.completed_lectures,
    })
}

pub fn complete_lecture(
    course: &mut Course,
    student_id: Uuid,
    lecture_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    let course_id = course.id;
    let Course {
        curriculum,
        students,
        ..
    } = &mut *course;
    let enrollment = students
        .iter_mut()
        .find(|e| e.student_id == student_id)
        .ok_or(Error::NotEnrolled {
            course_id,
            student_id,
        })?;
    progress::mark_lecture_complete(&mut enrollment.progress, lecture_id, curriculum, now)?;
    course.updated_at = now;
    Ok(())
}

pub fn uncomplete_lecture(
    course: &mut Course,
    student_id: Uuid,
    lecture_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    let course_id = course.id;
    let Course {
        curriculum,
        students,
        ..
    } = &mut *course;
    let enrollment = students
        .iter_mut()
        .find(|e| e.student_id == student_id)
        .ok_or(Error::NotEnrolled {
            course_id,
            student_id,
        })?;
    progress::unmark_lecture_complete(&mut enrollment.progress, lecture_id, curriculum, now);
    course.updated_at = now;
    Ok(())
}

/// Only enrolled students may rate.
pub fn rate_course(
    course: &mut Course,
    student_id: Uuid,
    score: u8,
    review: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    require_enrollment(course, student_id)?;
    rating::submit_rating(course, student_id, score, review, now)
}

pub fn remove_course_rating(course: &mut Course, student_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    rating::remove_rating(course, student_id, now)
}

fn require_enrollment(course: &Course, student_id: Uuid) -> Result<&Enrollment> {
    course.enrollment(student_id).ok_or(Error::NotEnrolled {
        course_id: course.id,
        student_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{course, student};

    #[test]
    fn enroll_once() {
        let mut c = course(4);
        let s = student();
        let now = Utc::now();
        enroll(&mut c, &s, 49.99, now).unwrap();
        let err = enroll(&mut c, &s, 49.99, now).unwrap_err();
        assert!(matches!(err, Error::AlreadyEnrolled { .. }));
        assert_eq!(c.students.len(), 1);

        let e = c.enrollment(s.id).unwrap();
        assert_eq!(e.student_email, s.email);
        assert_eq!(e.enrollment_date, now);
        assert_eq!(e.progress.completion_percentage(&c.curriculum), 0.0);
        assert!(e.progress.completed_lectures().is_empty());
    }

    #[test]
    fn unpublished_course_refuses_enrollment() {
        let mut c = course(1);
        crate::curriculum::unpublish(&mut c, Utc::now());
        let err = enroll(&mut c, &student(), 0.0, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::CourseNotPublished(_)));
        assert!(c.students.is_empty());
    }

    #[test]
    fn progress_through_the_course() {
        let mut c = course(4);
        let s = student();
        let now = Utc::now();
        let ids: Vec<Uuid> = c.curriculum.iter().map(|l| l.id).collect();
        enroll(&mut c, &s, 0.0, now).unwrap();

        complete_lecture(&mut c, s.id, ids[0], now).unwrap();
        complete_lecture(&mut c, s.id, ids[2], now).unwrap();
        let snap = get_progress(&c, s.id).unwrap();
        assert_eq!(snap.completion_percentage, 50.0);
        assert_eq!(snap.next_lecture, Some(ids[1]));
        assert_eq!(snap.total_lectures, 4);

        for id in &ids {
            complete_lecture(&mut c, s.id, *id, now).unwrap();
        }
        assert_eq!(get_progress(&c, s.id).unwrap().completion_percentage, 100.0);

        uncomplete_lecture(&mut c, s.id, ids[3], now).unwrap();
        assert_eq!(get_progress(&c, s.id).unwrap().completion_percentage, 75.0);
    }

    #[test]
    fn progress_changes_touch_the_course() {
        let mut c = course(2);
        let s = student();
        let enrolled = Utc::now();
        enroll(&mut c, &s, 0.0, enrolled).unwrap();
        let lecture = c.curriculum[0].id;

        let later = enrolled + chrono::Duration::minutes(1);
        complete_lecture(&mut c, s.id, lecture, later).unwrap();
        assert_eq!(c.updated_at, later);

        let latest = later + chrono::Duration::minutes(1);
        uncomplete_lecture(&mut c, s.id, lecture, latest).unwrap();
        assert_eq!(c.updated_at, latest);

        // a rejected completion leaves the timestamp alone
        let err = complete_lecture(&mut c, s.id, Uuid::new_v4(), latest + chrono::Duration::minutes(1));
        assert!(matches!(err, Err(Error::LectureNotFound(_))));
        assert_eq!(c.updated_at, latest);
    }

    #[test]
    fn strangers_have_no_progress() {
        let mut c = course(2);
        let lecture = c.curriculum[0].id;
        let stranger = Uuid::new_v4();
        assert!(matches!(get_progress(&c, stranger), Err(Error::NotEnrolled { .. })));
        assert!(matches!(
            complete_lecture(&mut c, stranger, lecture, Utc::now()),
            Err(Error::NotEnrolled { .. })
        ));
        assert!(matches!(
            rate_course(&mut c, stranger, 5, None, Utc::now()),
            Err(Error::NotEnrolled { .. })
        ));
    }

    #[test]
    fn rating_via_enrollment() {
        let mut c = course(1);
        let (a, b) = (student(), student());
        let now = Utc::now();
        enroll(&mut c, &a, 0.0, now).unwrap();
        enroll(&mut c, &b, 0.0, now).unwrap();
        rate_course(&mut c, a.id, 5, Some("great".into()), now).unwrap();
        rate_course(&mut c, b.id, 2, None, now).unwrap();
        assert_eq!(c.average_rating(), 3.5);
        remove_course_rating(&mut c, b.id, now).unwrap();
        assert_eq!(c.average_rating(), 5.0);
    }

    #[test]
    fn unenroll_removes_record() {
        let mut c = course(1);
        let s = student();
        enroll(&mut c, &s, 0.0, Utc::now()).unwrap();
        let removed = unenroll(&mut c, s.id, Utc::now()).unwrap();
        assert_eq!(removed.student_id, s.id);
        assert!(matches!(
            unenroll(&mut c, s.id, Utc::now()),
            Err(Error::NotEnrolled { .. })
        ));
    }

    #[test]
    fn negative_payment_rejected() {
        let mut c = course(1);
        let err = enroll(&mut c, &student(), -5.0, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(c.students.is_empty());
    }
}
