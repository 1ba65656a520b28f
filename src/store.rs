//! Repository seams between the domain and whatever holds the documents.
//!
//! Writes are optimistic: each stored document carries a version, and an
//! update only lands if the caller saw the latest one.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{Attempt, Course, Quiz},
};

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub doc: T,
    pub version: i64,
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn get_course(&self, id: Uuid) -> Result<Option<Versioned<Course>>>;

    async fn insert_course(&self, course: &Course) -> Result<()>;

    /// Replaces the course if its stored version is still `expected`.
    /// Returns the new version, or `VersionConflict`.
    async fn update_course(&self, course: &Course, expected: i64) -> Result<i64>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Versioned<Quiz>>>;

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()>;

    async fn update_quiz(&self, quiz: &Quiz, expected: i64) -> Result<i64>;

    async fn quizzes_for_course(&self, course_id: Uuid) -> Result<Vec<Quiz>>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Attempts by one student on one quiz, ordered by attempt number.
    async fn attempts_for(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<Attempt>>;

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>>;

    /// Fails with `VersionConflict` when the (quiz, student, attempt number)
    /// slot is already taken.
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()>;

    /// Stores the scored form of an attempt. Fails with `AttemptAlreadyScored`
    /// if a submission was recorded first.
    async fn seal_attempt(&self, attempt: &Attempt) -> Result<()>;
}

/// In-process store used by tests and embedded deployments.
#[derive(Default)]
pub struct MemoryStore {
    courses: RwLock<HashMap<Uuid, Versioned<Course>>>,
    quizzes: RwLock<HashMap<Uuid, Versioned<Quiz>>>,
    attempts: RwLock<HashMap<Uuid, Attempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace_versioned<T: Clone>(
    map: &mut HashMap<Uuid, Versioned<T>>,
    entity: &'static str,
    id: Uuid,
    doc: &T,
    expected: i64,
) -> Result<i64> {
    match map.get_mut(&id) {
        None => Err(match entity {
            "quiz" => Error::QuizNotFound(id),
            _ => Error::CourseNotFound(id),
        }),
        Some(current) if current.version != expected => Err(Error::VersionConflict { entity, id }),
        Some(current) => {
            current.doc = doc.clone();
            current.version += 1;
            Ok(current.version)
        }
    }
}

#[async_trait]
impl CourseRepository for MemoryStore {
    async fn get_course(&self, id: Uuid) -> Result<Option<Versioned<Course>>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }

    async fn insert_course(&self, course: &Course) -> Result<()> {
        let mut courses = self.courses.write().await;
        if courses.contains_key(&course.id) {
            return Err(Error::VersionConflict {
                entity: "course",
                id: course.id,
            });
        }
        courses.insert(
            course.id,
            Versioned {
                doc: course.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn update_course(&self, course: &Course, expected: i64) -> Result<i64> {
        let mut courses = self.courses.write().await;
        replace_versioned(&mut courses, "course", course.id, course, expected)
    }
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Versioned<Quiz>>> {
        Ok(self.quizzes.read().await.get(&id).cloned())
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        let mut quizzes = self.quizzes.write().await;
        if quizzes.contains_key(&quiz.id) {
            return Err(Error::VersionConflict {
                entity: "quiz",
                id: quiz.id,
            });
        }
        quizzes.insert(
            quiz.id,
            Versioned {
                doc: quiz.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn update_quiz(&self, quiz: &Quiz, expected: i64) -> Result<i64> {
        let mut quizzes = self.quizzes.write().await;
        replace_versioned(&mut quizzes, "quiz", quiz.id, quiz, expected)
    }

    async fn quizzes_for_course(&self, course_id: Uuid) -> Result<Vec<Quiz>> {
        let quizzes = self.quizzes.read().await;
        let mut found: Vec<Quiz> = quizzes
            .values()
            .filter(|v| v.doc.course_id == course_id)
            .map(|v| v.doc.clone())
            .collect();
        found.sort_by_key(|q| q.created_at);
        Ok(found)
    }
}

#[async_trait]
impl AttemptRepository for MemoryStore {
    async fn attempts_for(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<Attempt>> {
        let attempts = self.attempts.read().await;
        let mut found: Vec<Attempt> = attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.attempt_number);
        Ok(found)
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        Ok(self.attempts.read().await.get(&id).cloned())
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        let taken = attempts.values().any(|a| {
            a.quiz_id == attempt.quiz_id
                && a.student_id == attempt.student_id
                && a.attempt_number == attempt.attempt_number
        });
        if taken || attempts.contains_key(&attempt.id) {
            return Err(Error::VersionConflict {
                entity: "attempt",
                id: attempt.quiz_id,
            });
        }
        attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn seal_attempt(&self, attempt: &Attempt) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        let stored = attempts
            .get_mut(&attempt.id)
            .ok_or(Error::AttemptNotFound(attempt.id))?;
        if stored.is_scored() {
            return Err(Error::AttemptAlreadyScored(attempt.id));
        }
        *stored = attempt.clone();
        Ok(())
    }
}
