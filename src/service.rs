//! Application service: load a document, apply a pure domain operation,
//! write it back.
//!
//! Course and quiz writes are optimistic. When a write loses a race the
//! operation is replayed on the freshly loaded document, so every derived
//! field is recomputed from the latest state before it is stored.

use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    curriculum, enrollment,
    enrollment::ProgressSnapshot,
    error::{Error, Result},
    models::{
        Attempt, Course, Enrollment, NewCourse, NewLecture, NewQuestion, NewQuiz, Question, Quiz,
        QuizSummary, StudentIdentity,
    },
    quiz::{self, AttemptStatus},
    rating::{self, RatingSummary},
    store::{AttemptRepository, CourseRepository, QuizRepository, Versioned},
    validation,
};

#[derive(Clone)]
pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
    config: ServiceConfig,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            courses,
            quizzes,
            attempts,
            config,
        }
    }

    /// Uses one store for all three repositories.
    pub fn with_store<S>(store: Arc<S>, config: ServiceConfig) -> Self
    where
        S: CourseRepository + QuizRepository + AttemptRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    // --- courses ---

    #[tracing::instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create_course(&self, req: NewCourse) -> Result<Course> {
        let course = Course::new(req, Utc::now())?;
        self.courses.insert_course(&course).await?;
        tracing::info!(course_id = %course.id, "course created");
        Ok(course)
    }

    pub async fn get_course(&self, course_id: Uuid) -> Result<Course> {
        Ok(self.load_course(course_id).await?.doc)
    }

    #[tracing::instrument(skip(self, req))]
    pub async fn add_lecture(
        &self,
        course_id: Uuid,
        req: NewLecture,
        position: Option<usize>,
    ) -> Result<Uuid> {
        let (_, lecture_id) = self
            .mutate_course(course_id, |c, now| {
                curriculum::add_lecture(c, req.clone(), position, now)
            })
            .await?;
        Ok(lecture_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_lecture(&self, course_id: Uuid, lecture_id: Uuid) -> Result<Course> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| curriculum::remove_lecture(c, lecture_id, now))
            .await?;
        Ok(course)
    }

    pub async fn move_lecture(
        &self,
        course_id: Uuid,
        lecture_id: Uuid,
        position: usize,
    ) -> Result<Course> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                curriculum::move_lecture(c, lecture_id, position, now)
            })
            .await?;
        Ok(course)
    }

    #[tracing::instrument(skip(self))]
    pub async fn publish_course(&self, course_id: Uuid) -> Result<Course> {
        let (course, _) = self
            .mutate_course(course_id, curriculum::publish)
            .await?;
        tracing::info!(%course_id, "course published");
        Ok(course)
    }

    pub async fn unpublish_course(&self, course_id: Uuid) -> Result<Course> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                curriculum::unpublish(c, now);
                Ok(())
            })
            .await?;
        Ok(course)
    }

    // --- enrollment and progress ---

    #[tracing::instrument(skip(self, student), fields(student_id = %student.id))]
    pub async fn enroll(
        &self,
        course_id: Uuid,
        student: &StudentIdentity,
        paid_amount: f64,
    ) -> Result<Enrollment> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                enrollment::enroll(c, student, paid_amount, now)
            })
            .await?;
        tracing::info!(%course_id, student_id = %student.id, "student enrolled");
        course
            .enrollment(student.id)
            .cloned()
            .ok_or(Error::NotEnrolled {
                course_id,
                student_id: student.id,
            })
    }

    #[tracing::instrument(skip(self))]
    pub async fn unenroll(&self, course_id: Uuid, student_id: Uuid) -> Result<Enrollment> {
        let (_, removed) = self
            .mutate_course(course_id, |c, now| enrollment::unenroll(c, student_id, now))
            .await?;
        Ok(removed)
    }

    pub async fn progress(&self, course_id: Uuid, student_id: Uuid) -> Result<ProgressSnapshot> {
        let course = self.load_course(course_id).await?.doc;
        enrollment::get_progress(&course, student_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_lecture(
        &self,
        course_id: Uuid,
        student_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<ProgressSnapshot> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                enrollment::complete_lecture(c, student_id, lecture_id, now)
            })
            .await?;
        enrollment::get_progress(&course, student_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn uncomplete_lecture(
        &self,
        course_id: Uuid,
        student_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<ProgressSnapshot> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                enrollment::uncomplete_lecture(c, student_id, lecture_id, now)
            })
            .await?;
        enrollment::get_progress(&course, student_id)
    }

    // --- ratings ---

    #[tracing::instrument(skip(self, review))]
    pub async fn rate_course(
        &self,
        course_id: Uuid,
        student_id: Uuid,
        score: u8,
        review: Option<String>,
    ) -> Result<RatingSummary> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                enrollment::rate_course(c, student_id, score, review.clone(), now)
            })
            .await?;
        Ok(rating::rating_summary(&course))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_rating(&self, course_id: Uuid, student_id: Uuid) -> Result<RatingSummary> {
        let (course, _) = self
            .mutate_course(course_id, |c, now| {
                enrollment::remove_course_rating(c, student_id, now)
            })
            .await?;
        Ok(rating::rating_summary(&course))
    }

    pub async fn rating_summary(&self, course_id: Uuid) -> Result<RatingSummary> {
        let course = self.load_course(course_id).await?.doc;
        Ok(rating::rating_summary(&course))
    }

    // --- quizzes ---

    #[tracing::instrument(skip(self, req), fields(course_id = %req.course_id, title = %req.title))]
    pub async fn create_quiz(&self, req: NewQuiz) -> Result<Quiz> {
        let course = self.load_course(req.course_id).await?.doc;
        if let Some(lecture_id) = req.lecture_id {
            if course.lecture(lecture_id).is_none() {
                return Err(Error::LectureNotFound(lecture_id));
            }
        }
        let quiz = Quiz::new(req, Utc::now())?;
        self.quizzes.insert_quiz(&quiz).await?;
        tracing::info!(quiz_id = %quiz.id, questions = quiz.questions.len(), "quiz created");
        Ok(quiz)
    }

    pub async fn get_quiz(&self, quiz_id: Uuid) -> Result<QuizSummary> {
        Ok(self.load_quiz(quiz_id).await?.doc.summary())
    }

    pub async fn course_quizzes(&self, course_id: Uuid) -> Result<Vec<QuizSummary>> {
        let quizzes = self.quizzes.quizzes_for_course(course_id).await?;
        Ok(quizzes.iter().map(Quiz::summary).collect())
    }

    pub async fn add_question(&self, quiz_id: Uuid, req: NewQuestion) -> Result<QuizSummary> {
        let quiz = self
            .mutate_quiz(quiz_id, |q, now| {
                q.questions.push(Question::new(req.clone())?);
                validation::validate_quiz(q)?;
                q.updated_at = now;
                Ok(())
            })
            .await?;
        Ok(quiz.summary())
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_quiz_published(&self, quiz_id: Uuid, published: bool) -> Result<QuizSummary> {
        let quiz = self
            .mutate_quiz(quiz_id, |q, now| {
                validation::validate_quiz(q)?;
                q.is_published = published;
                q.updated_at = now;
                Ok(())
            })
            .await?;
        Ok(quiz.summary())
    }

    pub async fn quiz_status(&self, quiz_id: Uuid, student_id: Uuid) -> Result<AttemptStatus> {
        let quiz = self.load_quiz(quiz_id).await?.doc;
        let history = self.attempts.attempts_for(quiz_id, student_id).await?;
        Ok(quiz::attempt_status(&quiz, student_id, &history))
    }

    pub async fn attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<Attempt>> {
        self.attempts.attempts_for(quiz_id, student_id).await
    }

    /// Opens the student's next attempt. Concurrent starts race on the
    /// attempt-number slot; the loser re-reads the history and re-checks
    /// the attempt cap.
    #[tracing::instrument(skip(self))]
    pub async fn start_attempt(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Attempt> {
        let quiz = self.load_quiz(quiz_id).await?.doc;
        let course = self.load_course(quiz.course_id).await?.doc;
        if course.enrollment(student_id).is_none() {
            return Err(Error::NotEnrolled {
                course_id: course.id,
                student_id,
            });
        }

        let mut retries = 0;
        loop {
            let history = self.attempts.attempts_for(quiz_id, student_id).await?;
            let attempt = quiz::start_attempt(&quiz, student_id, &history, Utc::now())?;
            match self.attempts.insert_attempt(&attempt).await {
                Ok(()) => {
                    tracing::info!(attempt_id = %attempt.id, number = attempt.attempt_number, "attempt started");
                    return Ok(attempt);
                }
                Err(e) if e.is_retryable() && retries < self.config.write_retries => {
                    retries += 1;
                    tracing::warn!(retries, "attempt slot taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[tracing::instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn submit_attempt(
        &self,
        attempt_id: Uuid,
        answers: BTreeMap<Uuid, String>,
    ) -> Result<Attempt> {
        let attempt = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;
        let quiz = self.load_quiz(attempt.quiz_id).await?.doc;
        let sealed = quiz::score_attempt(&quiz, &attempt, answers, Utc::now())?;
        self.attempts.seal_attempt(&sealed).await?;
        if let Some(s) = sealed.submission() {
            tracing::info!(
                percentage = s.percentage,
                outcome = ?s.outcome,
                late = s.late,
                "attempt scored"
            );
        }
        Ok(sealed)
    }

    // --- helpers ---

    /// Stored derived fields are rebuilt on every load, so a stale document
    /// never leaks out of the service.
    async fn load_course(&self, course_id: Uuid) -> Result<Versioned<Course>> {
        let mut loaded = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(Error::CourseNotFound(course_id))?;
        loaded.doc.refresh_derived();
        Ok(loaded)
    }

    async fn load_quiz(&self, quiz_id: Uuid) -> Result<Versioned<Quiz>> {
        self.quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(Error::QuizNotFound(quiz_id))
    }

    async fn mutate_course<T, F>(&self, course_id: Uuid, op: F) -> Result<(Course, T)>
    where
        F: Fn(&mut Course, DateTime<Utc>) -> Result<T>,
    {
        let mut retries = 0;
        loop {
            let Versioned { mut doc, version } = self.load_course(course_id).await?;
            let out = op(&mut doc, Utc::now())?;
            doc.refresh_derived();
            match self.courses.update_course(&doc, version).await {
                Ok(_) => return Ok((doc, out)),
                Err(e) if e.is_retryable() && retries < self.config.write_retries => {
                    retries += 1;
                    tracing::warn!(%course_id, retries, "course changed underneath us, replaying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn mutate_quiz<F>(&self, quiz_id: Uuid, op: F) -> Result<Quiz>
    where
        F: Fn(&mut Quiz, DateTime<Utc>) -> Result<()>,
    {
        let mut retries = 0;
        loop {
            let Versioned { mut doc, version } = self.load_quiz(quiz_id).await?;
            op(&mut doc, Utc::now())?;
            match self.quizzes.update_quiz(&doc, version).await {
                Ok(_) => return Ok(doc),
                Err(e) if e.is_retryable() && retries < self.config.write_retries => {
                    retries += 1;
                    tracing::warn!(%quiz_id, retries, "quiz changed underneath us, replaying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
