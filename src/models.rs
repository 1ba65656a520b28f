use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::{curriculum, error::Result, progress, rating, validation};

pub const DEFAULT_PASSING_SCORE: u8 = 70;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub instructor: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub image: String,
    pub category: String,
    pub level: Level,
    pub primary_language: String,
    pub welcome_message: Option<String>,
    pub playlist_link: Option<String>,
    pub pricing: f64,
    pub objectives: Vec<String>,
    pub tags: Vec<String>,
    pub curriculum: Vec<Lecture>,
    pub students: Vec<Enrollment>,
    pub ratings: Vec<Rating>,
    // stored copies of derived values; the accessors never read them
    pub(crate) average_rating: f64,
    pub(crate) total_hours: f64,
    pub(crate) is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub instructor: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub pricing: f64,
    pub subtitle: Option<String>,
    pub primary_language: Option<String>,
    pub welcome_message: Option<String>,
    pub playlist_link: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Course {
    /// Builds an unpublished course with an empty curriculum.
    pub fn new(req: NewCourse, now: DateTime<Utc>) -> Result<Self> {
        validation::validate_new_course(&req)?;
        Ok(Course {
            id: Uuid::new_v4(),
            instructor: req.instructor,
            title: req.title.trim().to_string(),
            subtitle: req.subtitle,
            description: req.description,
            image: req.image,
            category: req.category.trim().to_string(),
            level: req.level,
            primary_language: req
                .primary_language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            welcome_message: req.welcome_message,
            playlist_link: req.playlist_link,
            pricing: req.pricing,
            objectives: req.objectives,
            tags: req.tags,
            curriculum: Vec::new(),
            students: Vec::new(),
            ratings: Vec::new(),
            average_rating: 0.0,
            total_hours: 0.0,
            is_published: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn average_rating(&self) -> f64 {
        rating::average_rating(&self.ratings)
    }

    pub fn total_hours(&self) -> f64 {
        curriculum::total_hours(&self.curriculum)
    }

    /// Rewrites the stored derived fields (`averageRating`, `totalHours` and
    /// every enrollment's progress) from the current collections.
    pub fn refresh_derived(&mut self) {
        rating::recompute(self);
        curriculum::recompute(self);
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn lecture(&self, lecture_id: Uuid) -> Option<&Lecture> {
        self.curriculum.iter().find(|l| l.id == lecture_id)
    }

    pub fn enrollment(&self, student_id: Uuid) -> Option<&Enrollment> {
        self.students.iter().find(|e| e.student_id == student_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub video_url: String,
    /// Minutes.
    pub duration: u32,
    pub description: Option<String>,
    pub resources: Vec<Resource>,
    pub is_free_preview: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewLecture {
    pub title: String,
    pub video_url: String,
    pub duration: u32,
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub is_free_preview: bool,
}

impl Lecture {
    pub fn new(req: NewLecture, now: DateTime<Utc>) -> Result<Self> {
        validation::validate_new_lecture(&req)?;
        Ok(Lecture {
            id: Uuid::new_v4(),
            title: req.title.trim().to_string(),
            video_url: req.video_url,
            duration: req.duration,
            description: req.description,
            resources: req.resources,
            is_free_preview: req.is_free_preview,
            created_at: now,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub paid_amount: f64,
    pub enrollment_date: DateTime<Utc>,
    pub progress: Progress,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub(crate) completed_lectures: BTreeSet<Uuid>,
    pub(crate) last_accessed: Option<DateTime<Utc>>,
    pub(crate) completion_percentage: f64,
}

impl Progress {
    pub fn completed_lectures(&self) -> &BTreeSet<Uuid> {
        &self.completed_lectures
    }

    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    /// Percentage of `curriculum` covered by the completed set.
    pub fn completion_percentage(&self, curriculum: &[Lecture]) -> f64 {
        progress::completion_percentage(&self.completed_lectures, curriculum)
    }
}

/// Already-verified identity of the student, snapshotted on enrollment.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub user_id: Uuid,
    pub rating: u8,
    pub review: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub lecture_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub passing_score: u8,
    /// Minutes.
    pub time_limit: Option<u32>,
    pub max_attempts: u32,
    pub is_published: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewQuiz {
    pub course_id: Uuid,
    pub lecture_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
    pub passing_score: Option<u8>,
    pub time_limit: Option<u32>,
    pub max_attempts: Option<u32>,
    pub created_by: Uuid,
}

impl Quiz {
    /// Builds an unpublished quiz, applying the default passing score and attempt cap.
    pub fn new(req: NewQuiz, now: DateTime<Utc>) -> Result<Self> {
        let questions = req
            .questions
            .into_iter()
            .map(Question::new)
            .collect::<Result<Vec<_>>>()?;
        let quiz = Quiz {
            id: Uuid::new_v4(),
            course_id: req.course_id,
            lecture_id: req.lecture_id,
            title: req.title.trim().to_string(),
            description: req.description,
            questions,
            passing_score: req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
            time_limit: req.time_limit,
            max_attempts: req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            is_published: false,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        validation::validate_quiz(&quiz)?;
        Ok(quiz)
    }

    /// Saturates at `u32::MAX`; `validate_quiz` keeps real quizzes far below it.
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |total, q| total.saturating_add(q.points))
    }

    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            course_id: self.course_id,
            lecture_id: self.lecture_id,
            title: self.title.clone(),
            question_count: self.questions.len(),
            total_points: self.total_points(),
            passing_score: self.passing_score,
            time_limit: self.time_limit,
            max_attempts: self.max_attempts,
            is_published: self.is_published,
        }
    }
}

/// Serialized view of a quiz carrying its derived point total.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: Uuid,
    pub course_id: Uuid,
    pub lecture_id: Option<Uuid>,
    pub title: String,
    pub question_count: usize,
    pub total_points: u32,
    pub passing_score: u8,
    pub time_limit: Option<u32>,
    pub max_attempts: u32,
    pub is_published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: Option<u32>,
}

impl Question {
    pub fn new(req: NewQuestion) -> Result<Self> {
        let question = Question {
            id: Uuid::new_v4(),
            question: req.question,
            options: req.options,
            correct_answer: req.correct_answer,
            explanation: req.explanation,
            points: req.points.unwrap_or(1),
        };
        validation::validate_question(&question)?;
        Ok(question)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub(crate) submission: Option<Submission>,
}

impl Attempt {
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn is_scored(&self) -> bool {
        self.submission.is_some()
    }

    pub fn passed(&self) -> bool {
        matches!(&self.submission, Some(s) if s.outcome == Outcome::Passed)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub answers: BTreeMap<Uuid, String>,
    pub breakdown: Vec<AnswerResult>,
    pub score: u32,
    pub total_points: u32,
    pub percentage: f64,
    pub outcome: Outcome,
    pub late: bool,
    pub submitted_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub question_id: Uuid,
    pub given: Option<String>,
    pub is_correct: bool,
    pub points_earned: u32,
    pub explanation: Option<String>,
}
