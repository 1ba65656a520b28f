//! Error types shared by the domain modules, repositories and service.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping callers use to pick a response (status code, message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Policy,
    Storage,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("course {0} not found")]
    CourseNotFound(Uuid),
    #[error("lecture {0} is not part of the curriculum")]
    LectureNotFound(Uuid),
    #[error("quiz {0} not found")]
    QuizNotFound(Uuid),
    #[error("attempt {0} not found")]
    AttemptNotFound(Uuid),
    #[error("student {student_id} is not enrolled in course {course_id}")]
    NotEnrolled { course_id: Uuid, student_id: Uuid },
    #[error("user {user_id} has no rating on course {course_id}")]
    RatingNotFound { course_id: Uuid, user_id: Uuid },

    #[error("student {student_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled { course_id: Uuid, student_id: Uuid },
    #[error("all {max_attempts} attempts used for quiz {quiz_id}")]
    AttemptsExhausted { quiz_id: Uuid, max_attempts: u32 },
    #[error("attempt {0} has already been scored")]
    AttemptAlreadyScored(Uuid),
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("course {0} is not published")]
    CourseNotPublished(Uuid),
    #[error("quiz {0} is not published")]
    QuizNotPublished(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Error::Validation(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::CourseNotFound(_)
            | Error::LectureNotFound(_)
            | Error::QuizNotFound(_)
            | Error::AttemptNotFound(_)
            | Error::NotEnrolled { .. }
            | Error::RatingNotFound { .. } => ErrorCategory::NotFound,
            Error::AlreadyEnrolled { .. }
            | Error::AttemptsExhausted { .. }
            | Error::AttemptAlreadyScored(_)
            | Error::VersionConflict { .. } => ErrorCategory::Conflict,
            Error::CourseNotPublished(_) | Error::QuizNotPublished(_) => ErrorCategory::Policy,
            Error::Database(_) | Error::Serialization(_) => ErrorCategory::Storage,
        }
    }

    /// Whether the service should reload the document and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let id = Uuid::new_v4();
        assert_eq!(Error::validation("x").category(), ErrorCategory::Validation);
        assert_eq!(Error::LectureNotFound(id).category(), ErrorCategory::NotFound);
        assert_eq!(
            Error::AttemptsExhausted { quiz_id: id, max_attempts: 3 }.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(Error::QuizNotPublished(id).category(), ErrorCategory::Policy);
        assert!(Error::VersionConflict { entity: "course", id }.is_retryable());
        assert!(!Error::AttemptAlreadyScored(id).is_retryable());
    }
}
