//! Field-level checks applied by the constructors in [`crate::models`] and by
//! the curriculum and quiz editors.
//!
//! Every check runs before anything is mutated, so a failed validation never
//! leaves a half-built document behind.

use crate::{
    error::{Error, Result},
    models::{NewCourse, NewLecture, Question, Quiz},
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_REVIEW_LEN: usize = 5000;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_QUESTION_POINTS: u32 = 1000;

/// Rejects empty (after trimming) or overlong values.
pub fn validate_required(field: &str, value: &str, max_len: usize) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

pub fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

pub fn validate_new_course(req: &NewCourse) -> Result<()> {
    validate_required("title", &req.title, MAX_TITLE_LEN)?;
    validate_required("description", &req.description, usize::MAX)?;
    validate_required("image", &req.image, usize::MAX)?;
    validate_required("category", &req.category, MAX_TITLE_LEN)?;
    validate_amount("pricing", req.pricing)?;
    Ok(())
}

pub fn validate_new_lecture(req: &NewLecture) -> Result<()> {
    validate_required("lecture title", &req.title, MAX_TITLE_LEN)?;
    validate_required("videoUrl", &req.video_url, usize::MAX)?;
    for resource in &req.resources {
        validate_required("resource title", &resource.title, MAX_TITLE_LEN)?;
        validate_required("resource url", &resource.url, usize::MAX)?;
    }
    Ok(())
}

pub fn validate_rating_score(score: u8) -> Result<()> {
    if !(1..=5).contains(&score) {
        return Err(Error::validation(format!(
            "rating must be between 1 and 5, got {score}"
        )));
    }
    Ok(())
}

pub fn validate_review(review: Option<&str>) -> Result<()> {
    match review {
        Some(text) if text.chars().count() > MAX_REVIEW_LEN => Err(Error::validation(format!(
            "review must be at most {MAX_REVIEW_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// # Rules
/// - prompt is non-empty
/// - at least two non-empty, distinct options
/// - the correct answer is exactly one of the options
/// - 1 <= points <= [`MAX_QUESTION_POINTS`]
pub fn validate_question(question: &Question) -> Result<()> {
    validate_required("question", &question.question, usize::MAX)?;
    if question.options.len() < MIN_OPTIONS {
        return Err(Error::validation(format!(
            "question must have at least {MIN_OPTIONS} options"
        )));
    }
    for (i, option) in question.options.iter().enumerate() {
        if option.trim().is_empty() {
            return Err(Error::validation(format!("option {i} is empty")));
        }
        if question.options[..i].contains(option) {
            return Err(Error::validation(format!("duplicate option '{option}'")));
        }
    }
    if !question.options.contains(&question.correct_answer) {
        return Err(Error::validation(
            "correctAnswer must match one of the options",
        ));
    }
    if !(1..=MAX_QUESTION_POINTS).contains(&question.points) {
        return Err(Error::validation(format!(
            "points must be between 1 and {MAX_QUESTION_POINTS}"
        )));
    }
    Ok(())
}

pub fn validate_quiz(quiz: &Quiz) -> Result<()> {
    validate_required("quiz title", &quiz.title, MAX_TITLE_LEN)?;
    if quiz.passing_score > 100 {
        return Err(Error::validation("passingScore must be between 0 and 100"));
    }
    if quiz.max_attempts < 1 {
        return Err(Error::validation("maxAttempts must be at least 1"));
    }
    if quiz.time_limit == Some(0) {
        return Err(Error::validation("timeLimit must be at least 1 minute"));
    }
    let mut total = 0u32;
    for question in &quiz.questions {
        validate_question(question)?;
        total = total
            .checked_add(question.points)
            .ok_or_else(|| Error::validation("total points overflow"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question(options: &[&str], correct: &str, points: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            question: "2 + 2?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct.into(),
            explanation: None,
            points,
        }
    }

    #[test]
    fn required_fields() {
        assert!(validate_required("title", "Rust 101", MAX_TITLE_LEN).is_ok());
        assert!(matches!(
            validate_required("title", "   ", MAX_TITLE_LEN),
            Err(Error::Validation(_))
        ));
        assert!(validate_required("title", &"a".repeat(201), MAX_TITLE_LEN).is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating_score(0).is_err());
        assert!(validate_rating_score(1).is_ok());
        assert!(validate_rating_score(5).is_ok());
        assert!(validate_rating_score(6).is_err());
    }

    #[test]
    fn question_rules() {
        assert!(validate_question(&question(&["3", "4"], "4", 1)).is_ok());
        assert!(validate_question(&question(&["4"], "4", 1)).is_err());
        assert!(validate_question(&question(&["3", "4"], "5", 1)).is_err());
        assert!(validate_question(&question(&["3", "4"], "4", 0)).is_err());
        assert!(validate_question(&question(&["3", "4"], "4", MAX_QUESTION_POINTS)).is_ok());
        assert!(validate_question(&question(&["3", "4"], "4", u32::MAX)).is_err());
        assert!(validate_question(&question(&["4", "4"], "4", 1)).is_err());
        assert!(validate_question(&question(&["4", " "], "4", 1)).is_err());
    }

    #[test]
    fn negative_amounts_rejected() {
        assert!(validate_amount("pricing", 0.0).is_ok());
        assert!(validate_amount("pricing", -1.0).is_err());
        assert!(validate_amount("pricing", f64::NAN).is_err());
    }
}
