//! Quiz attempt eligibility and scoring.
//!
//! Per (student, quiz) the status moves from `Eligible` to one of two terminal
//! states: `Passed`, which is sticky, or `Exhausted` once every allowed
//! attempt has been used without a pass.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{AnswerResult, Attempt, Outcome, Quiz, Submission},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AttemptStatus {
    Eligible { remaining: u32 },
    Passed,
    Exhausted,
}

fn history<'a>(
    quiz: &'a Quiz,
    student_id: Uuid,
    attempts: &'a [Attempt],
) -> impl Iterator<Item = &'a Attempt> + 'a {
    attempts
        .iter()
        .filter(move |a| a.quiz_id == quiz.id && a.student_id == student_id)
}

pub fn attempt_status(quiz: &Quiz, student_id: Uuid, attempts: &[Attempt]) -> AttemptStatus {
    let mut used = 0u32;
    for attempt in history(quiz, student_id, attempts) {
        if attempt.passed() {
            return AttemptStatus::Passed;
        }
        used += 1;
    }
    match quiz.max_attempts.saturating_sub(used) {
        0 => AttemptStatus::Exhausted,
        remaining => AttemptStatus::Eligible { remaining },
    }
}

/// Opens a new attempt shell numbered after the student's prior attempts.
///
/// A student who already passed may keep starting attempts; their status
/// stays `Passed` whatever the later outcomes are.
pub fn start_attempt(
    quiz: &Quiz,
    student_id: Uuid,
    prior_attempts: &[Attempt],
    now: DateTime<Utc>,
) -> Result<Attempt> {
    if !quiz.is_published {
        return Err(Error::QuizNotPublished(quiz.id));
    }
    let status = attempt_status(quiz, student_id, prior_attempts);
    if status == AttemptStatus::Exhausted {
        return Err(Error::AttemptsExhausted {
            quiz_id: quiz.id,
            max_attempts: quiz.max_attempts,
        });
    }
    let used = history(quiz, student_id, prior_attempts).count() as u32;
    Ok(Attempt {
        id: Uuid::new_v4(),
        quiz_id: quiz.id,
        student_id,
        attempt_number: used + 1,
        started_at: now,
        deadline: quiz
            .time_limit
            .map(|minutes| now + Duration::minutes(i64::from(minutes))),
        submission: None,
    })
}

/// Scores `answers` (keyed by question id) and returns the sealed attempt.
///
/// Comparison is exact and case-sensitive. An attempt submitted after the
/// deadline fixed when it was started is `Failed` regardless of its score.
pub fn score_attempt(
    quiz: &Quiz,
    attempt: &Attempt,
    answers: BTreeMap<Uuid, String>,
    now: DateTime<Utc>,
) -> Result<Attempt> {
    if attempt.is_scored() {
        return Err(Error::AttemptAlreadyScored(attempt.id));
    }
    if attempt.quiz_id != quiz.id {
        return Err(Error::validation(format!(
            "attempt {} does not belong to quiz {}",
            attempt.id, quiz.id
        )));
    }
    if let Some(unknown) = answers.keys().find(|id| quiz.question(**id).is_none()) {
        return Err(Error::validation(format!(
            "answer references unknown question {unknown}"
        )));
    }

    let mut score = 0u32;
    let breakdown: Vec<AnswerResult> = quiz
        .questions
        .iter()
        .map(|q| {
            let given = answers.get(&q.id).cloned();
            let is_correct = given.as_deref() == Some(q.correct_answer.as_str());
            let points_earned = if is_correct { q.points } else { 0 };
            score = score.saturating_add(points_earned);
            AnswerResult {
                question_id: q.id,
                given,
                is_correct,
                points_earned,
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let total_points = quiz.total_points();
    let percentage = if total_points > 0 {
        f64::from(score) / f64::from(total_points) * 100.0
    } else {
        0.0
    };

    let elapsed = now - attempt.started_at;
    let late = attempt.deadline.is_some_and(|deadline| now > deadline);

    let outcome = if total_points > 0 && !late && percentage >= f64::from(quiz.passing_score) {
        Outcome::Passed
    } else {
        Outcome::Failed
    };

    if late {
        tracing::info!(attempt_id = %attempt.id, elapsed_secs = elapsed.num_seconds(), "late submission scored as failed");
    }

    let mut sealed = attempt.clone();
    sealed.submission = Some(Submission {
        answers,
        breakdown,
        score,
        total_points,
        percentage,
        outcome,
        late,
        submitted_at: now,
        elapsed_seconds: elapsed.num_seconds(),
    });
    Ok(sealed)
}

/// Highest-scoring sealed attempt; earlier attempts win ties.
pub fn best_attempt(attempts: &[Attempt]) -> Option<&Attempt> {
    attempts
        .iter()
        .filter_map(|a| a.submission().map(|s| (a, s.percentage)))
        .fold(None, |best: Option<(&Attempt, f64)>, (a, pct)| match best {
            Some((_, best_pct)) if best_pct >= pct => best,
            _ => Some((a, pct)),
        })
        .map(|(a, _)| a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::quiz;

    fn answers(pairs: &[(Uuid, &str)]) -> BTreeMap<Uuid, String> {
        pairs.iter().map(|(id, a)| (*id, a.to_string())).collect()
    }

    #[test]
    fn weighted_scoring() {
        let q = quiz(&[1, 3], 70, None, 3);
        let (one, three) = (&q.questions[0], &q.questions[1]);
        let now = Utc::now();
        let student = Uuid::new_v4();

        let a = start_attempt(&q, student, &[], now).unwrap();
        let scored = score_attempt(&q, &a, answers(&[(three.id, "right")]), now).unwrap();
        let s = scored.submission().unwrap();
        assert_eq!(s.score, 3);
        assert_eq!(s.total_points, 4);
        assert_eq!(s.percentage, 75.0);
        assert_eq!(s.outcome, Outcome::Passed);

        let b = start_attempt(&q, student, &[scored], now).unwrap();
        let scored = score_attempt(&q, &b, answers(&[(one.id, "right"), (three.id, "wrong")]), now).unwrap();
        let s = scored.submission().unwrap();
        assert_eq!(s.percentage, 25.0);
        assert_eq!(s.outcome, Outcome::Failed);
    }

    #[test]
    fn answers_are_case_sensitive() {
        let q = quiz(&[1], 50, None, 3);
        let now = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], now).unwrap();
        let scored = score_attempt(&q, &a, answers(&[(q.questions[0].id, "Right")]), now).unwrap();
        assert_eq!(scored.submission().unwrap().outcome, Outcome::Failed);
    }

    #[test]
    fn zero_question_quiz_never_passes() {
        let q = quiz(&[], 0, None, 3);
        let now = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], now).unwrap();
        let scored = score_attempt(&q, &a, BTreeMap::new(), now).unwrap();
        let s = scored.submission().unwrap();
        assert_eq!(s.percentage, 0.0);
        assert_eq!(s.outcome, Outcome::Failed);
    }

    #[test]
    fn attempts_are_capped() {
        let q = quiz(&[1], 70, None, 3);
        let student = Uuid::new_v4();
        let now = Utc::now();
        let mut history = Vec::new();
        for n in 1..=3 {
            let a = start_attempt(&q, student, &history, now).unwrap();
            assert_eq!(a.attempt_number, n);
            history.push(score_attempt(&q, &a, BTreeMap::new(), now).unwrap());
        }
        assert_eq!(attempt_status(&q, student, &history), AttemptStatus::Exhausted);
        let err = start_attempt(&q, student, &history, now).unwrap_err();
        assert!(matches!(err, Error::AttemptsExhausted { max_attempts: 3, .. }));

        // another student's history is irrelevant
        assert!(start_attempt(&q, Uuid::new_v4(), &history, now).is_ok());
    }

    #[test]
    fn pass_is_sticky() {
        let q = quiz(&[1], 70, None, 3);
        let id = q.questions[0].id;
        let student = Uuid::new_v4();
        let now = Utc::now();
        let mut history = Vec::new();

        let a = start_attempt(&q, student, &history, now).unwrap();
        history.push(score_attempt(&q, &a, answers(&[(id, "right")]), now).unwrap());
        for _ in 0..2 {
            let a = start_attempt(&q, student, &history, now).unwrap();
            history.push(score_attempt(&q, &a, BTreeMap::new(), now).unwrap());
        }
        assert_eq!(attempt_status(&q, student, &history), AttemptStatus::Passed);

        let fourth = start_attempt(&q, student, &history, now).unwrap();
        assert_eq!(fourth.attempt_number, 4);
    }

    #[test]
    fn unpublished_quiz_rejects_attempts() {
        let mut q = quiz(&[1], 70, None, 3);
        q.is_published = false;
        let err = start_attempt(&q, Uuid::new_v4(), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, Error::QuizNotPublished(_)));
    }

    #[test]
    fn late_submission_fails() {
        let q = quiz(&[1], 70, Some(10), 3);
        let started = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], started).unwrap();
        assert_eq!(a.deadline, Some(started + Duration::minutes(10)));

        let on_time = started + Duration::minutes(10);
        let scored = score_attempt(&q, &a, answers(&[(q.questions[0].id, "right")]), on_time).unwrap();
        assert_eq!(scored.submission().unwrap().outcome, Outcome::Passed);

        let late = started + Duration::minutes(10) + Duration::seconds(1);
        let scored = score_attempt(&q, &a, answers(&[(q.questions[0].id, "right")]), late).unwrap();
        let s = scored.submission().unwrap();
        assert_eq!(s.percentage, 100.0);
        assert!(s.late);
        assert_eq!(s.outcome, Outcome::Failed);
    }

    #[test]
    fn deadline_is_fixed_at_start() {
        let mut q = quiz(&[1], 70, Some(10), 3);
        let started = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], started).unwrap();
        let id = q.questions[0].id;

        // the limit is raised after the attempt opened
        q.time_limit = Some(60);
        let at = started + Duration::minutes(30);
        let scored = score_attempt(&q, &a, answers(&[(id, "right")]), at).unwrap();
        assert!(scored.submission().unwrap().late);
        assert_eq!(scored.submission().unwrap().outcome, Outcome::Failed);

        // and removed entirely on another quiz
        let mut q = quiz(&[1], 70, Some(10), 3);
        let a = start_attempt(&q, Uuid::new_v4(), &[], started).unwrap();
        q.time_limit = None;
        let scored = score_attempt(&q, &a, answers(&[(q.questions[0].id, "right")]), at).unwrap();
        assert!(scored.submission().unwrap().late);

        // an attempt opened without a limit is never late
        let mut q = quiz(&[1], 70, None, 3);
        let a = start_attempt(&q, Uuid::new_v4(), &[], started).unwrap();
        q.time_limit = Some(1);
        let scored = score_attempt(&q, &a, answers(&[(q.questions[0].id, "right")]), at).unwrap();
        assert_eq!(scored.submission().unwrap().outcome, Outcome::Passed);
    }

    #[test]
    fn oversized_points_do_not_overflow() {
        let mut q = quiz(&[1, 1], 70, None, 3);
        q.questions[0].points = u32::MAX;
        q.questions[1].points = 2;
        assert_eq!(q.total_points(), u32::MAX);
        assert!(matches!(
            crate::validation::validate_quiz(&q),
            Err(Error::Validation(_))
        ));

        let now = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], now).unwrap();
        let picks = answers(&[(q.questions[0].id, "right"), (q.questions[1].id, "right")]);
        let scored = score_attempt(&q, &a, picks, now).unwrap();
        assert_eq!(scored.submission().unwrap().score, u32::MAX);
    }

    #[test]
    fn rescoring_is_rejected() {
        let q = quiz(&[1], 70, None, 3);
        let now = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], now).unwrap();
        let scored = score_attempt(&q, &a, BTreeMap::new(), now).unwrap();
        let err = score_attempt(&q, &scored, BTreeMap::new(), now).unwrap_err();
        assert!(matches!(err, Error::AttemptAlreadyScored(_)));
    }

    #[test]
    fn unknown_question_is_a_validation_error() {
        let q = quiz(&[1], 70, None, 3);
        let now = Utc::now();
        let a = start_attempt(&q, Uuid::new_v4(), &[], now).unwrap();
        let err = score_attempt(&q, &a, answers(&[(Uuid::new_v4(), "right")]), now).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn best_attempt_prefers_highest_then_earliest() {
        let q = quiz(&[1, 1], 70, None, 5);
        let student = Uuid::new_v4();
        let now = Utc::now();
        let mut history = Vec::new();
        for given in [vec![], vec![0usize], vec![0, 1], vec![1, 0]] {
            let a = start_attempt(&q, student, &history, now).unwrap();
            let picks: Vec<(Uuid, &str)> = given.iter().map(|i| (q.questions[*i].id, "right")).collect();
            history.push(score_attempt(&q, &a, answers(&picks), now).unwrap());
        }
        assert_eq!(best_attempt(&history).map(|a| a.attempt_number), Some(3));
        assert!(best_attempt(&[]).is_none());
    }
}
