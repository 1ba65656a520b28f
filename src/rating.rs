//! Course rating aggregation.
//!
//! The average is always recomputed from the current rating collection, never
//! nudged from a previous value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{Course, Rating},
    validation,
};

/// Mean of all scores, or 0 for an empty collection.
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u64 = ratings.iter().map(|r| u64::from(r.rating)).sum();
    sum as f64 / ratings.len() as f64
}

pub(crate) fn recompute(course: &mut Course) {
    course.average_rating = average_rating(&course.ratings);
}

/// Adds the user's rating, or replaces their previous one in place.
pub fn submit_rating(
    course: &mut Course,
    user_id: Uuid,
    score: u8,
    review: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    validation::validate_rating_score(score)?;
    validation::validate_review(review.as_deref())?;

    match course.ratings.iter_mut().find(|r| r.user_id == user_id) {
        Some(existing) => {
            existing.rating = score;
            existing.review = review;
            existing.date = now;
        }
        None => course.ratings.push(Rating {
            user_id,
            rating: score,
            review,
            date: now,
        }),
    }
    recompute(course);
    course.updated_at = now;
    tracing::debug!(course_id = %course.id, %user_id, score, average = course.average_rating, "rating stored");
    Ok(())
}

pub fn remove_rating(course: &mut Course, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let pos = course
        .ratings
        .iter()
        .position(|r| r.user_id == user_id)
        .ok_or(Error::RatingNotFound {
            course_id: course.id,
            user_id,
        })?;
    course.ratings.remove(pos);
    recompute(course);
    course.updated_at = now;
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub count: usize,
    pub average_rating: f64,
    /// `histogram[i]` counts ratings of `i + 1` stars.
    pub histogram: [usize; 5],
}

pub fn rating_summary(course: &Course) -> RatingSummary {
    let mut histogram = [0usize; 5];
    for r in &course.ratings {
        if let Some(slot) = histogram.get_mut(usize::from(r.rating).wrapping_sub(1)) {
            *slot += 1;
        }
    }
    RatingSummary {
        count: course.ratings.len(),
        average_rating: average_rating(&course.ratings),
        histogram,
    }
}
