use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, Pool, Postgres};
use uuid::Uuid;

use crate::{
    config::DatabaseConfig,
    error::{Error, Result},
    models::{Attempt, Course, Quiz},
    store::{AttemptRepository, CourseRepository, QuizRepository, Versioned},
};

pub type Db = Pool<Postgres>;

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}

pub async fn migrate(db: &Db) -> anyhow::Result<()> {
    // crate-relative path for sqlx migrations
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}

/// Postgres-backed repositories; one JSONB document per aggregate.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
        let found: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&self.db).await?;
        Ok(found)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CourseRepository for PgStore {
    async fn get_course(&self, id: Uuid) -> Result<Option<Versioned<Course>>> {
        let row: Option<(i64, Json<Course>)> =
            sqlx::query_as("SELECT version, doc FROM courses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(version, Json(doc))| Versioned { doc, version }))
    }

    async fn insert_course(&self, course: &Course) -> Result<()> {
        sqlx::query("INSERT INTO courses (id, version, doc) VALUES ($1, 1, $2)")
            .bind(course.id)
            .bind(Json(course))
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::VersionConflict { entity: "course", id: course.id }
                } else {
                    Error::Database(e)
                }
            })?;
        Ok(())
    }

    async fn update_course(&self, course: &Course, expected: i64) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE courses SET doc = $1, version = version + 1, updated_at = now()
            WHERE id = $2 AND version = $3
            RETURNING version
            "#,
        )
        .bind(Json(course))
        .bind(course.id)
        .bind(expected)
        .fetch_optional(&self.db)
        .await?;

        match version {
            Some(v) => Ok(v),
            None if self.exists("courses", course.id).await? => Err(Error::VersionConflict {
                entity: "course",
                id: course.id,
            }),
            None => Err(Error::CourseNotFound(course.id)),
        }
    }
}

#[async_trait]
impl QuizRepository for PgStore {
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Versioned<Quiz>>> {
        let row: Option<(i64, Json<Quiz>)> =
            sqlx::query_as("SELECT version, doc FROM quizzes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(version, Json(doc))| Versioned { doc, version }))
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        sqlx::query("INSERT INTO quizzes (id, course_id, version, doc) VALUES ($1, $2, 1, $3)")
            .bind(quiz.id)
            .bind(quiz.course_id)
            .bind(Json(quiz))
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::VersionConflict { entity: "quiz", id: quiz.id }
                } else {
                    Error::Database(e)
                }
            })?;
        Ok(())
    }

    async fn update_quiz(&self, quiz: &Quiz, expected: i64) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE quizzes SET doc = $1, version = version + 1, updated_at = now()
            WHERE id = $2 AND version = $3
            RETURNING version
            "#,
        )
        .bind(Json(quiz))
        .bind(quiz.id)
        .bind(expected)
        .fetch_optional(&self.db)
        .await?;

        match version {
            Some(v) => Ok(v),
            None if self.exists("quizzes", quiz.id).await? => Err(Error::VersionConflict {
                entity: "quiz",
                id: quiz.id,
            }),
            None => Err(Error::QuizNotFound(quiz.id)),
        }
    }

    async fn quizzes_for_course(&self, course_id: Uuid) -> Result<Vec<Quiz>> {
        let rows: Vec<(Json<Quiz>,)> =
            sqlx::query_as("SELECT doc FROM quizzes WHERE course_id = $1 ORDER BY created_at")
                .bind(course_id)
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(|(Json(q),)| q).collect())
    }
}

#[async_trait]
impl AttemptRepository for PgStore {
    async fn attempts_for(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<Attempt>> {
        let rows: Vec<(Json<Attempt>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM quiz_attempts
            WHERE quiz_id = $1 AND student_id = $2
            ORDER BY attempt_number
            "#,
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|(Json(a),)| a).collect())
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        let row: Option<(Json<Attempt>,)> =
            sqlx::query_as("SELECT doc FROM quiz_attempts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(Json(a),)| a))
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        let number = i32::try_from(attempt.attempt_number)
            .map_err(|_| Error::validation("attempt number out of range"))?;
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, quiz_id, student_id, attempt_number, scored, doc)
            VALUES ($1, $2, $3, $4, false, $5)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(number)
        .bind(Json(attempt))
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::VersionConflict { entity: "attempt", id: attempt.quiz_id }
            } else {
                Error::Database(e)
            }
        })?;
        Ok(())
    }

    async fn seal_attempt(&self, attempt: &Attempt) -> Result<()> {
        let res = sqlx::query(
            "UPDATE quiz_attempts SET doc = $1, scored = true WHERE id = $2 AND scored = false",
        )
        .bind(Json(attempt))
        .bind(attempt.id)
        .execute(&self.db)
        .await?;

        if res.rows_affected() == 1 {
            return Ok(());
        }
        if self.exists("quiz_attempts", attempt.id).await? {
            Err(Error::AttemptAlreadyScored(attempt.id))
        } else {
            Err(Error::AttemptNotFound(attempt.id))
        }
    }
}
