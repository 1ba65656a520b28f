//! Fixtures shared by the unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Course, Lecture, NewCourse, NewLecture, NewQuestion, NewQuiz, Progress, Enrollment, Quiz,
    StudentIdentity,
};

pub fn new_lecture(title: &str, minutes: u32) -> NewLecture {
    NewLecture {
        title: title.into(),
        video_url: format!("https://videos.example.com/{title}.mp4"),
        duration: minutes,
        description: None,
        resources: Vec::new(),
        is_free_preview: false,
    }
}

/// A published course with `lectures` lectures of 30 minutes each.
pub fn course(lectures: usize) -> Course {
    let now = Utc::now();
    let mut course = Course::new(
        NewCourse {
            instructor: Uuid::new_v4(),
            title: "Ownership in Practice".into(),
            description: "Borrowing without tears".into(),
            image: "https://img.example.com/rust.png".into(),
            category: "Programming".into(),
            level: Default::default(),
            pricing: 49.99,
            subtitle: None,
            primary_language: None,
            welcome_message: None,
            playlist_link: None,
            objectives: Vec::new(),
            tags: Vec::new(),
        },
        now,
    )
    .unwrap();
    for i in 0..lectures {
        course
            .curriculum
            .push(Lecture::new(new_lecture(&format!("lecture-{i}"), 30), now).unwrap());
    }
    crate::curriculum::recompute(&mut course);
    course.is_published = true;
    course
}

pub fn student() -> StudentIdentity {
    let id = Uuid::new_v4();
    StudentIdentity {
        id,
        name: "Ada".into(),
        email: format!("{id}@example.com"),
    }
}

pub fn enroll_student(course: &mut Course) -> Uuid {
    let s = student();
    course.students.push(Enrollment {
        student_id: s.id,
        student_name: s.name,
        student_email: s.email,
        paid_amount: 0.0,
        enrollment_date: Utc::now(),
        progress: Progress::default(),
    });
    s.id
}

/// A published quiz whose questions all have options `right` / `wrong`.
pub fn quiz(points: &[u32], passing_score: u8, time_limit: Option<u32>, max_attempts: u32) -> Quiz {
    let mut quiz = Quiz::new(
        NewQuiz {
            course_id: Uuid::new_v4(),
            lecture_id: None,
            title: "Checkpoint".into(),
            description: None,
            questions: points
                .iter()
                .enumerate()
                .map(|(i, p)| NewQuestion {
                    question: format!("question {i}"),
                    options: vec!["right".into(), "wrong".into()],
                    correct_answer: "right".into(),
                    explanation: Some("because".into()),
                    points: Some(*p),
                })
                .collect(),
            passing_score: Some(passing_score),
            time_limit,
            max_attempts: Some(max_attempts),
            created_by: Uuid::new_v4(),
        },
        Utc::now(),
    )
    .unwrap();
    quiz.is_published = true;
    quiz
}
