// src/grading.rs

use serde::Serialize;

use crate::models::exam::Question;

/// Fraction of correct answers required to pass, validated to lie in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassThreshold(f64);

impl PassThreshold {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Outcome of grading one set of answers against one exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub score: u32,
    pub total: u32,
    pub passed: bool,
}

/// Grades `answers` against the exam's questions.
///
/// An answer counts when it is non-empty and exactly equals the question's
/// correct option at the same index. Answers not aligned one-to-one with the
/// questions score zero. An exam with no questions never passes.
pub fn grade(questions: &[Question], answers: &[String], threshold: PassThreshold) -> Grade {
    let total = questions.len() as u32;
    let score = if answers.len() == questions.len() {
        questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| !answer.is_empty() && **answer == question.answer)
            .count() as u32
    } else {
        0
    };

    // Dividing keeps "3 of 5 at 0.6" exact; multiplying the threshold would not.
    let passed = total > 0 && f64::from(score) / f64::from(total) >= threshold.value();

    Grade {
        score,
        total,
        passed,
    }
}
