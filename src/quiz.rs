//! Typed quiz model and structural validation of model output.

use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A complete generated quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Quiz", description = "Multiple-choice questions generated from a document")]
pub struct Quiz {
    /// Questions in presentation order
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// Stable identifier such as "Q1"
    pub id: String,
    /// Difficulty tier of the question
    pub level: Level,
    /// The question stem
    pub text: String,
    /// Answer options; exactly one has `isCorrect` set
    pub options: Vec<AnswerOption>,
    /// Brief rationale for the correct answer, referencing the document
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Easy, Level::Medium, Level::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerOption {
    /// Option text
    pub text: String,
    /// Whether this option is the correct answer
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

impl Quiz {
    pub fn count_level(&self, level: Level) -> usize {
        self.questions.iter().filter(|q| q.level == level).count()
    }
}

impl Question {
    pub fn correct_options(&self) -> impl Iterator<Item = &AnswerOption> {
        self.options.iter().filter(|o| o.is_correct)
    }
}

/// Expected shape of a generated quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizBlueprint {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
    pub options_per_question: usize,
}

impl Default for QuizBlueprint {
    fn default() -> Self {
        Self {
            easy: 10,
            medium: 5,
            hard: 5,
            options_per_question: 4,
        }
    }
}

impl QuizBlueprint {
    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }

    pub fn expected(&self, level: Level) -> usize {
        match level {
            Level::Easy => self.easy,
            Level::Medium => self.medium,
            Level::Hard => self.hard,
        }
    }

    /// Check every structural invariant and report all violations at once.
    pub fn validate(&self, quiz: &Quiz) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if quiz.questions.len() != self.total() {
            violations.push(Violation::QuestionCount {
                expected: self.total(),
                actual: quiz.questions.len(),
            });
        }

        for level in Level::ALL {
            let actual = quiz.count_level(level);
            let expected = self.expected(level);
            if actual != expected {
                violations.push(Violation::LevelCount { level, expected, actual });
            }
        }

        let mut seen = HashSet::new();
        for (index, question) in quiz.questions.iter().enumerate() {
            let label = if question.id.trim().is_empty() {
                violations.push(Violation::MissingId { index });
                format!("#{}", index + 1)
            } else {
                if !seen.insert(question.id.as_str()) {
                    violations.push(Violation::DuplicateId(question.id.clone()));
                }
                question.id.clone()
            };

            if question.text.trim().is_empty() {
                violations.push(Violation::EmptyText { question: label.clone() });
            }

            if question.options.len() != self.options_per_question {
                violations.push(Violation::OptionCount {
                    question: label.clone(),
                    expected: self.options_per_question,
                    actual: question.options.len(),
                });
            }

            let correct = question.correct_options().count();
            if correct != 1 {
                violations.push(Violation::CorrectAnswers { question: label, count: correct });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// How strictly decoded output is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    /// Typed decode plus every blueprint invariant.
    #[default]
    Strict,
    /// Typed decode only.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    QuestionCount { expected: usize, actual: usize },
    LevelCount { level: Level, expected: usize, actual: usize },
    OptionCount { question: String, expected: usize, actual: usize },
    CorrectAnswers { question: String, count: usize },
    MissingId { index: usize },
    DuplicateId(String),
    EmptyText { question: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuestionCount { expected, actual } => {
                write!(f, "expected {expected} questions, got {actual}")
            }
            Self::LevelCount { level, expected, actual } => {
                write!(f, "expected {expected} {level} questions, got {actual}")
            }
            Self::OptionCount { question, expected, actual } => {
                write!(f, "{question}: expected {expected} options, got {actual}")
            }
            Self::CorrectAnswers { question, count } => {
                write!(f, "{question}: expected exactly one correct option, got {count}")
            }
            Self::MissingId { index } => write!(f, "question #{} has no id", index + 1),
            Self::DuplicateId(id) => write!(f, "duplicate question id {id}"),
            Self::EmptyText { question } => write!(f, "{question}: empty question text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, level: Level, correct: &[bool]) -> Question {
        Question {
            id: id.to_string(),
            level,
            text: format!("Question {id}?"),
            options: correct
                .iter()
                .enumerate()
                .map(|(i, &is_correct)| AnswerOption { text: format!("Option {i}"), is_correct })
                .collect(),
            explanation: "Because the document says so".to_string(),
        }
    }

    fn quiz_with(easy: usize, medium: usize, hard: usize) -> Quiz {
        let mut questions = Vec::new();
        for (level, count) in [(Level::Easy, easy), (Level::Medium, medium), (Level::Hard, hard)] {
            for _ in 0..count {
                let id = format!("Q{}", questions.len() + 1);
                questions.push(question(&id, level, &[false, true, false, false]));
            }
        }
        Quiz { questions }
    }

    #[test]
    fn well_formed_quiz_passes() {
        let quiz = quiz_with(10, 5, 5);
        assert!(QuizBlueprint::default().validate(&quiz).is_ok());
    }

    #[test]
    fn wrong_tier_distribution_is_reported() {
        let quiz = quiz_with(12, 4, 4);
        let err = QuizBlueprint::default().validate(&quiz).unwrap_err();
        assert!(err.violations.contains(&Violation::LevelCount {
            level: Level::Easy,
            expected: 10,
            actual: 12
        }));
        assert!(err.violations.contains(&Violation::LevelCount {
            level: Level::Hard,
            expected: 5,
            actual: 4
        }));
        // total is still 20
        assert!(!err.violations.iter().any(|v| matches!(v, Violation::QuestionCount { .. })));
    }

    #[test]
    fn multiple_correct_options_are_reported() {
        let mut quiz = quiz_with(10, 5, 5);
        quiz.questions[3] = question("Q4", Level::Easy, &[true, true, false, false]);
        let err = QuizBlueprint::default().validate(&quiz).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::CorrectAnswers { question: "Q4".into(), count: 2 }]
        );
    }

    #[test]
    fn option_count_and_duplicate_ids() {
        let mut quiz = quiz_with(10, 5, 5);
        quiz.questions[1] = question("Q1", Level::Easy, &[true, false, false]);
        let err = QuizBlueprint::default().validate(&quiz).unwrap_err();
        assert!(err.violations.contains(&Violation::DuplicateId("Q1".into())));
        assert!(err.violations.contains(&Violation::OptionCount {
            question: "Q1".into(),
            expected: 4,
            actual: 3
        }));
    }

    #[test]
    fn level_and_option_wire_names() {
        let json = r#"{"text":"A","isCorrect":true}"#;
        let option: AnswerOption = serde_json::from_str(json).unwrap();
        assert!(option.is_correct);
        assert_eq!(serde_json::to_string(&Level::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn error_message_lists_violations() {
        let err = QuizBlueprint::default().validate(&quiz_with(0, 0, 0)).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("expected 20 questions, got 0"));
        assert!(message.contains("expected 10 easy questions, got 0"));
    }
}
