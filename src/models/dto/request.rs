use std::collections::HashSet;

use async_graphql::InputObject;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::domain::{
    AnswerValue, BadgeTrigger, CertificateTemplate, Course, CourseBadge, CourseModule, Lesson,
    Question, QuestionOption, QuestionType, Quiz, SubmittedAnswers,
};

fn id_or_new(id: Option<String>) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct PaginationParams {
    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            offset: Some(0),
            limit: Some(20),
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

/// One answer. Choice questions use `selected_option_ids`, short answers use `text`.
#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct QuestionAnswerInput {
    #[validate(length(min = 1, max = 100))]
    pub question_id: String,

    #[graphql(default)]
    #[serde(default)]
    pub selected_option_ids: Vec<String>,

    #[validate(length(max = 1000))]
    pub text: Option<String>,
}

impl QuestionAnswerInput {
    /// `None` for an answer that selects nothing, which grades as unanswered.
    pub fn into_value(self) -> Option<AnswerValue> {
        if let Some(text) = self.text {
            return Some(AnswerValue::Text(text));
        }

        let mut ids = self.selected_option_ids;
        match ids.len() {
            0 => None,
            1 => ids.pop().map(AnswerValue::Choice),
            _ => Some(AnswerValue::Choices(ids)),
        }
    }
}

/// Build the question-id keyed answer map. A question answered twice is rejected.
pub fn submitted_answers(inputs: Vec<QuestionAnswerInput>) -> AppResult<SubmittedAnswers> {
    let mut answers = SubmittedAnswers::with_capacity(inputs.len());

    for input in inputs {
        input.validate()?;
        let question_id = input.question_id.clone();
        if answers.contains_key(&question_id) {
            return Err(AppError::ValidationError(format!(
                "question '{}' is answered more than once",
                question_id
            )));
        }
        if let Some(value) = input.into_value() {
            answers.insert(question_id, value);
        }
    }

    Ok(answers)
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct SubmitAttemptInput {
    #[validate(length(min = 1))]
    pub attempt_id: String,
    pub answers: Vec<QuestionAnswerInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct GradeQuizInput {
    #[validate(length(min = 1))]
    pub quiz_id: String,
    pub answers: Vec<QuestionAnswerInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct OptionInput {
    pub id: Option<String>,

    #[validate(length(min = 1, max = 500))]
    pub text: String,

    #[graphql(default)]
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct QuestionInput {
    pub id: Option<String>,

    #[validate(length(min = 1, max = 2000))]
    pub text: String,

    pub question_type: QuestionType,

    #[validate(range(min = 1, max = 1000))]
    pub points: i32,

    #[validate(nested)]
    pub options: Vec<OptionInput>,

    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct QuizInput {
    pub id: Option<String>,

    #[validate(length(min = 1))]
    pub course_id: String,

    pub lesson_id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(nested)]
    pub questions: Vec<QuestionInput>,

    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,

    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,

    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,

    #[graphql(default)]
    #[serde(default)]
    pub shuffle_questions: bool,

    #[graphql(default)]
    #[serde(default)]
    pub show_correct_answers: bool,
}

impl From<OptionInput> for QuestionOption {
    fn from(input: OptionInput) -> Self {
        QuestionOption {
            id: id_or_new(input.id),
            text: input.text,
            is_correct: input.is_correct,
        }
    }
}

impl From<QuestionInput> for Question {
    fn from(input: QuestionInput) -> Self {
        Question {
            id: id_or_new(input.id),
            text: input.text,
            question_type: input.question_type,
            points: input.points,
            options: input.options.into_iter().map(QuestionOption::from).collect(),
            explanation: input.explanation,
        }
    }
}

impl From<QuizInput> for Quiz {
    fn from(input: QuizInput) -> Self {
        Quiz {
            id: id_or_new(input.id),
            course_id: input.course_id,
            lesson_id: input.lesson_id,
            title: input.title,
            questions: input.questions.into_iter().map(Question::from).collect(),
            passing_score: input.passing_score,
            max_attempts: input.max_attempts,
            time_limit_minutes: input.time_limit_minutes,
            shuffle_questions: input.shuffle_questions,
            show_correct_answers: input.show_correct_answers,
            created_at: None,
            modified_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct LessonInput {
    pub id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct ModuleInput {
    pub id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(nested)]
    pub lessons: Vec<LessonInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct CourseInput {
    pub id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(nested)]
    pub modules: Vec<ModuleInput>,
}

impl From<CourseInput> for Course {
    // module and lesson order follow input position
    fn from(input: CourseInput) -> Self {
        let modules = input
            .modules
            .into_iter()
            .enumerate()
            .map(|(m, module)| CourseModule {
                id: id_or_new(module.id),
                title: module.title,
                order: m as i32 + 1,
                lessons: module
                    .lessons
                    .into_iter()
                    .enumerate()
                    .map(|(l, lesson)| Lesson {
                        id: id_or_new(lesson.id),
                        title: lesson.title,
                        order: l as i32 + 1,
                    })
                    .collect(),
            })
            .collect();

        Course {
            id: id_or_new(input.id),
            title: input.title,
            modules,
            created_at: None,
            modified_at: None,
        }
    }
}

impl CourseInput {
    pub fn duplicate_lesson_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .filter_map(|l| l.id.clone())
            .filter(|id| !seen.insert(id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct CertificateTemplateInput {
    #[validate(length(min = 1))]
    pub course_id: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[graphql(default = true)]
    pub enabled: bool,

    #[validate(range(min = 1, max = 600))]
    pub validity_months: Option<i32>,

    #[validate(range(min = 0.0, max = 100.0))]
    #[graphql(default)]
    pub min_score: f64,

    #[graphql(default = true)]
    pub require_all_lessons: bool,
}

impl CertificateTemplateInput {
    pub fn into_template(self, id: Option<String>) -> CertificateTemplate {
        CertificateTemplate {
            id: id_or_new(id),
            course_id: self.course_id,
            title: self.title,
            enabled: self.enabled,
            validity_months: self.validity_months,
            min_score: self.min_score,
            require_all_lessons: self.require_all_lessons,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, InputObject)]
pub struct CourseBadgeInput {
    pub id: Option<String>,

    #[validate(length(min = 1))]
    pub course_id: String,

    #[validate(length(min = 1, max = 100))]
    pub badge_id: String,

    #[validate(length(min = 1, max = 200))]
    pub badge_name: String,

    pub trigger: BadgeTrigger,

    #[validate(range(min = 0.0, max = 100.0))]
    pub min_score: Option<f64>,
}

impl From<CourseBadgeInput> for CourseBadge {
    fn from(input: CourseBadgeInput) -> Self {
        CourseBadge {
            id: id_or_new(input.id),
            course_id: input.course_id,
            badge_id: input.badge_id,
            badge_name: input.badge_name,
            trigger: input.trigger,
            min_score: input.min_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question_id: &str, ids: &[&str], text: Option<&str>) -> QuestionAnswerInput {
        QuestionAnswerInput {
            question_id: question_id.to_string(),
            selected_option_ids: ids.iter().map(|s| s.to_string()).collect(),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn answer_shape_follows_the_input() {
        assert_eq!(
            answer("q1", &["a"], None).into_value(),
            Some(AnswerValue::Choice("a".to_string()))
        );
        assert_eq!(
            answer("q1", &["a", "b"], None).into_value(),
            Some(AnswerValue::Choices(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            answer("q1", &[], Some("Paris")).into_value(),
            Some(AnswerValue::Text("Paris".to_string()))
        );
        assert_eq!(answer("q1", &[], None).into_value(), None);
    }

    #[test]
    fn duplicate_question_answers_are_rejected() {
        let err = submitted_answers(vec![
            answer("q1", &["a"], None),
            answer("q1", &["b"], None),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn empty_answers_are_left_out_of_the_map() {
        let answers =
            submitted_answers(vec![answer("q1", &[], None), answer("q2", &["x"], None)]).unwrap();
        assert_eq!(answers.len(), 1);
        assert!(answers.contains_key("q2"));
    }

    #[test]
    fn quiz_input_rejects_out_of_range_passing_score() {
        let input = QuizInput {
            id: None,
            course_id: "course-1".to_string(),
            lesson_id: None,
            title: "Quiz".to_string(),
            questions: vec![],
            passing_score: 120,
            max_attempts: Some(0),
            time_limit_minutes: None,
            shuffle_questions: false,
            show_correct_answers: false,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn question_points_are_capped() {
        let question = |points| QuestionInput {
            id: None,
            text: "Pick one".to_string(),
            question_type: QuestionType::TrueFalse,
            points,
            options: vec![],
            explanation: None,
        };

        assert!(question(1000).validate().is_ok());
        assert!(question(1001).validate().is_err());
        assert!(question(i32::MAX).validate().is_err());
    }

    #[test]
    fn course_input_keeps_given_ids_and_orders_by_position() {
        let input = CourseInput {
            id: Some("course-1".to_string()),
            title: "Rust".to_string(),
            modules: vec![ModuleInput {
                id: None,
                title: "Basics".to_string(),
                lessons: vec![
                    LessonInput {
                        id: Some("l1".to_string()),
                        title: "Ownership".to_string(),
                    },
                    LessonInput {
                        id: None,
                        title: "Borrowing".to_string(),
                    },
                ],
            }],
        };
        assert!(input.duplicate_lesson_ids().is_empty());

        let course = Course::from(input);
        assert_eq!(course.id, "course-1");
        assert_eq!(course.modules[0].lessons[0].id, "l1");
        assert_eq!(course.modules[0].lessons[1].order, 2);
        assert_eq!(course.total_lessons(), 2);
    }

    #[test]
    fn pagination_is_clamped() {
        let params = PaginationParams {
            offset: Some(-5),
            limit: Some(1000),
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 100);
    }
}
