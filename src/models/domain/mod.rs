pub mod attempt;
pub mod award;
pub mod course;
pub mod progress;
pub mod quiz;
pub use attempt::{Answer, AnswerValue, Attempt, SubmittedAnswers};
pub use award::{
    BadgeTrigger, Certificate, CertificateStatus, CertificateTemplate, CourseBadge, UserBadge,
};
pub use course::{Course, CourseModule, Lesson};
pub use progress::CourseProgress;
pub use quiz::{Question, QuestionOption, QuestionType, Quiz};
