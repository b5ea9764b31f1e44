pub mod attempt_repository;
pub mod badge_repository;
pub mod certificate_repository;
pub mod course_repository;
pub mod progress_repository;
pub mod quiz_repository;

pub use attempt_repository::{AttemptRepository, MongoAttemptRepository};
pub use badge_repository::{BadgeRepository, MongoBadgeRepository};
pub use certificate_repository::{CertificateRepository, MongoCertificateRepository};
pub use course_repository::{CourseRepository, MongoCourseRepository};
pub use progress_repository::{MongoProgressRepository, ProgressRepository};
pub use quiz_repository::{MongoQuizRepository, QuizRepository};
