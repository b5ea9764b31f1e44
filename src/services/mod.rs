pub mod attempt_service;
pub mod award_service;
pub mod catalog_service;
pub mod grading;
pub mod keyed_lock;
pub mod progress_service;
pub mod submission_service;

pub use attempt_service::AttemptService;
pub use award_service::AwardService;
pub use catalog_service::CatalogService;
pub use progress_service::ProgressService;
pub use submission_service::SubmissionService;
