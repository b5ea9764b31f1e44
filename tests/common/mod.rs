#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use tutorly_server::{
    app_state::{AppState, Repositories},
    config::EngineSettings,
    errors::{AppError, AppResult},
    models::domain::{
        AnswerValue, Attempt, BadgeTrigger, Certificate, CertificateTemplate, Course,
        CourseBadge, CourseModule, CourseProgress, Lesson, Question, QuestionOption,
        QuestionType, Quiz, SubmittedAnswers, UserBadge,
    },
    repositories::{
        AttemptRepository, BadgeRepository, CertificateRepository, CourseRepository,
        ProgressRepository, QuizRepository,
    },
};

fn page<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    let start = offset.max(0) as usize;
    if start >= items.len() {
        return vec![];
    }
    let end = (start + limit.max(0) as usize).min(items.len());
    items[start..end].to_vec()
}

#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>> {
        Ok(self.quizzes.read().await.get(id).cloned())
    }

    async fn find_by_course(&self, course_id: &str) -> AppResult<Vec<Quiz>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes
            .values()
            .filter(|q| q.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, quiz: Quiz) -> AppResult<Quiz> {
        self.quizzes
            .write()
            .await
            .insert(quiz.id.clone(), quiz.clone());
        Ok(quiz)
    }
}

/// Mirrors the unique (learner, quiz, attempt_number) slot index.
#[derive(Default)]
pub struct InMemoryAttemptRepository {
    attempts: RwLock<Vec<Attempt>>,
}

fn slot_taken(attempts: &[Attempt], candidate: &Attempt) -> bool {
    candidate.attempt_number.is_some()
        && attempts.iter().any(|a| {
            a.id != candidate.id
                && a.learner_id == candidate.learner_id
                && a.quiz_id == candidate.quiz_id
                && a.attempt_number == candidate.attempt_number
        })
}

fn slot_error(attempt: &Attempt) -> AppError {
    AppError::AlreadyExists(format!(
        "attempt number {:?} for quiz '{}' is taken",
        attempt.attempt_number, attempt.quiz_id
    ))
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn create(&self, attempt: Attempt) -> AppResult<Attempt> {
        let mut attempts = self.attempts.write().await;
        if attempts.iter().any(|a| a.id == attempt.id) {
            return Err(AppError::AlreadyExists(attempt.id));
        }
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Attempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn count_completed(&self, learner_id: &str, quiz_id: &str) -> AppResult<i64> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.learner_id == learner_id && a.quiz_id == quiz_id && a.is_graded())
            .count() as i64)
    }

    async fn finalize(&self, graded: Attempt) -> AppResult<Attempt> {
        let mut attempts = self.attempts.write().await;
        if slot_taken(&attempts, &graded) {
            return Err(slot_error(&graded));
        }
        match attempts.iter_mut().find(|a| a.id == graded.id) {
            None => Err(AppError::AttemptNotFound(graded.id)),
            Some(existing) if existing.is_graded() => {
                Err(AppError::AttemptAlreadyGraded(graded.id))
            }
            Some(existing) => {
                *existing = graded.clone();
                Ok(graded)
            }
        }
    }

    async fn insert_graded(&self, graded: Attempt) -> AppResult<Attempt> {
        let mut attempts = self.attempts.write().await;
        if slot_taken(&attempts, &graded) {
            return Err(slot_error(&graded));
        }
        attempts.push(graded.clone());
        Ok(graded)
    }

    async fn best_passing_score(
        &self,
        learner_id: &str,
        quiz_ids: Vec<String>,
    ) -> AppResult<Option<f64>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.learner_id == learner_id && quiz_ids.contains(&a.quiz_id))
            .filter(|a| a.passed == Some(true))
            .filter_map(|a| a.score)
            .fold(None, |best: Option<f64>, s| {
                Some(best.map_or(s, |b| b.max(s)))
            }))
    }

    async fn list_for_learner(
        &self,
        learner_id: &str,
        quiz_id: Option<String>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)> {
        let attempts = self.attempts.read().await;
        let mut items: Vec<Attempt> = attempts
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .filter(|a| quiz_id.as_ref().map_or(true, |q| &a.quiz_id == q))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = items.len() as i64;
        Ok((page(&items, offset, limit), total))
    }
}

#[derive(Default)]
pub struct InMemoryCourseRepository {
    courses: RwLock<HashMap<String, Course>>,
}

#[async_trait]
impl CourseRepository for InMemoryCourseRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Course>> {
        Ok(self.courses.read().await.get(id).cloned())
    }

    async fn upsert(&self, course: Course) -> AppResult<Course> {
        self.courses
            .write()
            .await
            .insert(course.id.clone(), course.clone());
        Ok(course)
    }
}

/// Mirrors the unique (learner, course) index and the version compare-and-swap.
#[derive(Default)]
pub struct InMemoryProgressRepository {
    records: RwLock<HashMap<(String, String), CourseProgress>>,
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn find(&self, learner_id: &str, course_id: &str) -> AppResult<Option<CourseProgress>> {
        let records = self.records.read().await;
        Ok(records
            .get(&(learner_id.to_string(), course_id.to_string()))
            .cloned())
    }

    async fn insert(&self, progress: CourseProgress) -> AppResult<CourseProgress> {
        let mut records = self.records.write().await;
        let key = (progress.learner_id.clone(), progress.course_id.clone());
        if records.contains_key(&key) {
            return Err(AppError::AlreadyExists(format!(
                "learner '{}' is already enrolled in '{}'",
                key.0, key.1
            )));
        }
        records.insert(key, progress.clone());
        Ok(progress)
    }

    async fn save(
        &self,
        progress: CourseProgress,
        expected_version: i64,
    ) -> AppResult<CourseProgress> {
        let mut records = self.records.write().await;
        let key = (progress.learner_id.clone(), progress.course_id.clone());
        match records.get(&key) {
            Some(stored) if stored.version == expected_version => {
                records.insert(key, progress.clone());
                Ok(progress)
            }
            _ => Err(AppError::Conflict(format!(
                "progress for learner '{}' in course '{}' changed concurrently",
                key.0, key.1
            ))),
        }
    }
}

/// Badge grants are unique per (learner, badge) regardless of course.
#[derive(Default)]
pub struct InMemoryBadgeRepository {
    rules: RwLock<Vec<CourseBadge>>,
    grants: RwLock<Vec<UserBadge>>,
}

#[async_trait]
impl BadgeRepository for InMemoryBadgeRepository {
    async fn rules_for_course(&self, course_id: &str) -> AppResult<Vec<CourseBadge>> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn save_rule(&self, rule: CourseBadge) -> AppResult<CourseBadge> {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.id != rule.id);
        rules.push(rule.clone());
        Ok(rule)
    }

    async fn has_badge(&self, learner_id: &str, badge_id: &str) -> AppResult<bool> {
        let grants = self.grants.read().await;
        Ok(grants
            .iter()
            .any(|g| g.learner_id == learner_id && g.badge_id == badge_id))
    }

    async fn grant(&self, badge: UserBadge) -> AppResult<bool> {
        let mut grants = self.grants.write().await;
        if grants
            .iter()
            .any(|g| g.learner_id == badge.learner_id && g.badge_id == badge.badge_id)
        {
            return Ok(false);
        }
        grants.push(badge);
        Ok(true)
    }

    async fn badges_for_learner(&self, learner_id: &str) -> AppResult<Vec<UserBadge>> {
        let grants = self.grants.read().await;
        Ok(grants
            .iter()
            .filter(|g| g.learner_id == learner_id)
            .cloned()
            .collect())
    }
}

/// One template per course; one certificate per (learner, course); numbers unique.
#[derive(Default)]
pub struct InMemoryCertificateRepository {
    templates: RwLock<HashMap<String, CertificateTemplate>>,
    certificates: RwLock<Vec<Certificate>>,
}

#[async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn template_for_course(&self, course_id: &str) -> AppResult<Option<CertificateTemplate>> {
        Ok(self.templates.read().await.get(course_id).cloned())
    }

    async fn save_template(&self, template: CertificateTemplate) -> AppResult<CertificateTemplate> {
        self.templates
            .write()
            .await
            .insert(template.course_id.clone(), template.clone());
        Ok(template)
    }

    async fn find_for_learner(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> AppResult<Option<Certificate>> {
        let certificates = self.certificates.read().await;
        Ok(certificates
            .iter()
            .find(|c| c.learner_id == learner_id && c.course_id == course_id)
            .cloned())
    }

    async fn issue(&self, certificate: Certificate) -> AppResult<Option<Certificate>> {
        let mut certificates = self.certificates.write().await;
        if certificates
            .iter()
            .any(|c| c.learner_id == certificate.learner_id && c.course_id == certificate.course_id)
        {
            return Ok(None);
        }
        if certificates
            .iter()
            .any(|c| c.certificate_number == certificate.certificate_number)
        {
            return Err(AppError::AlreadyExists(format!(
                "certificate number '{}' is already in use",
                certificate.certificate_number
            )));
        }
        certificates.push(certificate.clone());
        Ok(Some(certificate))
    }

    async fn find_by_number(&self, certificate_number: &str) -> AppResult<Option<Certificate>> {
        let certificates = self.certificates.read().await;
        Ok(certificates
            .iter()
            .find(|c| c.certificate_number == certificate_number)
            .cloned())
    }

    async fn certificates_for_learner(&self, learner_id: &str) -> AppResult<Vec<Certificate>> {
        let certificates = self.certificates.read().await;
        Ok(certificates
            .iter()
            .filter(|c| c.learner_id == learner_id)
            .cloned()
            .collect())
    }
}

/// A fresh store shared by every `AppState` built from it.
pub fn in_memory_repositories() -> Repositories {
    Repositories {
        quizzes: Arc::new(InMemoryQuizRepository::default()),
        attempts: Arc::new(InMemoryAttemptRepository::default()),
        courses: Arc::new(InMemoryCourseRepository::default()),
        progress: Arc::new(InMemoryProgressRepository::default()),
        badges: Arc::new(InMemoryBadgeRepository::default()),
        certificates: Arc::new(InMemoryCertificateRepository::default()),
    }
}

pub fn app_state(repos: &Repositories) -> AppState {
    AppState::from_repositories(repos.clone(), EngineSettings::default())
}

/// Lessons are numbered `l1`, `l2`, ... across modules.
pub fn course(id: &str, lessons_per_module: &[usize]) -> Course {
    let mut next = 0;
    let modules = lessons_per_module
        .iter()
        .enumerate()
        .map(|(m, count)| CourseModule {
            id: format!("{}-m{}", id, m + 1),
            title: format!("Module {}", m + 1),
            order: m as i32 + 1,
            lessons: (0..*count)
                .map(|_| {
                    next += 1;
                    Lesson {
                        id: format!("l{}", next),
                        title: format!("Lesson {}", next),
                        order: next,
                    }
                })
                .collect(),
        })
        .collect();

    Course {
        id: id.to_string(),
        title: format!("Course {}", id),
        modules,
        created_at: None,
        modified_at: None,
    }
}

/// Option `{id}-a` is the correct one.
pub fn single_choice(id: &str, points: i32) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {}", id),
        question_type: QuestionType::SingleChoice,
        points,
        options: ["a", "b", "c"]
            .iter()
            .map(|suffix| QuestionOption {
                id: format!("{}-{}", id, suffix),
                text: suffix.to_string(),
                is_correct: *suffix == "a",
            })
            .collect(),
        explanation: Some(format!("{}-a is right", id)),
    }
}

/// `question_count` one-point single-choice questions `q1`, `q2`, ...
pub fn quiz(id: &str, course_id: &str, question_count: usize, passing_score: i32) -> Quiz {
    let mut quiz = Quiz::new(course_id, &format!("Quiz {}", id), passing_score);
    quiz.id = id.to_string();
    quiz.questions = (1..=question_count)
        .map(|n| single_choice(&format!("q{}", n), 1))
        .collect();
    quiz
}

/// Answer the first `correct` questions right and the rest wrong.
pub fn answers(quiz: &Quiz, correct: usize) -> SubmittedAnswers {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let suffix = if i < correct { "a" } else { "b" };
            (q.id.clone(), AnswerValue::Choice(format!("{}-{}", q.id, suffix)))
        })
        .collect()
}

pub fn badge_rule(
    course_id: &str,
    badge_id: &str,
    trigger: BadgeTrigger,
    min_score: Option<f64>,
) -> CourseBadge {
    CourseBadge {
        id: format!("{}-{}", course_id, badge_id),
        course_id: course_id.to_string(),
        badge_id: badge_id.to_string(),
        badge_name: badge_id.to_string(),
        trigger,
        min_score,
    }
}

pub fn certificate_template(course_id: &str, min_score: f64) -> CertificateTemplate {
    CertificateTemplate {
        id: format!("tpl-{}", course_id),
        course_id: course_id.to_string(),
        title: format!("Certificate of completion: {}", course_id),
        enabled: true,
        validity_months: None,
        min_score,
        require_all_lessons: true,
    }
}
