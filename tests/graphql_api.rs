mod common;

use async_graphql::{Request, Response};
use serde_json::{json, Value};

use tutorly_server::{
    auth::{Caller, Role},
    graphql::{create_schema, Schema},
};

fn schema() -> Schema {
    create_schema(common::app_state(&common::in_memory_repositories()))
}

fn caller(user_id: &str, role: Role) -> Caller {
    Caller {
        user_id: user_id.to_string(),
        role,
    }
}

async fn execute(schema: &Schema, query: &str, as_caller: Option<Caller>) -> Response {
    let mut request = Request::new(query);
    if let Some(caller) = as_caller {
        request = request.data(caller);
    }
    schema.execute(request).await
}

fn data(response: Response) -> Value {
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

fn first_error(response: &Response) -> Value {
    serde_json::to_value(&response.errors[0]).unwrap()
}

fn question(id: &str) -> String {
    format!(
        r#"{{ id: "{id}", text: "Pick a", questionType: SINGLE_CHOICE, points: 1,
             explanation: "a is right",
             options: [{{ id: "{id}-a", text: "a", isCorrect: true }}, {{ id: "{id}-b", text: "b" }}] }}"#
    )
}

async fn author_course(schema: &Schema, max_attempts: Option<i32>) {
    let instructor = Some(caller("teacher-1", Role::Instructor));
    data(
        execute(
            schema,
            r#"mutation {
                saveCourse(input: {
                    id: "course-1", title: "Intro",
                    modules: [{ title: "Basics", lessons: [{ id: "l1", title: "Start" }, { id: "l2", title: "Next" }] }]
                }) { id }
            }"#,
            instructor.clone(),
        )
        .await,
    );

    let max_attempts = max_attempts
        .map(|n| format!("maxAttempts: {n},"))
        .unwrap_or_default();
    let query = format!(
        r#"mutation {{
            saveQuiz(input: {{
                id: "quiz-1", courseId: "course-1", lessonId: "l1", title: "Check",
                passingScore: 70, showCorrectAnswers: true, {max_attempts}
                questions: [{}, {}, {}]
            }}) {{ id }}
        }}"#,
        question("q1"),
        question("q2"),
        question("q3")
    );
    data(execute(schema, &query, instructor).await);
}

#[tokio::test]
async fn two_step_submission_reports_display_score_and_review() {
    let schema = schema();
    author_course(&schema, None).await;
    let learner = Some(caller("learner-1", Role::Learner));

    let started = data(
        execute(
            &schema,
            r#"mutation { startAttempt(quizId: "quiz-1") { id completedAt } }"#,
            learner.clone(),
        )
        .await,
    );
    let attempt_id = started["startAttempt"]["id"].as_str().unwrap().to_string();
    assert_eq!(started["startAttempt"]["completedAt"], Value::Null);

    let submitted = data(
        execute(
            &schema,
            &format!(
                r#"mutation {{
                    submitAttempt(input: {{ attemptId: "{attempt_id}", answers: [
                        {{ questionId: "q1", selectedOptionIds: ["q1-a"] }},
                        {{ questionId: "q2", selectedOptionIds: ["q2-a"] }},
                        {{ questionId: "q3", selectedOptionIds: ["q3-b"] }}
                    ] }}) {{
                        attempt {{ score passed attemptNumber answers {{ questionId isCorrect correctOptionIds }} }}
                        progress {{ progressPercent }}
                        awards {{ badgesGranted }}
                    }}
                }}"#
            ),
            learner,
        )
        .await,
    );

    let result = &submitted["submitAttempt"];
    assert_eq!(result["attempt"]["score"], json!(66.67));
    assert_eq!(result["attempt"]["passed"], json!(false));
    assert_eq!(result["attempt"]["attemptNumber"], json!(1));
    assert_eq!(result["attempt"]["answers"][2]["isCorrect"], json!(false));
    assert_eq!(result["attempt"]["answers"][2]["correctOptionIds"], json!(["q3-a"]));
    assert_eq!(result["progress"], Value::Null);
    assert_eq!(result["awards"]["badgesGranted"], json!([]));
}

#[tokio::test]
async fn quiz_for_taking_hides_correct_options() {
    let schema = schema();
    author_course(&schema, None).await;

    let response = execute(
        &schema,
        r#"{ quizForTaking(id: "quiz-1") { totalPoints questions { options { id isCorrect } } } }"#,
        Some(caller("learner-1", Role::Learner)),
    )
    .await;

    // the field does not exist on the learner-facing type
    assert!(!response.errors.is_empty());

    let taking = data(
        execute(
            &schema,
            r#"{ quizForTaking(id: "quiz-1") { totalPoints questions { id options { id text } } } }"#,
            Some(caller("learner-1", Role::Learner)),
        )
        .await,
    );
    assert_eq!(taking["quizForTaking"]["totalPoints"], json!(3));
    assert_eq!(taking["quizForTaking"]["questions"][0]["options"][0]["id"], json!("q1-a"));
}

#[tokio::test]
async fn learners_cannot_author_content() {
    let schema = schema();

    let response = execute(
        &schema,
        r#"mutation { saveCourse(input: { title: "Mine", modules: [] }) { id } }"#,
        Some(caller("learner-1", Role::Learner)),
    )
    .await;

    assert_eq!(first_error(&response)["extensions"]["code"], json!("FORBIDDEN"));
}

#[tokio::test]
async fn anonymous_callers_may_only_verify_certificates() {
    let schema = schema();

    let response = execute(&schema, r#"{ myBadges { badgeId } }"#, None).await;
    assert_eq!(first_error(&response)["extensions"]["code"], json!("UNAUTHORIZED"));

    let verified = data(
        execute(
            &schema,
            r#"{ verifyCertificate(certificateNumber: "CERT-NOPE", code: "x") { status certificate { id } } }"#,
            None,
        )
        .await,
    );
    assert_eq!(verified["verifyCertificate"]["status"], json!("UNKNOWN"));
    assert_eq!(verified["verifyCertificate"]["certificate"], Value::Null);
}

#[tokio::test]
async fn attempt_cap_is_reported_with_its_limit() {
    let schema = schema();
    author_course(&schema, Some(1)).await;
    let learner = Some(caller("learner-1", Role::Learner));
    let grade = r#"mutation {
        gradeQuiz(input: { quizId: "quiz-1", answers: [{ questionId: "q1", selectedOptionIds: ["q1-a"] }] }) { score }
    }"#;

    data(execute(&schema, grade, learner.clone()).await);
    let response = execute(&schema, grade, learner.clone()).await;

    let error = first_error(&response);
    assert_eq!(error["extensions"]["code"], json!("ATTEMPT_LIMIT_EXCEEDED"));
    assert_eq!(error["extensions"]["limit"], json!(1));

    let remaining = data(
        execute(&schema, r#"{ attemptsRemaining(quizId: "quiz-1") }"#, learner).await,
    );
    assert_eq!(remaining["attemptsRemaining"], json!(0));
}

#[tokio::test]
async fn records_of_other_learners_need_instructor_role() {
    let schema = schema();
    author_course(&schema, None).await;
    data(
        execute(
            &schema,
            r#"mutation { completeLesson(courseId: "course-1", lessonId: "l2") { progress { progressPercent } } }"#,
            Some(caller("learner-1", Role::Learner)),
        )
        .await,
    );
    let query = r#"{ courseProgress(courseId: "course-1", learnerId: "learner-1") { progressPercent completedLessonIds } }"#;

    let response = execute(&schema, query, Some(caller("learner-2", Role::Learner))).await;
    assert_eq!(first_error(&response)["extensions"]["code"], json!("FORBIDDEN"));

    let progress = data(execute(&schema, query, Some(caller("teacher-1", Role::Instructor))).await);
    assert_eq!(progress["courseProgress"]["progressPercent"], json!(50));
    assert_eq!(progress["courseProgress"]["completedLessonIds"], json!(["l2"]));
}
