/// End-to-end tests against a real database
///
/// Ignored by default. Point `DATABASE_URL` at a disposable database and run:
/// cargo test -p learnova-api --test integration_test -- --ignored --test-threads=1

mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use common::{create_user, db_app, send, token};
use learnova_shared::models::user::UserRole;
use serde_json::{json, Value};
use uuid::Uuid;

fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..10])
}

/// Creates a course as `instructor` and returns its id
async fn create_course(app: &Router, instructor: &str, status: &str) -> i64 {
    let (status_code, body) = send(
        app,
        Method::POST,
        "/api/v1/courses",
        Some(instructor),
        Some(json!({
            "title": "Intro to Algebra",
            "slug": unique_slug("algebra"),
            "status": status,
            "duration_hours": 12
        })),
    )
    .await;
    assert_eq!(status_code, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

fn is_certificate_id(value: &Value) -> bool {
    value.as_str().is_some_and(|id| {
        id.len() == 17
            && id.starts_with("CERT-")
            && id[5..].chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    })
}

#[tokio::test]
#[ignore]
async fn test_register_and_login() {
    let (app, _pool) = db_app().await;
    let username = format!("learner_{}", &Uuid::new_v4().simple().to_string()[..8]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@learnova.test"),
            "password": "long-enough-passphrase",
            "password_confirm": "long-enough-passphrase",
            "first_name": "Lin"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], json!("STUDENT"));
    assert!(body.get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"username": username, "password": "long-enough-passphrase"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let access = body["access"].as_str().unwrap().to_string();
    assert!(body["refresh"].is_string());

    let (status, me) = send(&app, Method::GET, "/api/v1/auth/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], json!(username));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"username": username, "password": "wrong-passphrase"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_enrollment_workflow() {
    let (app, pool) = db_app().await;
    let instructor = create_user(&pool, UserRole::Instructor).await;
    let student = create_user(&pool, UserRole::Student).await;
    let instructor_token = token(instructor.user.id, UserRole::Instructor);
    let student_token = token(student.user.id, UserRole::Student);

    let course_id = create_course(&app, &instructor_token, "DRAFT").await;

    // drafts are invisible to anonymous callers and cannot be joined
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/courses/{course_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let enroll = json!({"course_id": course_id});
    let (status, body) = send(&app, Method::POST, "/api/v1/enrollments/enroll", Some(&student_token), Some(enroll.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Course not found or not published"));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/courses/{course_id}"),
        Some(&instructor_token),
        Some(json!({"status": "PUBLISHED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, enrollment) =
        send(&app, Method::POST, "/api/v1/enrollments/enroll", Some(&student_token), Some(enroll.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{enrollment}");
    assert_eq!(enrollment["status"], json!("ACTIVE"));
    assert_eq!(enrollment["progress_percent"], json!("0.00"));
    assert_eq!(enrollment["course"], json!(course_id));

    let (status, body) = send(&app, Method::POST, "/api/v1/enrollments/enroll", Some(&student_token), Some(enroll)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Already enrolled"));

    let (status, mine) = send(&app, Method::GET, "/api/v1/enrollments/my-courses", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    // two lessons; completing one puts progress at half
    let (status, module) = send(
        &app,
        Method::POST,
        "/api/v1/courses/modules",
        Some(&instructor_token),
        Some(json!({"course": course_id, "title": "Basics", "order": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{module}");

    let mut lesson_ids = Vec::new();
    for order in 1..=2 {
        let (status, lesson) = send(
            &app,
            Method::POST,
            "/api/v1/courses/lessons",
            Some(&instructor_token),
            Some(json!({"module": module["id"], "title": format!("Lesson {order}"), "content_type": "TEXT", "order": order})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{lesson}");
        lesson_ids.push(lesson["id"].as_i64().unwrap());
    }

    let enrollment_id = enrollment["id"].as_i64().unwrap();
    let (status, progress) = send(
        &app,
        Method::POST,
        "/api/v1/enrollments/lesson-progress",
        Some(&student_token),
        Some(json!({"enrollment": enrollment_id, "lesson": lesson_ids[0]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{progress}");
    assert_eq!(progress["progress_percent"], json!("50.00"));

    // certificates need a completed enrollment
    let certificate_uri = format!("/api/v1/enrollments/{enrollment_id}/certificate");
    let (status, _) = send(&app, Method::POST, &certificate_uri, Some(&instructor_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, &certificate_uri, Some(&student_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // finishing the last lesson completes the enrollment
    let (status, progress) = send(
        &app,
        Method::POST,
        "/api/v1/enrollments/lesson-progress",
        Some(&student_token),
        Some(json!({"enrollment": enrollment_id, "lesson": lesson_ids[1]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{progress}");
    assert_eq!(progress["progress_percent"], json!("100.00"));

    let (status, completed) = send(
        &app,
        Method::GET,
        &format!("/api/v1/enrollments/{enrollment_id}"),
        Some(&student_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], json!("COMPLETED"));
    assert_eq!(completed["progress_percent"], json!("100.00"));
    assert!(completed["completed_at"].is_string());

    // two issues racing for one enrollment share a single certificate
    let ((first_status, first), (second_status, second)) = tokio::join!(
        send(&app, Method::POST, &certificate_uri, Some(&instructor_token), None),
        send(&app, Method::POST, &certificate_uri, Some(&instructor_token), None),
    );
    let mut statuses = [first_status.as_u16(), second_status.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 201], "{first} {second}");
    assert_eq!(first["certificate_id"], second["certificate_id"]);

    let certificate = first;
    assert!(is_certificate_id(&certificate["certificate_id"]));

    let (status, again) = send(&app, Method::POST, &certificate_uri, Some(&instructor_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["certificate_id"], certificate["certificate_id"]);
}

#[tokio::test]
#[ignore]
async fn test_students_only_see_published_courses() {
    let (app, pool) = db_app().await;
    let instructor = create_user(&pool, UserRole::Instructor).await;
    let student = create_user(&pool, UserRole::Student).await;
    let instructor_token = token(instructor.user.id, UserRole::Instructor);

    let draft = create_course(&app, &instructor_token, "DRAFT").await;
    create_course(&app, &instructor_token, "PUBLISHED").await;

    let student_token = token(student.user.id, UserRole::Student);
    for caller in [None, Some(student_token.as_str())] {
        let (status, page) = send(&app, Method::GET, "/api/v1/courses?page_size=100", caller, None).await;
        assert_eq!(status, StatusCode::OK);
        let results = page["results"].as_array().unwrap();
        assert!(results.iter().all(|course| course["status"] == json!("PUBLISHED")));
        assert!(results.iter().all(|course| course["id"] != json!(draft)));
    }

    let (status, page) = send(
        &app,
        Method::GET,
        &format!("/api/v1/courses?instructor={}", instructor.user.id),
        Some(&instructor_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], json!(2));
}

#[tokio::test]
#[ignore]
async fn test_submission_and_grading() {
    let (app, pool) = db_app().await;
    let instructor = create_user(&pool, UserRole::Instructor).await;
    let student = create_user(&pool, UserRole::Student).await;
    let instructor_token = token(instructor.user.id, UserRole::Instructor);
    let student_token = token(student.user.id, UserRole::Student);

    let course_id = create_course(&app, &instructor_token, "PUBLISHED").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/enrollments/enroll",
        Some(&student_token),
        Some(json!({"course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, assignment) = send(
        &app,
        Method::POST,
        "/api/v1/assessments/assignments",
        Some(&instructor_token),
        Some(json!({"course": course_id, "title": "Worksheet 1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{assignment}");
    assert_eq!(assignment["max_points"], json!(100));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assessments/assignments",
        Some(&instructor_token),
        Some(json!({"course": course_id, "title": "Capstone", "max_points": 5000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["max_points"].is_array());

    let submit = json!({"assignment": assignment["id"], "text_submission": "x = 4"});
    let (status, submission) =
        send(&app, Method::POST, "/api/v1/assessments/submissions", Some(&student_token), Some(submit.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{submission}");

    let (status, body) =
        send(&app, Method::POST, "/api/v1/assessments/submissions", Some(&student_token), Some(submit)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["non_field_errors"].is_array());

    let grade_uri = format!("/api/v1/assessments/submissions/{}/grade", submission["id"]);
    let (status, body) = send(&app, Method::POST, &grade_uri, Some(&instructor_token), Some(json!({"grade": 150}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["grade"].is_array());

    let (status, graded) = send(
        &app,
        Method::POST,
        &grade_uri,
        Some(&instructor_token),
        Some(json!({"grade": "92.50", "feedback": "Good work"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{graded}");
    assert!(graded["graded_at"].is_string());
    assert_eq!(graded["grade"], json!("92.50"));

    let (status, body) = send(&app, Method::POST, &grade_uri, Some(&instructor_token), Some(json!({"grade": 10}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("This submission has already been graded."));

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/assessments/submissions/{}", submission["id"]),
        Some(&student_token),
        Some(json!({"text_submission": "x = 5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("This submission has already been graded."));
}

#[tokio::test]
#[ignore]
async fn test_attendance_is_unique_per_student() {
    let (app, pool) = db_app().await;
    let instructor = create_user(&pool, UserRole::Instructor).await;
    let student = create_user(&pool, UserRole::Student).await;
    let instructor_token = token(instructor.user.id, UserRole::Instructor);
    let student_token = token(student.user.id, UserRole::Student);

    let course_id = create_course(&app, &instructor_token, "PUBLISHED").await;
    send(
        &app,
        Method::POST,
        "/api/v1/enrollments/enroll",
        Some(&student_token),
        Some(json!({"course_id": course_id})),
    )
    .await;

    let (status, session) = send(
        &app,
        Method::POST,
        "/api/v1/attendance/sessions",
        Some(&instructor_token),
        Some(json!({"course": course_id, "title": "Live Q&A", "session_date": "2026-11-02T16:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{session}");

    let record = json!({"session": session["id"], "student": student.user.id, "status": "PRESENT"});
    let (status, _) =
        send(&app, Method::POST, "/api/v1/attendance/records", Some(&instructor_token), Some(record.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        send(&app, Method::POST, "/api/v1/attendance/records", Some(&instructor_token), Some(record)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["details"]["non_field_errors"],
        json!(["The fields session, student must make a unique set."])
    );

    let (status, visible) = send(&app, Method::GET, "/api/v1/attendance/records", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible["count"], json!(1));
}
