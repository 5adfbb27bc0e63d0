/// Router tests that never reach the database
///
/// Every request here is rejected by the auth middleware, an extractor or
/// a role check before any query runs, so the pool is never connected.

mod common;

use axum::http::{Method, StatusCode};
use common::{lazy_app, send, token, tokens};
use learnova_shared::models::user::UserRole;
use serde_json::json;

#[tokio::test]
async fn test_protected_route_requires_credentials() {
    let app = lazy_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/enrollments/my-courses", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Authentication credentials were not provided.",
            "status_code": 401,
            "details": {"detail": "Authentication credentials were not provided."}
        })
    );
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = lazy_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/courses", Some("not.a.jwt"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["status_code"], json!(401));
}

#[tokio::test]
async fn test_refresh_token_cannot_authenticate() {
    let app = lazy_app();
    let refresh = tokens(3, UserRole::Student).refresh;

    let (status, _) = send(&app, Method::GET, "/api/v1/enrollments/my-courses", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_enroll_without_course_id() {
    let app = lazy_app();
    let student = token(3, UserRole::Student);

    let (status, body) = send(&app, Method::POST, "/api/v1/enrollments/enroll", Some(&student), Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("course_id is required"));
}

#[tokio::test]
async fn test_missing_course_id_is_checked_before_role() {
    let app = lazy_app();
    let instructor = token(2, UserRole::Instructor);

    let (status, _) = send(&app, Method::POST, "/api/v1/enrollments/enroll", Some(&instructor), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_students_enroll() {
    let app = lazy_app();

    for role in [UserRole::Instructor, UserRole::Admin] {
        let caller = token(2, role);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/enrollments/enroll",
            Some(&caller),
            Some(json!({"course_id": 5})),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], json!("Only students can enroll"));
    }
}

#[tokio::test]
async fn test_my_courses_is_for_students() {
    let app = lazy_app();
    let instructor = token(2, UserRole::Instructor);

    let (status, body) = send(&app, Method::GET, "/api/v1/enrollments/my-courses", Some(&instructor), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Students only"));
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let app = lazy_app();
    let student = token(3, UserRole::Student);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/enrollments/enroll",
        Some(&student),
        Some(json!({"course_id": "five"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_non_numeric_id_is_not_found() {
    let app = lazy_app();
    let admin = token(1, UserRole::Admin);

    let (status, body) = send(&app, Method::GET, "/api/v1/auth/users/abc", Some(&admin), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status_code"], json!(404));
}

#[tokio::test]
async fn test_admin_only_endpoints() {
    let app = lazy_app();
    let student = token(3, UserRole::Student);

    for uri in [
        "/api/v1/auth/users",
        "/api/v1/analytics/reports",
        "/api/v1/analytics/dashboard/overview",
    ] {
        let (status, _) = send(&app, Method::GET, uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn test_roster_is_for_instructors() {
    let app = lazy_app();
    let admin = token(1, UserRole::Admin);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/analytics/dashboard/instructor/students",
        Some(&admin),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Instructors only"));
}

#[tokio::test]
async fn test_anonymous_cannot_register_admin() {
    let app = lazy_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": "root.user",
            "email": "root@learnova.io",
            "password": "s3cret-passphrase",
            "password_confirm": "s3cret-passphrase",
            "role": "ADMIN"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_registration_validation_errors() {
    let app = lazy_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/users",
        None,
        Some(json!({
            "username": "x",
            "email": "not-an-email",
            "password": "s3cret-passphrase",
            "password_confirm": "different-passphrase"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid input."));
    let details = body["details"].as_object().unwrap();
    assert!(details.contains_key("username"));
    assert!(details.contains_key("email"));
    assert_eq!(details["password_confirm"], json!(["Passwords do not match."]));
}

#[tokio::test]
async fn test_refresh_exchanges_token() {
    let app = lazy_app();
    let pair = tokens(3, UserRole::Student);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({"refresh": pair.refresh})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].as_str().is_some_and(|access| !access.is_empty()));
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = lazy_app();
    let access = token(3, UserRole::Student);

    let (status, _) = send(&app, Method::POST, "/api/v1/auth/refresh", None, Some(json!({"refresh": access}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_students_cannot_create_courses() {
    let app = lazy_app();
    let student = token(3, UserRole::Student);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/courses",
        Some(&student),
        Some(json!({"title": "Physics", "slug": "physics"})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
