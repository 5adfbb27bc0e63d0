//! Domain errors raised by the enrollment and assessment workflows
//!
//! Each [`DomainError`] variant maps to one HTTP status in the API layer.
//! Workflow functions that also touch the database return
//! [`ServiceError`].

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// The student already has an enrollment row for the course
    #[error("Already enrolled")]
    DuplicateEnrollment,

    /// The course does not exist or is not PUBLISHED
    #[error("Course not found or not published")]
    CourseNotPublished,

    /// The action needs an enrollment in the object's course
    #[error("You are not enrolled in this course.")]
    NotEnrolled,

    /// The submission has a grade and can no longer be edited
    #[error("This submission has already been graded.")]
    AlreadyGraded,

    /// Certificates are only issued for COMPLETED enrollments
    #[error("Certificates can only be issued for completed enrollments.")]
    EnrollmentNotCompleted,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// True when `err` is a unique violation of `constraint`
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.constraint() == Some(constraint),
        _ => false,
    }
}
