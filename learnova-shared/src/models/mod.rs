/// Database models for Learnova
///
/// Each module owns one table (or a parent with its children) and exposes
/// async CRUD functions over a [`sqlx::PgPool`]. Models the API scopes per
/// caller take a [`crate::auth::visibility::Visibility`] and build their
/// queries through [`scoped::ScopedQuery`].
///
/// # Models
///
/// - `user`: accounts, roles and profiles
/// - `category`, `course`, `module`, `lesson`: the catalog
/// - `enrollment`, `lesson_progress`, `certificate`: a student's path through a course
/// - `quiz`, `quiz_attempt`, `assignment`, `submission`: assessments
/// - `live_session`, `attendance`: live classes
/// - `announcement`: course and system-wide notices
/// - `report`: stored reports and dashboard aggregates
///
/// # Example
///
/// ```no_run
/// use learnova_shared::auth::visibility::Visibility;
/// use learnova_shared::models::course::{Course, CourseFilter};
/// use learnova_shared::pagination::PageRequest;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let (courses, total) = Course::list(
///     &pool,
///     &Visibility::PublishedOnly,
///     CourseFilter::default(),
///     PageRequest::default(),
/// ).await?;
/// println!("{} of {} published courses", courses.len(), total);
/// # Ok(())
/// # }
/// ```

pub mod announcement;
pub mod assignment;
pub mod attendance;
pub mod category;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod fixed_point;
pub mod lesson;
pub mod lesson_progress;
pub mod live_session;
pub mod module;
pub mod quiz;
pub mod quiz_attempt;
pub mod report;
pub mod scoped;
pub mod submission;
pub mod user;
