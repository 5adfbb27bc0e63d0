/// Row visibility for list and detail queries
///
/// Which rows a caller may see depends on two things only: who is asking
/// and what kind of resource is being read. [`resolve_visibility`] maps
/// that pair onto a [`Visibility`], and [`Visibility::push_predicate`]
/// renders it as a SQL condition on the resource's own columns.
///
/// | Resource         | Anonymous | Student                     | Instructor   | Admin |
/// |------------------|-----------|-----------------------------|--------------|-------|
/// | `Catalog`        | published | published                   | all          | all   |
/// | `CourseMaterial` | nothing   | enrolled courses            | own courses  | all   |
/// | `Announcement`   | nothing   | enrolled courses or system  | own courses  | all   |
/// | `StudentRecord`  | nothing   | own rows                    | own courses  | all   |
///
/// A detail lookup uses the same predicate, so a row outside the caller's
/// scope reads as "not found".
///
/// # Example
///
/// ```
/// use learnova_shared::auth::context::AuthContext;
/// use learnova_shared::auth::visibility::{resolve_visibility, Resource, ScopeColumns, Visibility};
/// use learnova_shared::models::user::UserRole;
/// use sqlx::{Postgres, QueryBuilder};
///
/// let student = AuthContext::new(7, UserRole::Student);
/// let visibility = resolve_visibility(Some(&student), Resource::StudentRecord);
/// assert_eq!(visibility, Visibility::Own(7));
///
/// let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM enrollments e WHERE ");
/// visibility.push_predicate(&mut qb, &ScopeColumns::course("e.course_id").with_student("e.student_id"));
/// assert_eq!(qb.sql(), "SELECT * FROM enrollments e WHERE e.student_id = $1");
/// ```

use sqlx::{Postgres, QueryBuilder};

use super::context::AuthContext;
use crate::models::user::UserRole;

/// Kinds of readable resources, grouped by how they are scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Courses, modules and lessons
    Catalog,
    /// Quizzes, assignments and live sessions
    CourseMaterial,
    Announcement,
    /// Enrollments, certificates, lesson progress, quiz attempts,
    /// submissions and attendance
    StudentRecord,
}

/// The set of rows a caller may read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// Rows whose course is PUBLISHED
    PublishedOnly,
    /// Rows whose course is taught by this instructor
    InstructorOf(i64),
    /// Rows whose course this student is enrolled in
    EnrolledIn(i64),
    /// Enrolled courses plus system-wide rows
    EnrolledOrSystem(i64),
    /// Rows belonging to this student
    Own(i64),
    Nothing,
}

pub fn resolve_visibility(requester: Option<&AuthContext>, resource: Resource) -> Visibility {
    let Some(auth) = requester else {
        return match resource {
            Resource::Catalog => Visibility::PublishedOnly,
            _ => Visibility::Nothing,
        };
    };

    match (auth.role, resource) {
        (UserRole::Admin, _) => Visibility::All,

        (UserRole::Instructor, Resource::Catalog) => Visibility::All,
        (UserRole::Instructor, _) => Visibility::InstructorOf(auth.user_id),

        (UserRole::Student, Resource::Catalog) => Visibility::PublishedOnly,
        (UserRole::Student, Resource::CourseMaterial) => Visibility::EnrolledIn(auth.user_id),
        (UserRole::Student, Resource::Announcement) => Visibility::EnrolledOrSystem(auth.user_id),
        (UserRole::Student, Resource::StudentRecord) => Visibility::Own(auth.user_id),
    }
}

/// Column expressions the predicate is rendered against
///
/// `course_id` is the expression yielding the row's course id (for a course
/// table itself, its primary key). `student_id` and `system_wide` are only
/// needed by the visibilities that use them.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns<'a> {
    pub course_id: &'a str,
    pub student_id: Option<&'a str>,
    pub system_wide: Option<&'a str>,
}

impl<'a> ScopeColumns<'a> {
    pub fn course(course_id: &'a str) -> Self {
        Self {
            course_id,
            student_id: None,
            system_wide: None,
        }
    }

    pub fn with_student(mut self, student_id: &'a str) -> Self {
        self.student_id = Some(student_id);
        self
    }

    pub fn with_system_wide(mut self, system_wide: &'a str) -> Self {
        self.system_wide = Some(system_wide);
        self
    }
}

impl Visibility {
    /// True when no row can match, letting callers skip the query
    pub fn is_nothing(&self) -> bool {
        matches!(self, Visibility::Nothing)
    }

    /// Appends a boolean SQL condition to `qb`
    ///
    /// `Own` on a resource without a student column and `EnrolledOrSystem`
    /// without a system-wide column fall back to the narrower condition.
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>, columns: &ScopeColumns<'_>) {
        match *self {
            Visibility::All => {
                qb.push("TRUE");
            }
            Visibility::Nothing => {
                qb.push("FALSE");
            }
            Visibility::PublishedOnly => {
                qb.push(columns.course_id)
                    .push(" IN (SELECT id FROM courses WHERE status = 'PUBLISHED')");
            }
            Visibility::InstructorOf(user_id) => {
                qb.push(columns.course_id)
                    .push(" IN (SELECT id FROM courses WHERE instructor_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
            Visibility::EnrolledIn(user_id) => push_enrolled(qb, columns.course_id, user_id),
            Visibility::EnrolledOrSystem(user_id) => match columns.system_wide {
                Some(system_wide) => {
                    qb.push("(").push(system_wide).push(" OR ");
                    push_enrolled(qb, columns.course_id, user_id);
                    qb.push(")");
                }
                None => push_enrolled(qb, columns.course_id, user_id),
            },
            Visibility::Own(user_id) => match columns.student_id {
                Some(student_id) => {
                    qb.push(student_id).push(" = ").push_bind(user_id);
                }
                None => {
                    qb.push("FALSE");
                }
            },
        }
    }
}

fn push_enrolled(qb: &mut QueryBuilder<'_, Postgres>, course_id: &str, user_id: i64) {
    qb.push(course_id)
        .push(" IN (SELECT course_id FROM enrollments WHERE student_id = ")
        .push_bind(user_id)
        .push(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(visibility: Visibility, columns: ScopeColumns<'_>) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        visibility.push_predicate(&mut qb, &columns);
        qb.sql().to_string()
    }

    #[test]
    fn test_anonymous() {
        assert_eq!(resolve_visibility(None, Resource::Catalog), Visibility::PublishedOnly);
        assert_eq!(resolve_visibility(None, Resource::CourseMaterial), Visibility::Nothing);
        assert_eq!(resolve_visibility(None, Resource::Announcement), Visibility::Nothing);
        assert_eq!(resolve_visibility(None, Resource::StudentRecord), Visibility::Nothing);
    }

    #[test]
    fn test_student() {
        let student = AuthContext::new(4, UserRole::Student);
        let s = Some(&student);

        assert_eq!(resolve_visibility(s, Resource::Catalog), Visibility::PublishedOnly);
        assert_eq!(resolve_visibility(s, Resource::CourseMaterial), Visibility::EnrolledIn(4));
        assert_eq!(resolve_visibility(s, Resource::Announcement), Visibility::EnrolledOrSystem(4));
        assert_eq!(resolve_visibility(s, Resource::StudentRecord), Visibility::Own(4));
    }

    #[test]
    fn test_instructor() {
        let instructor = AuthContext::new(2, UserRole::Instructor);
        let i = Some(&instructor);

        assert_eq!(resolve_visibility(i, Resource::Catalog), Visibility::All);
        assert_eq!(resolve_visibility(i, Resource::CourseMaterial), Visibility::InstructorOf(2));
        assert_eq!(resolve_visibility(i, Resource::Announcement), Visibility::InstructorOf(2));
        assert_eq!(resolve_visibility(i, Resource::StudentRecord), Visibility::InstructorOf(2));
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = AuthContext::new(1, UserRole::Admin);
        for resource in [
            Resource::Catalog,
            Resource::CourseMaterial,
            Resource::Announcement,
            Resource::StudentRecord,
        ] {
            assert_eq!(resolve_visibility(Some(&admin), resource), Visibility::All);
        }
    }

    #[test]
    fn test_render_published() {
        assert_eq!(
            render(Visibility::PublishedOnly, ScopeColumns::course("c.id")),
            "c.id IN (SELECT id FROM courses WHERE status = 'PUBLISHED')"
        );
    }

    #[test]
    fn test_render_instructor_and_enrolled() {
        assert_eq!(
            render(Visibility::InstructorOf(2), ScopeColumns::course("q.course_id")),
            "q.course_id IN (SELECT id FROM courses WHERE instructor_id = $1)"
        );
        assert_eq!(
            render(Visibility::EnrolledIn(4), ScopeColumns::course("q.course_id")),
            "q.course_id IN (SELECT course_id FROM enrollments WHERE student_id = $1)"
        );
    }

    #[test]
    fn test_render_enrolled_or_system() {
        let columns = ScopeColumns::course("a.course_id").with_system_wide("a.scope = 'SYSTEM'");
        assert_eq!(
            render(Visibility::EnrolledOrSystem(4), columns),
            "(a.scope = 'SYSTEM' OR a.course_id IN (SELECT course_id FROM enrollments WHERE student_id = $1))"
        );
    }

    #[test]
    fn test_render_own_without_student_column() {
        assert_eq!(render(Visibility::Own(4), ScopeColumns::course("x.course_id")), "FALSE");
        assert_eq!(
            render(Visibility::Own(4), ScopeColumns::course("x.course_id").with_student("x.student_id")),
            "x.student_id = $1"
        );
    }

    #[test]
    fn test_render_all_and_nothing() {
        assert_eq!(render(Visibility::All, ScopeColumns::course("id")), "TRUE");
        assert_eq!(render(Visibility::Nothing, ScopeColumns::course("id")), "FALSE");
        assert!(Visibility::Nothing.is_nothing());
    }
}
