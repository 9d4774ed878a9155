use crate::Entity;
use chrono::{Local, NaiveDateTime};
use std::fmt;

/// A pupil on the roster, stored in the `students` table.
///
/// Uniqueness of `email`, its 55 character limit and the 1..=12 grade range are
/// enforced by the database through the constraints declared here.
#[derive(Entity, Clone, Debug, PartialEq)]
#[entity(table = "students", primary_key = "id_pk")]
#[entity(check(name = "grade_between_1_and_12", expr = "grade BETWEEN 1 AND 12"))]
#[entity(index(name = "index_name", columns = "name"))]
pub struct Student {
    #[fetch(id)]
    pub id: Option<i64>,
    pub name: String,
    #[fetch(unique = "unique_email", max_length = 55)]
    pub email: String,
    pub grade: i64,
    pub birthday: NaiveDateTime,
    #[fetch(default = "CURRENT_TIMESTAMP")]
    pub enrolled_date: NaiveDateTime,
}

impl Student {
    /// A not-yet-stored student, enrolled now (local time).
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        grade: i64,
        birthday: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            grade,
            birthday,
            enrolled_date: Local::now().naive_local(),
        }
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "Student {id}: {}, Grade {}", self.name, self.grade),
            None => write!(f, "Student None: {}, Grade {}", self.name, self.grade),
        }
    }
}
