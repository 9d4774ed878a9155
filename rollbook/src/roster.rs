//! The roster walkthrough: schema creation, a bulk enrollment and the read and
//! update queries run against it, in order.

use crate::backends::{LibsqlRepository, LibsqlSession};
use crate::student::{Student, StudentRowAdapter};
use crate::{
    Assignment, Filter, ParamValue, Query, RepoError, RepoResult, Repository, RollbookConfig,
};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

pub type StudentRepository = LibsqlRepository<Student, StudentRowAdapter>;

/// Everything the walkthrough read back, step by step.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterReport {
    /// Rows returned by the bulk insert, with their generated ids.
    pub enrolled: Vec<Student>,
    pub all: Vec<Student>,
    pub names: Vec<String>,
    /// Names ordered by grade, highest first.
    pub names_by_grade: Vec<String>,
    /// Highest-grade student's name and birthday, via `LIMIT 1`.
    pub oldest: Option<(String, NaiveDateTime)>,
    /// The same lookup via `first`.
    pub oldest_using_first: Option<(String, NaiveDateTime)>,
    /// Students named like `%Alan%` in grade 11.
    pub alans: Vec<Student>,
    /// Rows touched by the grade increment.
    pub promoted: u64,
    /// The table after the increment.
    pub after_promotion: Vec<Student>,
}

impl RosterReport {
    /// `(name, grade)` of every student after the increment.
    pub fn name_grades(&self) -> Vec<(String, i64)> {
        self.after_promotion
            .iter()
            .map(|s| (s.name.clone(), s.grade))
            .collect()
    }
}

fn midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

/// The two students enrolled by the walkthrough.
pub fn seed_students() -> Vec<Student> {
    let einstein = midnight(1979, 3, 14).unwrap_or_default();
    let turing = midnight(1912, 6, 23).unwrap_or_default();
    vec![
        Student::new("Albert Einstein", "alber.einstein@zurich.edu", 6, einstein),
        Student::new("Alan Turing", "alan.turing@sherbone.edu", 11, turing),
    ]
}

/// Opens the configured database and runs the walkthrough on a fresh session.
pub async fn run(config: &RollbookConfig) -> RepoResult<RosterReport> {
    let session = LibsqlSession::open(&config.database_url).await?;
    info!(database_url = %config.database_url, "opened database");
    run_in(&session).await
}

/// Runs the walkthrough on an existing session, leaving the rows in place.
pub async fn run_in(session: &LibsqlSession) -> RepoResult<RosterReport> {
    session.create_all::<Student>().await?;
    let repo: StudentRepository = session.repository(StudentRowAdapter);

    let enrolled = repo.insert_many(&seed_students()).await?;
    for s in &enrolled {
        info!(student = %s, "enrolled");
    }

    let all = repo.find_all().await?;

    let names = repo
        .project(&["name"], &Query::new())
        .await?
        .into_iter()
        .map(|row| text_at(&row, 0))
        .collect::<RepoResult<Vec<_>>>()?;
    info!(?names, "names");

    let by_grade = Query::new().order_by_desc("grade");
    let names_by_grade = repo
        .project(&["name"], &by_grade)
        .await?
        .into_iter()
        .map(|row| text_at(&row, 0))
        .collect::<RepoResult<Vec<_>>>()?;
    info!(?names_by_grade, "names by grade");

    let oldest = repo
        .project(&["name", "birthday"], &by_grade.clone().limit(1))
        .await?
        .into_iter()
        .next()
        .map(|row| name_and_birthday(&row))
        .transpose()?;
    let oldest_using_first = repo
        .first(&by_grade)
        .await?
        .map(|s| (s.name, s.birthday));
    info!(?oldest, ?oldest_using_first, "oldest student");

    let alans = repo
        .find(
            &Query::new()
                .filter(Filter::contains("name", "Alan"))
                .filter(Filter::eq("grade", 11i64)),
        )
        .await?;
    info!(count = alans.len(), "students like %Alan% in grade 11");

    let promoted = repo
        .update_all(&[Assignment::increment("grade", 1)], &Query::new())
        .await?;
    let after_promotion = repo.find_all().await?;
    info!(promoted, "incremented grades");

    Ok(RosterReport {
        enrolled,
        all,
        names,
        names_by_grade,
        oldest,
        oldest_using_first,
        alans,
        promoted,
        after_promotion,
    })
}

fn unexpected(what: &str) -> RepoError {
    RepoError::mapping(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("unexpected projected value for {what}"),
    ))
}

fn text_at(row: &[ParamValue], idx: usize) -> RepoResult<String> {
    row.get(idx)
        .and_then(ParamValue::as_str)
        .map(str::to_owned)
        .ok_or_else(|| unexpected("a text column"))
}

fn name_and_birthday(row: &[ParamValue]) -> RepoResult<(String, NaiveDateTime)> {
    let name = text_at(row, 0)?;
    let raw = text_at(row, 1)?;
    let birthday = NaiveDateTime::parse_from_str(&raw, rollbook_core::TIMESTAMP_FORMAT)
        .map_err(RepoError::mapping)?;
    Ok((name, birthday))
}
