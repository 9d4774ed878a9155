#![cfg(all(feature = "libsql-backend", feature = "backend-adapters"))]

use chrono::NaiveDate;
use rollbook_core::{
    Assignment, ConstraintKind, Filter, ParamValue, Query, RepoError, RepoResult, Repository,
};
use rollbook_libsql::{LibsqlRepository, LibsqlSession};
use tracing_test::traced_test;

#[derive(rollbook_macros::Entity, Clone, Debug, PartialEq)]
#[entity(table = "pupils", primary_key = "pupils_pk")]
#[entity(check(name = "grade_range", expr = "grade BETWEEN 1 AND 12"))]
#[entity(index(name = "pupils_name_idx", columns = "name"))]
struct Pupil {
    #[fetch(id)]
    id: Option<i64>,
    name: String,
    #[fetch(unique = "pupils_email_key", max_length = 20)]
    email: String,
    grade: i64,
    born: chrono::NaiveDateTime,
    nickname: Option<String>,
}

fn pupil(name: &str, email: &str, grade: i64) -> Pupil {
    Pupil {
        id: None,
        name: name.into(),
        email: email.into(),
        grade,
        born: NaiveDate::from_ymd_opt(2008, 3, 14)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap(),
        nickname: None,
    }
}

async fn setup() -> RepoResult<(LibsqlSession, LibsqlRepository<Pupil, PupilRowAdapter>)> {
    let session = LibsqlSession::open(":memory:").await?;
    session.create_all::<Pupil>().await?;
    let repo = session.repository::<Pupil, _>(PupilRowAdapter);
    Ok((session, repo))
}

#[tokio::test]
async fn create_all_is_idempotent_and_creates_index() -> RepoResult<()> {
    let (session, _repo) = setup().await?;
    session.create_all::<Pupil>().await?;

    let mut rows = session
        .connection()
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'pupils' AND name = 'pupils_name_idx'",
            (),
        )
        .await
        .map_err(RepoError::backend)?;
    assert!(rows.next().await.map_err(RepoError::backend)?.is_some());
    Ok(())
}

#[tokio::test]
async fn insert_assigns_ids_and_round_trips() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    let mut nick = pupil("Ada", "ada@school.edu", 7);
    nick.nickname = Some("Countess".into());

    let stored = repo.insert(&nick).await?;
    let id = stored.id.expect("id assigned");
    assert_eq!(Pupil { id: None, ..stored.clone() }, nick);

    let fetched = repo.find_by_id(&id).await?.expect("row present");
    assert_eq!(fetched, stored);
    assert!(repo.find_by_id(&(id + 100)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn insert_many_returns_rows_in_input_order() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    assert!(repo.insert_many(&[]).await?.is_empty());

    let stored = repo
        .insert_many(&[pupil("Bea", "bea@school.edu", 3), pupil("Cy", "cy@school.edu", 4)])
        .await?;
    let names: Vec<_> = stored.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Bea", "Cy"]);
    assert!(stored[0].id < stored[1].id);
    assert_eq!(repo.find_all().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_bulk_insert_leaves_no_rows() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    let err = repo
        .insert_many(&[pupil("Bea", "dup@school.edu", 3), pupil("Cy", "dup@school.edu", 4)])
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
    assert_eq!(repo.count(&Query::new()).await?, 0);

    // The connection is usable again after the rollback.
    repo.insert(&pupil("Dee", "dee@school.edu", 5)).await?;
    assert_eq!(repo.count(&Query::new()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn constraint_violations_are_classified() -> RepoResult<()> {
    let (_session, repo) = setup().await?;

    let err = repo.insert(&pupil("Old", "old@school.edu", 13)).await.unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));

    let err = repo
        .insert(&pupil("Long", "a-very-long-address@school.edu", 5))
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));

    let first = repo.insert(&pupil("Eve", "eve@school.edu", 9)).await?;
    let err = repo.insert(&pupil("Eve2", "eve@school.edu", 9)).await.unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));

    repo.insert(&pupil("Fay", "fay@school.edu", 9)).await?;
    let err = repo
        .update_all(
            &[Assignment::set("id", first.id.unwrap())],
            &Query::new().filter(Filter::eq("name", "Fay")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::PrimaryKey));
    Ok(())
}

#[tokio::test]
async fn queries_filter_order_limit_and_project() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    repo.insert_many(&[
        pupil("Alan Turing", "alan@school.edu", 11),
        pupil("Alana Smith", "alana@school.edu", 9),
        pupil("Grace Hopper", "grace@school.edu", 11),
    ])
    .await?;

    let alans = repo
        .find(&Query::new().filter(Filter::contains("name", "Alan")))
        .await?;
    assert_eq!(alans.len(), 2);

    let top = repo
        .first(&Query::new().order_by_desc("grade").order_by("name", rollbook_core::Order::Asc))
        .await?
        .expect("non-empty table");
    assert_eq!(top.name, "Alan Turing");

    let limited = repo.find(&Query::new().order_by_desc("name").limit(2)).await?;
    let names: Vec<_> = limited.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Grace Hopper", "Alana Smith"]);

    let projected = repo
        .project(
            &["name", "grade"],
            &Query::new().filter(Filter::eq("grade", 11i64)).order_by_desc("name"),
        )
        .await?;
    assert_eq!(
        projected,
        vec![
            vec![ParamValue::String("Grace Hopper".into()), ParamValue::I64(11)],
            vec![ParamValue::String("Alan Turing".into()), ParamValue::I64(11)],
        ]
    );

    assert!(repo
        .first(&Query::new().filter(Filter::eq("name", "Nobody")))
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn update_all_increments_matching_rows() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    repo.insert_many(&[
        pupil("Alan Turing", "alan@school.edu", 11),
        pupil("Grace Hopper", "grace@school.edu", 6),
    ])
    .await?;

    let changed = repo
        .update_all(
            &[Assignment::increment("grade", 1)],
            &Query::new().filter(Filter::contains("name", "Alan")),
        )
        .await?;
    assert_eq!(changed, 1);

    let grades = repo
        .project(&["grade"], &Query::new().order_by("name", rollbook_core::Order::Asc))
        .await?;
    assert_eq!(grades, vec![vec![ParamValue::I64(12)], vec![ParamValue::I64(6)]]);

    // Pushing past grade 12 violates the CHECK and changes nothing.
    let err = repo
        .update_all(&[Assignment::increment("grade", 1)], &Query::new())
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));
    assert_eq!(
        repo.count(&Query::new().filter(Filter::eq("grade", 12i64))).await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn unknown_columns_are_rejected_before_execution() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    let err = repo
        .find(&Query::new().filter(Filter::eq("age", 3i64)))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidQuery(_)));

    let err = repo.project(&["name", "shoe_size"], &Query::new()).await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidQuery(_)));

    let err = repo
        .update_all(&[Assignment::increment("grade; --", 1)], &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidQuery(_)));
    Ok(())
}

#[tokio::test]
async fn separate_memory_sessions_are_isolated() -> RepoResult<()> {
    let (_a, repo_a) = setup().await?;
    let (_b, repo_b) = setup().await?;
    repo_a.insert(&pupil("Ada", "ada@school.edu", 7)).await?;
    assert_eq!(repo_a.count(&Query::new()).await?, 1);
    assert_eq!(repo_b.count(&Query::new()).await?, 0);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn operations_are_logged() -> RepoResult<()> {
    let (_session, repo) = setup().await?;
    repo.insert(&pupil("Ada", "ada@school.edu", 7)).await?;
    assert!(logs_contain("repo op"));
    assert!(logs_contain("insert"));
    assert!(logs_contain("pupils"));
    Ok(())
}

#[tokio::test]
async fn failed_commit_releases_the_transaction() -> RepoResult<()> {
    let session = LibsqlSession::open(":memory:").await?;
    // Deferred foreign keys are only checked at COMMIT.
    session
        .connection()
        .execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE grades (level INTEGER PRIMARY KEY);
             CREATE TABLE pupils (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 email TEXT NOT NULL UNIQUE,
                 grade INTEGER NOT NULL REFERENCES grades(level) DEFERRABLE INITIALLY DEFERRED,
                 born TIMESTAMP NOT NULL,
                 nickname TEXT
             );",
        )
        .await
        .map_err(RepoError::backend)?;
    let repo = session.repository::<Pupil, _>(PupilRowAdapter);

    let err = repo
        .insert_many(&[pupil("Bea", "bea@school.edu", 3)])
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Other));
    assert_eq!(repo.count(&Query::new()).await?, 0);

    // A new bulk insert can open its own transaction.
    session
        .connection()
        .execute("INSERT INTO grades (level) VALUES (3)", ())
        .await
        .map_err(RepoError::backend)?;
    let stored = repo
        .insert_many(&[pupil("Bea", "bea@school.edu", 3)])
        .await?;
    assert_eq!(stored.len(), 1);
    Ok(())
}
