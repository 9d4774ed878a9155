// Criterion benches for bulk insert and filtered queries against an in-memory libsql database.
// Run locally with:
//   cargo bench -p rollbook_libsql --bench ops

#[cfg(all(feature = "libsql-backend", feature = "backend-adapters"))]
mod bench_impl {
    use criterion::{black_box, BatchSize, Criterion};
    use rollbook_core::{Assignment, Filter, Query, Repository};
    use rollbook_libsql::{LibsqlRepository, LibsqlSession};
    use tokio::runtime::Runtime;

    #[derive(rollbook_macros::Entity, Clone, Debug, PartialEq)]
    #[entity(table = "pupils")]
    #[entity(check(name = "grade_range", expr = "grade BETWEEN 1 AND 12"))]
    #[entity(index(name = "pupils_name_idx", columns = "name"))]
    pub struct Pupil {
        #[fetch(id)]
        id: Option<i64>,
        name: String,
        #[fetch(unique)]
        email: String,
        grade: i64,
    }

    fn batch(n: usize) -> Vec<Pupil> {
        (0..n)
            .map(|i| Pupil {
                id: None,
                name: format!("Pupil {i}"),
                email: format!("p{i}@school.edu"),
                grade: (i % 11 + 1) as i64,
            })
            .collect()
    }

    fn setup(rt: &Runtime) -> (LibsqlSession, LibsqlRepository<Pupil, PupilRowAdapter>) {
        rt.block_on(async {
            let session = LibsqlSession::open(":memory:").await.expect("open db");
            session.create_all::<Pupil>().await.expect("apply schema");
            let repo = session.repository::<Pupil, _>(PupilRowAdapter);
            (session, repo)
        })
    }

    pub fn bench_insert_many(c: &mut Criterion) {
        let rt = Runtime::new().expect("runtime");
        let rows = batch(100);
        let mut group = c.benchmark_group("libsql_insert_many");
        group.bench_function("hundred_rows", |b| {
            b.iter_batched(
                || setup(&rt),
                |(_session, repo)| {
                    let stored = rt
                        .block_on(async { repo.insert_many(&rows).await })
                        .expect("insert ok");
                    black_box(stored);
                },
                BatchSize::SmallInput,
            )
        });
        group.finish();
    }

    pub fn bench_queries(c: &mut Criterion) {
        let rt = Runtime::new().expect("runtime");
        let (_session, repo) = setup(&rt);
        rt.block_on(async { repo.insert_many(&batch(500)).await })
            .expect("seed");

        let mut group = c.benchmark_group("libsql_query");
        group.bench_function("find_like_ordered", |b| {
            let query = Query::new()
                .filter(Filter::contains("name", "4"))
                .order_by_desc("grade")
                .limit(20);
            b.iter(|| {
                let rows = rt.block_on(async { repo.find(&query).await }).expect("find ok");
                black_box(rows);
            })
        });
        group.bench_function("project_by_grade", |b| {
            let query = Query::new().filter(Filter::eq("grade", 6i64));
            b.iter(|| {
                let rows = rt
                    .block_on(async { repo.project(&["name", "email"], &query).await })
                    .expect("project ok");
                black_box(rows);
            })
        });
        group.bench_function("update_all_set", |b| {
            let query = Query::new().filter(Filter::eq("grade", 3i64));
            b.iter(|| {
                let changed = rt
                    .block_on(async {
                        repo.update_all(&[Assignment::set("grade", 3i64)], &query)
                            .await
                    })
                    .expect("update ok");
                black_box(changed);
            })
        });
        group.finish();
    }
}

#[cfg(all(feature = "libsql-backend", feature = "backend-adapters"))]
criterion::criterion_group!(
    benches,
    bench_impl::bench_insert_many,
    bench_impl::bench_queries
);
#[cfg(all(feature = "libsql-backend", feature = "backend-adapters"))]
criterion::criterion_main!(benches);

#[cfg(not(all(feature = "libsql-backend", feature = "backend-adapters")))]
fn main() {}
