#![forbid(unsafe_code)]
#![cfg_attr(
    not(feature = "libsql-backend"),
    doc = "Enable feature `libsql-backend` to use this adapter."
)]

#[cfg(feature = "libsql-backend")]
mod backend {
    use async_trait::async_trait;
    use libsql::{Builder, Connection, Database, Row, Value};
    use rollbook_core::{
        Assignment, ConstraintKind, Fetchable, Identifiable, Insertable, ParamValue, Query,
        RepoError, RepoResult, Repository, RowAdapter, Schema,
    };
    use std::marker::PhantomData;
    use std::sync::Arc;
    use std::time::Instant;

    #[cfg(feature = "tracing")]
    use tracing::{debug, info};

    #[inline]
    #[allow(unused_variables)]
    fn obs_record(op: &str, table: &str, start: Instant, rows: usize, success: bool) {
        let elapsed = start.elapsed().as_millis() as u64;
        #[cfg(feature = "tracing")]
        {
            info!(
                sql_kind = "sql",
                table = table,
                op = op,
                rows = rows,
                elapsed_ms = elapsed,
                success = success,
                "repo op"
            );
        }
        #[cfg(feature = "metrics")]
        {
            metrics::counter!("repo_ops_total", 1, "op" => op.to_string(), "table" => table.to_string(), "success" => success.to_string());
            metrics::histogram!("repo_op_duration_ms", elapsed as f64, "op" => op.to_string(), "table" => table.to_string());
            if !success {
                metrics::counter!("repo_op_errors_total", 1, "op" => op.to_string(), "table" => table.to_string());
            }
        }
    }

    /// Records the outcome of one operation and hands the result back unchanged.
    fn observed<R>(
        op: &str,
        table: &str,
        start: Instant,
        result: RepoResult<R>,
        rows: impl Fn(&R) -> usize,
    ) -> RepoResult<R> {
        match &result {
            Ok(v) => obs_record(op, table, start, rows(v), true),
            Err(_) => obs_record(op, table, start, 0, false),
        }
        result
    }

    #[inline]
    #[allow(unused_variables)]
    fn trace_sql(sql: &str, params: usize) {
        #[cfg(feature = "tracing")]
        debug!(sql = sql, params = params, "executing statement");
    }

    fn to_libsql_value(p: ParamValue) -> Value {
        match p {
            ParamValue::String(s) => s.into(),
            ParamValue::I32(i) => (i as i64).into(), // libsql uses i64 for integers
            ParamValue::I64(i) => i.into(),
            ParamValue::F64(f) => f.into(),
            ParamValue::Bool(b) => (b as i64).into(), // SQLite bools are 0/1
            ParamValue::Null => Value::Null,
        }
    }

    fn to_libsql_values(params: Vec<ParamValue>) -> Vec<Value> {
        params.into_iter().map(to_libsql_value).collect()
    }

    fn from_libsql_value(v: Value) -> RepoResult<ParamValue> {
        Ok(match v {
            Value::Null => ParamValue::Null,
            Value::Integer(i) => ParamValue::I64(i),
            Value::Real(f) => ParamValue::F64(f),
            Value::Text(s) => ParamValue::String(s),
            Value::Blob(_) => {
                return Err(RepoError::mapping(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "BLOB values cannot be projected",
                )))
            }
        })
    }

    /// Translates a driver error, recognizing constraint violations from the engine's
    /// message. A UNIQUE failure on `<table>.<id_column>` is the rowid primary key.
    fn classify(err: libsql::Error, table: &str, id_column: &str) -> RepoError {
        let message = err.to_string();
        match constraint_kind(&message, table, id_column) {
            Some(kind) => RepoError::Constraint { kind, message },
            None => RepoError::backend(err),
        }
    }

    fn constraint_kind(message: &str, table: &str, id_column: &str) -> Option<ConstraintKind> {
        if message.contains("UNIQUE constraint failed") {
            if message.contains(&format!("{table}.{id_column}")) {
                Some(ConstraintKind::PrimaryKey)
            } else {
                Some(ConstraintKind::Unique)
            }
        } else if message.contains("CHECK constraint failed") {
            Some(ConstraintKind::Check)
        } else if message.contains("NOT NULL constraint failed") {
            Some(ConstraintKind::NotNull)
        } else if message.contains("constraint failed") {
            Some(ConstraintKind::Other)
        } else {
            None
        }
    }

    /// Unit-of-work handle over a single connection.
    ///
    /// Every connection to `:memory:` opens its own database, so all repositories
    /// vended by one session share the session's connection.
    pub struct LibsqlSession {
        db: Arc<Database>,
        conn: Connection,
    }

    impl LibsqlSession {
        /// Opens (or creates) a local database. `":memory:"` gives a transient one.
        pub async fn open(database_url: &str) -> RepoResult<Self> {
            let db = Builder::new_local(database_url)
                .build()
                .await
                .map_err(RepoError::backend)?;
            Self::from_database(Arc::new(db))
        }

        /// Starts a session on an existing database.
        pub fn from_database(db: Arc<Database>) -> RepoResult<Self> {
            let conn = db.connect().map_err(RepoError::backend)?;
            Ok(Self { db, conn })
        }

        pub fn database(&self) -> &Arc<Database> {
            &self.db
        }

        pub fn connection(&self) -> &Connection {
            &self.conn
        }

        /// Creates the table and indexes declared by `T`. Existing objects are left as is.
        pub async fn create_all<T: Schema>(&self) -> RepoResult<()> {
            let start = Instant::now();
            let statements = std::iter::once(rollbook_sql_builder::create_table::<T>())
                .chain(rollbook_sql_builder::create_indexes::<T>());
            let mut result = Ok(());
            for sql in statements {
                trace_sql(&sql, 0);
                if let Err(e) = self.conn.execute(&sql, ()).await {
                    result = Err(RepoError::backend(e));
                    break;
                }
            }
            observed("create_all", T::TABLE, start, result, |_| 0)
        }

        /// Vends a repository for `T` bound to this session's connection.
        pub fn repository<T, A>(&self, adapter: A) -> LibsqlRepository<T, A>
        where
            T: Fetchable + Identifiable + Insertable + 'static,
            A: RowAdapter<T, Row = Row> + Send + Sync + 'static,
        {
            LibsqlRepository::from_conn(self.conn.clone(), adapter)
        }
    }

    /// Statements that do not depend on the query, rendered once per repository.
    struct RepoSql<T> {
        select_all: String,
        select_by_id: String,
        insert: String,
        _marker: PhantomData<T>,
    }

    impl<T> RepoSql<T>
    where
        T: Fetchable + Identifiable + Insertable,
    {
        fn new() -> Self {
            Self {
                select_all: rollbook_sql_builder::select_all::<T>(),
                select_by_id: rollbook_sql_builder::select_by_id::<T>(T::ID_COLUMN),
                insert: rollbook_sql_builder::insert::<T>(),
                _marker: PhantomData,
            }
        }
    }

    /// A fully asynchronous, `libsql`-backed repository.
    pub struct LibsqlRepository<T, A>
    where
        T: Identifiable + 'static,
        A: RowAdapter<T> + Send + Sync + 'static,
    {
        conn: Connection,
        adapter: A,
        sql: RepoSql<T>,
    }

    impl<T, A> LibsqlRepository<T, A>
    where
        T: Fetchable + Identifiable + Insertable + 'static,
        A: RowAdapter<T, Row = Row> + Send + Sync + 'static,
    {
        /// Creates a repository executing on the provided connection.
        pub fn from_conn(conn: Connection, adapter: A) -> Self {
            Self {
                conn,
                adapter,
                sql: RepoSql::<T>::new(),
            }
        }

        fn classify(&self, err: libsql::Error) -> RepoError {
            classify(err, T::TABLE, T::ID_COLUMN)
        }

        async fn fetch(&self, sql: &str, params: Vec<Value>) -> RepoResult<Vec<T>> {
            trace_sql(sql, params.len());
            let mut rows = self
                .conn
                .query(sql, params)
                .await
                .map_err(|e| self.classify(e))?;
            let mut entities = Vec::new();
            while let Some(row) = rows.next().await.map_err(RepoError::backend)? {
                entities.push(self.adapter.from_row(&row)?);
            }
            Ok(entities)
        }

        async fn insert_row(&self, entity: &T) -> RepoResult<i64> {
            let values = to_libsql_values(entity.insert_values());
            trace_sql(&self.sql.insert, values.len());
            self.conn
                .execute(&self.sql.insert, values)
                .await
                .map_err(|e| self.classify(e))?;
            Ok(self.conn.last_insert_rowid())
        }

        async fn insert_rows(&self, entities: &[T]) -> RepoResult<Vec<i64>> {
            let mut ids = Vec::with_capacity(entities.len());
            for entity in entities {
                ids.push(self.insert_row(entity).await?);
            }
            Ok(ids)
        }

        /// Reads a freshly inserted row back so storage-generated values are visible.
        async fn reload(&self, id: i64) -> RepoResult<T> {
            self.fetch(&self.sql.select_by_id, vec![id.into()])
                .await?
                .into_iter()
                .next()
                .ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl<T, A> Repository<T> for LibsqlRepository<T, A>
    where
        T: Fetchable + Identifiable + Insertable + Send + Sync + 'static,
        A: RowAdapter<T, Row = Row> + Send + Sync + 'static,
        T::Key: Clone + Send + Sync + Into<Value>,
    {
        async fn find_by_id(&self, id: &T::Key) -> RepoResult<Option<T>> {
            let start = Instant::now();
            let result = self
                .fetch(&self.sql.select_by_id, vec![id.clone().into()])
                .await
                .map(|rows| rows.into_iter().next());
            observed("find_by_id", T::TABLE, start, result, |found| {
                usize::from(found.is_some())
            })
        }

        async fn find_all(&self) -> RepoResult<Vec<T>> {
            let start = Instant::now();
            let result = self.fetch(&self.sql.select_all, Vec::new()).await;
            observed("find_all", T::TABLE, start, result, Vec::len)
        }

        async fn find(&self, query: &Query) -> RepoResult<Vec<T>> {
            let start = Instant::now();
            let result = async {
                let (sql, params) = rollbook_sql_builder::select_query::<T>(query)?;
                self.fetch(&sql, to_libsql_values(params)).await
            }
            .await;
            observed("find", T::TABLE, start, result, Vec::len)
        }

        async fn first(&self, query: &Query) -> RepoResult<Option<T>> {
            let start = Instant::now();
            let result = async {
                let limited = query.clone().limit(1);
                let (sql, params) = rollbook_sql_builder::select_query::<T>(&limited)?;
                let rows = self.fetch(&sql, to_libsql_values(params)).await?;
                Ok(rows.into_iter().next())
            }
            .await;
            observed("first", T::TABLE, start, result, |found| {
                usize::from(found.is_some())
            })
        }

        async fn project(
            &self,
            columns: &[&str],
            query: &Query,
        ) -> RepoResult<Vec<Vec<ParamValue>>> {
            let start = Instant::now();
            let result = async {
                let (sql, params) = rollbook_sql_builder::select_columns::<T>(columns, query)?;
                trace_sql(&sql, params.len());
                let mut rows = self
                    .conn
                    .query(&sql, to_libsql_values(params))
                    .await
                    .map_err(|e| self.classify(e))?;
                let mut out = Vec::new();
                while let Some(row) = rows.next().await.map_err(RepoError::backend)? {
                    let mut values = Vec::with_capacity(columns.len());
                    for idx in 0..columns.len() {
                        let value = row.get_value(idx as i32).map_err(RepoError::mapping)?;
                        values.push(from_libsql_value(value)?);
                    }
                    out.push(values);
                }
                Ok(out)
            }
            .await;
            observed("project", T::TABLE, start, result, Vec::len)
        }

        async fn count(&self, query: &Query) -> RepoResult<u64> {
            let start = Instant::now();
            let result = async {
                let (sql, params) = rollbook_sql_builder::count_query::<T>(query)?;
                trace_sql(&sql, params.len());
                let mut rows = self
                    .conn
                    .query(&sql, to_libsql_values(params))
                    .await
                    .map_err(|e| self.classify(e))?;
                let row = rows
                    .next()
                    .await
                    .map_err(RepoError::backend)?
                    .ok_or(RepoError::NotFound)?;
                let n: i64 = row.get(0).map_err(RepoError::mapping)?;
                Ok(n as u64)
            }
            .await;
            observed("count", T::TABLE, start, result, |_| 1)
        }

        async fn insert(&self, entity: &T) -> RepoResult<T> {
            let start = Instant::now();
            let result = async {
                let id = self.insert_row(entity).await?;
                self.reload(id).await
            }
            .await;
            observed("insert", T::TABLE, start, result, |_| 1)
        }

        async fn insert_many(&self, entities: &[T]) -> RepoResult<Vec<T>> {
            let start = Instant::now();
            if entities.is_empty() {
                return observed("insert_many", T::TABLE, start, Ok(Vec::new()), Vec::len);
            }
            let result = async {
                self.conn
                    .execute("BEGIN", ())
                    .await
                    .map_err(RepoError::backend)?;
                let ids = match self.insert_rows(entities).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        self.conn.execute("ROLLBACK", ()).await.ok();
                        return Err(e);
                    }
                };
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(self.classify(e));
                }

                let mut stored = Vec::with_capacity(ids.len());
                for id in ids {
                    stored.push(self.reload(id).await?);
                }
                Ok(stored)
            }
            .await;
            observed("insert_many", T::TABLE, start, result, Vec::len)
        }

        async fn update_all(&self, assignments: &[Assignment], query: &Query) -> RepoResult<u64> {
            let start = Instant::now();
            let result = async {
                let (sql, params) = rollbook_sql_builder::update_query::<T>(assignments, query)?;
                trace_sql(&sql, params.len());
                self.conn
                    .execute(&sql, to_libsql_values(params))
                    .await
                    .map_err(|e| self.classify(e))
            }
            .await;
            observed("update_all", T::TABLE, start, result, |n| *n as usize)
        }
    }

}

#[cfg(feature = "libsql-backend")]
pub use backend::{LibsqlRepository, LibsqlSession};
