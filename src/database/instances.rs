use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::{PgPool, Row};

use super::manager::DatabaseError;

/// Reads the stored JSON document for one model instance as text, so the
/// payload reaches the handler exactly as Postgres renders it.
pub const SELECT_INSTANCE_SQL: &str =
    "SELECT data #>> '{}' FROM bim_models.instances WHERE model = $1 AND id = $2";

/// Identifiers of the document(s) to fetch, taken verbatim from the query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub model_id: String,
    pub instance_id: String,
}

/// One row of a lookup result.
///
/// Extraction of the JSON column may fail independently of the cursor
/// itself, so the payload is kept as a `Result` until the handler looks at it.
#[derive(Debug)]
pub struct InstanceRow {
    payload: Result<Vec<u8>, DatabaseError>,
}

impl InstanceRow {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self { payload: Ok(payload.into()) }
    }

    /// A row whose column could not be extracted
    pub fn unreadable(error: DatabaseError) -> Self {
        Self { payload: Err(error) }
    }

    /// Raw bytes of the JSON column
    pub fn payload(&self) -> Result<&[u8], &DatabaseError> {
        self.payload.as_deref()
    }
}

/// Result cursor: yields rows in store order until exhausted or a fetch fails.
/// Dropping it releases the underlying connection.
pub type RowStream<'a> = BoxStream<'a, Result<InstanceRow, DatabaseError>>;

/// Query-executing data source for model instances
#[async_trait]
pub trait InstanceSource: Send + Sync {
    /// Execute the lookup. `Err` means the query could not be opened or
    /// executed; no rows were produced in that case.
    async fn query_instances<'a>(&'a self, query: &'a LookupQuery) -> Result<RowStream<'a>, DatabaseError>;
}

/// `InstanceSource` backed by the shared Postgres pool
#[derive(Clone)]
pub struct PgInstanceSource {
    pool: PgPool,
    statement: &'static str,
}

impl PgInstanceSource {
    pub fn new(pool: PgPool) -> Self {
        Self::with_statement(pool, SELECT_INSTANCE_SQL)
    }

    /// Run a different lookup statement. It must select one text column
    /// and take the model and instance identifiers as $1 and $2.
    pub fn with_statement(pool: PgPool, statement: &'static str) -> Self {
        Self { pool, statement }
    }
}

#[async_trait]
impl InstanceSource for PgInstanceSource {
    async fn query_instances<'a>(&'a self, query: &'a LookupQuery) -> Result<RowStream<'a>, DatabaseError> {
        let mut rows = sqlx::query(self.statement)
            .bind(query.model_id.as_str())
            .bind(query.instance_id.as_str())
            .fetch(&self.pool)
            .peekable();

        // sqlx runs the statement on first poll; an error there means the
        // query itself failed, not a row
        let failed_to_execute = matches!(Pin::new(&mut rows).peek().await, Some(Err(_)));
        if failed_to_execute {
            if let Some(Err(e)) = rows.next().await {
                return Err(e.into());
            }
        }

        Ok(rows
            .map(|fetched| {
                fetched.map_err(DatabaseError::from).map(|row| {
                    match row.try_get::<String, _>(0) {
                        Ok(text) => InstanceRow::new(text),
                        Err(e) => InstanceRow::unreadable(e.into()),
                    }
                })
            })
            .boxed())
    }
}
