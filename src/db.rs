use deadpool_postgres::Pool;
use postgres_types::ToSql;

use crate::error::AppError;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

/// Serializes concurrent schema runs.
const MIGRATION_LOCK: i64 = 0x0dab5;

/// Creates every type and table that is still missing. Safe to run on
/// each start, also from several processes at once.
pub async fn migrate(db_pool: &Pool) -> Result<(), AppError> {
    let mut db_conn = db_pool.get().await?;
    let txn = db_conn.transaction().await?;
    txn.execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK])
        .await?;
    txn.batch_execute(SCHEMA).await?;
    txn.commit().await?;
    log::info!("database schema is up to date");
    Ok(())
}

/// `%value%` with the LIKE wildcards in `value` escaped.
pub fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

type Param = Box<dyn ToSql + Sync + Send>;

/// Accumulates `WHERE` conditions and their positional parameters.
#[derive(Default, Debug)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<Param>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    fn bind(&mut self, value: Param) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Adds `condition`, where each `?` is replaced by the placeholder
    /// bound to `value`.
    pub fn push<T: ToSql + Sync + Send + 'static>(&mut self, condition: &str, value: T) {
        let placeholder = self.bind(Box::new(value));
        self.clauses.push(condition.replace('?', &placeholder));
    }

    /// Adds a condition that binds nothing.
    pub fn require(&mut self, condition: &str) {
        self.clauses.push(condition.to_string());
    }

    /// Case-insensitive substring match of `q` over any of `columns`.
    pub fn search(&mut self, columns: &[&str], q: &str) {
        if columns.is_empty() {
            return;
        }
        let placeholder = self.bind(Box::new(like_pattern(q)));
        let any = columns
            .iter()
            .map(|column| format!("{} ILIKE {}", column, placeholder))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({})", any));
    }

    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }

    /// Placeholder for a value bound after the filter ones, e.g. a LIMIT.
    pub fn next_placeholder(&self, offset: usize) -> String {
        format!("${}", self.params.len() + offset)
    }
}
