//! PostgreSQL store gateway
//!
//! Owns one connection for the process lifetime, bootstraps the destination
//! schema, and appends rows to `forex_data`. Diesel is synchronous, so the
//! async entry points run the blocking work on tokio's blocking pool while
//! the connection mutex keeps a single statement in flight.

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::core::config::DatabaseConfig;
use crate::core::{ConnectionError, RateRecord, ReadError, SchemaError, WriteError};
use crate::store::schema::forex_data;
use crate::store::{RateStore, StoredRate};

pub const FOREX_TABLE: &str = "forex_data";

const CREATE_FOREX_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS forex_data (
    id SERIAL PRIMARY KEY,
    currency_pair VARCHAR(10) NOT NULL,
    exchange_rate NUMERIC NOT NULL,
    timestamp TEXT NOT NULL
)"#;

const DATABASE_EXISTS: &str =
    "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS present";

const TABLE_COLUMNS: &str = "SELECT column_name::text AS column_name, data_type::text AS data_type \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1";

const TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1) AS present";

// Postgres truncates identifiers longer than NAMEDATALEN - 1 bytes
const MAX_IDENTIFIER_LEN: usize = 63;

/// Quotes `name` for use as a SQL identifier, doubling embedded quotes.
///
/// Only needed where the server cannot take a bind parameter, such as
/// `CREATE DATABASE`.
pub fn quote_identifier(name: &str) -> Result<String, SchemaError> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN || name.contains('\0') {
        return Err(SchemaError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// What `ensure_schema` had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub database_created: bool,
    pub table_created: bool,
}

#[derive(QueryableByName)]
struct Presence {
    #[diesel(sql_type = Bool)]
    present: bool,
}

#[derive(QueryableByName)]
struct ColumnType {
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    data_type: String,
}

// Column types the insert and read paths bind against
const EXPECTED_COLUMNS: [(&str, &[&str]); 4] = [
    ("id", &["integer"]),
    ("currency_pair", &["character varying", "text"]),
    ("exchange_rate", &["numeric"]),
    ("timestamp", &["text", "character varying"]),
];

/// Describes the first column of `columns` that the gateway cannot write to.
fn incompatible_column(columns: &[ColumnType]) -> Option<String> {
    EXPECTED_COLUMNS.iter().find_map(|(name, accepted)| {
        match columns.iter().find(|c| c.column_name == *name) {
            None => Some(format!("missing column '{name}'")),
            Some(c) if !accepted.contains(&c.data_type.as_str()) => Some(format!(
                "column '{name}' has type {}, expected {}",
                c.data_type,
                accepted.join(" or ")
            )),
            Some(_) => None,
        }
    })
}

#[derive(Insertable)]
#[diesel(table_name = forex_data)]
struct NewRate<'a> {
    currency_pair: &'a str,
    exchange_rate: Decimal,
    observed_at: &'a str,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = forex_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct RateRow {
    id: i32,
    currency_pair: String,
    exchange_rate: Decimal,
    observed_at: String,
}

impl From<RateRow> for StoredRate {
    fn from(row: RateRow) -> Self {
        StoredRate {
            id: row.id,
            currency_pair: row.currency_pair,
            exchange_rate: row.exchange_rate,
            observed_at: row.observed_at,
        }
    }
}

type SharedConnection = Arc<Mutex<PgConnection>>;

fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, PgConnection>, String> {
    conn.lock()
        .map_err(|_| "connection lock poisoned".to_string())
}

fn establish(config: &DatabaseConfig) -> Result<PgConnection, ConnectionError> {
    let url = config.connection_url()?;
    let mut conn = PgConnection::establish(&url)?;
    diesel::sql_query("SELECT set_config('statement_timeout', $1, false)")
        .bind::<Text, _>(config.statement_timeout_ms.to_string())
        .execute(&mut conn)
        .map_err(ConnectionError::Session)?;
    Ok(conn)
}

fn exists(conn: &mut PgConnection, query: &str, name: &str) -> Result<bool, SchemaError> {
    diesel::sql_query(query)
        .bind::<Text, _>(name)
        .get_result::<Presence>(conn)
        .map(|row| row.present)
        .map_err(SchemaError::Inspect)
}

fn ensure_database(conn: &mut PgConnection, name: &str) -> Result<bool, SchemaError> {
    let quoted = quote_identifier(name)?;
    if exists(conn, DATABASE_EXISTS, name)? {
        debug!(database = name, "Database already exists");
        return Ok(false);
    }
    diesel::sql_query(format!("CREATE DATABASE {quoted}"))
        .execute(conn)
        .map_err(|source| SchemaError::CreateDatabase {
            name: name.to_string(),
            source,
        })?;
    info!(database = name, "Created database");
    Ok(true)
}

fn verify_columns(conn: &mut PgConnection) -> Result<(), SchemaError> {
    let columns = diesel::sql_query(TABLE_COLUMNS)
        .bind::<Text, _>(FOREX_TABLE)
        .load::<ColumnType>(conn)
        .map_err(SchemaError::Inspect)?;
    match incompatible_column(&columns) {
        Some(reason) => Err(SchemaError::IncompatibleTable {
            name: FOREX_TABLE.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn ensure_table(conn: &mut PgConnection) -> Result<bool, SchemaError> {
    if exists(conn, TABLE_EXISTS, FOREX_TABLE)? {
        debug!(table = FOREX_TABLE, "Table already exists");
        verify_columns(conn)?;
        return Ok(false);
    }
    match diesel::sql_query(CREATE_FOREX_TABLE).execute(conn) {
        Ok(_) => {
            info!(table = FOREX_TABLE, "Created table");
            Ok(true)
        }
        // A concurrent bootstrap may have won the race; the table is what matters.
        Err(source) if exists(conn, TABLE_EXISTS, FOREX_TABLE).unwrap_or(false) => {
            verify_columns(conn)?;
            warn!(table = FOREX_TABLE, error = %source, "Table creation failed but table is usable");
            Ok(false)
        }
        Err(source) => Err(SchemaError::CreateTable {
            name: FOREX_TABLE.to_string(),
            source,
        }),
    }
}

fn bootstrap(conn: &SharedConnection, database: &str) -> Result<SchemaReport, SchemaError> {
    let mut conn = lock(conn).map_err(SchemaError::Unavailable)?;
    let database_created = ensure_database(&mut conn, database).unwrap_or_else(|err| {
        warn!(database, error = %err, "Database bootstrap failed, continuing with table check");
        false
    });
    let table_created = ensure_table(&mut conn)?;
    Ok(SchemaReport {
        database_created,
        table_created,
    })
}

fn insert(conn: &SharedConnection, record: &RateRecord) -> Result<(), WriteError> {
    let mut conn = lock(conn).map_err(WriteError::Unavailable)?;
    let row = NewRate {
        currency_pair: record.currency_pair().as_str(),
        exchange_rate: record.exchange_rate(),
        observed_at: record.observed_at(),
    };
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::insert_into(forex_data::table)
            .values(&row)
            .execute(conn)
    })?;
    Ok(())
}

fn load_rows(conn: &SharedConnection, pair: &str) -> Result<Vec<StoredRate>, ReadError> {
    let mut conn = lock(conn).map_err(ReadError::Unavailable)?;
    let rows = forex_data::table
        .filter(forex_data::currency_pair.eq(pair))
        .order(forex_data::id.asc())
        .select(RateRow::as_select())
        .load(&mut *conn)?;
    Ok(rows.into_iter().map(StoredRate::from).collect())
}

/// Store gateway over a single PostgreSQL connection.
///
/// The connection is released by `close`, or when the gateway is dropped on
/// an error path.
pub struct PgGateway {
    conn: SharedConnection,
    database: String,
}

impl PgGateway {
    /// Opens the connection and applies the session statement timeout.
    #[instrument(name = "PgConnect", skip(config), fields(host = %config.host, database = %config.name))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        let settings = config.clone();
        let conn = tokio::task::spawn_blocking(move || establish(&settings))
            .await
            .map_err(|e| ConnectionError::Unavailable(e.to_string()))??;
        info!("Database connection successful");
        Ok(PgGateway {
            conn: Arc::new(Mutex::new(conn)),
            database: config.name.clone(),
        })
    }

    /// Creates the database and `forex_data` table if missing. Safe to repeat.
    ///
    /// A failed database step is logged and skipped; only an unusable table
    /// is an error.
    pub async fn ensure_schema(&self) -> Result<SchemaReport, SchemaError> {
        let conn = Arc::clone(&self.conn);
        let database = self.database.clone();
        tokio::task::spawn_blocking(move || bootstrap(&conn, &database))
            .await
            .map_err(|e| SchemaError::Unavailable(e.to_string()))?
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Drops the connection handle, closing the session.
    pub fn close(self) {
        let PgGateway { conn, database } = self;
        drop(conn);
        info!(database = %database, "Closed database connection");
    }
}

#[async_trait]
impl RateStore for PgGateway {
    #[instrument(name = "PgWrite", skip(self, record), fields(pair = %record.currency_pair()))]
    async fn write(&self, record: &RateRecord) -> Result<(), WriteError> {
        let conn = Arc::clone(&self.conn);
        let record = record.clone();
        tokio::task::spawn_blocking(move || insert(&conn, &record))
            .await
            .map_err(|e| WriteError::Unavailable(e.to_string()))??;
        debug!("Insert committed");
        Ok(())
    }

    async fn rows_for_pair(&self, pair: &str) -> Result<Vec<StoredRate>, ReadError> {
        let conn = Arc::clone(&self.conn);
        let pair = pair.to_string();
        tokio::task::spawn_blocking(move || load_rows(&conn, &pair))
            .await
            .map_err(|e| ReadError::Unavailable(e.to_string()))?
    }
}
