use crate::{
    schema::store_entries,
    store::{KvStore, StoreError, StoreResult},
};
use diesel::{prelude::*, sqlite::SqliteConnection};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const CREATE_STORE_ENTRIES: &str = r#"CREATE TABLE IF NOT EXISTS store_entries (
    "key" TEXT PRIMARY KEY NOT NULL,
    "value" TEXT NOT NULL
)"#;

#[derive(Insertable)]
#[diesel(table_name = store_entries)]
struct NewEntry<'a> {
    key: &'a str,
    value: String,
}

impl<'a> NewEntry<'a> {
    fn new(key: &'a str, value: &Value) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// SQLite backed store. Values are kept as JSON text, keyed by a primary key
/// so a conditional insert can never create a second row for the same key.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<SqliteConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> StoreResult<Self> {
        let mut connection = Self::establish_connection(database_url)?;
        diesel::sql_query(CREATE_STORE_ENTRIES).execute(&mut connection)?;
        info!(database_url, "Connected to database");

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(
        database_url: &str,
    ) -> Result<SqliteConnection, diesel::ConnectionError> {
        SqliteConnection::establish(database_url)
    }

    fn connection(&self) -> StoreResult<MutexGuard<'_, SqliteConnection>> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl KvStore for DatabaseInterface {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut connection = self.connection()?;
        let value = store_entries::table
            .filter(store_entries::key.eq(key))
            .select(store_entries::value)
            .first::<String>(&mut *connection)
            .optional()?;

        value
            .map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(StoreError::from)
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut connection = self.connection()?;
        diesel::replace_into(store_entries::table)
            .values(&NewEntry::new(key, &value))
            .execute(&mut *connection)?;
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: Value) -> StoreResult<bool> {
        let mut connection = self.connection()?;
        let inserted = diesel::insert_or_ignore_into(store_entries::table)
            .values(&NewEntry::new(key, &value))
            .execute(&mut *connection)?;
        Ok(inserted == 1)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut connection = self.connection()?;
        diesel::delete(store_entries::table.filter(store_entries::key.eq(key)))
            .execute(&mut *connection)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<Value>> {
        let mut connection = self.connection()?;
        let rows = store_entries::table
            .filter(
                store_entries::key
                    .like(format!("{}%", escape_like(prefix)))
                    .escape('\\'),
            )
            .order(store_entries::key.asc())
            .load::<(String, String)>(&mut *connection)?;

        // LIKE ignores ASCII case.
        rows.into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| serde_json::from_str(&value).map_err(StoreError::from))
            .collect()
    }
}
