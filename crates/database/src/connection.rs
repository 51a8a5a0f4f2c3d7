use crate::bind::bind_value;
use crate::error::DbError;
use crate::query::Statement;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Connection, PgConnection};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// The statement session on an open connection. It records the text of the
/// last statement it ran so failures can be reported with it.
#[derive(Debug, Default)]
pub(crate) struct Cursor {
    last_statement: Option<String>,
}

#[derive(Default)]
pub(crate) struct ConnectionState {
    connection: Option<PgConnection>,
    cursor: Option<Cursor>,
}

impl ConnectionState {
    /// Forgets the connection after a transport failure or timeout; the next
    /// `connect` opens a fresh one.
    fn reset(&mut self) {
        self.cursor = None;
        self.connection = None;
    }
}

/// Owns the one connection + cursor pair used by a persistence engine.
///
/// Every operation that touches the pair holds a single async mutex from
/// connect through commit, so statements never interleave.
pub struct ConnectionManager {
    settings: DatabaseSettings,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    /// Creates a manager; nothing is opened until [`connect`](Self::connect)
    /// or the first persistence operation.
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Opens the connection and cursor if they are not open yet. Safe to call
    /// before every operation.
    pub async fn connect(&self) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        self.open(&mut state).await
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    pub async fn has_cursor(&self) -> bool {
        let state = self.state.lock().await;
        state.connection.is_some() && state.cursor.is_some()
    }

    /// Text of the last statement the cursor ran, if any.
    pub async fn last_statement(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.cursor.as_ref().and_then(|c| c.last_statement.clone())
    }

    /// Closes the cursor, then the connection. Idempotent; also fine on a
    /// half-open or never-opened manager.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.cursor = None;
        if let Some(connection) = state.connection.take() {
            match connection.close().await {
                Ok(()) => tracing::info!(
                    target_db = %self.settings.connection_target(),
                    "Database connection closed."
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Database connection did not shut down cleanly; it has been dropped."
                ),
            }
        }
    }

    /// Locks the pair, opening it if needed, for one or more statements.
    pub(crate) async fn session(&self) -> Result<Session<'_>, DbError> {
        let mut state = self.state.lock().await;
        self.open(&mut state).await?;
        Ok(Session {
            state,
            statement_timeout: self.settings.statement_timeout(),
        })
    }

    async fn open(&self, state: &mut ConnectionState) -> Result<(), DbError> {
        if state.connection.is_some() && state.cursor.is_some() {
            return Ok(());
        }

        if state.connection.is_none() {
            let target = self.settings.connection_target();
            let after = self.settings.connect_timeout();
            let options = connect_options(&self.settings);

            let connection =
                match tokio::time::timeout(after, PgConnection::connect_with(&options)).await {
                    Ok(Ok(connection)) => connection,
                    Ok(Err(source)) => {
                        tracing::error!(
                            target_db = %target,
                            error = %source,
                            "Unable to connect to the database with the given connection parameters."
                        );
                        return Err(DbError::Connection { target, source });
                    }
                    Err(_) => {
                        tracing::error!(target_db = %target, ?after, "Timed out connecting to the database.");
                        return Err(DbError::Timeout {
                            operation: format!("Connecting to '{target}'"),
                            after,
                        });
                    }
                };
            tracing::info!(target_db = %target, "Database connection established.");
            state.connection = Some(connection);
        }

        if state.cursor.is_none() {
            state.cursor = Some(Cursor::default());
        }
        Ok(())
    }
}

fn connect_options(settings: &DatabaseSettings) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();
    if let Some(host) = &settings.hostname {
        options = options.host(host);
    }
    if let Some(port) = settings.port {
        options = options.port(port);
    }
    if let Some(db_name) = &settings.db_name {
        options = options.database(db_name);
    }
    if let Some(user) = &settings.username {
        options = options.username(user);
    }
    if let Some(password) = &settings.password {
        options = options.password(password);
    }
    options
}

fn is_transport_failure(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
    )
}

/// Exclusive use of the connection + cursor pair.
pub(crate) struct Session<'a> {
    state: MutexGuard<'a, ConnectionState>,
    statement_timeout: Duration,
}

impl Session<'_> {
    /// Runs `statement` in its own transaction and commits it, returning any
    /// rows it produced.
    pub(crate) async fn execute(
        &mut self,
        table: &str,
        statement: &Statement,
    ) -> Result<Vec<PgRow>, DbError> {
        let compiled = statement.compile()?;
        let mut query = sqlx::query(&compiled.sql);
        for (name, value) in &compiled.binds {
            query = bind_value(query, name, value)?;
        }

        let after = self.statement_timeout;
        let state = &mut *self.state;
        let (Some(connection), Some(cursor)) = (state.connection.as_mut(), state.cursor.as_mut())
        else {
            return Err(DbError::Disconnected);
        };
        cursor.last_statement = Some(statement.text().to_string());
        tracing::debug!(table, sql = %compiled.sql, "Executing statement.");

        let outcome = tokio::time::timeout(after, async {
            let mut tx = connection.begin().await?;
            let rows = query.fetch_all(&mut *tx).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(rows)
        })
        .await;

        match outcome {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(source)) => {
                if is_transport_failure(&source) {
                    state.reset();
                }
                tracing::error!(
                    table,
                    sql = statement.text(),
                    error = %source,
                    "Statement failed."
                );
                Err(DbError::QueryExecution {
                    table: table.to_string(),
                    sql: statement.text().to_string(),
                    source,
                })
            }
            Err(_) => {
                state.reset();
                tracing::error!(table, sql = statement.text(), ?after, "Statement timed out.");
                Err(DbError::Timeout {
                    operation: format!("Statement on table '{table}'"),
                    after,
                })
            }
        }
    }
}
