//! Pooled SQLite connection client.
//!
//! # Responsibility
//! - Open file or in-memory SQLite pools and configure per-connection pragmas.
//! - Hand each call its own pooled connection, bounded by the caller's deadline.
//! - Release handles independently; the pool closes once no handle holds it.
//!
//! # Invariants
//! - Every pooled connection has `foreign_keys=ON`; file databases run in WAL mode.
//! - Waiting for a connection or for a busy database never outlives the deadline.
//! - A stopped handle rejects every call with `DbError::Stopped`.

use super::{DbError, DbResult, Deadline};
use crate::config::{DbConfig, DEFAULT_POOL_SIZE};
use log::{error, info};
use r2d2::{ManageConnection, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Params, Transaction};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type ConnectionPool = Pool<SqliteConnectionManager>;
pub type PooledSqlite = PooledConnection<SqliteConnectionManager>;

const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;";

/// Wait bound used when the caller passes `Deadline::none()`.
const UNBOUNDED_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Cloneable handle over one connection pool.
///
/// Every clone holds the pool. `stop` releases the calling handle only; the
/// pool and its connections are closed once no handle holds it.
pub struct Client {
    pool: Mutex<Option<ConnectionPool>>,
    mode: &'static str,
}

impl Client {
    /// Opens the database described by `config`.
    ///
    /// `":memory:"` opens a private in-memory database shared by every
    /// connection of this pool.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn connect(config: &DbConfig, deadline: &Deadline) -> DbResult<Self> {
        if config.is_in_memory() {
            return Self::open_with("memory", deadline, memory_manager(), config.pool_size);
        }
        let manager = SqliteConnectionManager::file(&config.path).with_init(file_pragmas);
        Self::open_with("file", deadline, manager, config.pool_size)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(deadline: &Deadline) -> DbResult<Self> {
        Self::open_with("memory", deadline, memory_manager(), DEFAULT_POOL_SIZE)
    }

    fn open_with(
        mode: &'static str,
        deadline: &Deadline,
        manager: SqliteConnectionManager,
        pool_size: u32,
    ) -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode={mode} pool_size={pool_size}");

        let result = deadline
            .check()
            .and_then(|()| build_pool(deadline, manager, pool_size));

        match result {
            Ok(pool) => {
                info!(
                    "event=db_open module=db status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    pool: Mutex::new(Some(pool)),
                    mode,
                })
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Executes one statement and returns the number of affected rows.
    pub fn execute<P: Params>(&self, deadline: &Deadline, sql: &str, params: P) -> DbResult<usize> {
        self.with_connection(deadline, |conn| Ok(conn.execute(sql, params)?))
    }

    /// Executes a batch of statements without parameters.
    pub fn execute_batch(&self, deadline: &Deadline, sql: &str) -> DbResult<()> {
        self.with_connection(deadline, |conn| Ok(conn.execute_batch(sql)?))
    }

    /// Runs `f` on a connection checked out for the duration of the call.
    ///
    /// Other calls, including calls made from inside `f`, check out their own
    /// connection and never wait for `f` to return.
    pub fn with_connection<T, E>(
        &self,
        deadline: &Deadline,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let conn = self.acquire(deadline)?;
        f(&conn)
    }

    /// Runs `f` inside a transaction committed only when `f` succeeds.
    pub fn with_transaction<T, E>(
        &self,
        deadline: &Deadline,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut conn = self.acquire(deadline)?;
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        deadline.check()?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Reports whether `table` currently holds no rows.
    pub fn is_table_empty(&self, deadline: &Deadline, table: &str) -> DbResult<bool> {
        self.with_connection(deadline, |conn| {
            let exists: i64 = conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} LIMIT 1);"),
                [],
                |row| row.get(0),
            )?;
            Ok(exists == 0)
        })
    }

    /// Releases this handle. The pool closes when it was the last holder.
    ///
    /// Calling `stop` twice on the same handle is a no-op.
    pub fn stop(&self, deadline: &Deadline) -> DbResult<()> {
        deadline.check()?;
        if self.slot().take().is_some() {
            info!("event=db_stop module=db status=ok mode={}", self.mode);
        }
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.slot().is_none()
    }

    // The slot holds only a cloneable pool handle, so a poisoned lock still
    // guards a consistent value.
    fn slot(&self) -> MutexGuard<'_, Option<ConnectionPool>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks out a connection, waiting at most until `deadline`.
    ///
    /// The busy timeout is set to the same remaining budget, so statements
    /// blocked by another writer also give up at the deadline.
    fn acquire(&self, deadline: &Deadline) -> DbResult<PooledSqlite> {
        let pool = self.slot().clone().ok_or(DbError::Stopped)?;
        deadline.check()?;

        let wait = deadline.remaining().unwrap_or(UNBOUNDED_WAIT);
        let conn = pool.get_timeout(wait).map_err(|err| {
            if deadline.is_expired() {
                DbError::DeadlineExceeded
            } else {
                DbError::Pool(err)
            }
        })?;

        deadline.check()?;
        conn.busy_timeout(deadline.remaining().unwrap_or(UNBOUNDED_WAIT))?;
        Ok(conn)
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            pool: Mutex::new(self.slot().clone()),
            mode: self.mode,
        }
    }
}

/// Shared-cache URI with a unique name: every connection of one pool sees the
/// same in-memory database, separate pools never do.
fn memory_manager() -> SqliteConnectionManager {
    let uri = format!(
        "file:catalog-{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    SqliteConnectionManager::file(uri).with_init(memory_pragmas)
}

fn memory_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(MEMORY_PRAGMAS)
}

fn file_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(FILE_PRAGMAS)
}

fn build_pool(
    deadline: &Deadline,
    manager: SqliteConnectionManager,
    pool_size: u32,
) -> DbResult<ConnectionPool> {
    // Surfaces the engine's own open error instead of a pool timeout.
    let first = manager.connect()?;

    let setup_wait = deadline
        .remaining()
        .filter(|remaining| !remaining.is_zero())
        .unwrap_or(UNBOUNDED_WAIT);
    // In-memory databases vanish with their last connection, so pooled
    // connections are never recycled.
    let pool = Pool::builder()
        .max_size(pool_size)
        .min_idle(Some(1))
        .max_lifetime(None)
        .idle_timeout(None)
        .connection_timeout(setup_wait)
        .build(manager)?;

    drop(first);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::config::DbConfig;
    use crate::db::{DbError, Deadline};
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn stopped_handle_rejects_calls_but_clones_keep_working() {
        let first = Client::open_in_memory(&Deadline::none()).unwrap();
        let second = first.clone();
        first
            .execute_batch(&Deadline::none(), "CREATE TABLE t (v INTEGER);")
            .unwrap();

        first.stop(&Deadline::none()).unwrap();
        assert!(first.is_stopped());
        let err = first
            .execute(&Deadline::none(), "INSERT INTO t (v) VALUES (1);", [])
            .unwrap_err();
        assert!(matches!(err, DbError::Stopped));

        let changed = second
            .execute(&Deadline::none(), "INSERT INTO t (v) VALUES (1);", [])
            .unwrap();
        assert_eq!(changed, 1);
        assert!(!second.is_table_empty(&Deadline::none(), "t").unwrap());

        second.stop(&Deadline::none()).unwrap();
        second.stop(&Deadline::none()).unwrap();
    }

    #[test]
    fn separate_in_memory_clients_do_not_share_data() {
        let first = Client::open_in_memory(&Deadline::none()).unwrap();
        let second = Client::open_in_memory(&Deadline::none()).unwrap();
        first
            .execute_batch(&Deadline::none(), "CREATE TABLE t (v INTEGER);")
            .unwrap();
        assert!(second.is_table_empty(&Deadline::none(), "t").is_err());
    }

    #[test]
    fn expired_deadline_blocks_statement() {
        let client = Client::open_in_memory(&Deadline::none()).unwrap();
        let expired = Deadline::after(Duration::ZERO);
        let err = client.execute_batch(&expired, "SELECT 1;").unwrap_err();
        assert!(matches!(err, DbError::DeadlineExceeded));
    }

    #[test]
    fn nested_call_gets_its_own_connection() {
        let client = Client::open_in_memory(&Deadline::none()).unwrap();
        client
            .execute_batch(
                &Deadline::none(),
                "CREATE TABLE t (v INTEGER); INSERT INTO t (v) VALUES (1);",
            )
            .unwrap();

        let inner_empty = client
            .with_connection(&Deadline::none(), |_outer| {
                client.is_table_empty(&Deadline::after(Duration::from_secs(5)), "t")
            })
            .unwrap();
        assert!(!inner_empty);
    }

    #[test]
    fn waiting_for_a_busy_pool_honours_the_deadline() {
        let config = DbConfig {
            pool_size: 1,
            ..DbConfig::default()
        };
        let client = Client::connect(&config, &Deadline::none()).unwrap();
        let holder = client.clone();
        let (held_tx, held_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            holder
                .with_connection(&Deadline::none(), |_conn| -> Result<(), DbError> {
                    held_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(800));
                    Ok(())
                })
                .unwrap();
        });
        held_rx.recv().unwrap();

        let started_at = Instant::now();
        let err = client
            .execute_batch(&Deadline::after(Duration::from_millis(100)), "SELECT 1;")
            .unwrap_err();
        assert!(matches!(err, DbError::DeadlineExceeded));
        assert!(started_at.elapsed() < Duration::from_millis(600));

        worker.join().unwrap();
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let client = Client::open_in_memory(&Deadline::none()).unwrap();
        client
            .execute_batch(&Deadline::none(), "CREATE TABLE t (v INTEGER);")
            .unwrap();

        let result: Result<(), DbError> = client.with_transaction(&Deadline::none(), |tx| {
            tx.execute("INSERT INTO t (v) VALUES (1);", [])?;
            Err(DbError::DeadlineExceeded)
        });
        assert!(result.is_err());
        assert!(client.is_table_empty(&Deadline::none(), "t").unwrap());
    }
}
