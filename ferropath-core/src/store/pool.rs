use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

use rusqlite::Connection;

use super::Deadline;
use crate::Error;

/// Fixed set of SQLite connections handed out one at a time
pub(crate) struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    released: Condvar,
    size: usize,
}

impl ConnectionPool {
    pub(crate) fn new(connections: Vec<Connection>) -> Self {
        let size = connections.len();
        Self {
            idle: Mutex::new(connections),
            released: Condvar::new(),
            size,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Blocks until a connection is idle or the deadline passes.
    pub(crate) fn get(&self, deadline: Deadline) -> Result<PooledConnection<'_>, Error> {
        let mut idle = self
            .idle
            .lock()
            .map_err(|_| Error::unavailable("connection pool lock poisoned"))?;

        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }

            idle = match deadline.remaining() {
                None => self
                    .released
                    .wait(idle)
                    .map_err(|_| Error::unavailable("connection pool lock poisoned"))?,
                Some(left) if left.is_zero() => return Err(Error::CollaboratorTimeout),
                Some(left) => {
                    self.released
                        .wait_timeout(idle, left)
                        .map_err(|_| Error::unavailable("connection pool lock poisoned"))?
                        .0
                }
            };
        }
    }

    fn put_back(&self, conn: Connection) {
        // a poisoned pool is already unusable, the connection is closed instead
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
            self.released.notify_one();
        }
    }
}

/// Connection on loan from the pool, returned on drop
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}
