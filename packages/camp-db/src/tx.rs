//! Transações de escrita
//!
//! `pool.begin()` abre uma transação adiada: a leitura inicial pega um
//! snapshot e a primeira escrita falha com `SQLITE_BUSY` se outra conexão
//! gravou nesse meio tempo, sem passar pelo `busy_timeout`. `WriteTx` abre
//! com `BEGIN IMMEDIATE`, que espera pela trava de escrita antes de qualquer
//! leitura.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::ops::{Deref, DerefMut};
use tracing::warn;

use crate::error::DbResult;

pub struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
    done: bool,
}

impl WriteTx {
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self {
            conn: Some(conn),
            done: false,
        })
    }

    pub async fn commit(mut self) -> DbResult<()> {
        if let Some(conn) = self.conn.as_mut() {
            sqlx::query("COMMIT").execute(&mut **conn).await?;
        }
        self.done = true;
        Ok(())
    }

    fn live(&self) -> &PoolConnection<Sqlite> {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("conexão usada após commit"),
        }
    }

    fn live_mut(&mut self) -> &mut PoolConnection<Sqlite> {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("conexão usada após commit"),
        }
    }
}

impl Deref for WriteTx {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        self.live()
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.live_mut()
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        // A conexão só volta ao pool depois do ROLLBACK
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!("Falha ao desfazer transação: {}", err);
                        drop(conn.detach());
                    }
                });
            }
            // Sem runtime: fechar a conexão desfaz a transação
            Err(_) => drop(conn.detach()),
        }
    }
}
