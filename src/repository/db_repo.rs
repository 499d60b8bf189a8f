use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection, R2D2Connection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{error, info};

use super::{StoreError, StoreResult, TaskStore};
use crate::tasks::models::{tasks, NewTask, Task};

#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
#[cfg(feature = "mysql")]
pub const MYSQL_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/mysql");
#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DbRepo<C: R2D2Connection + 'static> {
    pool: Pool<ConnectionManager<C>>,
}

impl<C: R2D2Connection + 'static> DbRepo<C> {
    #[cfg_attr(not(any(feature = "mysql", feature = "postgres")), allow(dead_code))]
    fn connect(url: &str) -> StoreResult<Self> {
        Self::with_builder(url, Pool::builder())
    }

    fn with_builder(
        url: &str,
        builder: diesel::r2d2::Builder<ConnectionManager<C>>,
    ) -> StoreResult<Self> {
        let manager = ConnectionManager::new(url);
        let pool = builder
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|e| {
                error!("database connection failed: {}", e);
                StoreError::Pool(e)
            })?;

        let out = Self { pool };
        // Checkout runs the manager's validity check, which pings the server.
        out.conn()?;
        info!("database connection pool ready");
        Ok(out)
    }

    fn conn(&self) -> StoreResult<PooledConnection<ConnectionManager<C>>> {
        Ok(self.pool.get()?)
    }

    /// Runs `f` on a pooled connection off the async worker threads.
    async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut C) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        rocket::tokio::task::spawn_blocking(move || -> StoreResult<T> {
            let mut conn = pool.get()?;
            Ok(f(&mut *conn)?)
        })
        .await?
    }
}

macro_rules! diesel_store {
    ($conn:ty, $migrations:expr) => {
        impl DbRepo<$conn> {
            pub fn sync_schema(&self) -> StoreResult<()> {
                let mut pooled = self.conn()?;
                let conn: &mut $conn = &mut *pooled;
                let applied = conn
                    .run_pending_migrations($migrations)
                    .map_err(StoreError::Schema)?;
                log::info!("schema sync applied {} migration(s)", applied.len());
                Ok(())
            }
        }

        #[rocket::async_trait]
        impl TaskStore for DbRepo<$conn> {
            async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
                self.run(|conn: &mut $conn| {
                    tasks::table.order(tasks::id.asc()).load::<Task>(conn)
                })
                .await
            }

            async fn add_task(&self, text: &str) -> StoreResult<()> {
                let text = text.to_owned();
                self.run(move |conn: &mut $conn| {
                    diesel::insert_into(tasks::table)
                        .values(&NewTask::new(&text))
                        .execute(conn)
                })
                .await?;
                Ok(())
            }

            async fn mark_done(&self, id: i32) -> StoreResult<()> {
                self.run(move |conn: &mut $conn| {
                    diesel::update(tasks::table.find(id))
                        .set(tasks::done.eq(true))
                        .execute(conn)
                })
                .await?;
                Ok(())
            }

            async fn delete_task(&self, id: i32) -> StoreResult<()> {
                self.run(move |conn: &mut $conn| diesel::delete(tasks::table.find(id)).execute(conn))
                    .await?;
                Ok(())
            }
        }
    };
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use diesel::connection::SimpleConnection;
    use diesel::r2d2::{CustomizeConnection, Error};
    use diesel::SqliteConnection;

    use super::*;

    diesel_store!(SqliteConnection, SQLITE_MIGRATIONS);

    /// Makes concurrent writers wait on the file lock instead of failing.
    #[derive(Debug)]
    struct BusyTimeout;

    impl CustomizeConnection<SqliteConnection, Error> for BusyTimeout {
        fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), Error> {
            conn.batch_execute("PRAGMA busy_timeout = 5000;")
                .map_err(Error::QueryError)
        }
    }

    impl DbRepo<SqliteConnection> {
        pub fn open(path: &str, sync: bool) -> StoreResult<Self> {
            let builder = Pool::<ConnectionManager<SqliteConnection>>::builder()
                .connection_customizer(Box::new(BusyTimeout));
            let repo = Self::with_builder(path, builder)?;
            if sync {
                repo.sync_schema()?;
            }
            Ok(repo)
        }
    }
}

#[cfg(feature = "mysql")]
mod mysql {
    use diesel::MysqlConnection;

    use super::*;

    diesel_store!(MysqlConnection, MYSQL_MIGRATIONS);

    impl DbRepo<MysqlConnection> {
        pub fn open(url: &str, sync: bool) -> StoreResult<Self> {
            let repo = Self::connect(url)?;
            if sync {
                repo.sync_schema()?;
            }
            Ok(repo)
        }
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use diesel::PgConnection;

    use super::*;

    diesel_store!(PgConnection, POSTGRES_MIGRATIONS);

    impl DbRepo<PgConnection> {
        pub fn open(url: &str, sync: bool) -> StoreResult<Self> {
            let repo = Self::connect(url)?;
            if sync {
                repo.sync_schema()?;
            }
            Ok(repo)
        }
    }
}
