use diesel::r2d2::PoolError;
use log::info;
use rocket::tokio::task::JoinError;
use thiserror::Error;

use crate::config::{Backend, Config};
use crate::tasks::models::Task;

pub mod db_repo;
#[cfg(feature = "mssql")]
pub mod mssql_repo;

#[allow(unused_imports)]
use db_repo::DbRepo;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Query(#[from] diesel::result::Error),
    #[error("{0}")]
    Pool(#[from] PoolError),
    #[cfg(feature = "mssql")]
    #[error("{0}")]
    Mssql(#[from] tiberius::error::Error),
    #[error("database worker failed: {0}")]
    Blocking(#[from] JoinError),
    #[error("schema sync failed: {0}")]
    Schema(Box<dyn std::error::Error + Send + Sync>),
    #[error("backend {0} is not enabled in this build")]
    BackendDisabled(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the routes need from the `Tasks` table.
///
/// Updates and deletes that match no row are not errors.
#[rocket::async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;
    async fn add_task(&self, text: &str) -> StoreResult<()>;
    async fn mark_done(&self, id: i32) -> StoreResult<()>;
    async fn delete_task(&self, id: i32) -> StoreResult<()>;
}

pub type Store = Box<dyn TaskStore>;

/// Opens the backend named by `config`, checks that a connection can be made
/// and, in development, brings the schema up to date.
pub async fn open(config: &Config) -> StoreResult<Store> {
    info!("opening {} task store", config.backend);
    #[allow(unused_variables)]
    let sync = config.is_development();
    #[allow(unused_variables)]
    let url = config.database_url.as_str();

    let store: Store = match config.backend {
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Box::new(DbRepo::<diesel::SqliteConnection>::open(url, sync)?),
        #[cfg(feature = "mysql")]
        Backend::Mysql => Box::new(DbRepo::<diesel::MysqlConnection>::open(url, sync)?),
        #[cfg(feature = "postgres")]
        Backend::Postgres => Box::new(DbRepo::<diesel::PgConnection>::open(url, sync)?),
        #[cfg(feature = "mssql")]
        Backend::Mssql => Box::new(mssql_repo::MssqlRepo::open(url, sync).await?),
        #[allow(unreachable_patterns)]
        other => return Err(StoreError::BackendDisabled(other.name())),
    };

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config(backend: Backend, database_url: &str) -> Config {
        Config {
            app_env: "production".to_string(),
            backend,
            database_url: database_url.to_string(),
        }
    }

    #[cfg(not(feature = "postgres"))]
    #[rocket::async_test]
    async fn disabled_backend_is_fatal() {
        let err = open(&config(Backend::Postgres, "postgres://localhost/todo"))
            .await
            .err()
            .expect("postgres is not compiled in");
        assert_matches!(err, StoreError::BackendDisabled("postgres"));
    }

    #[cfg(not(feature = "mssql"))]
    #[rocket::async_test]
    async fn disabled_sql_server_is_fatal() {
        let err = open(&config(Backend::Mssql, "server=tcp:localhost,1433"))
            .await
            .err()
            .expect("mssql is not compiled in");
        assert_matches!(err, StoreError::BackendDisabled("mssql"));
    }
}
