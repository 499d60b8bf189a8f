use log::{error, info, warn};
use rocket::tokio::net::TcpStream;
use rocket::tokio::sync::Mutex;
use tiberius::{Client, Config, Row};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{StoreResult, TaskStore};
use crate::tasks::models::Task;

const CREATE_TASKS: &str = "IF OBJECT_ID('Tasks', 'U') IS NULL \
     CREATE TABLE Tasks (\
     ID INT IDENTITY(1,1) PRIMARY KEY, \
     Text NVARCHAR(MAX) NOT NULL, \
     Done BIT NOT NULL DEFAULT 0)";
const LIST_TASKS: &str = "SELECT ID, Text, Done FROM Tasks ORDER BY ID";
const ADD_TASK: &str = "INSERT INTO Tasks (Text, Done) VALUES (@P1, 0)";
const MARK_DONE: &str = "UPDATE Tasks SET Done = 1 WHERE ID = @P1";
const DELETE_TASK: &str = "DELETE FROM Tasks WHERE ID = @P1";

/// SQL Server store over a single TDS connection.
///
/// TDS runs one request at a time per connection, so callers queue on the lock.
pub struct MssqlRepo {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl MssqlRepo {
    /// Connects with an ADO.NET connection string and pings the server.
    pub async fn open(ado: &str, sync: bool) -> StoreResult<Self> {
        let client = Self::connect(ado).await.map_err(|e| {
            error!("database connection failed: {}", e);
            e
        })?;
        let repo = Self {
            client: Mutex::new(client),
        };

        repo.client.lock().await.simple_query("SELECT 1").await?.into_results().await?;
        info!("database connection ready");

        if sync {
            repo.sync_schema().await?;
        }
        Ok(repo)
    }

    async fn connect(ado: &str) -> StoreResult<Client<Compat<TcpStream>>> {
        let config = Config::from_ado_string(ado)?;
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(tiberius::error::Error::from)?;
        tcp.set_nodelay(true).map_err(tiberius::error::Error::from)?;
        Ok(Client::connect(config, tcp.compat_write()).await?)
    }

    pub async fn sync_schema(&self) -> StoreResult<()> {
        self.client.lock().await.execute(CREATE_TASKS, &[]).await?;
        info!("schema sync checked the Tasks table");
        Ok(())
    }
}

fn to_task(row: &Row) -> Result<Task, tiberius::error::Error> {
    let id = row.try_get::<i32, _>("ID")?;
    let text = row.try_get::<&str, _>("Text")?;
    let done = row.try_get::<bool, _>("Done")?;
    match (id, text, done) {
        (Some(id), Some(text), Some(done)) => Ok(Task {
            id,
            text: text.to_string(),
            done,
        }),
        _ => Err(tiberius::error::Error::Conversion(
            "Tasks row has a NULL column".into(),
        )),
    }
}

#[rocket::async_trait]
impl TaskStore for MssqlRepo {
    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let mut client = self.client.lock().await;
        let rows = client.query(LIST_TASKS, &[]).await?.into_first_result().await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            match to_task(row) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("skipping unreadable task row: {}", e),
            }
        }
        Ok(tasks)
    }

    async fn add_task(&self, text: &str) -> StoreResult<()> {
        self.client.lock().await.execute(ADD_TASK, &[&text]).await?;
        Ok(())
    }

    async fn mark_done(&self, id: i32) -> StoreResult<()> {
        self.client.lock().await.execute(MARK_DONE, &[&id]).await?;
        Ok(())
    }

    async fn delete_task(&self, id: i32) -> StoreResult<()> {
        self.client.lock().await.execute(DELETE_TASK, &[&id]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;
    use assert_matches::assert_matches;

    #[rocket::async_test]
    async fn refused_connection_is_fatal() {
        // Port 1 on loopback has no listener.
        let ado = "server=tcp:127.0.0.1,1;database=TodoApp;user id=sa;password=x;TrustServerCertificate=true";
        let err = MssqlRepo::open(ado, false)
            .await
            .err()
            .expect("nothing listens on port 1");
        assert_matches!(err, StoreError::Mssql(tiberius::error::Error::Io { .. }));
    }
}
