use std::any::Any;

use rusqlite::{Connection, Transaction};
use tokio::sync::{mpsc, oneshot};

use tidemark_core::errors::Result;

use crate::errors::StorageError;

// Type alias for the job to be executed by the writer actor.
// It runs against the actor's transaction and returns a StorageError;
// conversion to core::Error happens at the reply boundary.
type Job<T> =
    Box<dyn for<'c> FnOnce(&Transaction<'c>) -> std::result::Result<T, StorageError> + Send + 'static>;

/// Handle for sending jobs to the writer actor.
///
/// The embedded store connection is not safe for uncoordinated concurrent
/// writers, so every store operation - reads included - goes through this
/// handle and runs serially on the actor's one connection, each job inside
/// its own transaction.
#[derive(Clone)]
pub struct StoreHandle {
    // Sender part of the MPSC channel to send jobs.
    // Each job is a boxed closure, and a oneshot sender is used for the reply.
    // The Box<dyn Any + Send> is used for type erasure of the job's return type.
    #[allow(clippy::type_complexity)]
    tx: mpsc::Sender<(
        Job<Box<dyn Any + Send + 'static>>,
        oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>,
    )>,
}

impl StoreHandle {
    /// Executes a database job on the writer actor's dedicated connection.
    ///
    /// # Arguments
    /// * `job`: A closure that runs against the job's transaction.
    ///
    /// # Returns
    /// A `Result<T>` containing the outcome of the job. The transaction is
    /// committed when the job returns `Ok` and rolled back otherwise.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: for<'c> FnOnce(&Transaction<'c>) -> std::result::Result<T, StorageError>
            + Send
            + 'static,
        T: Send + 'static + Any,
    {
        // Create a oneshot channel for receiving the result from the actor.
        let (ret_tx, ret_rx) = oneshot::channel();

        // Send the job to the writer actor. The job is wrapped to return a
        // Box<dyn Any + Send> for type erasure.
        self.tx
            .send((
                Box::new(move |tx| job(tx).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| StorageError::WriterGone("writer actor channel closed".to_string()))?;

        // Await the result from the writer actor and downcast the
        // type-erased value back to T.
        ret_rx
            .await
            .map_err(|_| {
                StorageError::WriterGone("writer actor dropped the reply sender".to_string())
            })?
            .map(|boxed: Box<dyn Any + Send + 'static>| {
                *boxed
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("Failed to downcast writer actor result."))
            })
    }
}

/// Spawns a background Tokio task that acts as the single writer to the
/// database. The actor owns the one connection and processes jobs serially.
///
/// # Arguments
/// * `conn`: The database connection the actor takes ownership of.
///
/// # Returns
/// A `StoreHandle` to send jobs to the spawned actor.
pub fn spawn_writer(mut conn: Connection) -> StoreHandle {
    // Create an MPSC channel for sending jobs to the actor.
    // The channel is bounded; 1024 is an arbitrary size.
    let (tx, mut rx) = mpsc::channel::<(
        Job<Box<dyn Any + Send + 'static>>,
        oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>,
    )>(1024);

    tokio::spawn(async move {
        // Loop to receive and process jobs.
        while let Some((job, reply_tx)) = rx.recv().await {
            // Execute the job within its own transaction: commit on Ok,
            // implicit rollback when the transaction drops on Err.
            let result: Result<Box<dyn Any + Send + 'static>> = run_job(&mut conn, job);

            // Send the result back to the requester. Ignore error if the
            // receiver has dropped (e.g. the request was cancelled).
            let _ = reply_tx.send(result);
        }
        // If rx.recv() returns None, every StoreHandle was dropped and the
        // actor can terminate.
    });

    StoreHandle { tx }
}

fn run_job(
    conn: &mut Connection,
    job: Job<Box<dyn Any + Send + 'static>>,
) -> Result<Box<dyn Any + Send + 'static>> {
    let tx = conn.transaction().map_err(StorageError::from)?;
    let value = job(&tx)?;
    tx.commit().map_err(StorageError::from)?;
    Ok(value)
}
