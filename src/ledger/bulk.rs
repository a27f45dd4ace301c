//! Bulk ingestion: a bounded pool of workers that admits and commits a batch
//! of transactions concurrently.
//!
//! A feeder task queues one job per submitted transaction, tagged with its
//! position in the batch. `worker_count` workers share the job queue; each
//! runs the [gate](super::admit) and commits accepted transactions, then
//! reports a [JobOutcome]. The results queue closes once the last worker drops
//! its sender, and the caller folds every outcome into a [BulkAccumulator].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use serde::Serialize;
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinSet,
};

use crate::{Error, Ledger, cancellation::Cancellation, transaction::TransactionBuilder};

/// The accounting for a bulk call.
///
/// Once [Ledger::bulk_add] returns, `accepted + rejected` equals the number of
/// submitted transactions and `errors` has exactly one entry per rejected
/// transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkResult {
    /// The number of transactions that were committed.
    pub accepted: u64,
    /// The number of transactions that were not committed.
    pub rejected: u64,
    /// The rejection message for each rejected transaction, keyed by its
    /// position in the submitted batch.
    pub errors: HashMap<usize, String>,
}

/// One transaction of a batch, tagged with its position in the batch.
#[derive(Debug)]
struct BulkJob {
    index: usize,
    transaction: TransactionBuilder,
}

/// What happened to one [BulkJob]; `Ok` means the transaction was committed.
#[derive(Debug)]
struct JobOutcome {
    index: usize,
    result: Result<(), Error>,
}

#[derive(Debug)]
struct AccumulatorState {
    result: BulkResult,
    recorded: Vec<bool>,
}

/// Folds [JobOutcome]s into a [BulkResult].
///
/// Recording takes `&self` and is safe to call from several tasks at once.
#[derive(Debug)]
struct BulkAccumulator {
    state: Mutex<AccumulatorState>,
}

impl BulkAccumulator {
    fn new(job_count: usize) -> Self {
        Self {
            state: Mutex::new(AccumulatorState {
                result: BulkResult::default(),
                recorded: vec![false; job_count],
            }),
        }
    }

    /// Count `outcome`.
    ///
    /// A second outcome for an index that was already counted is ignored.
    fn record(&self, outcome: JobOutcome) {
        // Nothing panics while the lock is held, so the state is never torn.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match state.recorded.get_mut(outcome.index) {
            Some(recorded) if !*recorded => *recorded = true,
            Some(_) => {
                tracing::warn!("ignoring duplicate outcome for job {}", outcome.index);
                return;
            }
            None => {
                tracing::warn!("ignoring outcome for unknown job {}", outcome.index);
                return;
            }
        }

        match outcome.result {
            Ok(()) => state.result.accepted += 1,
            Err(error) => {
                state.result.rejected += 1;
                state.result.errors.insert(outcome.index, error.to_string());
            }
        }
    }

    /// Finish accounting, counting every job without an outcome as rejected
    /// with the error from `unprocessed`.
    fn finish(self, unprocessed: impl Fn() -> Error) -> BulkResult {
        let AccumulatorState {
            mut result,
            recorded,
        } = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        for (index, _) in recorded.iter().enumerate().filter(|(_, seen)| !**seen) {
            result.rejected += 1;
            result.errors.insert(index, unprocessed().to_string());
        }

        result
    }
}

impl Ledger {
    /// Admit and commit a batch of transactions using `worker_count`
    /// concurrent workers.
    ///
    /// Individual rejections never fail the call, they are reported in
    /// [BulkResult::errors] keyed by the transaction's position in
    /// `transactions`. The order in which transactions are processed is not
    /// specified, and in [AdmissionMode::Unserialized](crate::AdmissionMode)
    /// two transactions in the same category may both be admitted against the
    /// same spent amount.
    ///
    /// When `cancellation` fires, idle workers stop taking jobs; a job that
    /// has already started is still completed. Jobs that were never started
    /// are counted as rejected with the message for [Error::Cancelled].
    ///
    /// # Errors
    /// Returns [Error::InvalidWorkerCount] if `worker_count` is zero.
    pub async fn bulk_add(
        &self,
        transactions: Vec<TransactionBuilder>,
        worker_count: usize,
        cancellation: Cancellation,
    ) -> Result<BulkResult, Error> {
        if worker_count == 0 {
            return Err(Error::InvalidWorkerCount(worker_count));
        }

        let job_count = transactions.len();

        if job_count == 0 {
            return Ok(BulkResult::default());
        }

        let start_time = Instant::now();
        tracing::info!("starting bulk add of {job_count} transactions with {worker_count} workers");

        let (job_sender, job_receiver) = mpsc::channel(job_count);
        let (outcome_sender, mut outcome_receiver) = mpsc::channel(job_count);
        let job_receiver = Arc::new(AsyncMutex::new(job_receiver));

        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count {
            workers.spawn(self.clone().run_worker(
                worker_id,
                job_receiver.clone(),
                outcome_sender.clone(),
                cancellation.clone(),
            ));
        }

        // The workers now hold the only senders and receivers, so the outcome
        // queue closes when the last worker exits.
        drop(outcome_sender);
        drop(job_receiver);

        let feeder = tokio::spawn(feed_jobs(transactions, job_sender));

        let accumulator = BulkAccumulator::new(job_count);

        while let Some(outcome) = outcome_receiver.recv().await {
            accumulator.record(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(error) = joined {
                tracing::error!("bulk worker failed: {error}");
            }
        }

        if let Err(error) = feeder.await {
            tracing::error!("bulk feeder failed: {error}");
        }

        let result = accumulator.finish(|| {
            if cancellation.is_cancelled() {
                Error::Cancelled
            } else {
                Error::TaskFailed("the job was never processed".to_owned())
            }
        });

        tracing::info!(
            "finished bulk add in {}ms: {} accepted, {} rejected",
            start_time.elapsed().as_millis(),
            result.accepted,
            result.rejected
        );

        Ok(result)
    }

    async fn run_worker(
        self,
        worker_id: usize,
        jobs: Arc<AsyncMutex<mpsc::Receiver<BulkJob>>>,
        outcomes: mpsc::Sender<JobOutcome>,
        mut cancellation: Cancellation,
    ) {
        loop {
            let next_job = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    tracing::debug!("worker {worker_id} exiting due to cancellation");
                    return;
                }
                job = receive_job(&jobs) => job,
            };

            let Some(job) = next_job else {
                tracing::debug!("worker {worker_id} exiting because the job queue is closed");
                return;
            };

            let outcome = self.process_job(job).await;

            if outcomes.send(outcome).await.is_err() {
                tracing::warn!("worker {worker_id} exiting because the outcome queue is closed");
                return;
            }
        }
    }

    async fn process_job(&self, job: BulkJob) -> JobOutcome {
        let BulkJob { index, transaction } = job;

        let result = match self
            .run_blocking(move |ledger| ledger.admit_and_commit(transaction))
            .await
        {
            Ok(transaction) => {
                tracing::debug!("job {index} committed as transaction {}", transaction.id);
                Ok(())
            }
            Err(error @ Error::TaskFailed(_)) => {
                tracing::error!("job {index} failed: {error}");
                Err(error)
            }
            Err(error) => {
                tracing::debug!("job {index} rejected: {error}");
                Err(error)
            }
        };

        JobOutcome { index, result }
    }
}

async fn receive_job(jobs: &AsyncMutex<mpsc::Receiver<BulkJob>>) -> Option<BulkJob> {
    jobs.lock().await.recv().await
}

/// Queue every transaction in submission order, closing the queue when done.
async fn feed_jobs(transactions: Vec<TransactionBuilder>, jobs: mpsc::Sender<BulkJob>) {
    for (index, transaction) in transactions.into_iter().enumerate() {
        if jobs.send(BulkJob { index, transaction }).await.is_err() {
            tracing::debug!("job queue closed before job {index} was queued");
            return;
        }
    }
}
