//! Sequential multi-source join input.
//!
//! Drains an ordered chain of bounded inputs one at a time, optionally
//! correlating records across them by a join key, and hands each emitted
//! record downstream as an ack-gated transaction.
//!
//! With sharding enabled (`iterations > 1`) the chain is re-read once per
//! shard: pass *i* folds only the records whose key hashes to shard *i*, so
//! accumulator memory is bounded by the largest shard rather than the whole
//! key space. Accumulator state never crosses a pass boundary.

mod join;

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tributary_core::config::ComponentKey;
use tributary_core::emit;
use tributary_core::metrics::events::{
    JoinEntriesFlushed, RecordsRead, SourceNotReady, TransactionsDelivered, TransactionsRejected,
};
use tributary_core::record::{Record, lookup_path, scalar_key};
use tributary_core::transaction::{AckStatus, Transaction};

use self::join::{JoinBuffer, shard};
use crate::config::{JoinType, SequenceConfig, ShardedJoinConfig};
use crate::error::{
    ChannelClosedSnafu, EngineError, JoinKeyNotScalarSnafu, MissingJoinKeySnafu,
    NotReadyTimeoutSnafu, SequenceError,
};
use crate::input::{BoxedInput, InputRegistry};

const INITIAL_OPEN_BACKOFF: Duration = Duration::from_millis(50);
const MAX_OPEN_BACKOFF: Duration = Duration::from_secs(1);

/// The sequential chain input.
///
/// Construction validates the config, builds every input in the chain, and
/// spawns the driver task. Transactions arrive through
/// [`SequenceInput::next_transaction`]; the channel closes once the chain is
/// exhausted (or the driver fails or is shut down).
pub struct SequenceInput {
    transactions: mpsc::Receiver<Transaction>,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl SequenceInput {
    /// Build the chain and start the driver.
    pub fn new(
        key: ComponentKey,
        config: SequenceConfig,
        registry: &InputRegistry,
    ) -> Result<Self, EngineError> {
        config.validate(key.id())?;

        let inputs = config
            .inputs
            .iter()
            .map(|input| registry.build(&input.kind, input.options.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        // Capacity 1: the driver suspends on the ack of each transaction
        // before producing the next, so the channel is a rendezvous point.
        let (tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();

        let driver = ChainDriver {
            key,
            inputs,
            join: config.sharded_join.clone(),
            tx,
            shutdown: shutdown.clone(),
            not_ready_timeout: config.not_ready_timeout_secs.map(Duration::from_secs),
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        };

        Ok(Self {
            transactions: rx,
            shutdown,
            driver: Some(tokio::spawn(driver.run())),
        })
    }

    /// Receive the next transaction.
    ///
    /// Returns `None` once the chain has finished and all transactions have
    /// been consumed.
    pub async fn next_transaction(&mut self) -> Option<Transaction> {
        self.transactions.recv().await
    }

    /// Request cooperative shutdown.
    ///
    /// The driver observes the request at its next blocking point (source
    /// read, source open retry, or ack wait), allows an in-flight
    /// transaction a bounded drain window, and stops.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the driver to finish, bounded by `timeout`.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, driver).await {
            Ok(_) => Ok(()),
            Err(_) => Err(EngineError::CloseTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

impl Drop for SequenceInput {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Why the driver stopped early.
enum Stop {
    Cancelled,
}

struct ChainDriver {
    key: ComponentKey,
    inputs: Vec<BoxedInput>,
    join: ShardedJoinConfig,
    tx: mpsc::Sender<Transaction>,
    shutdown: CancellationToken,
    not_ready_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl ChainDriver {
    async fn run(mut self) {
        match self.drive().await {
            Ok(ControlFlow::Continue(())) => {
                info!(target = %self.key, "Source chain exhausted")
            }
            Ok(ControlFlow::Break(Stop::Cancelled)) => {
                info!(target = %self.key, "Shutdown requested, sequence input stopping")
            }
            Err(e) => error!(target = %self.key, error = %e, "Sequence input failed"),
        }
        // Dropping `self.tx` here closes the transaction channel, which is
        // the consumer's end-of-stream signal.
    }

    async fn drive(&mut self) -> Result<ControlFlow<Stop>, SequenceError> {
        let passes = if self.join.enabled() {
            self.join.iterations
        } else {
            1
        };

        for pass in 0..passes {
            // Fresh accumulator per pass: shards are disjoint, so no entry
            // could legitimately span passes.
            let mut buffer = self
                .join
                .enabled()
                .then(|| JoinBuffer::new(self.join.merge_strategy, self.join.id_path.clone()));

            for index in 0..self.inputs.len() {
                if let ControlFlow::Break(stop) = self.open_source(index).await? {
                    return Ok(ControlFlow::Break(stop));
                }
                if let ControlFlow::Break(stop) =
                    self.drain_source(index, pass, &mut buffer).await?
                {
                    return Ok(ControlFlow::Break(stop));
                }
            }

            if let Some(buffer) = buffer.as_mut() {
                if self.join.join_type == JoinType::FullOuter {
                    emit!(JoinEntriesFlushed {
                        count: buffer.len() as u64,
                        pass,
                        target: self.key.id().to_string(),
                    });
                    let entries: Vec<Map<String, Value>> =
                        buffer.drain().map(|(_, fields)| fields).collect();
                    for fields in entries {
                        if let ControlFlow::Break(stop) =
                            self.deliver(Record::object(fields)).await?
                        {
                            return Ok(ControlFlow::Break(stop));
                        }
                    }
                }
            }
            debug!(target = %self.key, pass, "Pass complete");
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Open the source at `index`, retrying with backoff while it reports
    /// not-ready.
    async fn open_source(&mut self, index: usize) -> Result<ControlFlow<Stop>, SequenceError> {
        let shutdown = self.shutdown.clone();
        let started = Instant::now();
        let mut backoff = INITIAL_OPEN_BACKOFF;

        loop {
            match self.inputs[index].open().await {
                Ok(()) => {
                    debug!(target = %self.key, source = index, "Source opened");
                    return Ok(ControlFlow::Continue(()));
                }
                Err(e) if e.is_not_ready() => {
                    emit!(SourceNotReady {
                        source: index,
                        target: self.key.id().to_string(),
                    });
                    if let Some(limit) = self.not_ready_timeout {
                        if started.elapsed() >= limit {
                            return NotReadyTimeoutSnafu {
                                source_index: index,
                                waited_secs: started.elapsed().as_secs(),
                            }
                            .fail();
                        }
                    }
                    debug!(
                        target = %self.key,
                        source = index,
                        error = %e,
                        "Source not ready, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            return Ok(ControlFlow::Break(Stop::Cancelled));
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_OPEN_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read the source at `index` to exhaustion, routing each record.
    async fn drain_source(
        &mut self,
        index: usize,
        pass: u32,
        buffer: &mut Option<JoinBuffer>,
    ) -> Result<ControlFlow<Stop>, SequenceError> {
        let shutdown = self.shutdown.clone();
        let mut read = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.inputs[index].close().await;
                    return Ok(ControlFlow::Break(Stop::Cancelled));
                }
                next = self.inputs[index].next() => next?,
            };

            let Some(record) = next else {
                self.inputs[index].close().await;
                emit!(RecordsRead {
                    count: read,
                    source: index,
                    target: self.key.id().to_string(),
                });
                debug!(target = %self.key, source = index, records = read, "Source exhausted");
                return Ok(ControlFlow::Continue(()));
            };
            read += 1;

            if let ControlFlow::Break(stop) = self.route(record, index, pass, buffer).await? {
                return Ok(ControlFlow::Break(stop));
            }
        }
    }

    /// Decide what happens to one record: pass it through, fold it into the
    /// accumulator, or (final source under an outer join) fold and emit.
    async fn route(
        &mut self,
        record: Record,
        index: usize,
        pass: u32,
        buffer: &mut Option<JoinBuffer>,
    ) -> Result<ControlFlow<Stop>, SequenceError> {
        let Some(buffer) = buffer.as_mut() else {
            // No join configured: the chain is a passthrough.
            return self.deliver(record).await;
        };

        let (key, fields) = split_record(record, &self.join.id_path)?;
        if shard(&key, self.join.iterations) != pass {
            // Another pass owns this key.
            return Ok(ControlFlow::Continue(()));
        }

        let is_final = index + 1 == self.inputs.len();
        match self.join.join_type {
            JoinType::Outer if is_final => {
                // The entry stays in the buffer afterward: a later hit on
                // the same key merges against (and re-emits) the
                // accumulated state.
                let merged = buffer.fold(&key, fields).clone();
                self.deliver(Record::object(merged)).await
            }
            JoinType::Outer | JoinType::FullOuter => {
                buffer.fold(&key, fields);
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    /// Hand one record downstream and suspend until it is acknowledged.
    ///
    /// A reject triggers redelivery of the same record; only a commit (or
    /// shutdown, or a vanished consumer) ends the loop.
    async fn deliver(&mut self, record: Record) -> Result<ControlFlow<Stop>, SequenceError> {
        let shutdown = self.shutdown.clone();

        loop {
            let (txn, mut ack) = Transaction::single(record.clone());

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return Ok(ControlFlow::Break(Stop::Cancelled));
                }
                sent = self.tx.send(txn) => {
                    if sent.is_err() {
                        return ChannelClosedSnafu.fail();
                    }
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    // The transaction is already with the consumer; give it
                    // a bounded window to resolve before stopping.
                    let _ = tokio::time::timeout(self.drain_timeout, &mut ack).await;
                    return Ok(ControlFlow::Break(Stop::Cancelled));
                }
                status = &mut ack => match status {
                    Ok(AckStatus::Committed) => {
                        emit!(TransactionsDelivered {
                            count: 1,
                            target: self.key.id().to_string(),
                        });
                        return Ok(ControlFlow::Continue(()));
                    }
                    Ok(AckStatus::Rejected { reason }) => {
                        warn!(
                            target = %self.key,
                            reason = %reason,
                            "Transaction rejected, redelivering"
                        );
                        emit!(TransactionsRejected {
                            count: 1,
                            target: self.key.id().to_string(),
                        });
                    }
                    Err(_) => return ChannelClosedSnafu.fail(),
                }
            }
        }
    }
}

/// Pull the join key out of a record and return it with the record's fields.
fn split_record(
    record: Record,
    id_path: &str,
) -> Result<(String, Map<String, Value>), SequenceError> {
    use snafu::OptionExt;

    let key = {
        let value = lookup_path(record.value(), id_path)
            .context(MissingJoinKeySnafu { path: id_path })?;
        scalar_key(value).context(JoinKeyNotScalarSnafu { path: id_path })?
    };
    match record.into_value() {
        Value::Object(fields) => Ok((key, fields)),
        _ => MissingJoinKeySnafu { path: id_path }.fail(),
    }
}
