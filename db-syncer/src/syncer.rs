//! One sync cycle for one target
//!
//! Every stage failure is caught at the cycle boundary. The caller always
//! receives a [`CycleReport`] carrying what was planned and what was
//! actually applied; batches submitted before a failure stand.

use crate::ledger::LedgerClient;
use crate::source::SourceStore;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use sync_core::reconcile;
use sync_core::{ActionCounts, DataAction, DataTransaction, SyncOptions, SyncTarget, Table};
use tracing::{debug, info, warn};

/// Pipeline stage, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Relational snapshot
    FetchSource,
    /// Paginated ledger snapshot
    FetchLedger,
    /// Schema guard and diff
    Reconcile,
    /// Chain tail lookup
    Witness,
    /// Signing and submission
    Submit,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::FetchSource => "fetch-source",
            SyncStage::FetchLedger => "fetch-ledger",
            SyncStage::Reconcile => "reconcile",
            SyncStage::Witness => "witness",
            SyncStage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every planned batch was submitted
    Completed,

    /// Some batches were submitted before `stage` failed
    Partial {
        /// Failing stage
        stage: SyncStage,
        /// Rendered error
        error: String,
    },

    /// Nothing was written
    Failed {
        /// Failing stage
        stage: SyncStage,
        /// Rendered error
        error: String,
    },
}

/// Result of one cycle for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Target name
    pub target: String,

    /// Outcome
    pub outcome: CycleOutcome,

    /// Actions produced by reconciliation
    pub planned: ActionCounts,

    /// Actions in successfully submitted batches
    pub applied: ActionCounts,

    /// Batches accepted by the ledger
    pub batches_submitted: usize,

    /// Batches planned
    pub batches_total: usize,
}

impl CycleReport {
    fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            outcome: CycleOutcome::Completed,
            planned: ActionCounts::default(),
            applied: ActionCounts::default(),
            batches_submitted: 0,
            batches_total: 0,
        }
    }

    /// Whether the cycle completed
    pub fn is_success(&self) -> bool {
        self.outcome == CycleOutcome::Completed
    }

    /// Stage that failed, if any
    pub fn failed_stage(&self) -> Option<SyncStage> {
        match &self.outcome {
            CycleOutcome::Completed => None,
            CycleOutcome::Partial { stage, .. } | CycleOutcome::Failed { stage, .. } => {
                Some(*stage)
            }
        }
    }
}

struct StageFailure {
    stage: SyncStage,
    error: Error,
}

trait AtStage<T> {
    fn at(self, stage: SyncStage) -> std::result::Result<T, StageFailure>;
}

impl<T, E: Into<Error>> AtStage<T> for std::result::Result<T, E> {
    fn at(self, stage: SyncStage) -> std::result::Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// Runs the pipeline for one target
pub struct Syncer {
    target: Arc<SyncTarget>,
    source: Arc<dyn SourceStore>,
    ledger: Arc<dyn LedgerClient>,
    options: SyncOptions,
}

impl fmt::Debug for Syncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Syncer")
            .field("target", &self.target.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Syncer {
    /// Create new syncer
    pub fn new(
        target: Arc<SyncTarget>,
        source: Arc<dyn SourceStore>,
        ledger: Arc<dyn LedgerClient>,
        options: SyncOptions,
    ) -> Self {
        Self {
            target,
            source,
            ledger,
            options,
        }
    }

    /// Target name
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Resolved target
    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Run one full cycle; never fails
    pub async fn sync(&self) -> CycleReport {
        let mut report = CycleReport::new(self.name());

        match self.run(&mut report).await {
            Ok(()) => {
                info!(
                    sync = %self.target.name,
                    batches = report.batches_submitted,
                    "[{}] sync finished, {}",
                    self.target.name,
                    report.applied
                );
            }
            Err(StageFailure { stage, error }) => {
                self.log_failure(stage, &error, &report);

                let error = error.to_string();
                report.outcome = if report.batches_submitted > 0 {
                    CycleOutcome::Partial { stage, error }
                } else {
                    CycleOutcome::Failed { stage, error }
                };
            }
        }

        report
    }

    async fn run(&self, report: &mut CycleReport) -> std::result::Result<(), StageFailure> {
        let target = &self.target;

        let snapshot = self
            .source
            .fetch(
                &target.source_connection,
                &target.source_query,
                &target.source_primary_key_name,
            )
            .await
            .at(SyncStage::FetchSource)?;

        let ledger_table = self.fetch_ledger_table().await.at(SyncStage::FetchLedger)?;

        let source_table = Table::from_source(snapshot).at(SyncStage::Reconcile)?;
        let changes = reconcile::diff(&target.ledger_table_name, &ledger_table, &source_table)
            .at(SyncStage::Reconcile)?;

        report.planned = changes.counts();
        let batches = changes.into_batches(self.options.batch_size);
        report.batches_total = batches.len();

        let witness = self
            .ledger
            .status(&target.ledger_address)
            .await
            .at(SyncStage::Witness)?
            .tail_hash;

        for (idx, batch) in batches.into_iter().enumerate() {
            let counts = ActionCounts::tally(&batch);
            let id = self.submit(&witness, batch).await.at(SyncStage::Submit)?;

            report.batches_submitted += 1;
            report.applied += counts;

            debug!(
                sync = %target.name,
                batch = idx + 1,
                of = report.batches_total,
                transaction = %id,
                "Batch submitted"
            );

            tokio::time::sleep(self.options.submit_pacing).await;
        }

        Ok(())
    }

    /// Read the whole ledger table, page by page
    ///
    /// Header and key metadata come from the first page; paging stops at the
    /// first empty page.
    async fn fetch_ledger_table(&self) -> Result<Table> {
        let address = &self.target.ledger_address;
        let table_name = &self.target.ledger_table_name;

        let tables = self.ledger.list_tables(address).await?;
        if !tables.iter().any(|t| t == table_name) {
            return Err(Error::UnknownTable {
                table: table_name.clone(),
                address: address.clone(),
            });
        }

        let page_size = self.options.page_size.max(1);
        let mut snapshot = self
            .ledger
            .query_data(address, table_name, 0, page_size)
            .await?;

        let mut start = snapshot.rows.len();
        let mut received = start;
        while received > 0 {
            let page = self
                .ledger
                .query_data(address, table_name, start, page_size)
                .await?;

            received = page.rows.len();
            start += received;
            snapshot.rows.extend(page.rows);
        }

        debug!(
            sync = %self.target.name,
            rows = snapshot.rows.len(),
            "Fetched ledger snapshot"
        );

        Ok(Table::from_ledger(snapshot)?)
    }

    async fn submit(&self, witness: &str, actions: Vec<DataAction>) -> Result<String> {
        let key = &self.target.signing_key;
        let transaction = DataTransaction::new(key, witness, actions).sign(key)?;

        self.ledger
            .submit_transaction(&self.target.ledger_address, &transaction)
            .await
    }

    fn log_failure(&self, stage: SyncStage, error: &Error, report: &CycleReport) {
        let name = &self.target.name;

        match error {
            Error::Core(sync_core::Error::SchemaMismatch {
                base_headers,
                other_headers,
            }) => warn!(
                sync = %name,
                stage = %stage,
                "[{}] schema is different, unable to sync. Database side: [{}], Chain side: [{}]",
                name,
                other_headers.join(","),
                base_headers.join(",")
            ),
            Error::DataAccess(_) => warn!(
                sync = %name,
                stage = %stage,
                error = %error,
                "[{}] Exception when getting data from origin database, ignore sync.",
                name
            ),
            Error::Connection(_) => warn!(
                sync = %name,
                stage = %stage,
                error = %error,
                "[{}][{}]: No Connection, ignore sync.",
                name,
                self.target.ledger_address
            ),
            _ => warn!(sync = %name, stage = %stage, "[{}]: {}", name, error),
        }

        if report.planned.total() > 0 {
            warn!(
                sync = %name,
                submitted = report.batches_submitted,
                total = report.batches_total,
                "[{}] sync stopped, planned: {}; applied: {}",
                name,
                report.planned,
                report.applied
            );
        }
    }
}
