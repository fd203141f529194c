use crate::{
    db::{
        context::{ContextInner, DataContext, ModelState, Shared},
        provider::{BatchRequest, BatchResponse, MutationRequest},
    },
    error::Error,
    obs::sink::{ExecKind, MetricsEvent, ProviderOp, Span, record},
};
use std::rc::Rc;

// Metrics label for batch-wide events; a batch spans many schemas.
const BATCH_SCOPE: &str = "*";

///
/// SaveReport
/// Counts of requests the backend accepted in one save.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SaveReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SaveOp {
    Insert,
    Update,
    Delete,
}

impl DataContext {
    /// Send every pending change to the backend in one batch.
    ///
    /// On success New and Changed instances become Unchanged and Deleted
    /// instances leave the context. On failure nothing changes locally.
    pub fn save(&self) -> Result<SaveReport, Error> {
        self.inner.with_sink(|| self.inner.save())
    }
}

impl ContextInner {
    fn save(&self) -> Result<SaveReport, Error> {
        let pending = self.identity.borrow().pending();
        let mut span = Span::new(ExecKind::Save, BATCH_SCOPE);

        let mut items = Vec::new();
        let mut sent: Vec<(Shared, SaveOp)> = Vec::new();
        let mut discarded: Vec<Shared> = Vec::new();

        for shared in pending {
            let mut model = shared.borrow_mut();
            let schema_name = model.schema_name().to_string();

            match model.state {
                ModelState::New => {
                    items.push(MutationRequest::Insert {
                        schema_name,
                        column_values: model.values.clone(),
                    });
                    sent.push((Rc::clone(&shared), SaveOp::Insert));
                }
                ModelState::Changed => {
                    let changes = model.changes();
                    if changes.is_empty() {
                        model.accept();
                        continue;
                    }
                    items.push(MutationRequest::Update {
                        schema_name,
                        primary_key: model.key,
                        column_values: changes.into_iter().collect(),
                    });
                    sent.push((Rc::clone(&shared), SaveOp::Update));
                }
                ModelState::Deleted if !model.persisted => {
                    discarded.push(Rc::clone(&shared));
                }
                ModelState::Deleted => {
                    items.push(MutationRequest::Delete {
                        schema_name,
                        primary_key: model.key,
                    });
                    sent.push((Rc::clone(&shared), SaveOp::Delete));
                }
                ModelState::Unchanged => {}
            }
        }

        if items.is_empty() {
            self.evict(&discarded);
            return Ok(SaveReport::default());
        }

        let batch = BatchRequest { items };
        tracing::debug!(items = batch.items.len(), "executing save batch");
        let response = self.provider.batch_execute(&batch);
        record(MetricsEvent::ProviderCall {
            op: ProviderOp::BatchExecute,
            schema: BATCH_SCOPE,
            success: response.success,
        });

        if !response.success {
            let message = batch_failure_message(&response, &self.generic_save_error.borrow());
            tracing::warn!(error = %message, "save failed");

            return Err(Error::provider(message));
        }

        let mut report = SaveReport::default();
        for (index, (shared, op)) in sent.iter().enumerate() {
            if let Some(item) = response.results.get(index)
                && !item.success
            {
                let model = shared.borrow();
                tracing::warn!(
                    schema = %model.schema_name(),
                    key = %model.key,
                    error = item.error_message.as_deref().unwrap_or_default(),
                    "save item rejected; keeping pending state"
                );
                continue;
            }

            match op {
                SaveOp::Insert => {
                    shared.borrow_mut().accept();
                    report.inserted += 1;
                }
                SaveOp::Update => {
                    shared.borrow_mut().accept();
                    report.updated += 1;
                }
                SaveOp::Delete => {
                    self.evict(std::slice::from_ref(shared));
                    report.deleted += 1;
                }
            }
        }
        self.evict(&discarded);

        span.set_rows(report.total() as u64);
        tracing::debug!(
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "save completed"
        );

        Ok(report)
    }

    fn evict(&self, models: &[Shared]) {
        let mut identity = self.identity.borrow_mut();
        for shared in models {
            let model = shared.borrow();
            identity.remove(model.schema_name(), model.key);
        }
    }
}

/// Batch message, else the joined item messages, else `generic`.
fn batch_failure_message(response: &BatchResponse, generic: &str) -> String {
    if let Some(message) = response.error_message.as_deref()
        && !message.trim().is_empty()
    {
        return message.to_string();
    }

    let items: Vec<&str> = response
        .results
        .iter()
        .filter_map(|r| r.error_message.as_deref())
        .filter(|m| !m.trim().is_empty())
        .collect();

    if items.is_empty() {
        generic.to_string()
    } else {
        items.join("\n")
    }
}

///
/// TESTS
///
