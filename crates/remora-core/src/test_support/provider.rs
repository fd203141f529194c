use crate::{
    db::{
        provider::{
            BatchRequest, BatchResponse, DataProvider, DefaultValuesResponse, ItemsResponse,
            ProcessRequest, ProcessResponse,
        },
        query::QueryPlan,
    },
    value::Row,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

///
/// MockProvider
///
/// Records every request. Queued item responses are served in order; once
/// the queue is empty queries return no rows.
///

#[derive(Default)]
pub struct MockProvider {
    pub items: RefCell<VecDeque<ItemsResponse>>,
    pub defaults: RefCell<Row>,
    pub batch_response: RefCell<Option<BatchResponse>>,
    pub process_response: RefCell<Option<ProcessResponse>>,

    pub plans: RefCell<Vec<QueryPlan>>,
    pub batches: RefCell<Vec<BatchRequest>>,
    pub processes: RefCell<Vec<ProcessRequest>>,
    pub get_items_calls: Cell<usize>,
    pub default_calls: Cell<usize>,
    pub batch_calls: Cell<usize>,
}

impl MockProvider {
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.items.borrow_mut().push_back(ItemsResponse::ok(rows));
    }

    pub fn push_response(&self, response: ItemsResponse) {
        self.items.borrow_mut().push_back(response);
    }

    pub fn last_plan(&self) -> QueryPlan {
        self.plans.borrow().last().cloned().expect("a query was executed")
    }

    pub fn last_batch(&self) -> BatchRequest {
        self.batches.borrow().last().cloned().expect("a batch was executed")
    }
}

impl DataProvider for MockProvider {
    fn get_items(&self, plan: &QueryPlan) -> ItemsResponse {
        self.get_items_calls.set(self.get_items_calls.get() + 1);
        self.plans.borrow_mut().push(plan.clone());

        self.items
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ItemsResponse::ok(Vec::new()))
    }

    fn get_default_values(&self, _schema_name: &str) -> DefaultValuesResponse {
        self.default_calls.set(self.default_calls.get() + 1);

        DefaultValuesResponse::ok(self.defaults.borrow().clone())
    }

    fn batch_execute(&self, batch: &BatchRequest) -> BatchResponse {
        self.batch_calls.set(self.batch_calls.get() + 1);
        self.batches.borrow_mut().push(batch.clone());

        self.batch_response
            .borrow()
            .clone()
            .unwrap_or_else(|| BatchResponse::ok(batch.items.len()))
    }

    fn execute_process(&self, request: &ProcessRequest) -> ProcessResponse {
        self.processes.borrow_mut().push(request.clone());

        self.process_response.borrow().clone().unwrap_or_else(|| ProcessResponse {
            success: true,
            ..ProcessResponse::default()
        })
    }
}
