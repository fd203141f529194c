//! Shared fixtures for the integration suites: a scripted backend and a
//! three-model schema.
#![allow(dead_code)]

use remora::{
    db::{
        provider::{
            BatchRequest, BatchResponse, DataProvider, DefaultValuesResponse, ItemsResponse,
            ProcessRequest, ProcessResponse,
        },
        query::QueryPlan,
    },
    prelude::*,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    sync::Arc,
};

///
/// ScriptedBackend
///
/// Serves queued query results in order and records what it was asked.
///

#[derive(Default)]
pub struct ScriptedBackend {
    pub queued: RefCell<VecDeque<ItemsResponse>>,
    pub plans: RefCell<Vec<QueryPlan>>,
    pub batches: RefCell<Vec<BatchRequest>>,
    pub batch_calls: Cell<usize>,
    pub batch_reply: RefCell<Option<BatchResponse>>,
}

impl ScriptedBackend {
    pub fn queue(&self, rows: Vec<Row>) {
        self.queued.borrow_mut().push_back(ItemsResponse::ok(rows));
    }

    pub fn query_count(&self) -> usize {
        self.plans.borrow().len()
    }

    pub fn last_plan(&self) -> QueryPlan {
        self.plans.borrow().last().cloned().expect("a query ran")
    }
}

impl DataProvider for ScriptedBackend {
    fn get_items(&self, plan: &QueryPlan) -> ItemsResponse {
        self.plans.borrow_mut().push(plan.clone());

        self.queued
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ItemsResponse::ok(Vec::new()))
    }

    fn get_default_values(&self, _schema_name: &str) -> DefaultValuesResponse {
        DefaultValuesResponse::ok(Row::new())
    }

    fn batch_execute(&self, batch: &BatchRequest) -> BatchResponse {
        self.batch_calls.set(self.batch_calls.get() + 1);
        self.batches.borrow_mut().push(batch.clone());

        self.batch_reply
            .borrow()
            .clone()
            .unwrap_or_else(|| BatchResponse::ok(batch.items.len()))
    }

    fn execute_process(&self, request: &ProcessRequest) -> ProcessResponse {
        ProcessResponse {
            success: true,
            output_values: request.input_values.clone(),
            error_message: None,
        }
    }
}

///
/// Customer
///

pub struct Customer;

impl Model for Customer {
    const SCHEMA_NAME: &'static str = "Customer";

    fn describe(schema: &mut SchemaBuilder) {
        schema.primary_key("Id").text("Name");
    }
}

impl Customer {
    pub fn name() -> Prop<Self, String> {
        Prop::new("Name")
    }
}

///
/// Invoice
///

pub struct Invoice;

impl Model for Invoice {
    const SCHEMA_NAME: &'static str = "Invoice";

    fn describe(schema: &mut SchemaBuilder) {
        schema
            .primary_key("Id")
            .text("StringValue")
            .integer("IntValue")
            .decimal("Total")
            .lookup::<Customer>("Customer", "Customer")
            .detail::<InvoiceLine>("Lines", "Invoice");
    }
}

impl Invoice {
    pub fn string_value() -> Prop<Self, String> {
        Prop::new("StringValue")
    }

    pub fn int_value() -> Prop<Self, i64> {
        Prop::new("IntValue")
    }

    pub fn total() -> Prop<Self, Decimal> {
        Prop::new("Total")
    }

    pub fn customer() -> Lookup<Self, Customer> {
        Lookup::new("Customer")
    }

    pub const fn lines() -> Detail<Self, InvoiceLine> {
        Detail::new("Lines")
    }
}

///
/// InvoiceLine
///

pub struct InvoiceLine;

impl Model for InvoiceLine {
    const SCHEMA_NAME: &'static str = "InvoiceLine";

    fn describe(schema: &mut SchemaBuilder) {
        schema
            .primary_key("Id")
            .text("Sku")
            .integer("Quantity")
            .lookup::<Invoice>("Invoice", "Invoice");
    }
}

impl InvoiceLine {
    pub fn sku() -> Prop<Self, String> {
        Prop::new("Sku")
    }
}

pub fn registry() -> Arc<SchemaRegistry> {
    SchemaRegistry::builder()
        .register::<Customer>()
        .register::<Invoice>()
        .register::<InvoiceLine>()
        .build()
        .expect("fixture schema is valid")
}

pub fn session() -> (DataContext, Rc<ScriptedBackend>) {
    let backend = Rc::new(ScriptedBackend::default());
    let cx = DataContext::new(registry(), Rc::clone(&backend));

    (cx, backend)
}

pub fn key(n: u128) -> Guid {
    Guid::from_u128(n)
}

pub fn invoice_row(n: u128, label: &str, amount: i64) -> Row {
    [
        ("Id", Value::Guid(key(n))),
        ("StringValue", Value::from(label)),
        ("IntValue", Value::Integer(amount)),
        ("Customer", Value::Guid(key(900))),
    ]
    .into_iter()
    .map(|(column, value)| (column.to_string(), value))
    .collect()
}
