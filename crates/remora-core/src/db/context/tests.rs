use crate::{
    db::{
        context::{DEFAULT_SAVE_ERROR, DataContext, ModelState},
        provider::{
            BatchResponse, ItemResult, MutationRequest, ProcessRequest, ProcessResponse,
        },
        query::ExpressionNode,
    },
    error::ErrorClass,
    obs::{MetricsEvent, MetricsSink, ProviderOp},
    test_support::{Contact, Order, OrderLine, context, key, registry, row},
    value::{Row, Value},
};
use std::{cell::RefCell, rc::Rc};

fn order_row(n: u128) -> Row {
    row([
        ("Id", Value::Guid(key(n))),
        ("StringValue", Value::from("first")),
        ("IntValue", Value::Integer(5)),
        ("Contact", Value::Guid(key(50))),
    ])
}

fn contact_row(n: u128, name: &str) -> Row {
    row([
        ("Id", Value::Guid(key(n))),
        ("Name", Value::from(name)),
    ])
}

fn line_row(n: u128, order: u128) -> Row {
    row([
        ("Id", Value::Guid(key(n))),
        ("Product", Value::from("Widget")),
        ("Quantity", Value::Integer(1)),
        ("Order", Value::Guid(key(order))),
    ])
}

// ----------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------

#[test]
fn one_key_is_one_instance() {
    let (cx, _) = context();

    let a = cx.attach::<Order>(order_row(1)).unwrap();
    let b = cx.attach::<Order>(order_row(1)).unwrap();

    assert!(a.ptr_eq(&b));
    assert_eq!(cx.tracked_count(), 1);
}

#[test]
fn find_uses_the_identity_map_first() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    let found = cx.find::<Order>(key(1)).unwrap().unwrap();

    assert!(found.ptr_eq(&order));
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn find_fetches_unknown_keys_by_primary_key() {
    let (cx, provider) = context();
    provider.push_rows(vec![order_row(1)]);

    let found = cx.find::<Order>(key(1)).unwrap();
    assert_eq!(found.map(|o| o.id()), Some(key(1)));

    let plan = provider.last_plan();
    let Some(ExpressionNode::Comparison { left, .. }) = &plan.filter else {
        panic!("expected a key comparison");
    };
    assert_eq!(**left, ExpressionNode::column("Id", crate::value::ValueType::Guid));

    assert!(cx.find::<Order>(key(2)).unwrap().is_none());
}

#[test]
fn deleted_instances_are_not_found() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    cx.delete_model(&order).unwrap();

    assert!(cx.find::<Order>(key(1)).unwrap().is_none());
}

#[test]
fn handles_from_another_context_are_rejected() {
    let (cx, _) = context();
    let (other, _) = context();
    let order = other.attach::<Order>(order_row(1)).unwrap();

    let err = cx.delete_model(&order).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidState);
    assert_eq!(order.state(), ModelState::Unchanged);
}

// ----------------------------------------------------------------------
// Change tracking and save
// ----------------------------------------------------------------------

#[test]
fn created_models_take_backend_defaults() {
    let (cx, provider) = context();
    *provider.defaults.borrow_mut() = row([
        ("IntValue", Value::from("10")),
        ("Unknown", Value::Integer(1)),
    ]);

    let order = cx.create_model::<Order>().unwrap();

    assert_eq!(order.state(), ModelState::New);
    assert!(!order.id().is_nil());
    assert_eq!(order.get(&Order::int_value()).unwrap(), Some(10));
    assert_eq!(order.value("Id").unwrap(), Some(Value::Guid(order.id())));
    assert_eq!(provider.default_calls.get(), 1);
}

#[test]
fn inserts_are_sent_only_on_save() {
    let (cx, provider) = context();
    let order = cx.create_model::<Order>().unwrap();

    order.set(&Order::int_value(), 10).unwrap();
    order.set(&Order::string_value(), "ten").unwrap();
    order.set(&Order::bool_value(), true).unwrap();
    assert_eq!(order.changes().len(), 3);
    assert_eq!(provider.batch_calls.get(), 0);

    let report = cx.save().unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(provider.batch_calls.get(), 1);
    let batch = provider.last_batch();
    let MutationRequest::Insert {
        schema_name,
        column_values,
    } = &batch.items[0]
    else {
        panic!("expected an insert");
    };
    assert_eq!(schema_name, "Order");
    assert_eq!(column_values["IntValue"], Value::Integer(10));
    assert_eq!(column_values["Id"], Value::Guid(order.id()));

    assert_eq!(order.state(), ModelState::Unchanged);
    assert!(order.changes().is_empty());
}

#[test]
fn saving_nothing_makes_no_call() {
    let (cx, provider) = context();
    cx.attach::<Order>(order_row(1)).unwrap();

    let report = cx.save().unwrap();

    assert!(report.is_empty());
    assert_eq!(provider.batch_calls.get(), 0);
}

#[test]
fn updates_carry_only_changed_columns() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    order.set(&Order::int_value(), 6).unwrap();
    assert_eq!(order.state(), ModelState::Changed);

    let report = cx.save().unwrap();
    assert_eq!(report.updated, 1);

    let batch = provider.last_batch();
    assert_eq!(
        batch.items,
        [MutationRequest::Update {
            schema_name: "Order".into(),
            primary_key: key(1),
            column_values: row([("IntValue", Value::Integer(6))]),
        }]
    );
    assert_eq!(order.state(), ModelState::Unchanged);
}

#[test]
fn reverted_changes_send_nothing() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    order.set(&Order::int_value(), 6).unwrap();
    order.set(&Order::int_value(), 5).unwrap();
    let report = cx.save().unwrap();

    assert!(report.is_empty());
    assert_eq!(provider.batch_calls.get(), 0);
    assert_eq!(order.state(), ModelState::Unchanged);
}

#[test]
fn values_are_coerced_to_the_column_type() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    order.set_value("IntValue", "42").unwrap();
    assert_eq!(order.get(&Order::int_value()).unwrap(), Some(42));

    let err = order.set_value("IntValue", "forty").unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidState);

    order.set_null(&Order::string_value()).unwrap();
    assert_eq!(order.get(&Order::string_value()).unwrap(), None);
}

#[test]
fn the_primary_key_is_immutable() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    let err = order.set_value("Id", Value::Guid(key(2))).unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidState);
    assert_eq!(order.id(), key(1));
}

#[test]
fn deleting_persisted_instances_sends_a_delete_and_evicts() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    cx.delete_model(&order).unwrap();

    let report = cx.save().unwrap();

    assert_eq!(report.deleted, 1);
    assert!(matches!(
        provider.last_batch().items[0],
        MutationRequest::Delete { primary_key, .. } if primary_key == key(1)
    ));
    assert_eq!(cx.tracked_count(), 0);
}

#[test]
fn deleting_unsaved_instances_is_never_sent() {
    let (cx, provider) = context();
    let order = cx.create_model::<Order>().unwrap();
    cx.delete_model(&order).unwrap();

    let report = cx.save().unwrap();

    assert!(report.is_empty());
    assert_eq!(provider.batch_calls.get(), 0);
    assert_eq!(cx.tracked_count(), 0);
}

#[test]
fn deleted_instances_reject_writes() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    cx.delete_model(&order).unwrap();

    let err = order.set(&Order::int_value(), 1).unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidState);
    assert_eq!(order.state(), ModelState::Deleted);
}

#[test]
fn one_save_batches_every_pending_change_in_tracking_order() {
    let (cx, provider) = context();
    let a = cx.attach::<Order>(order_row(1)).unwrap();
    let b = cx.attach::<Order>(order_row(2)).unwrap();
    let c = cx.create_model::<Contact>().unwrap();

    b.set(&Order::int_value(), 9).unwrap();
    cx.delete_model(&a).unwrap();
    c.set(&Contact::name(), "Ada").unwrap();

    let report = cx.save().unwrap();

    assert_eq!((report.inserted, report.updated, report.deleted), (1, 1, 1));
    let kinds: Vec<&str> = provider
        .last_batch()
        .items
        .iter()
        .map(|item| match item {
            MutationRequest::Insert { .. } => "insert",
            MutationRequest::Update { .. } => "update",
            MutationRequest::Delete { .. } => "delete",
        })
        .collect();
    assert_eq!(kinds, ["delete", "update", "insert"]);
}

#[test]
fn failed_saves_keep_local_state() {
    let (cx, provider) = context();
    *provider.batch_response.borrow_mut() = Some(BatchResponse::default());
    let order = cx.create_model::<Order>().unwrap();

    let err = cx.save().unwrap_err();

    assert!(err.is_provider());
    assert_eq!(err.message, DEFAULT_SAVE_ERROR);
    assert_eq!(order.state(), ModelState::New);
}

#[test]
fn failed_save_messages_prefer_the_backend() {
    let provider = Rc::new(crate::test_support::MockProvider::default());
    let cx = DataContext::new(registry(), Rc::clone(&provider)).generic_save_error("Could not save");
    cx.create_model::<Order>().unwrap();

    *provider.batch_response.borrow_mut() = Some(BatchResponse::default());
    assert_eq!(cx.save().unwrap_err().message, "Could not save");

    *provider.batch_response.borrow_mut() = Some(BatchResponse {
        success: false,
        error_message: None,
        results: vec![ItemResult {
            success: false,
            error_message: Some("Name is required".into()),
        }],
    });
    assert_eq!(cx.save().unwrap_err().message, "Name is required");
}

#[test]
fn rejected_items_stay_pending() {
    let (cx, provider) = context();
    let kept = cx.create_model::<Order>().unwrap();
    let saved = cx.create_model::<Order>().unwrap();
    *provider.batch_response.borrow_mut() = Some(BatchResponse {
        success: true,
        error_message: None,
        results: vec![
            ItemResult {
                success: false,
                error_message: Some("duplicate".into()),
            },
            ItemResult {
                success: true,
                error_message: None,
            },
        ],
    });

    let report = cx.save().unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(kept.state(), ModelState::New);
    assert_eq!(saved.state(), ModelState::Unchanged);
}

// ----------------------------------------------------------------------
// Reload
// ----------------------------------------------------------------------

#[test]
fn reload_overwrites_local_values() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    order.set(&Order::int_value(), 6).unwrap();

    let mut fresh = order_row(1);
    fresh.insert("IntValue".into(), Value::Integer(8));
    provider.push_rows(vec![fresh]);
    cx.reload(&order).unwrap();

    assert_eq!(order.get(&Order::int_value()).unwrap(), Some(8));
    assert_eq!(order.state(), ModelState::Unchanged);
    assert!(order.changes().is_empty());
}

#[test]
fn reloading_a_vanished_row_marks_it_deleted() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    let err = cx.reload(&order).unwrap_err();

    assert!(err.is_not_found());
    assert!(err.message.contains("not found"));
    assert_eq!(order.state(), ModelState::Deleted);
}

#[test]
fn reloading_unsaved_instances_is_not_found() {
    let (cx, provider) = context();
    let order = cx.create_model::<Order>().unwrap();

    assert!(cx.reload(&order).unwrap_err().is_not_found());
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn reloading_deleted_instances_is_not_found() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    cx.delete_model(&order).unwrap();

    assert!(cx.reload(&order).unwrap_err().is_not_found());
    assert_eq!(order.state(), ModelState::Deleted);
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn reload_clears_lookups_and_keeps_details() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    provider.push_rows(vec![contact_row(50, "Ada")]);
    provider.push_rows(vec![line_row(10, 1)]);

    let contact = order.lookup(&Order::contact()).unwrap().unwrap();
    assert_eq!(order.details(&Order::lines()).unwrap().len(), 1);
    assert_eq!(provider.get_items_calls.get(), 2);

    provider.push_rows(vec![order_row(1)]);
    cx.reload(&order).unwrap();
    assert_eq!(provider.get_items_calls.get(), 3);

    // details survive the reload
    assert_eq!(order.details(&Order::lines()).unwrap().len(), 1);
    assert_eq!(provider.get_items_calls.get(), 3);

    // lookups are fetched again
    provider.push_rows(vec![contact_row(50, "Ada")]);
    let again = order.lookup(&Order::contact()).unwrap().unwrap();
    assert!(again.ptr_eq(&contact));
    assert_eq!(provider.get_items_calls.get(), 4);
}

// ----------------------------------------------------------------------
// Lazy navigation
// ----------------------------------------------------------------------

#[test]
fn lookups_resolve_once() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    provider.push_rows(vec![contact_row(50, "Ada")]);

    let contact = order.lookup(&Order::contact()).unwrap().unwrap();
    let again = order.lookup(&Order::contact()).unwrap().unwrap();
    let name = order.get(&Order::contact().then(&Contact::name())).unwrap();

    assert!(contact.ptr_eq(&again));
    assert_eq!(name.as_deref(), Some("Ada"));
    assert_eq!(provider.get_items_calls.get(), 1);
}

#[test]
fn null_lookups_resolve_to_none_without_a_call() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    order.set_lookup(&Order::contact(), None).unwrap();

    assert!(order.lookup(&Order::contact()).unwrap().is_none());
    assert_eq!(order.get(&Order::contact().then(&Contact::name())).unwrap(), None);
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn dangling_lookups_are_not_found() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();

    assert!(order.lookup(&Order::contact()).unwrap_err().is_not_found());
}

#[test]
fn lookups_to_unsaved_targets_stay_local() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    let contact = cx.create_model::<Contact>().unwrap();

    order.set_lookup(&Order::contact(), Some(&contact)).unwrap();

    let resolved = order.lookup(&Order::contact()).unwrap().unwrap();
    assert!(resolved.ptr_eq(&contact));
    assert_eq!(order.value("Contact").unwrap(), Some(Value::Guid(contact.id())));
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn changing_the_lookup_key_refetches() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    provider.push_rows(vec![contact_row(50, "Ada")]);
    provider.push_rows(vec![contact_row(51, "Grace")]);

    order.lookup(&Order::contact()).unwrap();
    order.set_value("Contact", Value::Guid(key(51))).unwrap();
    let name = order.get(&Order::contact().then(&Contact::name())).unwrap();

    assert_eq!(name.as_deref(), Some("Grace"));
    assert_eq!(provider.get_items_calls.get(), 2);
}

#[test]
fn details_load_once_and_skip_deleted_children() {
    let (cx, provider) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    provider.push_rows(vec![line_row(10, 1), line_row(11, 1)]);

    let lines = order.details(&Order::lines()).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(provider.get_items_calls.get(), 1);

    let plan = provider.last_plan();
    assert_eq!(plan.root_schema, "OrderLine");
    let Some(ExpressionNode::Comparison { left, .. }) = &plan.filter else {
        panic!("expected a link comparison");
    };
    assert_eq!(
        **left,
        ExpressionNode::column("Order", crate::value::ValueType::Guid)
    );

    cx.delete_model(&lines[0]).unwrap();
    let lines = order.details(&Order::lines()).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].get(&OrderLine::product()).unwrap().as_deref(), Some("Widget"));
    assert_eq!(provider.get_items_calls.get(), 1);
}

#[test]
fn unsaved_masters_have_no_details() {
    let (cx, provider) = context();
    let order = cx.create_model::<Order>().unwrap();

    assert!(order.details(&Order::lines()).unwrap().is_empty());
    assert_eq!(provider.get_items_calls.get(), 0);
}

#[test]
fn saved_masters_fetch_their_details() {
    let (cx, provider) = context();
    let order = cx.create_model::<Order>().unwrap();
    assert!(order.details(&Order::lines()).unwrap().is_empty());

    cx.save().unwrap();
    provider.push_rows(vec![row([
        ("Id", Value::Guid(key(10))),
        ("Product", Value::from("Widget")),
        ("Order", Value::Guid(order.id())),
    ])]);

    let lines = order.details(&Order::lines()).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(provider.get_items_calls.get(), 1);
}

#[test]
fn handles_outliving_their_context_fail_cleanly() {
    let (cx, _) = context();
    let order = cx.attach::<Order>(order_row(1)).unwrap();
    drop(cx);

    let err = order.details(&Order::lines()).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidState);
    assert_eq!(order.get(&Order::int_value()).unwrap(), Some(5));
}

// ----------------------------------------------------------------------
// Processes and metrics
// ----------------------------------------------------------------------

#[test]
fn processes_forward_to_the_provider() {
    let (cx, provider) = context();
    let request = ProcessRequest::new("Recalculate")
        .input("OrderId", key(1))
        .result("Total");

    let response = cx.execute_process(&request).unwrap();
    assert!(response.success);
    assert_eq!(provider.processes.borrow()[0], request);

    *provider.process_response.borrow_mut() = Some(ProcessResponse::default());
    let err = cx.execute_process(&request).unwrap_err();
    assert_eq!(err.message, "process 'Recalculate' failed");
}

#[derive(Default)]
struct RecordingSink {
    calls: RefCell<Vec<(ProviderOp, String, bool)>>,
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: MetricsEvent<'_>) {
        if let MetricsEvent::ProviderCall { op, schema, success } = event {
            self.calls
                .borrow_mut()
                .push((op, schema.to_string(), success));
        }
    }
}

#[test]
fn context_sinks_receive_provider_events() {
    let provider = Rc::new(crate::test_support::MockProvider::default());
    let sink = Rc::new(RecordingSink::default());
    let cx = DataContext::new(registry(), Rc::clone(&provider))
        .debug()
        .metrics_sink(Rc::clone(&sink) as Rc<dyn MetricsSink>);

    cx.models::<Order>().to_list().unwrap();
    cx.create_model::<Order>().unwrap();
    cx.save().unwrap();

    assert_eq!(
        *sink.calls.borrow(),
        [
            (ProviderOp::GetItems, "Order".to_string(), true),
            (ProviderOp::DefaultValues, "Order".to_string(), true),
            (ProviderOp::BatchExecute, "*".to_string(), true),
        ]
    );
}
