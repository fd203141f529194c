//! Test fixtures: a small order-management schema and a recording provider.

mod provider;

pub use provider::MockProvider;

use crate::{
    db::{
        context::DataContext,
        query::expr::{Detail, Lookup, Prop},
    },
    model::{ModelSchema, SchemaBuilder, SchemaRegistry},
    traits::Model,
    types::{Decimal, Guid, Timestamp},
    value::{Row, Value},
};
use std::{rc::Rc, sync::Arc};

///
/// Account
///

pub struct Account;

impl Model for Account {
    const SCHEMA_NAME: &'static str = "Account";

    fn describe(schema: &mut SchemaBuilder) {
        schema.primary_key("Id").text("Name").text("Code");
    }
}

impl Account {
    pub fn name() -> Prop<Self, String> {
        Prop::new("Name")
    }
}

///
/// Contact
///

pub struct Contact;

impl Model for Contact {
    const SCHEMA_NAME: &'static str = "Contact";

    fn describe(schema: &mut SchemaBuilder) {
        schema
            .primary_key("Id")
            .text("Name")
            .text("Email")
            .integer("Age")
            .lookup::<Account>("Account", "Account");
    }
}

impl Contact {
    pub fn name() -> Prop<Self, String> {
        Prop::new("Name")
    }

    pub fn age() -> Prop<Self, i64> {
        Prop::new("Age")
    }

    pub fn account() -> Lookup<Self, Account> {
        Lookup::new("Account")
    }
}

///
/// Order
///

pub struct Order;

impl Model for Order {
    const SCHEMA_NAME: &'static str = "Order";

    fn describe(schema: &mut SchemaBuilder) {
        schema
            .primary_key("Id")
            .text("StringValue")
            .integer("IntValue")
            .decimal("DecimalValue")
            .boolean("BoolValue")
            .date_time("CreatedOn")
            .guid("GuidValue")
            .lookup::<Contact>("Contact", "Contact")
            .detail::<OrderLine>("Lines", "Order");
    }
}

impl Order {
    pub fn string_value() -> Prop<Self, String> {
        Prop::new("StringValue")
    }

    pub fn int_value() -> Prop<Self, i64> {
        Prop::new("IntValue")
    }

    pub fn decimal_value() -> Prop<Self, Decimal> {
        Prop::new("DecimalValue")
    }

    pub fn bool_value() -> Prop<Self, bool> {
        Prop::new("BoolValue")
    }

    pub fn created_on() -> Prop<Self, Timestamp> {
        Prop::new("CreatedOn")
    }

    pub fn guid_value() -> Prop<Self, Guid> {
        Prop::new("GuidValue")
    }

    pub fn contact() -> Lookup<Self, Contact> {
        Lookup::new("Contact")
    }

    pub const fn lines() -> Detail<Self, OrderLine> {
        Detail::new("Lines")
    }
}

///
/// OrderLine
///

pub struct OrderLine;

impl Model for OrderLine {
    const SCHEMA_NAME: &'static str = "OrderLine";

    fn describe(schema: &mut SchemaBuilder) {
        schema
            .primary_key("Id")
            .text("Product")
            .integer("Quantity")
            .decimal("Price")
            .lookup::<Order>("Order", "Order");
    }
}

impl OrderLine {
    pub fn product() -> Prop<Self, String> {
        Prop::new("Product")
    }

    pub fn quantity() -> Prop<Self, i64> {
        Prop::new("Quantity")
    }

    pub fn price() -> Prop<Self, Decimal> {
        Prop::new("Price")
    }

    pub fn order() -> Lookup<Self, Order> {
        Lookup::new("Order")
    }
}

/// Registry holding every fixture model.
pub fn registry() -> Arc<SchemaRegistry> {
    SchemaRegistry::builder()
        .register::<Account>()
        .register::<Contact>()
        .register::<Order>()
        .register::<OrderLine>()
        .build()
        .expect("fixture registry is valid")
}

pub fn schema_of<T: Model>() -> Arc<ModelSchema> {
    registry().schema::<T>().expect("fixture model is registered")
}

/// Context over a fresh mock provider; the provider handle stays shared.
pub fn context() -> (DataContext, Rc<MockProvider>) {
    let provider = Rc::new(MockProvider::default());
    let cx = DataContext::new(registry(), Rc::clone(&provider));

    (cx, provider)
}

/// Build a row from (column, value) pairs.
pub fn row<const N: usize>(cells: [(&str, Value); N]) -> Row {
    cells
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

pub fn key(n: u128) -> Guid {
    Guid::from_u128(n)
}
