use super::*;
use crate::test_support::{Contact, Order, OrderLine};

#[test]
fn col_splits_dotted_paths() {
    assert_eq!(
        col("Contact.Account.Name"),
        Expr::Member(vec!["Contact".into(), "Account".into(), "Name".into()])
    );
}

#[test]
fn builders_nest_left_to_right() {
    let expr = col("A").eq(1).and(col("B").ne("x")).or(col("C").is_null());

    assert_eq!(
        expr.to_string(),
        "(((x.A == 1) && (x.B != 'x')) || (x.C == null))"
    );
}

#[test]
fn operator_sugar_matches_methods() {
    let a = col("A").gt(1);
    let b = col("B").lt(2);

    assert_eq!(a.clone() & b.clone(), a.clone().and(b.clone()));
    assert_eq!(a.clone() | b.clone(), a.clone().or(b));
    assert_eq!(!a.clone(), a.not());
}

#[test]
fn in_list_is_list_contains() {
    assert_eq!(
        col("A").in_list([1, 2]),
        list([1, 2]).contains(col("A"))
    );
}

#[test]
fn is_open_tracks_member_references() {
    assert!(col("A").eq(1).is_open());
    assert!(detail("Lines").any().is_open());
    assert!(!val(1).eq(2).is_open());
    assert!(!list(["a"]).contains(val("a")).is_open());
    assert!(val("abc").starts_with(col("A")).is_open());
}

#[test]
fn method_names_round_trip() {
    for name in ["starts_with", "ends_with", "contains", "year", "month", "day", "hour"] {
        assert_eq!(Method::from_name(name).name(), name);
    }
    assert_eq!(Method::from_name("trim"), Method::Other("trim".into()));
}

#[test]
fn detail_terminals_close_the_chain() {
    let expr = detail("Lines")
        .filter(col("Quantity").gt(1))
        .count_where(col("Price").gt(0));

    let Expr::Detail { path, chain } = expr else {
        panic!("expected a detail expression");
    };
    assert_eq!(path, ["Lines"]);
    assert_eq!(chain.len(), 2);
    assert!(matches!(chain[0], DetailCall::Where(_)));
    assert!(matches!(chain[1], DetailCall::Count(Some(_))));
}

#[test]
fn unterminated_detail_converts_without_a_terminal() {
    let expr: Expr = detail("Lines").filter(col("Quantity").gt(1)).into();

    let Expr::Detail { chain, .. } = expr else {
        panic!("expected a detail expression");
    };
    assert!(matches!(chain.as_slice(), [DetailCall::Where(_)]));
}

#[test]
fn typed_props_build_untyped_trees() {
    assert_eq!(Order::int_value().eq(10), col("IntValue").eq(10i64));
    assert_eq!(
        Order::string_value().starts_with("Ord"),
        col("StringValue").starts_with("Ord")
    );
    assert_eq!(Order::created_on().year(), col("CreatedOn").year());
    assert_eq!(
        Order::int_value().in_list([1i64, 2]),
        col("IntValue").in_list([1i64, 2])
    );
}

#[test]
fn lookup_then_extends_the_path() {
    let name = Order::contact().then(&Contact::name());
    assert_eq!(name.path(), ["Contact", "Name"]);
    assert_eq!(name.name(), "Name");
    assert_eq!(name.eq("Ann"), col("Contact.Name").eq("Ann"));

    let account = Order::contact().then_lookup(&Contact::account());
    assert_eq!(account.path(), ["Contact", "Account"]);
}

#[test]
fn typed_detail_terminals() {
    let lines = Order::lines();

    assert_eq!(lines.any(), detail("Lines").any());
    assert_eq!(
        lines.sum(&OrderLine::quantity()),
        detail("Lines").sum(col("Quantity"))
    );
    assert_eq!(
        lines.any_where(OrderLine::product().eq("x")),
        detail("Lines").any_where(col("Product").eq("x"))
    );
}
