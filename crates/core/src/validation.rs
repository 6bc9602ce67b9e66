//! Order validation engine.
//!
//! [`validate`] is a pure decision function: it inspects one snapshot of an order and
//! returns every rule violation it finds. Rules never short-circuit each other, so a
//! rejected order carries its complete problem list.
//!
//! Known looseness: the `payment.amount` cross-check is skipped when the expected total
//! cannot be computed at all (no items and no `goods_total`). An order in that state is
//! still rejected for having no items, but the amount itself goes unchecked.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

use crate::error::ValidationError;
use crate::order::{Delivery, Item, Order, Payment};

/// Maximum accepted locale length, in characters.
pub const MAX_LOCALE_LEN: usize = 10;

/// How far in the future `payment.payment_dt` may lie.
pub const PAYMENT_DT_MAX_AHEAD: Duration = Duration::hours(24);

/// How far in the future `date_created` may lie.
pub const DATE_CREATED_MAX_AHEAD: Duration = Duration::hours(1);

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Problem {
    #[error("{field} is required")]
    Missing { field: String },

    #[error("{field} invalid: {value:?}")]
    Malformed { field: String, value: String },

    #[error("{field} must be >= 0")]
    Negative { field: String },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be a positive epoch")]
    NotPositive { field: String },

    #[error("{field} is in the future: {value}")]
    InFuture { field: String, value: String },

    #[error("items must contain at least one item")]
    NoItems,

    /// `index` is 1-based and points at the repeated occurrence.
    #[error("items[{index}].rid duplicated: {rid:?}")]
    DuplicateRid { index: usize, rid: String },

    #[error("sum(items.total_price) = {items_total} does not equal payment.goods_total = {goods_total}")]
    GoodsTotalMismatch { items_total: i64, goods_total: i64 },

    #[error("payment.amount ({amount}) does not equal expected total (goods+delivery+custom = {expected})")]
    AmountMismatch { amount: i64, expected: i64 },
}

impl Problem {
    fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    fn malformed(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Malformed {
            field: field.into(),
            value: value.into(),
        }
    }

    fn negative(field: impl Into<String>) -> Self {
        Self::Negative {
            field: field.into(),
        }
    }
}

/// Validate an order against the current wall clock.
pub fn validate(order: &Order) -> Vec<Problem> {
    validate_at(order, Utc::now())
}

/// Validate an order, treating `now` as the current time.
pub fn validate_at(order: &Order, now: DateTime<Utc>) -> Vec<Problem> {
    let mut problems = Vec::new();

    check_header(order, now, &mut problems);

    match &order.delivery {
        Some(delivery) => check_delivery(delivery, &mut problems),
        None => problems.push(Problem::missing("delivery")),
    }

    match &order.payment {
        Some(payment) => check_payment(payment, now, &mut problems),
        None => problems.push(Problem::missing("payment")),
    }

    check_items(&order.items, &mut problems);
    check_totals(order, &mut problems);

    problems
}

/// Validate and fold the problem list into an error.
pub fn ensure_valid(order: &Order) -> Result<(), ValidationError> {
    let problems = validate(order);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(problems))
    }
}

fn check_header(order: &Order, now: DateTime<Utc>, problems: &mut Vec<Problem>) {
    if is_blank(&order.order_uid) {
        problems.push(Problem::missing("order_uid"));
    }
    if is_blank(&order.track_number) {
        problems.push(Problem::missing("track_number"));
    }
    if order.locale.chars().count() > MAX_LOCALE_LEN {
        problems.push(Problem::malformed("locale", order.locale.as_str()));
    }
    if order.sm_id.is_some_and(|sm_id| sm_id < 0) {
        problems.push(Problem::negative("sm_id"));
    }
    if let Some(date_created) = order.date_created {
        if date_created > now + DATE_CREATED_MAX_AHEAD {
            problems.push(Problem::InFuture {
                field: "date_created".to_string(),
                value: date_created.to_rfc3339(),
            });
        }
    }
}

fn check_delivery(delivery: &Delivery, problems: &mut Vec<Problem>) {
    for (field, value) in [
        ("delivery.name", &delivery.name),
        ("delivery.address", &delivery.address),
        ("delivery.city", &delivery.city),
    ] {
        if is_blank(value) {
            problems.push(Problem::missing(field));
        }
    }

    if is_blank(&delivery.zip) {
        problems.push(Problem::missing("delivery.zip"));
    } else if !is_valid_zip(&delivery.zip) {
        problems.push(Problem::malformed("delivery.zip", delivery.zip.as_str()));
    }

    if is_blank(&delivery.phone) {
        problems.push(Problem::missing("delivery.phone"));
    } else if !is_valid_phone(&delivery.phone) {
        problems.push(Problem::malformed("delivery.phone", delivery.phone.as_str()));
    }

    if !delivery.email.is_empty() && !is_valid_email(&delivery.email) {
        problems.push(Problem::malformed("delivery.email", delivery.email.as_str()));
    }
}

fn check_payment(payment: &Payment, now: DateTime<Utc>, problems: &mut Vec<Problem>) {
    match payment.amount {
        None => problems.push(Problem::missing("payment.amount")),
        Some(amount) if amount < 0 => problems.push(Problem::negative("payment.amount")),
        Some(_) => {}
    }

    for (field, value) in [
        ("payment.goods_total", payment.goods_total),
        ("payment.delivery_cost", payment.delivery_cost),
        ("payment.custom_fee", payment.custom_fee),
    ] {
        if value.is_some_and(|v| v < 0) {
            problems.push(Problem::negative(field));
        }
    }

    if let Some(payment_dt) = payment.payment_dt {
        if payment_dt <= 0 {
            problems.push(Problem::NotPositive {
                field: "payment.payment_dt".to_string(),
            });
        } else if payment_dt > (now + PAYMENT_DT_MAX_AHEAD).timestamp() {
            let value = DateTime::from_timestamp(payment_dt, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| payment_dt.to_string());
            problems.push(Problem::InFuture {
                field: "payment.payment_dt".to_string(),
                value,
            });
        }
    }
}

fn check_items(items: &[Item], problems: &mut Vec<Problem>) {
    if items.is_empty() {
        problems.push(Problem::NoItems);
        return;
    }

    let mut seen_rids = std::collections::HashSet::new();
    for (i, item) in items.iter().enumerate() {
        let idx = i + 1;

        if is_blank(&item.rid) {
            problems.push(Problem::missing(format!("items[{idx}].rid")));
        } else if !seen_rids.insert(item.rid.as_str()) {
            problems.push(Problem::DuplicateRid {
                index: idx,
                rid: item.rid.clone(),
            });
        }

        for (name, value) in [("price", item.price), ("total_price", item.total_price)] {
            match value {
                None => problems.push(Problem::missing(format!("items[{idx}].{name}"))),
                Some(v) if v < 0 => {
                    problems.push(Problem::negative(format!("items[{idx}].{name}")))
                }
                Some(_) => {}
            }
        }

        if item.sale.is_some_and(|sale| !(0..=100).contains(&sale)) {
            problems.push(Problem::OutOfRange {
                field: format!("items[{idx}].sale"),
                min: 0,
                max: 100,
            });
        }
        if item.status.is_some_and(|status| status < 0) {
            problems.push(Problem::negative(format!("items[{idx}].status")));
        }
    }
}

fn check_totals(order: &Order, problems: &mut Vec<Problem>) {
    let Some(payment) = &order.payment else {
        return;
    };
    let items_total = order.items_total();

    if let Some(goods_total) = payment.goods_total {
        if !order.items.is_empty() && items_total != goods_total {
            problems.push(Problem::GoodsTotalMismatch {
                items_total,
                goods_total,
            });
        }
    }

    let Some(amount) = payment.amount else {
        return;
    };
    let goods = match payment.goods_total {
        Some(goods_total) => goods_total,
        None if !order.items.is_empty() => items_total,
        // Nothing to compare against.
        None => return,
    };
    let expected = goods
        .saturating_add(payment.delivery_cost.unwrap_or(0))
        .saturating_add(payment.custom_fee.unwrap_or(0));
    if amount != expected {
        problems.push(Problem::AmountMismatch { amount, expected });
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

#[allow(clippy::expect_used)]
fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("validation pattern is a valid regex"))
}

/// Six-digit postal code.
fn is_valid_zip(zip: &str) -> bool {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    pattern(&ZIP, r"^\d{6}$").is_match(zip.trim())
}

/// `+7` followed by ten digits, after stripping separators.
///
/// An 11-digit number with the domestic `8` trunk prefix is normalized to `+7` first,
/// so `8 (915) 123-45-67` and `+7 915 123 45 67` are both accepted.
fn is_valid_phone(phone: &str) -> bool {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    static PHONE: OnceLock<Regex> = OnceLock::new();

    let clean = pattern(&SEPARATORS, r"[^\d+]").replace_all(phone.trim(), "");
    let normalized = match clean.strip_prefix('8') {
        Some(rest) if clean.len() == 11 => format!("+7{rest}"),
        _ => clean.into_owned(),
    };
    pattern(&PHONE, r"^\+7\d{10}$").is_match(&normalized)
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    pattern(&EMAIL, r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_match(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_item(rid: &str, price: i64) -> Item {
        Item {
            rid: rid.to_string(),
            price: Some(price),
            total_price: Some(price),
            ..Item::default()
        }
    }

    /// The order from the end-to-end example: one item, amount = goods + delivery.
    fn valid_order() -> Order {
        Order {
            order_uid: "A1".to_string(),
            track_number: "TRACK-A1".to_string(),
            delivery: Some(Delivery {
                name: "N".to_string(),
                address: "Addr".to_string(),
                city: "C".to_string(),
                zip: "123456".to_string(),
                phone: "+71234567890".to_string(),
                ..Delivery::default()
            }),
            payment: Some(Payment {
                amount: Some(150),
                goods_total: Some(100),
                delivery_cost: Some(50),
                custom_fee: Some(0),
                ..Payment::default()
            }),
            items: vec![test_item("r1", 100)],
            ..Order::default()
        }
    }

    fn has(problems: &[Problem], expected: &Problem) -> bool {
        problems.iter().any(|p| p == expected)
    }

    #[test]
    fn valid_order_has_no_problems() {
        assert_eq!(validate_at(&valid_order(), test_now()), vec![]);
        assert!(ensure_valid(&valid_order()).is_ok());
    }

    #[test]
    fn track_number_is_required_even_when_everything_else_is_valid() {
        let order = Order {
            track_number: String::new(),
            ..valid_order()
        };
        assert_eq!(
            validate_at(&order, test_now()),
            vec![Problem::missing("track_number")]
        );
    }

    #[test]
    fn missing_sections_are_reported_together() {
        let order = Order {
            order_uid: "  ".to_string(),
            ..Order::default()
        };
        let problems = validate_at(&order, test_now());

        assert!(has(&problems, &Problem::missing("order_uid")));
        assert!(has(&problems, &Problem::missing("track_number")));
        assert!(has(&problems, &Problem::missing("delivery")));
        assert!(has(&problems, &Problem::missing("payment")));
        assert!(has(&problems, &Problem::NoItems));
    }

    #[test]
    fn locale_longer_than_ten_chars_is_rejected() {
        let mut order = valid_order();
        order.locale = "en".to_string();
        assert!(validate_at(&order, test_now()).is_empty());

        order.locale = "verylonglocale".to_string();
        assert!(has(
            &validate_at(&order, test_now()),
            &Problem::malformed("locale", "verylonglocale")
        ));
    }

    #[test]
    fn negative_sm_id_is_rejected() {
        let mut order = valid_order();
        order.sm_id = Some(-1);
        assert_eq!(validate_at(&order, test_now()), vec![Problem::negative("sm_id")]);
    }

    #[test]
    fn phone_formats_are_normalized() {
        assert!(is_valid_phone("+7 (915) 123-45-67"));
        assert!(is_valid_phone("8 915 123 45 67"));
        assert!(is_valid_phone("+79151234567"));
        assert!(!is_valid_phone("+1 555 123 4567"));
        assert!(!is_valid_phone("915-123"));
        assert!(!is_valid_phone("8915123456"));
    }

    #[test]
    fn zip_and_email_shapes() {
        assert!(is_valid_zip("101000"));
        assert!(is_valid_zip(" 101000 "));
        assert!(!is_valid_zip("10100"));
        assert!(!is_valid_zip("10100a"));

        assert!(is_valid_email("ivan@example.ru"));
        assert!(!is_valid_email("ivan@example"));
        assert!(!is_valid_email("ivan example@mail.ru"));
    }

    #[test]
    fn delivery_problems_are_itemized() {
        let mut order = valid_order();
        order.delivery = Some(Delivery {
            name: "N".to_string(),
            phone: "123".to_string(),
            zip: "12".to_string(),
            email: "not-an-email".to_string(),
            ..Delivery::default()
        });
        let problems = validate_at(&order, test_now());

        assert!(has(&problems, &Problem::missing("delivery.address")));
        assert!(has(&problems, &Problem::missing("delivery.city")));
        assert!(has(&problems, &Problem::malformed("delivery.zip", "12")));
        assert!(has(&problems, &Problem::malformed("delivery.phone", "123")));
        assert!(has(&problems, &Problem::malformed("delivery.email", "not-an-email")));
        assert_eq!(problems.len(), 5);
    }

    #[test]
    fn missing_amount_is_reported_without_cross_check() {
        let mut order = valid_order();
        order.payment.as_mut().unwrap().amount = None;
        assert_eq!(
            validate_at(&order, test_now()),
            vec![Problem::missing("payment.amount")]
        );
    }

    #[test]
    fn payment_dt_must_be_positive_and_not_far_ahead() {
        let mut order = valid_order();
        order.payment.as_mut().unwrap().payment_dt = Some(0);
        assert!(has(
            &validate_at(&order, test_now()),
            &Problem::NotPositive {
                field: "payment.payment_dt".to_string()
            }
        ));

        let ahead = (test_now() + Duration::hours(23)).timestamp();
        order.payment.as_mut().unwrap().payment_dt = Some(ahead);
        assert!(validate_at(&order, test_now()).is_empty());

        let too_far = (test_now() + Duration::hours(25)).timestamp();
        order.payment.as_mut().unwrap().payment_dt = Some(too_far);
        let problems = validate_at(&order, test_now());
        assert!(matches!(
            problems.as_slice(),
            [Problem::InFuture { field, .. }] if field == "payment.payment_dt"
        ));
    }

    #[test]
    fn date_created_tolerates_one_hour_of_skew() {
        let mut order = valid_order();
        order.date_created = Some(test_now() + Duration::minutes(59));
        assert!(validate_at(&order, test_now()).is_empty());

        order.date_created = Some(test_now() + Duration::minutes(61));
        assert!(matches!(
            validate_at(&order, test_now()).as_slice(),
            [Problem::InFuture { field, .. }] if field == "date_created"
        ));
    }

    #[test]
    fn item_field_problems_use_one_based_index() {
        let mut order = valid_order();
        order.items.push(Item {
            rid: "r2".to_string(),
            price: None,
            total_price: Some(-5),
            sale: Some(101),
            status: Some(-1),
            ..Item::default()
        });
        let problems = validate_at(&order, test_now());

        assert!(has(&problems, &Problem::missing("items[2].price")));
        assert!(has(&problems, &Problem::negative("items[2].total_price")));
        assert!(has(
            &problems,
            &Problem::OutOfRange {
                field: "items[2].sale".to_string(),
                min: 0,
                max: 100
            }
        ));
        assert!(has(&problems, &Problem::negative("items[2].status")));
    }

    #[test]
    fn goods_total_must_match_item_sum() {
        let mut order = valid_order();
        order.payment.as_mut().unwrap().goods_total = Some(90);
        let problems = validate_at(&order, test_now());

        assert!(has(
            &problems,
            &Problem::GoodsTotalMismatch {
                items_total: 100,
                goods_total: 90
            }
        ));
        // goods_total is trusted for the amount check: 90 + 50 + 0 != 150.
        assert!(has(
            &problems,
            &Problem::AmountMismatch {
                amount: 150,
                expected: 140
            }
        ));
    }

    #[test]
    fn amount_falls_back_to_item_sum_without_goods_total() {
        let mut order = valid_order();
        order.payment.as_mut().unwrap().goods_total = None;
        assert!(validate_at(&order, test_now()).is_empty());

        order.payment.as_mut().unwrap().amount = Some(151);
        assert_eq!(
            validate_at(&order, test_now()),
            vec![Problem::AmountMismatch {
                amount: 151,
                expected: 150
            }]
        );
    }

    #[test]
    fn zero_expected_total_is_still_compared() {
        let mut order = valid_order();
        order.items = vec![test_item("r1", 0)];
        let payment = order.payment.as_mut().unwrap();
        payment.goods_total = Some(0);
        payment.delivery_cost = Some(0);
        payment.amount = Some(10);

        assert_eq!(
            validate_at(&order, test_now()),
            vec![Problem::AmountMismatch {
                amount: 10,
                expected: 0
            }]
        );
    }

    #[test]
    fn amount_check_is_skipped_when_total_is_undeterminable() {
        let mut order = valid_order();
        order.items.clear();
        order.payment.as_mut().unwrap().goods_total = None;

        assert_eq!(validate_at(&order, test_now()), vec![Problem::NoItems]);
    }

    #[test]
    fn validation_error_joins_problems() {
        let err = ValidationError::new(vec![Problem::missing("order_uid"), Problem::NoItems]);
        assert_eq!(
            err.to_string(),
            "order_uid is required; items must contain at least one item"
        );
    }

    #[test]
    fn validate_does_not_mutate_input() {
        let order = Order {
            items: vec![test_item("r1", 1), test_item("r1", 1)],
            ..valid_order()
        };
        let before = order.clone();
        let _ = validate_at(&order, test_now());
        assert_eq!(order, before);
    }

    fn arb_valid_order() -> impl Strategy<Value = Order> {
        (
            prop::collection::vec((0i64..1_000_000, 0i32..=100), 1..8),
            0i64..100_000,
            0i64..100_000,
        )
            .prop_map(|(lines, delivery_cost, custom_fee)| {
                let items: Vec<Item> = lines
                    .iter()
                    .enumerate()
                    .map(|(i, (total, sale))| Item {
                        rid: format!("rid-{i}"),
                        price: Some(*total),
                        total_price: Some(*total),
                        sale: Some(*sale),
                        ..Item::default()
                    })
                    .collect();
                let goods_total: i64 = lines.iter().map(|(total, _)| total).sum();

                let mut order = valid_order();
                order.items = items;
                order.payment = Some(Payment {
                    amount: Some(goods_total + delivery_cost + custom_fee),
                    goods_total: Some(goods_total),
                    delivery_cost: Some(delivery_cost),
                    custom_fee: Some(custom_fee),
                    payment_dt: Some(test_now().timestamp()),
                    ..Payment::default()
                });
                order
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: consistent totals and in-range fields validate cleanly.
        #[test]
        fn consistent_orders_validate_cleanly(order in arb_valid_order()) {
            prop_assert_eq!(validate_at(&order, test_now()), vec![]);
        }

        /// Property: an empty item list is always reported, whatever else is wrong.
        #[test]
        fn empty_items_always_reported(
            mut order in arb_valid_order(),
            drop_payment in any::<bool>(),
            drop_delivery in any::<bool>(),
        ) {
            order.items.clear();
            if drop_payment {
                order.payment = None;
            }
            if drop_delivery {
                order.delivery = None;
            }
            let problems = validate_at(&order, test_now());
            prop_assert!(problems.contains(&Problem::NoItems));
        }

        /// Property: one repeated rid yields exactly one duplicate problem, at the repeat.
        #[test]
        fn duplicate_rid_reported_once_at_second_occurrence(
            order in arb_valid_order(),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut order = order;
            let source = pick.index(order.items.len());
            let mut repeated = order.items[source].clone();
            repeated.total_price = Some(0);
            repeated.price = Some(0);
            let rid = repeated.rid.clone();
            order.items.push(repeated);

            let problems = validate_at(&order, test_now());
            let duplicates: Vec<_> = problems
                .iter()
                .filter(|p| matches!(p, Problem::DuplicateRid { .. }))
                .collect();
            prop_assert_eq!(duplicates.len(), 1);
            prop_assert_eq!(
                duplicates[0],
                &Problem::DuplicateRid { index: order.items.len(), rid }
            );
        }
    }
}
