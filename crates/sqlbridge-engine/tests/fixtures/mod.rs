//! Test fixtures for end-to-end inference and extraction
//!
//! These build mock databases shaped like typical source tables:
//! - ORDERS with a primary key, a foreign key to CUSTOMERS, a decimal amount
//!   and an order date
//! - NUMBERS, a large single-table result with nulls every third row

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlbridge_catalog::{
    ColumnDescriptor, DriverRegistry, ImportedKey, MockDriver, MockResultSet, RawValue, SqlType,
    TableRef,
};
use sqlbridge_engine::SqlConnector;
use std::str::FromStr;
use std::sync::Arc;

pub const ORDERS_QUERY: &str = "SELECT id, customer_id, amount, created_at FROM ORDERS";
pub const NUMBERS_QUERY: &str = "SELECT n, label FROM NUMBERS ORDER BY n";
pub const MOCK_URL: &str = "mock:shop";

/// ORDERS(id PK, customer_id FK -> CUSTOMERS.id, amount DECIMAL, created_at DATE)
/// holding the single row (1, 10, 99.50, 2020-01-01)
pub async fn orders_database() -> MockDriver {
    let driver = MockDriver::new();
    let orders = TableRef::new("ORDERS");

    driver
        .add_result_set(
            ORDERS_QUERY,
            MockResultSet::new(
                vec![
                    ColumnDescriptor::new("id", SqlType::Integer).with_table(orders.clone()),
                    ColumnDescriptor::new("customer_id", SqlType::Integer).with_table(orders.clone()),
                    ColumnDescriptor::new("amount", SqlType::Decimal).with_table(orders.clone()),
                    ColumnDescriptor::new("created_at", SqlType::Date).with_table(orders),
                ],
                vec![vec![
                    RawValue::Int(1),
                    RawValue::Int(10),
                    RawValue::Decimal(Decimal::from_str("99.50").unwrap()),
                    RawValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
                ]],
            ),
        )
        .await;

    driver.add_primary_key("ORDERS", &["id"]).await;
    driver.add_primary_key("CUSTOMERS", &["id"]).await;
    driver
        .add_imported_key(
            "ORDERS",
            ImportedKey {
                fk_column: "CUSTOMER_ID".to_string(),
                pk_schema: None,
                pk_table: "CUSTOMERS".to_string(),
                pk_column: "id".to_string(),
                key_seq: 1,
            },
        )
        .await;

    driver
}

/// NUMBERS(n BIGINT, label VARCHAR) with rows 1..=count; every third label is null
pub async fn numbers_database(count: i64) -> MockDriver {
    let driver = MockDriver::new();

    driver
        .add_result_set(
            NUMBERS_QUERY,
            MockResultSet::new(
                vec![
                    ColumnDescriptor::new("n", SqlType::BigInt),
                    ColumnDescriptor::new("label", SqlType::Varchar),
                ],
                (1..=count)
                    .map(|n| {
                        let label = if n % 3 == 0 {
                            RawValue::Null
                        } else {
                            RawValue::Text(format!("row {}", n))
                        };
                        vec![RawValue::Int(n), label]
                    })
                    .collect(),
            ),
        )
        .await;

    driver
}

/// Connector with `driver` registered but not yet loaded
pub fn connector_with(driver: &MockDriver) -> SqlConnector {
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(driver.clone()));
    SqlConnector::new(registry)
}
