//! OKX adapter against a mocked API server.

mod support;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coinpanel::models::ExchangeKind;
use coinpanel::sources::transport::OkxTransport;
use coinpanel::sources::{OkxAdapter, SourceAdapter, SourceError};

use support::{exchange_account, fixed_clock};

fn adapter(server: &MockServer) -> OkxAdapter {
    let account = exchange_account(ExchangeKind::Okx, "okx-main");
    let transport = OkxTransport::new(&account, fixed_clock()).with_base_url(server.uri());
    OkxAdapter::with_transport(account.name, Arc::new(transport))
}

#[tokio::test]
async fn merges_funding_and_trading_accounts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/asset/balances"))
        .and(header("OK-ACCESS-KEY", "api-key"))
        .and(header("OK-ACCESS-PASSPHRASE", "hunter2"))
        .and(header_exists("OK-ACCESS-SIGN"))
        .and(header_exists("OK-ACCESS-TIMESTAMP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "0",
            "data": [
                {"ccy": "BTC", "bal": "0.30"},
                {"ccy": "OKB", "bal": "50"},
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v5/account/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "0",
            "data": [{"details": [
                {"ccy": "BTC", "eq": "0.20"},
                {"ccy": "USDT", "eq": "0", "cashBal": "150"},
            ]}]
        })))
        .mount(&server)
        .await;

    let mut holdings = adapter(&server).fetch().await.unwrap();
    holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
    assert_eq!(symbols, ["BTC", "OKB", "USDT"]);
    assert!((holdings[0].amount - 0.5).abs() < 1e-12);
    // eq was zero, cashBal filled in.
    assert_eq!(holdings[2].amount, 150.0);
}

#[tokio::test]
async fn wrong_passphrase_becomes_auth_warning_material() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "50105", "msg": "Request passphrase incorrect", "data": []
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch().await.unwrap_err();
    match err {
        SourceError::Auth(message) => assert!(message.contains("passphrase incorrect")),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_auth_api_error_is_not_an_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "50011", "msg": "Requests too frequent", "data": []
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch().await.unwrap_err();
    assert!(matches!(err, SourceError::Other(_)), "got {err:?}");
}
