mod common;

use anyhow::Result;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::shared_service;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> Result<(Router, TempDir)> {
    let (service, temp) = shared_service().await?;
    Ok((moneta::http::router(service), temp))
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

async fn get(app: &Router, uri: &str) -> Result<(StatusCode, Value)> {
    send(app, Request::get(uri).body(Body::empty())?).await
}

async fn post(app: &Router, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?;
    send(app, request).await
}

async fn open_account(app: &Router, initial_balance: Value) -> Result<String> {
    let (status, body) = post(app, "/create-account", json!({ "initialBalance": initial_balance })).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(body["iban"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_accounts_empty_is_not_found() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let (status, body) = get(&app, "/accounts").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No accounts found");

    Ok(())
}

#[tokio::test]
async fn test_create_account_and_list() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let (status, body) = post(&app, "/create-account", json!({ "initialBalance": 100 })).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "100.00");
    assert!(body["iban"].as_str().unwrap().starts_with("IBAN-"));
    assert!(body["createdAt"].is_string());

    let (status, body) = get(&app, "/accounts").await?;
    assert_eq!(status, StatusCode::OK);
    let accounts = body.as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["balance"], "100.00");

    Ok(())
}

#[tokio::test]
async fn test_create_account_without_balance() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let (status, body) = post(&app, "/create-account", json!({})).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "0.00");

    let (status, body) = post(&app, "/create-account", json!({ "initialBalance": null })).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "0.00");

    // No body at all
    let (status, body) = send(
        &app,
        Request::post("/create-account").body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "0.00");

    Ok(())
}

#[tokio::test]
async fn test_create_account_negative_balance() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let (status, body) = post(&app, "/create-account", json!({ "initialBalance": -5 })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Initial balance cannot be negative.");

    let (status, _) = get(&app, "/accounts").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_deposit_and_withdraw() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let iban = open_account(&app, json!(100)).await?;

    let (status, body) = post(&app, "/deposit", json!({ "iban": iban, "amount": 50 })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "150.00");

    let (status, body) = post(&app, "/withdraw", json!({ "iban": iban, "amount": 20.25 })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "129.75");

    let (status, body) = post(&app, "/withdraw", json!({ "iban": iban, "amount": 1000 })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Insufficient funds"));

    Ok(())
}

#[tokio::test]
async fn test_invalid_movement_input() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let iban = open_account(&app, json!(100)).await?;

    for body in [
        json!({ "iban": iban }),
        json!({ "iban": iban, "amount": "50" }),
        json!({ "iban": iban, "amount": 0 }),
        json!({ "iban": iban, "amount": -1 }),
        json!({ "iban": iban, "amount": 0.001 }),
        json!({ "amount": 10 }),
        json!({ "iban": 12, "amount": 10 }),
    ] {
        let (status, _) = post(&app, "/deposit", body.clone()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "deposit {}", body);
        let (status, _) = post(&app, "/withdraw", body.clone()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "withdraw {}", body);
    }

    // Malformed JSON
    let request = Request::post("/deposit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))?;
    let (status, _) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_unknown_account_is_not_found() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let iban = open_account(&app, json!(100)).await?;

    let (status, _) = post(&app, "/deposit", json!({ "iban": "IBAN-00000000", "amount": 5 })).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/withdraw", json!({ "iban": "IBAN-00000000", "amount": 5 })).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &app,
        "/transfer",
        json!({ "fromIban": iban, "toIban": "IBAN-00000000", "amount": 5 }),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/statement/IBAN-00000000").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_transfer_and_statements() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let alice = open_account(&app, json!(150)).await?;
    let bob = open_account(&app, json!(0)).await?;

    let (status, body) = post(
        &app,
        "/transfer",
        json!({ "fromIban": alice, "toIban": bob, "amount": 30 }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transfer successful");

    let (status, body) = get(&app, &format!("/statement/{}", alice)).await?;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["type"], "TRANSFER_OUT");
    assert_eq!(entries[0]["amount"], "30.00");
    assert_eq!(entries[0]["accountId"], alice.as_str());

    let (_, body) = get(&app, &format!("/statement/{}", bob)).await?;
    assert_eq!(body[0]["type"], "TRANSFER_IN");

    let (_, body) = get(&app, "/accounts").await?;
    let balances: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["balance"].as_str().unwrap().to_string())
        .collect();
    assert!(balances.contains(&"120.00".to_string()));
    assert!(balances.contains(&"30.00".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_transfer_rejections() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let alice = open_account(&app, json!(10)).await?;
    let bob = open_account(&app, json!(0)).await?;

    for body in [
        json!({ "fromIban": alice, "toIban": alice, "amount": 10 }),
        json!({ "fromIban": alice, "amount": 10 }),
        json!({ "fromIban": alice, "toIban": bob }),
        json!({ "fromIban": alice, "toIban": bob, "amount": -3 }),
        json!({ "fromIban": alice, "toIban": bob, "amount": 11 }),
    ] {
        let (status, _) = post(&app, "/transfer", body.clone()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "transfer {}", body);
    }

    let (_, body) = get(&app, &format!("/statement/{}", alice)).await?;
    assert_eq!(body, json!([]));

    Ok(())
}
