use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::LedgerError;
use crate::domain::{Account, Cents, Transaction, parse_cents};

use super::SharedService;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub initial_balance: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    #[serde(default)]
    pub iban: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub from_iban: Option<Value>,
    #[serde(default)]
    pub to_iban: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
}

/// Body fields are taken as raw JSON values so that a missing or mistyped
/// field is reported as invalid input instead of a framework rejection.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, LedgerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| LedgerError::validation(format!("Invalid input: {}", rejection.body_text())))
}

fn required_iban(value: Option<Value>, field: &str) -> Result<String, LedgerError> {
    match value {
        Some(Value::String(iban)) if !iban.trim().is_empty() => Ok(iban),
        _ => Err(LedgerError::validation(format!(
            "Invalid input: {} is required",
            field
        ))),
    }
}

/// Parse a JSON number in major units ("12.5") into cents.
fn money(value: &Value, field: &str) -> Result<Cents, LedgerError> {
    let Value::Number(number) = value else {
        return Err(LedgerError::validation(format!(
            "Invalid input: {} must be a number",
            field
        )));
    };
    parse_cents(&number.to_string())
        .map_err(|err| LedgerError::validation(format!("Invalid input: {}: {}", field, err)))
}

fn required_amount(value: Option<Value>) -> Result<Cents, LedgerError> {
    match value {
        Some(value) => money(&value, "amount"),
        None => Err(LedgerError::validation("Invalid input: amount is required")),
    }
}

pub async fn list_accounts(
    State(service): State<SharedService>,
) -> Result<Json<Vec<Account>>, LedgerError> {
    Ok(Json(service.list_accounts().await?))
}

pub async fn create_account(
    State(service): State<SharedService>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), LedgerError> {
    // An empty body is as good as `{}`
    let request = match payload {
        Err(JsonRejection::MissingJsonContentType(_)) => CreateAccountRequest::default(),
        other => body(other)?,
    };
    let initial_balance = request
        .initial_balance
        .as_ref()
        .map(|value| money(value, "initialBalance"))
        .transpose()?;

    let account = service.create_account(initial_balance).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn deposit(
    State(service): State<SharedService>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<Json<Account>, LedgerError> {
    let request = body(payload)?;
    let iban = required_iban(request.iban, "iban")?;
    let amount = required_amount(request.amount)?;

    Ok(Json(service.deposit(&iban, amount).await?))
}

pub async fn withdraw(
    State(service): State<SharedService>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<Json<Account>, LedgerError> {
    let request = body(payload)?;
    let iban = required_iban(request.iban, "iban")?;
    let amount = required_amount(request.amount)?;

    Ok(Json(service.withdraw(&iban, amount).await?))
}

pub async fn transfer(
    State(service): State<SharedService>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<Value>, LedgerError> {
    let request = body(payload)?;
    let from_iban = required_iban(request.from_iban, "fromIban")?;
    let to_iban = required_iban(request.to_iban, "toIban")?;
    let amount = required_amount(request.amount)?;

    service.transfer(&from_iban, &to_iban, amount).await?;
    Ok(Json(json!({ "message": "Transfer successful" })))
}

pub async fn statement(
    State(service): State<SharedService>,
    Path(iban): Path<String>,
) -> Result<Json<Vec<Transaction>>, LedgerError> {
    Ok(Json(service.statement(&iban).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_json_numbers() {
        assert_eq!(money(&json!(50), "amount").unwrap(), 5000);
        assert_eq!(money(&json!(12.5), "amount").unwrap(), 1250);
        assert_eq!(money(&json!(0.01), "amount").unwrap(), 1);
        assert_eq!(money(&json!(-5), "amount").unwrap(), -500);
    }

    #[test]
    fn test_money_rejects_non_numbers() {
        for value in [json!("50"), json!(true), json!(null), json!([1]), json!({"v": 1})] {
            assert!(matches!(
                money(&value, "amount"),
                Err(LedgerError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_money_rejects_sub_cent_amounts() {
        assert!(matches!(
            money(&json!(0.001), "amount"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_required_iban() {
        assert_eq!(
            required_iban(Some(json!("IBAN-ABCDEF12")), "iban").unwrap(),
            "IBAN-ABCDEF12"
        );
        assert!(required_iban(None, "iban").is_err());
        assert!(required_iban(Some(json!("  ")), "iban").is_err());
        assert!(required_iban(Some(json!(42)), "iban").is_err());
    }

    #[test]
    fn test_required_amount_missing() {
        assert!(matches!(
            required_amount(None),
            Err(LedgerError::Validation(_))
        ));
    }
}
