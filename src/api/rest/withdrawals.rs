use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::ledger::{
    complete_withdrawal, decide_withdrawal, request_withdrawal, Decision, WithdrawalRequest,
};
use crate::error::AppError;
use crate::models::withdrawal::{BankDetails, Withdrawal};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/withdrawals", post(create))
        .route("/withdrawals/:id", get(fetch))
        .route("/withdrawals/:id/decide", post(decide))
        .route("/withdrawals/:id/complete", post(complete))
}

#[derive(Deserialize)]
pub struct CreateWithdrawalBody {
    pub driver_id: u64,
    pub amount: f64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBody {
    Approve,
    Reject,
}

#[derive(Deserialize)]
pub struct DecideWithdrawalBody {
    pub decision: DecisionBody,
    pub actor: String,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWithdrawalBody>,
) -> Result<Json<Withdrawal>, AppError> {
    let withdrawal = request_withdrawal(
        &state,
        body.driver_id,
        WithdrawalRequest {
            amount: body.amount,
            bank: BankDetails {
                bank_name: body.bank_name,
                account_number: body.account_number,
                account_name: body.account_name,
            },
            notes: body.notes,
        },
    )?;

    Ok(Json(withdrawal))
}

async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Withdrawal>, AppError> {
    let withdrawal = state
        .withdrawals
        .get(&id)
        .map(|w| w.clone())
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {id} not found")))?;

    Ok(Json(withdrawal))
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<DecideWithdrawalBody>,
) -> Result<Json<Withdrawal>, AppError> {
    let decision = match body.decision {
        DecisionBody::Approve => Decision::Approve,
        DecisionBody::Reject => Decision::Reject,
    };

    Ok(Json(decide_withdrawal(&state, id, decision, &body.actor)?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Withdrawal>, AppError> {
    Ok(Json(complete_withdrawal(&state, id)?))
}
