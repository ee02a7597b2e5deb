use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::order::OrderStatus;
use crate::models::withdrawal::{BankDetails, Withdrawal, WithdrawalStatus};
use crate::state::AppState;

/// Fare credit on trip completion. Only callable with the driver entry guard
/// held by the order state machine, which guarantees exactly-once per order.
pub(crate) fn credit(driver: &mut Driver, amount: f64) {
    driver.total_earnings += amount;
    info!(
        driver_id = driver.id,
        amount,
        balance = driver.total_earnings,
        "earnings credited"
    );
}

pub struct WithdrawalRequest {
    pub amount: f64,
    pub bank: BankDetails,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Sum of approved withdrawal amounts for a driver. Completed withdrawals
/// were approved first, so they are counted at approval and stay debited.
fn approved_total(state: &AppState, driver_id: u64) -> f64 {
    state
        .withdrawals
        .iter()
        .filter(|w| w.driver_id == driver_id && w.status == WithdrawalStatus::Approved)
        .map(|w| w.amount)
        .sum()
}

pub fn available_balance(state: &AppState, driver: &Driver) -> f64 {
    driver.total_earnings - approved_total(state, driver.id)
}

/// Creates a pending withdrawal after checking the requested amount against
/// the driver's available balance. The balance is re-validated at approval,
/// so a race between two requests can only end up over-rejecting.
pub fn request_withdrawal(
    state: &AppState,
    driver_id: u64,
    req: WithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    if req.amount <= 0.0 {
        return Err(AppError::InvalidArgument(format!(
            "amount must be greater than 0, got {}",
            req.amount
        )));
    }

    let driver = state
        .drivers
        .get(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let available = available_balance(state, &driver);
    if req.amount > available {
        return Err(AppError::InsufficientBalance {
            available,
            requested: req.amount,
        });
    }
    drop(driver);

    let id = state.next_withdrawal_id();
    let withdrawal = Withdrawal {
        id,
        driver_id,
        amount: req.amount,
        status: WithdrawalStatus::Pending,
        bank: req.bank,
        notes: req.notes,
        approved_by: None,
        rejected_by: None,
        approved_at: None,
        rejected_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    state.withdrawals.insert(id, withdrawal.clone());
    info!(withdrawal_id = id, driver_id, amount = req.amount, "withdrawal requested");

    Ok(withdrawal)
}

/// Approves or rejects a pending withdrawal. Approval re-validates the
/// amount against the driver's balance under the driver entry guard, so two
/// approvals racing past the request-time check cannot jointly overdraw,
/// then debits the balance (floored at zero).
pub fn decide_withdrawal(
    state: &AppState,
    withdrawal_id: u64,
    decision: Decision,
    actor: &str,
) -> Result<Withdrawal, AppError> {
    let driver_id = state
        .withdrawals
        .get(&withdrawal_id)
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {withdrawal_id} not found")))?
        .driver_id;

    // Driver before withdrawal, per the fixed lock order.
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let mut withdrawal = state
        .withdrawals
        .get_mut(&withdrawal_id)
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {withdrawal_id} not found")))?;

    if withdrawal.status != WithdrawalStatus::Pending {
        return Err(AppError::InvalidTransition(format!(
            "withdrawal {withdrawal_id} has already been decided"
        )));
    }

    let now = Utc::now();
    match decision {
        Decision::Approve => {
            if withdrawal.amount > driver.total_earnings {
                return Err(AppError::InsufficientBalance {
                    available: driver.total_earnings,
                    requested: withdrawal.amount,
                });
            }

            driver.total_earnings = (driver.total_earnings - withdrawal.amount).max(0.0);
            driver.updated_at = now;
            withdrawal.status = WithdrawalStatus::Approved;
            withdrawal.approved_at = Some(now);
            withdrawal.approved_by = Some(actor.to_string());

            state.metrics.withdrawal_decisions("approved");
            info!(
                withdrawal_id,
                driver_id,
                amount = withdrawal.amount,
                balance = driver.total_earnings,
                "withdrawal approved"
            );
        }
        Decision::Reject => {
            withdrawal.status = WithdrawalStatus::Rejected;
            withdrawal.rejected_at = Some(now);
            withdrawal.rejected_by = Some(actor.to_string());

            state.metrics.withdrawal_decisions("rejected");
            info!(withdrawal_id, driver_id, "withdrawal rejected");
        }
    }

    Ok(withdrawal.clone())
}

/// Approved -> Completed, once the payout has actually been made. The
/// balance was already debited at approval.
pub fn complete_withdrawal(state: &AppState, withdrawal_id: u64) -> Result<Withdrawal, AppError> {
    let mut withdrawal = state
        .withdrawals
        .get_mut(&withdrawal_id)
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {withdrawal_id} not found")))?;

    if withdrawal.status != WithdrawalStatus::Approved {
        return Err(AppError::InvalidTransition(format!(
            "withdrawal {withdrawal_id} is not approved"
        )));
    }

    withdrawal.status = WithdrawalStatus::Completed;
    withdrawal.completed_at = Some(Utc::now());
    info!(withdrawal_id, "withdrawal completed");

    Ok(withdrawal.clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsSummary {
    pub driver_id: u64,
    pub driver_name: String,
    pub total_earnings: f64,
    pub available_balance: f64,
    pub approved_withdrawals: f64,
    pub total_trips: u32,
    pub completed_orders: u64,
    pub rating: f64,
}

pub fn driver_earnings(state: &AppState, driver_id: u64) -> Result<EarningsSummary, AppError> {
    let driver = state
        .drivers
        .get(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?
        .clone();

    let completed_orders = state
        .orders
        .iter()
        .filter(|o| o.driver_id == Some(driver_id) && o.status == OrderStatus::Completed)
        .count() as u64;

    let approved = approved_total(state, driver_id);

    Ok(EarningsSummary {
        driver_id,
        driver_name: driver.name,
        total_earnings: driver.total_earnings,
        available_balance: driver.total_earnings - approved,
        approved_withdrawals: approved,
        total_trips: driver.total_trips,
        completed_orders,
        rating: driver.rating,
    })
}
