use super::error::ApiError;
use crate::application::context::AppContext;
use crate::domain::account::{Account, Amount};
use crate::domain::identity::IdentityKey;
use crate::domain::payment::{PaymentFilter, PaymentRequest};
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub(super) type AppState = Arc<AppContext>;
type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
pub(super) struct Success {
    success: bool,
}

const SUCCESS: Success = Success { success: true };

#[derive(Deserialize)]
pub(super) struct SendOtpBody {
    identity_key: String,
}

#[derive(Deserialize)]
pub(super) struct VerifyOtpBody {
    identity_key: String,
    code: String,
}

#[derive(Deserialize)]
pub(super) struct OpenAccountBody {
    identity_key: String,
}

#[derive(Deserialize)]
pub(super) struct EnrollBody {
    tournament_id: String,
    #[serde(default)]
    entry_fee: u64,
}

#[derive(Serialize)]
pub(super) struct EnrollResponse {
    success: bool,
    balance: u64,
}

#[derive(Deserialize)]
pub(super) struct PaymentBody {
    identity_key: String,
    amount: u64,
}

pub(super) async fn healthz() -> Json<Success> {
    Json(SUCCESS)
}

pub(super) async fn send_otp(
    State(ctx): State<AppState>,
    body: Result<Json<SendOtpBody>, JsonRejection>,
) -> ApiResult<Json<Success>> {
    let Json(body) = body?;
    ctx.issuer.issue(&body.identity_key).await?;
    Ok(Json(SUCCESS))
}

pub(super) async fn verify_otp(
    State(ctx): State<AppState>,
    body: Result<Json<VerifyOtpBody>, JsonRejection>,
) -> ApiResult<Json<Success>> {
    let Json(body) = body?;
    ctx.verifier.verify(&body.identity_key, &body.code).await?;
    Ok(Json(SUCCESS))
}

pub(super) async fn open_account(
    State(ctx): State<AppState>,
    body: Result<Json<OpenAccountBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let Json(body) = body?;
    let key = IdentityKey::parse(&body.identity_key)?;
    let account = ctx.ledger.open_account(&key).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub(super) async fn get_account(
    State(ctx): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Account>> {
    let Path(key) = key?;
    let key = IdentityKey::parse(&key)?;
    Ok(Json(ctx.ledger.account(&key).await?))
}

pub(super) async fn enroll(
    State(ctx): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    body: Result<Json<EnrollBody>, JsonRejection>,
) -> ApiResult<Json<EnrollResponse>> {
    let Path(key) = key?;
    let Json(body) = body?;
    let key = IdentityKey::parse(&key)?;
    // A zero fee means a free tournament.
    let entry_fee = (body.entry_fee > 0)
        .then(|| Amount::new(body.entry_fee))
        .transpose()?;
    let balance = ctx.ledger.enroll(&key, &body.tournament_id, entry_fee).await?;
    Ok(Json(EnrollResponse {
        success: true,
        balance: balance.value(),
    }))
}

pub(super) async fn add_money(
    State(ctx): State<AppState>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentRequest>)> {
    let (key, amount) = payment_body(body)?;
    let request = ctx.payments.submit_add_money(&key, amount).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(super) async fn withdrawal(
    State(ctx): State<AppState>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentRequest>)> {
    let (key, amount) = payment_body(body)?;
    let request = ctx.payments.submit_withdrawal(&key, amount).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(super) async fn winning(
    State(ctx): State<AppState>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentRequest>)> {
    let (key, amount) = payment_body(body)?;
    let request = ctx.payments.record_winning(&key, amount).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(super) async fn approve(
    State(ctx): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PaymentRequest>> {
    let Path(id) = id?;
    Ok(Json(ctx.payments.approve(id).await?))
}

pub(super) async fn reject(
    State(ctx): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PaymentRequest>> {
    let Path(id) = id?;
    Ok(Json(ctx.payments.reject(id).await?))
}

pub(super) async fn get_payment(
    State(ctx): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PaymentRequest>> {
    let Path(id) = id?;
    Ok(Json(ctx.payments.get(id).await?))
}

pub(super) async fn list_payments(
    State(ctx): State<AppState>,
    filter: Result<Query<PaymentFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<PaymentRequest>>> {
    let Query(filter) = filter?;
    Ok(Json(ctx.payments.list(&filter).await?))
}

fn payment_body(
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> ApiResult<(IdentityKey, Amount)> {
    let Json(body) = body?;
    Ok((IdentityKey::parse(&body.identity_key)?, Amount::new(body.amount)?))
}
