//! services/companion/src/web/billing.rs
//!
//! REST handlers for subscriptions and credits. Every purchase ends in a checkout URL
//! that the UI redirects to.

use crate::web::{
    rest::{port_error_response, ApiResult},
    state::AppState,
};
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use video_learning_core::{
    credits::CustomCreditAmount,
    domain::{CheckoutSession, CreditPackage, CreditTransaction, SubscriptionPlan},
};

#[derive(Serialize, ToSchema, Debug)]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub price_pence: u64,
    pub monthly_credits: u32,
    pub features: Vec<String>,
}

impl From<SubscriptionPlan> for PlanResponse {
    fn from(p: SubscriptionPlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price_pence: p.price_pence,
            monthly_credits: p.monthly_credits,
            features: p.features,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct PackageResponse {
    pub id: String,
    pub credits: u32,
    pub price_pence: u64,
}

impl From<CreditPackage> for PackageResponse {
    fn from(p: CreditPackage) -> Self {
        Self {
            id: p.id,
            credits: p.credits,
            price_pence: p.price_pence,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(c: CheckoutSession) -> Self {
        Self { checkout_url: c.url }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub plan_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PurchasePackageRequest {
    pub package_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PurchaseCustomRequest {
    /// Pounds, between 1 and 1000.
    pub amount: f64,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TransactionResponse {
    pub id: String,
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransaction> for TransactionResponse {
    fn from(t: CreditTransaction) -> Self {
        Self {
            id: t.id,
            amount: t.amount,
            description: t.description,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct BalanceResponse {
    pub credits: i64,
}

#[utoipa::path(
    get,
    path = "/billing/plans",
    responses((status = 200, description = "Subscription plans", body = [PlanResponse]))
)]
pub async fn list_plans_handler(State(app_state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PlanResponse>>> {
    let plans = app_state.billing.list_plans().await.map_err(port_error_response)?;
    Ok(Json(plans.into_iter().map(PlanResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/billing/subscribe",
    request_body = SubscribeRequest,
    responses((status = 200, description = "Checkout for the plan", body = CheckoutResponse))
)]
pub async fn subscribe_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let checkout = app_state
        .billing
        .create_subscription_checkout(&body.plan_id)
        .await
        .map_err(port_error_response)?;
    info!("Created subscription checkout for plan {}", body.plan_id);
    Ok(Json(checkout.into()))
}

#[utoipa::path(
    get,
    path = "/credits/packages",
    responses((status = 200, description = "Credit packages", body = [PackageResponse]))
)]
pub async fn list_packages_handler(
    State(app_state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PackageResponse>>> {
    let packages = app_state.billing.list_credit_packages().await.map_err(port_error_response)?;
    Ok(Json(packages.into_iter().map(PackageResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/credits/purchase",
    request_body = PurchasePackageRequest,
    responses((status = 200, description = "Checkout for the package", body = CheckoutResponse))
)]
pub async fn purchase_package_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<PurchasePackageRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let checkout = app_state
        .billing
        .purchase_package(&body.package_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(checkout.into()))
}

/// Buy an arbitrary amount of credits. Amounts outside £1 to £1000 never reach the backend.
#[utoipa::path(
    post,
    path = "/credits/purchase-custom",
    request_body = PurchaseCustomRequest,
    responses(
        (status = 200, description = "Checkout for the amount", body = CheckoutResponse),
        (status = 400, description = "Amount out of range"),
    )
)]
pub async fn purchase_custom_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<PurchaseCustomRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let amount = CustomCreditAmount::new(body.amount).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let checkout = app_state
        .billing
        .purchase_custom_amount(amount)
        .await
        .map_err(port_error_response)?;
    info!("Created custom credit checkout for {}p", amount.pence());
    Ok(Json(checkout.into()))
}

#[utoipa::path(
    get,
    path = "/credits/history",
    responses((status = 200, description = "Credit transactions", body = [TransactionResponse]))
)]
pub async fn credit_history_handler(
    State(app_state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<TransactionResponse>>> {
    let history = app_state.billing.credit_history().await.map_err(port_error_response)?;
    Ok(Json(history.into_iter().map(TransactionResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/credits/balance",
    responses((status = 200, description = "Current credit balance", body = BalanceResponse))
)]
pub async fn credit_balance_handler(State(app_state): State<Arc<AppState>>) -> ApiResult<Json<BalanceResponse>> {
    let balance = app_state.billing.credit_balance().await.map_err(port_error_response)?;
    Ok(Json(BalanceResponse { credits: balance.credits }))
}
