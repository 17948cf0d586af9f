//! services/companion/src/adapters/billing.rs
//!
//! The REST adapter for subscriptions and credits. It implements the `BillingService`
//! port from the `core` crate. Checkout only yields a URL; redirecting the user is the
//! UI's job.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use video_learning_core::{
    credits::CustomCreditAmount,
    domain::{CheckoutSession, CreditBalance, CreditPackage, CreditTransaction, SubscriptionPlan},
    ports::{BillingService, PortResult},
};

#[derive(Clone)]
pub struct RestBillingAdapter {
    client: BackendClient,
}

impl RestBillingAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct PlanRecord {
    id: String,
    name: String,
    /// Pence.
    price: u64,
    #[serde(default)]
    monthly_credits: u32,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Deserialize)]
struct PackageRecord {
    id: String,
    credits: u32,
    /// Pence.
    price: u64,
}

#[derive(Deserialize)]
struct TransactionRecord {
    id: String,
    amount: i64,
    #[serde(default)]
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct BalanceRecord {
    #[serde(alias = "balance")]
    credits: i64,
}

#[derive(Deserialize)]
struct CheckoutRecord {
    #[serde(alias = "url")]
    checkout_url: String,
}

impl CheckoutRecord {
    fn to_domain(self) -> CheckoutSession {
        CheckoutSession { url: self.checkout_url }
    }
}

#[derive(Serialize)]
struct PlanCheckoutRequest<'a> {
    plan_id: &'a str,
}

#[derive(Serialize)]
struct PackagePurchaseRequest<'a> {
    package_id: &'a str,
}

#[derive(Serialize)]
struct CustomPurchaseRequest {
    amount_pence: u64,
}

//=========================================================================================
// `BillingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl BillingService for RestBillingAdapter {
    async fn list_plans(&self) -> PortResult<Vec<SubscriptionPlan>> {
        let records: Vec<PlanRecord> = self.client.get_json("/api/subscriptions/plans").await?;
        Ok(records
            .into_iter()
            .map(|r| SubscriptionPlan {
                id: r.id,
                name: r.name,
                price_pence: r.price,
                monthly_credits: r.monthly_credits,
                features: r.features,
            })
            .collect())
    }

    async fn create_subscription_checkout(&self, plan_id: &str) -> PortResult<CheckoutSession> {
        let record: CheckoutRecord = self
            .client
            .post_json("/api/subscriptions/checkout", &PlanCheckoutRequest { plan_id })
            .await?;
        Ok(record.to_domain())
    }

    async fn list_credit_packages(&self) -> PortResult<Vec<CreditPackage>> {
        let records: Vec<PackageRecord> = self.client.get_json("/api/credits/packages").await?;
        Ok(records
            .into_iter()
            .map(|r| CreditPackage {
                id: r.id,
                credits: r.credits,
                price_pence: r.price,
            })
            .collect())
    }

    async fn purchase_package(&self, package_id: &str) -> PortResult<CheckoutSession> {
        let record: CheckoutRecord = self
            .client
            .post_json("/api/credits/purchase", &PackagePurchaseRequest { package_id })
            .await?;
        Ok(record.to_domain())
    }

    async fn purchase_custom_amount(&self, amount: CustomCreditAmount) -> PortResult<CheckoutSession> {
        let record: CheckoutRecord = self
            .client
            .post_json(
                "/api/credits/purchase-custom",
                &CustomPurchaseRequest { amount_pence: amount.pence() },
            )
            .await?;
        Ok(record.to_domain())
    }

    async fn credit_history(&self) -> PortResult<Vec<CreditTransaction>> {
        let records: Vec<TransactionRecord> = self.client.get_json("/api/credits/history").await?;
        Ok(records
            .into_iter()
            .map(|r| CreditTransaction {
                id: r.id,
                amount: r.amount,
                description: r.description,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn credit_balance(&self) -> PortResult<CreditBalance> {
        let record: BalanceRecord = self.client.get_json("/api/credits/balance").await?;
        Ok(CreditBalance { credits: record.credits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_record_aliases() {
        let a: CheckoutRecord = serde_json::from_str(r#"{"checkout_url": "https://pay.example.com/s/1"}"#).unwrap();
        let b: CheckoutRecord = serde_json::from_str(r#"{"url": "https://pay.example.com/s/2"}"#).unwrap();
        assert_eq!(a.to_domain().url, "https://pay.example.com/s/1");
        assert_eq!(b.to_domain().url, "https://pay.example.com/s/2");
    }

    #[test]
    fn test_custom_purchase_sends_pence() {
        let amount = CustomCreditAmount::new(50.0).unwrap();
        let body = serde_json::to_value(CustomPurchaseRequest { amount_pence: amount.pence() }).unwrap();
        assert_eq!(body["amount_pence"], 5000);
    }
}
