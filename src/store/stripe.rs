//! Stripe-backed customer store. Licenses live as metadata on Stripe
//! customer objects, keyed by the purchaser's email.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CustomerRecord, CustomerStore, MetadataMap};
use crate::error::{AppError, Result};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    email: Option<String>,
    #[serde(default)]
    metadata: MetadataMap,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerList {
    data: Vec<StripeCustomer>,
}

impl StripeCustomer {
    fn into_record(self) -> CustomerRecord {
        CustomerRecord {
            id: self.id,
            email: self.email.unwrap_or_default(),
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StripeCustomerStore {
    client: Client,
    secret_key: String,
}

impl StripeCustomerStore {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AppError::Internal(format!(
                "Stripe API error: {} - {}",
                status, body
            )))
        }
    }

    fn metadata_form(metadata: &MetadataMap) -> Vec<(String, String)> {
        metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
            .collect()
    }
}

#[async_trait]
impl CustomerStore for StripeCustomerStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerRecord>> {
        let response = self
            .client
            .get(format!("{}/customers", STRIPE_API_URL))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        let list: StripeCustomerList = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(list.data.into_iter().next().map(StripeCustomer::into_record))
    }

    async fn create(&self, email: &str, metadata: MetadataMap) -> Result<CustomerRecord> {
        let mut form = vec![("email".to_string(), email.to_string())];
        form.extend(Self::metadata_form(&metadata));

        let response = self
            .client
            .post(format!("{}/customers", STRIPE_API_URL))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        let customer: StripeCustomer = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(customer.into_record())
    }

    async fn update(&self, id: &str, metadata: MetadataMap) -> Result<CustomerRecord> {
        let form = Self::metadata_form(&metadata);

        let response = self
            .client
            .post(format!("{}/customers/{}", STRIPE_API_URL, id))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        let customer: StripeCustomer = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(customer.into_record())
    }
}
