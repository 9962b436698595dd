use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{
        AccountLink,
        Address,
        Balance,
        Charge,
        List,
        NewPaymentIntent,
        PaymentIntent,
        Payout,
        StripeAccount,
        TerminalLocation,
        TerminalReader,
    },
    error::ErrorEnvelope,
    StripeApiError,
};

pub type FormParams = Vec<(String, String)>;

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        if config.secret_key.is_set() {
            let val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
                .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
            headers.insert("Authorization", val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    /// Sends a request to the Stripe API. `GET` and `DELETE` requests send `params` in the query string; all other
    /// methods send them as a form-encoded body. If `account` is supplied, the call is made on behalf of that
    /// connected account.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        account: Option<&str>,
    ) -> Result<T, StripeApiError> {
        if !self.config.secret_key.is_set() {
            return Err(StripeApiError::NotConfigured);
        }
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let is_query = method == Method::GET || method == Method::DELETE;
        let mut req = self.client.request(method, url);
        if let Some(account) = account {
            req = req.header("Stripe-Account", account);
        }
        if !params.is_empty() {
            req = if is_query { req.query(params) } else { req.form(params) };
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("REST query successful. {status}");
            return response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()));
        }
        let body = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        let message = serde_json::from_str::<ErrorEnvelope>(&body).map(|e| e.error.describe()).unwrap_or(body);
        if status == StatusCode::NOT_FOUND {
            Err(StripeApiError::NotFound(message))
        } else {
            Err(StripeApiError::QueryError { status: status.as_u16(), message })
        }
    }

    //----------------------------------------------   Connect  -------------------------------------------------------

    /// Creates an Express connected account that can take card payments and receive transfers.
    pub async fn create_express_account(
        &self,
        shop_id: &str,
        business_name: Option<&str>,
    ) -> Result<StripeAccount, StripeApiError> {
        let mut params = form(&[
            ("type", "express"),
            ("capabilities[card_payments][requested]", "true"),
            ("capabilities[transfers][requested]", "true"),
            ("metadata[shopId]", shop_id),
        ]);
        if let Some(name) = business_name {
            params.push(("business_profile[name]".into(), name.into()));
        }
        debug!("Creating connected account for shop {shop_id}");
        let account = self.rest_query::<StripeAccount>(Method::POST, "/accounts", &params, None).await?;
        info!("Created connected account {} for shop {shop_id}", account.id);
        Ok(account)
    }

    pub async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, StripeApiError> {
        let params = form(&[
            ("account", account_id),
            ("refresh_url", refresh_url),
            ("return_url", return_url),
            ("type", "account_onboarding"),
        ]);
        self.rest_query(Method::POST, "/account_links", &params, None).await
    }

    pub async fn retrieve_balance(&self, account_id: &str) -> Result<Balance, StripeApiError> {
        self.rest_query(Method::GET, "/balance", &[], Some(account_id)).await
    }

    pub async fn list_charges(&self, account_id: &str, limit: u32) -> Result<List<Charge>, StripeApiError> {
        let params = form(&[("limit", &limit.to_string())]);
        self.rest_query(Method::GET, "/charges", &params, Some(account_id)).await
    }

    pub async fn list_payouts(&self, account_id: &str, limit: u32) -> Result<List<Payout>, StripeApiError> {
        let params = form(&[("limit", &limit.to_string())]);
        self.rest_query(Method::GET, "/payouts", &params, Some(account_id)).await
    }

    pub async fn create_payout(
        &self,
        account_id: &str,
        amount: payment_common::Cents,
        currency: &str,
    ) -> Result<Payout, StripeApiError> {
        let params = form(&[("amount", &amount.value().to_string()), ("currency", &currency.to_lowercase())]);
        debug!("Requesting payout of {amount} for {account_id}");
        self.rest_query(Method::POST, "/payouts", &params, Some(account_id)).await
    }

    /// Sets the payout schedule interval (`daily`, `weekly`, `monthly` or `manual`) on a connected account.
    pub async fn update_payout_schedule(
        &self,
        account_id: &str,
        interval: &str,
    ) -> Result<StripeAccount, StripeApiError> {
        let params = form(&[("settings[payouts][schedule][interval]", interval)]);
        let path = format!("/accounts/{account_id}");
        self.rest_query(Method::POST, &path, &params, None).await
    }

    //----------------------------------------------   Terminal  ------------------------------------------------------

    pub async fn create_location(
        &self,
        display_name: &str,
        address: &Address,
    ) -> Result<TerminalLocation, StripeApiError> {
        let params = form(&[
            ("display_name", display_name),
            ("address[line1]", &address.line1),
            ("address[city]", &address.city),
            ("address[state]", &address.state),
            ("address[postal_code]", &address.postal_code),
            ("address[country]", &address.country),
        ]);
        self.rest_query(Method::POST, "/terminal/locations", &params, None).await
    }

    pub async fn list_readers(&self, limit: u32) -> Result<List<TerminalReader>, StripeApiError> {
        let params = form(&[("limit", &limit.to_string())]);
        self.rest_query(Method::GET, "/terminal/readers", &params, None).await
    }

    /// Fetches a reader. Readers that do not exist, or that have been deleted, are reported as `None`.
    pub async fn retrieve_reader(&self, reader_id: &str) -> Result<Option<TerminalReader>, StripeApiError> {
        let path = format!("/terminal/readers/{reader_id}");
        match self.rest_query::<TerminalReader>(Method::GET, &path, &[], None).await {
            Ok(reader) if reader.deleted => Ok(None),
            Ok(reader) => Ok(Some(reader)),
            Err(StripeApiError::NotFound(msg)) => {
                debug!("Reader {reader_id} not found. {msg}");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Labels a reader and records the location and shop it now serves in its metadata.
    pub async fn update_reader(
        &self,
        reader_id: &str,
        label: &str,
        metadata: &[(&str, &str)],
    ) -> Result<TerminalReader, StripeApiError> {
        let mut params = form(&[("label", label)]);
        params.extend(metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.to_string())));
        let path = format!("/terminal/readers/{reader_id}");
        self.rest_query(Method::POST, &path, &params, None).await
    }

    pub async fn process_payment_intent(
        &self,
        reader_id: &str,
        intent_id: &str,
    ) -> Result<TerminalReader, StripeApiError> {
        let params = form(&[("payment_intent", intent_id)]);
        let path = format!("/terminal/readers/{reader_id}/process_payment_intent");
        debug!("Handing payment intent {intent_id} to reader {reader_id}");
        self.rest_query(Method::POST, &path, &params, None).await
    }

    //----------------------------------------------  Payment intents  ------------------------------------------------

    pub async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, StripeApiError> {
        let params = intent.form_params();
        let result = self.rest_query::<PaymentIntent>(Method::POST, "/payment_intents", &params, None).await?;
        info!("Created payment intent {} for {}", result.id, result.amount);
        Ok(result)
    }

    pub async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{intent_id}/cancel");
        self.rest_query(Method::POST, &path, &[], None).await
    }
}

fn form(pairs: &[(&str, &str)]) -> FormParams {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
