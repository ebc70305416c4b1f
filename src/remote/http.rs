use super::{CartApi, GENERIC_FAILURE, RemoteCartItem, RemoteCartSnapshot, context};
use crate::config::StorefrontConfig;
use crate::core::{BillingCycle, Result, StorefrontError};
use crate::session::RequestIdentity;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SESSION_HEADER: &str = "X-Session-ID";

// ============================================================================
// Wire bodies
// ============================================================================

#[derive(Debug, Deserialize)]
struct CartEnvelope {
    cart: Option<WireCart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCart {
    #[serde(default)]
    items: Option<Vec<RemoteCartItem>>,
    #[serde(default)]
    billing_cycle: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillingCycleBody {
    billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddPlanBody<'a> {
    plan_id: &'a str,
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddAddonBody<'a> {
    addon_id: &'a str,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct QuantityBody {
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    address_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// `CartApi` over HTTP
#[derive(Debug, Clone)]
pub struct HttpCartApi {
    client: Client,
    base_url: Url,
}

impl HttpCartApi {
    pub fn new(config: &StorefrontConfig) -> Result<Self> {
        Self::build(&config.api_base_url, config.request_timeout, &config.user_agent)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, timeout, concat!("storefront_cart/", env!("CARGO_PKG_VERSION")))
    }

    fn build(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| StorefrontError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StorefrontError::Config(format!(
                "API base URL '{}' cannot be used as a base",
                base_url
            )));
        }
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| StorefrontError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StorefrontError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    fn item_url(&self, item_id: &str) -> Result<Url> {
        let mut url = self.endpoint("api/cart/item")?;
        url.path_segments_mut()
            .map_err(|_| StorefrontError::Config("API base URL cannot hold item paths".to_string()))?
            .push(item_id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, identity: &RequestIdentity) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(SESSION_HEADER, identity.session_id());
        match identity.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &'static str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StorefrontError::Timeout { context }
            } else {
                StorefrontError::remote(context, e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .filter(|message| !message.trim().is_empty());
        let message = detail
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());

        debug!("{} -> {}: {}", context, status, message);
        Err(StorefrontError::remote(context, message))
    }

    async fn send_unit(&self, builder: RequestBuilder, context: &'static str) -> Result<()> {
        self.send(builder, context).await.map(|_| ())
    }
}

#[async_trait]
impl CartApi for HttpCartApi {
    async fn fetch_cart(&self, identity: &RequestIdentity) -> Result<RemoteCartSnapshot> {
        let url = self.endpoint("api/cart")?;
        let response = self
            .send(self.request(Method::GET, url, identity), context::FETCH_CART)
            .await?;

        let envelope: CartEnvelope = response
            .json()
            .await
            .map_err(|e| StorefrontError::remote(context::FETCH_CART, format!("invalid response: {}", e)))?;

        let cart = envelope.cart.unwrap_or(WireCart {
            items: None,
            billing_cycle: None,
        });
        Ok(RemoteCartSnapshot {
            items: cart.items.unwrap_or_default(),
            billing_cycle: cart.billing_cycle.and_then(|raw| raw.parse().ok()),
        })
    }

    async fn set_billing_cycle(
        &self,
        identity: &RequestIdentity,
        cycle: BillingCycle,
    ) -> Result<()> {
        let url = self.endpoint("api/cart/billing-cycle")?;
        let builder = self
            .request(Method::POST, url, identity)
            .json(&BillingCycleBody { billing_cycle: cycle });
        self.send_unit(builder, context::SET_BILLING_CYCLE).await
    }

    async fn add_plan(&self, identity: &RequestIdentity, plan_id: &str, quantity: u32) -> Result<()> {
        let url = self.endpoint("api/cart/plan")?;
        let builder = self
            .request(Method::POST, url, identity)
            .json(&AddPlanBody { plan_id, quantity });
        self.send_unit(builder, context::ADD_PLAN).await
    }

    async fn add_addon(
        &self,
        identity: &RequestIdentity,
        addon_id: &str,
        quantity: u32,
    ) -> Result<()> {
        let url = self.endpoint("api/cart/addon")?;
        let builder = self
            .request(Method::POST, url, identity)
            .json(&AddAddonBody { addon_id, quantity });
        self.send_unit(builder, context::ADD_ADDON).await
    }

    async fn update_quantity(
        &self,
        identity: &RequestIdentity,
        item_id: &str,
        quantity: u32,
    ) -> Result<()> {
        let url = self.item_url(item_id)?;
        let builder = self
            .request(Method::PUT, url, identity)
            .json(&QuantityBody { quantity });
        self.send_unit(builder, context::UPDATE_QUANTITY).await
    }

    async fn remove_item(&self, identity: &RequestIdentity, item_id: &str) -> Result<()> {
        let url = self.item_url(item_id)?;
        self.send_unit(self.request(Method::DELETE, url, identity), context::REMOVE_ITEM)
            .await
    }

    async fn checkout(
        &self,
        identity: &RequestIdentity,
        address_id: Option<&str>,
    ) -> Result<String> {
        let url = self.endpoint("api/checkout")?;
        let builder = self
            .request(Method::POST, url, identity)
            .json(&CheckoutBody { address_id });
        let response = self.send(builder, context::CHECKOUT).await?;

        let body: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| StorefrontError::remote(context::CHECKOUT, format!("invalid response: {}", e)))?;

        body.url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StorefrontError::remote(context::CHECKOUT, "missing redirect URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let api = HttpCartApi::with_base_url("http://localhost:8080/shop", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            api.endpoint("api/cart").unwrap().as_str(),
            "http://localhost:8080/shop/api/cart"
        );
    }

    #[test]
    fn test_item_url_is_percent_encoded() {
        let api =
            HttpCartApi::with_base_url("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.item_url("de domain/x").unwrap().as_str(),
            "http://localhost:8080/api/cart/item/de%20domain%2Fx"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = HttpCartApi::with_base_url("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(StorefrontError::Config(_))));
    }

    #[test]
    fn test_checkout_body_omits_missing_address() {
        let body = serde_json::to_value(CheckoutBody { address_id: None }).unwrap();
        assert_eq!(body, serde_json::json!({}));
        let body = serde_json::to_value(CheckoutBody { address_id: Some("addr-1") }).unwrap();
        assert_eq!(body, serde_json::json!({ "addressId": "addr-1" }));
    }
}
