use std::time::Duration;

use serde_json::Value;

use crate::auth::constant_time_eq;
use crate::currency::Currency;
use crate::error::{GatewayError, Result};
use crate::pricing::PricingTable;
use crate::rates::RateOracle;
use crate::router::{ProviderKind, ProviderRegistry};
use crate::secrets::SecretCache;
use crate::store::LedgerStore;
use crate::translation;

/// Completions are refused outright below this USD balance; the check is
/// advisory and only spares upstream quota. The in-transaction check is the
/// one that cannot be raced.
pub const MIN_BALANCE_MICROS: u64 = 1_000;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);
const UPSTREAM_ERROR_PREVIEW_CHARS: usize = 200;

/// Outcome of a metered completion.
#[derive(Clone, Debug)]
pub struct Completed {
    pub body: Value,
    pub cost_usd_micros: u64,
    pub balance_after: u64,
    pub provider: ProviderKind,
}

#[derive(Clone, Debug)]
pub struct Converted {
    pub from: Currency,
    pub to: Currency,
    pub from_amount: u64,
    pub to_amount: u64,
    pub from_balance: u64,
    pub to_balance: u64,
}

pub struct Gateway {
    store: LedgerStore,
    registry: ProviderRegistry,
    pricing: PricingTable,
    secrets: SecretCache,
    rates: RateOracle,
    http: reqwest::Client,
    admin_key: String,
}

impl Gateway {
    pub fn new(
        store: LedgerStore,
        registry: ProviderRegistry,
        pricing: PricingTable,
        secrets: SecretCache,
        rates: RateOracle,
        admin_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            pricing,
            secrets,
            rates,
            http: reqwest::Client::new(),
            admin_key: admin_key.into(),
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Forwards one completion to its provider and debits the actual cost.
    ///
    /// The upstream call happens before the debit; if the debit aborts after
    /// a successful upstream response the caller is not charged and the
    /// upstream spend is the operator's loss. A 2xx is only returned once
    /// the debit has committed.
    pub async fn complete(&self, uid: &str, body: Value) -> Result<Completed> {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| GatewayError::Validation("model is required".to_string()))?
            .to_string();
        let provider = self.registry.route(&model);

        if provider == ProviderKind::Anthropic
            && body.get("tools").is_some_and(|tools| !tools.is_null())
        {
            return Err(GatewayError::Validation(
                "tool use is not supported for this model".to_string(),
            ));
        }

        let account = self.store.get_account(uid).await?;
        if account.balance(Currency::USD) < MIN_BALANCE_MICROS {
            return Err(GatewayError::InsufficientFunds(
                "Insufficient USD balance".to_string(),
            ));
        }

        let endpoint = self.registry.endpoint(provider);
        let api_key = self.secrets.get(&endpoint.secret_name).await?;

        let upstream_body = if endpoint.needs_translation {
            translation::anthropic_request_from_chat(&body)?
        } else {
            body.clone()
        };

        tracing::info!(provider = %provider, model = %model, "dispatching completion");
        let response = endpoint
            .apply_auth(self.http.post(&endpoint.base_url), &api_key)
            .timeout(UPSTREAM_TIMEOUT)
            .json(&upstream_body)
            .send()
            .await
            .map_err(|err| GatewayError::UpstreamUnreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: axum::http::StatusCode::from_u16(status.as_u16())
                    .unwrap_or(axum::http::StatusCode::BAD_GATEWAY),
                detail: redact_upstream_error(&text),
            });
        }

        let upstream: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::UpstreamUnreachable(err.to_string()))?;
        let canonical = if endpoint.needs_translation {
            translation::chat_response_from_anthropic(&upstream, &model)
        } else {
            upstream
        };

        // Billing keys off the model the provider reports, not the one the
        // client asked for. A provider that aliases or upgrades a cheap slug
        // bills at the served model's rate.
        let billed_model = canonical
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&model)
            .to_string();
        let prompt_tokens = canonical
            .pointer("/usage/prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let completion_tokens = canonical
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let cost = self
            .pricing
            .cost_usd_micros(&billed_model, prompt_tokens, completion_tokens);

        let metadata = serde_json::json!({
            "provider": provider.as_str(),
            "model": billed_model,
            "promptTokens": prompt_tokens,
            "completionTokens": completion_tokens,
        });
        let balance_after = self
            .store
            .debit_usage(uid, cost, "LLM usage", metadata)
            .await?;

        tracing::info!(
            provider = %provider,
            cost_usd_micros = cost,
            balance_after = balance_after,
            "completion settled"
        );
        Ok(Completed {
            body: canonical,
            cost_usd_micros: cost,
            balance_after,
            provider,
        })
    }

    pub async fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        currency: Currency,
        amount: u64,
        description: &str,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(GatewayError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if recipient == sender {
            return Err(GatewayError::Validation(
                "cannot transfer to your own account".to_string(),
            ));
        }
        let balance = self
            .store
            .transfer(sender, recipient, currency, amount, description)
            .await?;
        Ok(balance)
    }

    /// Oracle-priced conversion. The quote is taken before the store
    /// transaction so no write lock spans a network call, then frozen for
    /// this request.
    pub async fn convert(
        &self,
        uid: &str,
        from: Currency,
        to: Currency,
        amount: u64,
    ) -> Result<Converted> {
        if from == to {
            return Err(GatewayError::Validation(
                "from and to must differ".to_string(),
            ));
        }
        if amount == 0 {
            return Err(GatewayError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let snapshot = self.rates.snapshot().await?;
        let from_cents = snapshot
            .price_cents(from)
            .ok_or_else(|| GatewayError::Internal(format!("no rate for {from}")))?;
        let to_cents = snapshot
            .price_cents(to)
            .ok_or_else(|| GatewayError::Internal(format!("no rate for {to}")))?;

        let converted = convert_amount(amount, from, to, from_cents, to_cents);
        if converted == 0 {
            return Err(GatewayError::Validation(
                "amount too small to convert".to_string(),
            ));
        }

        let (from_balance, to_balance) = self
            .store
            .convert(uid, from, to, amount, converted, snapshot.ratio(from, to))
            .await?;
        Ok(Converted {
            from,
            to,
            from_amount: amount,
            to_amount: converted,
            from_balance,
            to_balance,
        })
    }

    /// Constant-time admin key gate. Callers must pass this before any
    /// other part of an admin request is looked at.
    pub fn check_admin_key(&self, provided: &str) -> Result<()> {
        if constant_time_eq(provided, &self.admin_key) {
            Ok(())
        } else {
            Err(GatewayError::ForbiddenAdmin)
        }
    }

    /// Admin-gated credit. The key comparison is constant-time; everything
    /// else waits until the caller has proven they hold the key.
    pub async fn deposit(
        &self,
        provided_admin_key: &str,
        account_id: &str,
        currency: Currency,
        amount: u64,
    ) -> Result<u64> {
        self.check_admin_key(provided_admin_key)?;
        if amount == 0 {
            return Err(GatewayError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        let balance = self
            .store
            .deposit(account_id, currency, amount, "Admin deposit")
            .await?;
        Ok(balance)
    }
}

/// Integer cross-currency conversion. Prices are in whole USD cents; the
/// triple product runs in i128 so no realistic amount can overflow.
pub fn convert_amount(
    amount: u64,
    from: Currency,
    to: Currency,
    from_cents: u64,
    to_cents: u64,
) -> u64 {
    if from_cents == 0 || to_cents == 0 {
        return 0;
    }
    let numer =
        i128::from(amount) * i128::from(from_cents) * i128::from(to.unit_factor());
    let denom = i128::from(from.unit_factor()) * i128::from(to_cents);
    (numer / denom).clamp(0, i128::from(u64::MAX)) as u64
}

fn redact_upstream_error(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.pointer("/error"))
                .and_then(Value::as_str)
                .map(|message| message.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        return "upstream provider returned an error".to_string();
    }
    detail.chars().take(UPSTREAM_ERROR_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_to_eth_carries_unit_scale() {
        // $3.00 at $3000/ETH is 0.001 ETH.
        let out = convert_amount(3_000_000, Currency::USD, Currency::ETH, 100, 300_000);
        assert_eq!(out, 1_000_000);
    }

    #[test]
    fn eth_to_usd_round_trips_scale() {
        let out = convert_amount(1_000_000, Currency::ETH, Currency::USD, 300_000, 100);
        assert_eq!(out, 3_000_000);
    }

    #[test]
    fn identical_rates_and_units_are_identity() {
        let out = convert_amount(123_456, Currency::USD, Currency::USDC, 100, 100);
        assert_eq!(out, 123_456);
    }

    #[test]
    fn dust_amounts_truncate_to_zero() {
        // One USD micro is far below one satoshi at any plausible BTC price.
        let out = convert_amount(1, Currency::USD, Currency::BTC, 100, 9_700_000);
        assert_eq!(out, 0);
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        // A billion BTC in satoshis against a USD quote exercises the
        // widest intermediate product.
        let out = convert_amount(
            100_000_000 * 1_000_000_000,
            Currency::BTC,
            Currency::USD,
            9_700_000,
            100,
        );
        assert!(out > 0);
    }

    #[test]
    fn upstream_error_redaction_prefers_error_message() {
        let detail = redact_upstream_error(
            r#"{"error":{"message":"model overloaded","type":"server_error","param":null}}"#,
        );
        assert_eq!(detail, "model overloaded");

        let detail = redact_upstream_error("plain text failure");
        assert_eq!(detail, "plain text failure");

        let long = "x".repeat(500);
        assert_eq!(redact_upstream_error(&long).chars().count(), 200);

        assert_eq!(
            redact_upstream_error(""),
            "upstream provider returned an error"
        );
    }
}
