//! The role-change webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::membership::ActionResult;
use crate::relay::Relay;

/// Fields the webhook reads from the request body.
///
/// Extraction is lenient: wrong-typed fields read as absent, so a bad
/// secret is always reported as such whatever else the body contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookRequest {
    /// `"give"`, `"remove"` or absent.
    pub action: Option<String>,
    /// Target user id, from `discordId` or `memberId`.
    pub member_id: Option<String>,
    /// Free-text role label.
    pub role_type: Option<String>,
    /// Shared secret.
    pub secret: Option<String>,
    /// Opaque payment details, logged only.
    pub payment_info: Option<Value>,
}

impl WebhookRequest {
    /// Extract the webhook fields from a JSON body.
    pub fn from_value(body: &Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_owned);
        let id = |key: &str| match body.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Self {
            action: body
                .get("action")
                .filter(|v| !v.is_null())
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned)),
            member_id: id("discordId").or_else(|| id("memberId")),
            role_type: text("roleType"),
            secret: text("secret"),
            payment_info: body.get("paymentInfo").filter(|v| !v.is_null()).cloned(),
        }
    }
}

/// What the webhook was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Attach the role.
    Give,
    /// Detach the role.
    Remove,
}

impl Dispatch {
    /// Map the `action` field; absent or empty means give.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] for any other value.
    pub fn parse(action: Option<&str>) -> RelayResult<Self> {
        match action {
            None | Some("" | "give") => Ok(Self::Give),
            Some("remove") => Ok(Self::Remove),
            Some(_) => Err(RelayError::Validation("unknown action".to_owned())),
        }
    }
}

/// `POST` handler: authenticate, validate, dispatch.
pub async fn handle(
    State(relay): State<Arc<Relay>>,
    body: Bytes,
) -> RelayResult<Json<ActionResult>> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|_| RelayError::Validation("invalid JSON body".to_owned()))?;
    let request = WebhookRequest::from_value(&value);

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("webhook", %request_id);
    process(&relay, request).instrument(span).await.map(Json)
}

async fn process(relay: &Relay, request: WebhookRequest) -> RelayResult<ActionResult> {
    let action_label = request.action.as_deref().unwrap_or("give");
    info!(
        action = action_label,
        member_id = request.member_id.as_deref().unwrap_or(""),
        role_type = request.role_type.as_deref().unwrap_or(""),
        "webhook received"
    );

    if !relay.verify_secret(request.secret.as_deref()) {
        warn!("webhook rejected: secret mismatch");
        return Err(RelayError::Unauthorized);
    }

    let (Some(member_id), Some(role_type)) = (
        request.member_id.as_deref().filter(|s| !s.is_empty()),
        request.role_type.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(RelayError::Validation("required fields missing".to_owned()));
    };

    let dispatch = Dispatch::parse(request.action.as_deref())?;

    if let Some(payment) = &request.payment_info {
        debug!(payment_info = %payment, "payment details attached");
    }

    let result = match dispatch {
        Dispatch::Give => relay.membership().grant(member_id, role_type).await?,
        Dispatch::Remove => relay.membership().revoke(member_id, role_type).await?,
    };

    info!(
        action = action_label,
        member_id,
        success = result.success,
        "webhook handled"
    );
    Ok(result)
}
