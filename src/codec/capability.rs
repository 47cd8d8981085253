use std::sync::Arc;

use tracing::info;

use crate::codec::cipher::{Cipher, CipherPayload};
use crate::db::{ConsumedLedger, IgnoreStore};
use crate::error::{AppError, Result};

/// Issues capability tokens for outbound notifications and redeems them when a
/// recipient follows a link. Ignore/unignore tokens are single use; thumbnail
/// tokens may be redeemed any number of times.
pub struct CapabilityGate {
    cipher: Arc<Cipher>,
    ledger: Arc<dyn ConsumedLedger>,
    ignore: Arc<dyn IgnoreStore>,
}

impl CapabilityGate {
    pub fn new(
        cipher: Arc<Cipher>,
        ledger: Arc<dyn ConsumedLedger>,
        ignore: Arc<dyn IgnoreStore>,
    ) -> Self {
        Self { cipher, ledger, ignore }
    }

    pub fn issue_ignore(&self, owner: &str, item_id: &str) -> Result<CipherPayload> {
        self.cipher.encode(&format!("{owner} {item_id}"))
    }

    pub fn issue_thumbnail(&self, image_url: &str) -> Result<CipherPayload> {
        self.cipher.encode(image_url)
    }

    /// Fails with `MessageConsumed` once the message has been spent.
    pub async fn check_if_consumed(&self, message: &str) -> Result<()> {
        if self.ledger.is_consumed(message).await? {
            return Err(AppError::MessageConsumed);
        }
        Ok(())
    }

    /// Idempotent. Returns whether this call was the one that spent the message.
    pub async fn mark_consumed(&self, message: &str) -> Result<bool> {
        self.ledger.mark_consumed(message).await
    }

    /// Redeem an ignore token. Returns `(owner, item_id)`.
    pub async fn ignore(&self, payload: &CipherPayload) -> Result<(String, String)> {
        let (owner, item_id) = self.redeem(payload).await?;
        self.ignore.add(&owner, &item_id).await?;
        info!(owner = %owner, item_id = %item_id, "Item ignored");
        Ok((owner, item_id))
    }

    /// Redeem an unignore token. Returns `(owner, item_id)`.
    pub async fn unignore(&self, payload: &CipherPayload) -> Result<(String, String)> {
        let (owner, item_id) = self.redeem(payload).await?;
        self.ignore.remove(&owner, &item_id).await?;
        info!(owner = %owner, item_id = %item_id, "Item unignored");
        Ok((owner, item_id))
    }

    /// Decode a thumbnail token into an absolute http(s) URL. Not consumed.
    pub fn thumbnail_url(&self, payload: &CipherPayload) -> Result<reqwest::Url> {
        let raw = self.cipher.decode(payload)?;
        let url = reqwest::Url::parse(&raw).map_err(|_| AppError::MessageCorrupted)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(AppError::MessageCorrupted),
        }
    }

    async fn redeem(&self, payload: &CipherPayload) -> Result<(String, String)> {
        let message = &payload.data.message;
        self.check_if_consumed(message).await?;
        let plaintext = self.cipher.decode(payload)?;
        let instruction = parse_instruction(&plaintext)?;
        // Two concurrent redemptions can both pass the check above; only one claims.
        if !self.mark_consumed(message).await? {
            return Err(AppError::MessageConsumed);
        }
        Ok(instruction)
    }
}

/// Split `"<owner> <item_id>"` on the first space.
fn parse_instruction(plaintext: &str) -> Result<(String, String)> {
    let (owner, item_id) = plaintext.split_once(' ').ok_or(AppError::MessageCorrupted)?;
    let (owner, item_id) = (owner.trim(), item_id.trim());
    if owner.is_empty() || item_id.is_empty() {
        return Err(AppError::MessageCorrupted);
    }
    Ok((owner.to_string(), item_id.to_string()))
}
