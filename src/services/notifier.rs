// src/services/notifier.rs

//! Notification service.
//!
//! Delivers one message per new listing, with a button opening the listing.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::{ListingRecord, NotifierConfig};

const MESSAGE_HEADLINE: &str = "New listing found!";

/// Delivery channel for new listing announcements.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce one listing. Errors are `AppError::Delivery`.
    async fn notify(&self, record: &ListingRecord) -> Result<()>;
}

/// Message text for a listing, at most `max_chars` characters long.
pub fn format_message(record: &ListingRecord, max_chars: usize) -> String {
    let text = format!("{MESSAGE_HEADLINE}\n\n{record}");
    truncate_chars(&text, max_chars)
}

/// Cut `text` to `max_chars` chars, ellipsis included, on a grapheme boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    // Room for the ellipsis.
    let budget = max_chars - 1;
    let mut used = 0;
    let mut cut = 0;
    for (idx, grapheme) in text.grapheme_indices(true) {
        let len = grapheme.chars().count();
        if used + len > budget {
            break;
        }
        used += len;
        cut = idx + grapheme.len();
    }
    format!("{}…", &text[..cut])
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    reply_markup: InlineKeyboard<'a>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
    button_text: String,
    max_chars: usize,
}

impl TelegramNotifier {
    /// Create a notifier; fails when the token or chat id is missing.
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| AppError::config("notifier.bot_token is not set"))?;
        let chat_id = config
            .chat_id
            .clone()
            .ok_or_else(|| AppError::config("notifier.chat_id is not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id,
            button_text: config.button_text.clone(),
            max_chars: config.max_message_chars,
        })
    }

    fn payload<'a>(&'a self, record: &'a ListingRecord) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text: format_message(record, self.max_chars),
            reply_markup: InlineKeyboard {
                inline_keyboard: vec![vec![InlineButton {
                    text: &self.button_text,
                    url: &record.link,
                }]],
            },
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, record: &ListingRecord) -> Result<()> {
        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(record))
            .send()
            .await
            .map_err(|e| AppError::delivery(&record.link, e.without_url()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::delivery(&record.link, e.without_url()))?;

        if !status.is_success() || !body.ok {
            return Err(AppError::delivery(
                &record.link,
                format!(
                    "{} ({})",
                    body.description.as_deref().unwrap_or("rejected"),
                    status
                ),
            ));
        }

        log::debug!("Notification sent for {}", record.link);
        Ok(())
    }
}

/// Notifier that only logs, for dry runs and missing credentials.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    max_chars: usize,
}

impl LogNotifier {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, record: &ListingRecord) -> Result<()> {
        log::info!(
            "[dry-run] {}\n[{}]",
            format_message(record, self.max_chars.max(1)),
            record.link
        );
        Ok(())
    }
}
