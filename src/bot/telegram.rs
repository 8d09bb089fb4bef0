use std::sync::Arc;

use log::info;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};
use tokio::sync::mpsc;

use crate::bot::{respond, Action, Keyboard, NEW_QUESTION_BUTTON, SURRENDER_BUTTON};
use crate::logging::LogSink;
use crate::quiz::QuizEngine;
use crate::store::UserIdentity;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const CHANNEL: &str = "telegram";

pub fn user_identity(chat_id: ChatId) -> UserIdentity {
    UserIdentity::new(CHANNEL, chat_id.0)
}

fn quiz_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(NEW_QUESTION_BUTTON),
        KeyboardButton::new(SURRENDER_BUTTON),
    ]])
}

pub async fn run(bot: Bot, engine: Arc<QuizEngine>) {
    info!(
        "Telegram quiz bot has started with {} questions",
        engine.corpus().len()
    );

    Dispatcher::builder(bot, Update::filter_message().endpoint(handle_message))
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(bot: Bot, engine: Arc<QuizEngine>, msg: Message) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Пожалуйста, отвечай текстом")
            .await?;
        return Ok(());
    };

    let user = user_identity(msg.chat.id);
    let reply = respond(&engine, &user, Action::classify(text)).await;

    let request = bot.send_message(msg.chat.id, reply.text);
    match reply.keyboard {
        Keyboard::Show => request.reply_markup(quiz_keyboard()).await?,
        Keyboard::Remove => request.reply_markup(KeyboardRemove::new()).await?,
        Keyboard::Keep => request.await?,
    };
    Ok(())
}

/// Posts log lines to a Telegram chat. Lines are queued and sent from a
/// background task, in order.
pub struct TelegramLogSink {
    lines: mpsc::UnboundedSender<String>,
}

impl TelegramLogSink {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(bot: Bot, chat_id: ChatId) -> Self {
        let (lines, mut queue) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = queue.recv().await {
                // Logging the failure would queue another line for this chat.
                if let Err(err) = bot.send_message(chat_id, line).await {
                    eprintln!("Failed to forward a log line to Telegram: {err}");
                }
            }
        });
        Self { lines }
    }
}

impl LogSink for TelegramLogSink {
    fn emit(&self, line: &str) {
        let _ = self.lines.send(line.to_string());
    }
}
