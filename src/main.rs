use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use quiz_bot::bot::{telegram, vk};
use quiz_bot::config::Config;
use quiz_bot::logging::{self, LogSink};
use quiz_bot::quiz::{QuizCorpus, QuizEngine};
use quiz_bot::store::{KeyValueStore, MemoryStore, RedisStore, SessionStore};
use teloxide::prelude::*;

#[derive(Parser)]
#[command(name = "quiz-bot", version, about = "Trivia quiz bot for Telegram and VK")]
struct Cli {
    /// Quiz file made of "Вопрос N:" / "Ответ:" records
    #[arg(value_parser = quiz_file_path)]
    quiz_file: PathBuf,

    /// Keep sessions in process memory instead of Redis
    #[arg(long)]
    memory_store: bool,

    #[command(subcommand)]
    transport: Transport,
}

#[derive(Subcommand)]
enum Transport {
    /// Serve the quiz through a Telegram bot
    Telegram,
    /// Serve the quiz through a VK community
    Vk,
}

fn quiz_file_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        return Err(format!("'{value}' is a directory, not a file"));
    }
    if !path.is_file() {
        return Err(format!("'{value}' does not exist or cannot be accessed"));
    }
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine, the variables may come from the environment.
    dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let telegram_bot = config.telegram_token.as_deref().map(Bot::new);
    let mut sinks: Vec<Box<dyn LogSink>> = Vec::new();
    if let (Some(bot), Some(chat_id)) = (&telegram_bot, config.logger_chat_id) {
        sinks.push(Box::new(telegram::TelegramLogSink::spawn(
            bot.clone(),
            ChatId(chat_id),
        )));
    }
    logging::init(config.log_level, sinks).context("failed to install the logger")?;

    let corpus = QuizCorpus::load(&cli.quiz_file, &config.quiz_file_encoding)
        .with_context(|| format!("failed to load quiz file {}", cli.quiz_file.display()))?;
    info!(
        "Loaded {} questions from {}",
        corpus.len(),
        cli.quiz_file.display()
    );

    let backend: Arc<dyn KeyValueStore> = if cli.memory_store {
        info!("Keeping sessions in memory, they will not survive a restart");
        Arc::new(MemoryStore::with_ttl(config.redis.ttl))
    } else {
        Arc::new(
            RedisStore::connect(&config.redis)
                .await
                .context("failed to connect to Redis")?,
        )
    };
    let mut sessions = SessionStore::new(backend).with_timeout(config.store_timeout);
    if let Some(namespace) = &config.session_namespace {
        sessions = sessions.with_namespace(namespace.clone());
    }
    let engine = Arc::new(QuizEngine::new(Arc::new(corpus), sessions));

    match cli.transport {
        Transport::Telegram => {
            let token = config.require_telegram_token()?;
            let bot = telegram_bot.unwrap_or_else(|| Bot::new(token));
            telegram::run(bot, engine).await;
        }
        Transport::Vk => {
            let (token, group_id) = config.require_vk()?;
            vk::run(vk::VkClient::new(token, group_id), engine).await;
        }
    }
    Ok(())
}
