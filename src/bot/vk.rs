//! VK community bot over the Bots Long Poll API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bot::{respond, Action, Keyboard, NEW_QUESTION_BUTTON, SURRENDER_BUTTON};
use crate::quiz::QuizEngine;
use crate::store::UserIdentity;

pub const CHANNEL: &str = "vk";

const API_URL: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.131";
const POLL_WAIT_SECS: u64 = 25;
const RETRY_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum VkError {
    #[error("VK request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },
}

pub fn user_identity(user_id: i64) -> UserIdentity {
    UserIdentity::new(CHANNEL, user_id)
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: i64,
    error_msg: String,
}

/// VK sends `ts` as a string from `getLongPollServer` and as either a
/// string or a number from the poll endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
enum Ts {
    Text(String),
    Number(u64),
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ts::Text(text) => f.write_str(text),
            Ts::Number(number) => write!(f, "{number}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LongPollServer {
    key: String,
    server: String,
    ts: Ts,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    ts: Option<Ts>,
    failed: Option<u8>,
    #[serde(default)]
    updates: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Value,
}

#[derive(Debug, Deserialize)]
struct MessageNew {
    message: IncomingMessage,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
struct IncomingMessage {
    from_id: i64,
    #[serde(default)]
    text: String,
}

enum PollStep {
    Messages(Vec<IncomingMessage>),
    Reconnect,
}

/// Applies one long poll answer to `server`, advancing its `ts`.
fn apply_poll(server: &mut LongPollServer, response: PollResponse) -> PollStep {
    match (response.failed, response.ts) {
        // History is partially lost, continue from the new ts.
        (Some(1), Some(ts)) => {
            server.ts = ts;
            PollStep::Messages(Vec::new())
        }
        (Some(code), _) => {
            debug!("VK long poll key expired (failed={code}), reconnecting");
            PollStep::Reconnect
        }
        (None, ts) => {
            if let Some(ts) = ts {
                server.ts = ts;
            }
            let messages = response
                .updates
                .into_iter()
                .filter(|event| event.kind == "message_new")
                .filter_map(|event| match serde_json::from_value::<MessageNew>(event.object) {
                    Ok(new) => Some(new.message),
                    Err(err) => {
                        warn!("Skipping malformed VK message event: {err}");
                        None
                    }
                })
                .collect();
            PollStep::Messages(messages)
        }
    }
}

#[derive(Clone)]
pub struct VkClient {
    http: reqwest::Client,
    token: String,
    group_id: u64,
}

impl VkClient {
    pub fn new(token: impl Into<String>, group_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            group_id,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, VkError> {
        let mut form = vec![
            ("access_token", self.token.clone()),
            ("v", API_VERSION.to_string()),
        ];
        form.extend(params.iter().map(|(name, value)| (*name, value.clone())));

        let envelope: ApiEnvelope<T> = self
            .http
            .post(format!("{API_URL}/{method}"))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }

    async fn long_poll_server(&self) -> Result<LongPollServer, VkError> {
        self.call(
            "groups.getLongPollServer",
            &[("group_id", self.group_id.to_string())],
        )
        .await
    }

    async fn poll(&self, server: &LongPollServer) -> Result<PollResponse, VkError> {
        let ts = server.ts.to_string();
        let wait = POLL_WAIT_SECS.to_string();
        let response = self
            .http
            .get(&server.server)
            .query(&[
                ("act", "a_check"),
                ("key", server.key.as_str()),
                ("ts", ts.as_str()),
                ("wait", wait.as_str()),
            ])
            .timeout(Duration::from_secs(POLL_WAIT_SECS + 10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    pub async fn send_message(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<String>,
    ) -> Result<(), VkError> {
        let random_id = rand::thread_rng().gen_range(1..i32::MAX);
        let mut params = vec![
            ("user_id", user_id.to_string()),
            ("message", text.to_string()),
            ("random_id", random_id.to_string()),
        ];
        if let Some(keyboard) = keyboard {
            params.push(("keyboard", keyboard));
        }
        self.call::<Value>("messages.send", &params).await?;
        Ok(())
    }
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> Result<T, VkError> {
        match (self.response, self.error) {
            (_, Some(error)) => Err(VkError::Api {
                code: error.error_code,
                message: error.error_msg,
            }),
            (Some(response), None) => Ok(response),
            (None, None) => Err(VkError::Api {
                code: 0,
                message: "empty response".to_string(),
            }),
        }
    }
}

fn button(label: &str) -> Value {
    json!({
        "action": { "type": "text", "label": label },
        "color": "secondary",
    })
}

fn quiz_keyboard() -> String {
    json!({
        "one_time": false,
        "buttons": [[button(NEW_QUESTION_BUTTON), button(SURRENDER_BUTTON)]],
    })
    .to_string()
}

fn empty_keyboard() -> String {
    json!({ "one_time": true, "buttons": [] }).to_string()
}

/// Polls VK forever. Each message is answered on its own task; poll
/// failures are logged and retried.
pub async fn run(client: VkClient, engine: Arc<QuizEngine>) {
    info!(
        "VK quiz bot has started with {} questions",
        engine.corpus().len()
    );

    let mut server: Option<LongPollServer> = None;
    loop {
        if server.is_none() {
            match client.long_poll_server().await {
                Ok(fresh) => server = Some(fresh),
                Err(err) => {
                    error!("Could not get a VK long poll server: {err}");
                    tokio::time::sleep(RETRY_PAUSE).await;
                    continue;
                }
            }
        }
        let Some(current) = server.as_mut() else {
            continue;
        };

        let response = match client.poll(current).await {
            Ok(response) => response,
            Err(err) => {
                error!("VK long poll failed: {err}");
                server = None;
                tokio::time::sleep(RETRY_PAUSE).await;
                continue;
            }
        };

        match apply_poll(current, response) {
            PollStep::Reconnect => server = None,
            PollStep::Messages(messages) => {
                for message in messages {
                    if message.text.trim().is_empty() {
                        continue;
                    }
                    tokio::spawn(handle_message(client.clone(), engine.clone(), message));
                }
            }
        }
    }
}

async fn handle_message(client: VkClient, engine: Arc<QuizEngine>, message: IncomingMessage) {
    let user = user_identity(message.from_id);
    let reply = respond(&engine, &user, Action::classify(&message.text)).await;
    let keyboard = match reply.keyboard {
        Keyboard::Show => Some(quiz_keyboard()),
        Keyboard::Remove => Some(empty_keyboard()),
        Keyboard::Keep => None,
    };
    if let Err(err) = client
        .send_message(message.from_id, &reply.text, keyboard)
        .await
    {
        error!("Could not reply to {}: {}", user, err);
    }
}
