//! Names, defaults and fixed strings of the integration

use std::time::Duration;

pub const DOMAIN: &str = "ai_assistant";

/// Unique id shared by every entry the config flow creates
pub const UNIQUE_ID: &str = "ai_assistant";

pub const SERVICE_ASK_QUESTION: &str = "ask_question";
pub const SERVICE_RESET: &str = "reset";

/// Fired after every answered `ask_question` call
pub const EVENT_RESPONSE: &str = "ai_assistant_response";

pub const DEFAULT_NAME: &str = "AI Assistant";
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant integrated with Home Assistant. Provide concise and useful responses about home automation.";

pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const MAX_TOKENS: u32 = 300;
pub const TEMPERATURE: f32 = 0.7;

/// Shortest API key the config flow accepts for OpenAI
pub const MIN_API_KEY_LENGTH: usize = 10;

pub const INITIAL_RESPONSE: &str = "Ready";
pub const RESET_RESPONSE: &str = "Reset";

/// Returned by `ask` when no API key is configured
pub const MISSING_API_KEY_WARNING: &str =
    "⚠️ API key non configurata. Configura l'API key nelle impostazioni.";

/// Prefix of the text returned for a failed question
pub const ERROR_PREFIX: &str = "Errore:";

pub const ATTR_QUESTION: &str = "question";
pub const ATTR_RESPONSE: &str = "response";
pub const ATTR_ENTRY_ID: &str = "entry_id";
