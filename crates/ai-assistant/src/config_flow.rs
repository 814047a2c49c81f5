//! Two-step config flow
//!
//! Step `user` collects the name and polling interval, step `api` the
//! provider settings. Validation is done by pure functions that return
//! field-level error codes; [`ConfigFlow`] only sequences the steps.

use crate::constants::*;
use crate::options::ApiProvider;
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntrySource};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const STEP_USER: &str = "user";
pub const STEP_API: &str = "api";
pub const STEP_IMPORT: &str = "import";

pub const ERROR_REQUIRED: &str = "required";
pub const ERROR_INVALID_UPDATE_INTERVAL: &str = "invalid_update_interval";
pub const ERROR_INVALID_API_KEY: &str = "invalid_api_key";
pub const ERROR_INVALID_PROVIDER: &str = "invalid_provider";
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

pub type FlowInput = HashMap<String, Value>;

/// Field name to error code
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid input: {errors:?}")]
pub struct ValidationError {
    pub errors: BTreeMap<String, String>,
}

impl ValidationError {
    fn add(&mut self, field: &str, code: &str) {
        self.errors.insert(field.to_string(), code.to_string());
    }

    fn merge(&mut self, other: ValidationError) {
        self.errors.extend(other.errors);
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    Form {
        step_id: String,
        errors: BTreeMap<String, String>,
    },
    CreateEntry {
        title: String,
        data: FlowInput,
    },
    Abort {
        reason: String,
    },
}

impl FlowResult {
    fn form(step_id: &str, errors: BTreeMap<String, String>) -> Self {
        FlowResult::Form {
            step_id: step_id.to_string(),
            errors,
        }
    }

    /// The config entry a `CreateEntry` result stands for
    pub fn into_config_entry(self, source: ConfigEntrySource) -> Option<ConfigEntry> {
        match self {
            FlowResult::CreateEntry { title, data } => Some(
                ConfigEntry::new(DOMAIN, title)
                    .with_data(data)
                    .with_unique_id(UNIQUE_ID)
                    .with_source(source),
            ),
            _ => None,
        }
    }
}

fn non_empty_str<'a>(input: &'a FlowInput, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Validate step `user`, returning its data with defaults filled in
pub fn validate_user_input(input: &FlowInput) -> Result<FlowInput, ValidationError> {
    let mut errors = ValidationError::default();

    let name = match input.get("name") {
        None | Some(Value::Null) => Some(DEFAULT_NAME.to_string()),
        Some(_) => non_empty_str(input, "name").map(str::to_string),
    };
    if name.is_none() {
        errors.add("name", ERROR_REQUIRED);
    }

    let update_interval = match input.get("update_interval") {
        None | Some(Value::Null) => Some(DEFAULT_UPDATE_INTERVAL.as_secs()),
        Some(value) => value.as_u64().filter(|secs| *secs >= 1),
    };
    if update_interval.is_none() {
        errors.add("update_interval", ERROR_INVALID_UPDATE_INTERVAL);
    }

    errors.into_result(HashMap::from([
        ("name".to_string(), json!(name)),
        ("update_interval".to_string(), json!(update_interval)),
    ]))
}

/// Validate step `api`, returning its data with defaults filled in
pub fn validate_api_input(input: &FlowInput) -> Result<FlowInput, ValidationError> {
    let mut errors = ValidationError::default();
    let api_key = non_empty_str(input, "api_key");
    let api_url = non_empty_str(input, "api_url");

    let provider = match input.get("api_provider") {
        None | Some(Value::Null) => Some(ApiProvider::default()),
        Some(value) => value.as_str().and_then(|s| s.parse::<ApiProvider>().ok()),
    };

    match provider {
        Some(ApiProvider::OpenAi) => {
            if api_key.map_or(true, |key| key.chars().count() < MIN_API_KEY_LENGTH) {
                errors.add("api_key", ERROR_INVALID_API_KEY);
            }
        }
        Some(ApiProvider::Custom) => {
            if api_url.is_none() {
                errors.add("api_url", ERROR_REQUIRED);
            }
        }
        None => errors.add("api_provider", ERROR_INVALID_PROVIDER),
    }

    let mut data = HashMap::from([
        ("api_provider".to_string(), json!(provider)),
        (
            "model".to_string(),
            json!(non_empty_str(input, "model").unwrap_or(DEFAULT_MODEL)),
        ),
    ]);
    if let Some(key) = api_key {
        data.insert("api_key".to_string(), json!(key));
    }
    if let Some(url) = api_url {
        data.insert("api_url".to_string(), json!(url));
    }
    // pass through settings only reachable from YAML
    for key in ["system_prompt", "request_timeout"] {
        if let Some(value) = input.get(key).filter(|v| !v.is_null()) {
            data.insert(key.to_string(), value.clone());
        }
    }

    errors.into_result(data)
}

/// One run through the flow
pub struct ConfigFlow {
    entries: Arc<ConfigEntries>,
    data: FlowInput,
}

impl ConfigFlow {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            data: FlowInput::new(),
        }
    }

    /// `None` shows the empty form
    pub fn step_user(&mut self, input: Option<FlowInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(STEP_USER, BTreeMap::new());
        };

        match validate_user_input(&input) {
            Ok(data) => {
                self.data.extend(data);
                FlowResult::form(STEP_API, BTreeMap::new())
            }
            Err(err) => FlowResult::form(STEP_USER, err.errors),
        }
    }

    pub fn step_api(&mut self, input: Option<FlowInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(STEP_API, BTreeMap::new());
        };

        match validate_api_input(&input) {
            Ok(data) => {
                self.data.extend(data);
                self.finish()
            }
            Err(err) => FlowResult::form(STEP_API, err.errors),
        }
    }

    /// Both steps at once, for `configuration.yaml`
    pub fn step_import(&mut self, input: FlowInput) -> Result<FlowResult, ValidationError> {
        let mut errors = ValidationError::default();

        let user = validate_user_input(&input).unwrap_or_else(|err| {
            errors.merge(err);
            FlowInput::new()
        });
        let api = validate_api_input(&input).unwrap_or_else(|err| {
            errors.merge(err);
            FlowInput::new()
        });
        errors.into_result(())?;

        debug!(step = STEP_IMPORT, "Importing configuration");
        self.data.extend(user);
        self.data.extend(api);
        Ok(self.finish())
    }

    fn finish(&mut self) -> FlowResult {
        if self.entries.get_by_unique_id(DOMAIN, UNIQUE_ID).is_some() {
            return FlowResult::Abort {
                reason: ABORT_ALREADY_CONFIGURED.to_string(),
            };
        }

        let title = self
            .data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_NAME)
            .to_string();
        info!(title = %title, "Config flow finished");

        FlowResult::CreateEntry {
            title,
            data: std::mem::take(&mut self.data),
        }
    }
}
