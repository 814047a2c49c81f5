//! Scripted assistant clients

use ai_assistant::{AssistantClient, AssistantOptions, ClientError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers from a script, one entry per question, and records what it was asked
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ClientError>>>,
    questions: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()))
    }

    pub fn fail(self, err: ClientError) -> Self {
        self.push(Err(err))
    }

    /// Sleep on the worker thread before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, reply: Result<String, ClientError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl AssistantClient for ScriptedClient {
    fn complete(
        &self,
        _system_prompt: &str,
        _model: &str,
        question: &str,
    ) -> Result<String, ClientError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.questions.lock().unwrap().push(question.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Request("script exhausted".to_string())))
    }
}

/// Client factory handing out `client` to every entry that has an API key
pub fn scripted_factory(
    client: Arc<ScriptedClient>,
) -> impl Fn(&AssistantOptions) -> Option<Arc<dyn AssistantClient>> + Send + Sync + 'static {
    move |options: &AssistantOptions| {
        options
            .has_api_key()
            .then(|| client.clone() as Arc<dyn AssistantClient>)
    }
}
