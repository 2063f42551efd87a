use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    any::{Any, TypeId},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::tools::{ExecutionStrategy, ToolCall, ToolResponse, ToolSet, ToolSetError};

/// Message that'll be sent in Completions
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// System prompt
    Preamble(String),
    /// Message sent by the user
    User {
        content: String,
        tool_responses: Option<Vec<ToolResponse>>,
    },
    /// Response from the assistant
    Assistant {
        content: String,
        tool_calls: Option<Vec<ToolCall>>,
    },
}

impl Message {
    /// Tool calls requested by an assistant message, if any
    #[must_use]
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Self::Assistant {
                tool_calls: Some(calls),
                ..
            } if !calls.is_empty() => Some(calls),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

pub type MessageHistory = Vec<Message>;

/// Typed values shared with tools, at most one per type
pub type StateMap = DashMap<TypeId, Box<dyn Any + Send + Sync>>;

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("ConfigError: {0}")]
    ConfigError(String),
    #[error(transparent)]
    StateError(#[from] StateError),
}

#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("State with type {0} already exists on client")]
    AlreadyExists(String),
    #[error("State not found")]
    NotFound,
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send message to LLM and get a reply
    async fn send(
        &mut self,
        message: Message,
        history: &MessageHistory,
        tools: Option<&ToolSet>,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<(Message, TokenUsage), CompletionError>;
}

pub struct State<T: Send + Sync + 'static>(pub Arc<T>);

/// Looks up the state of type `T` in `states`
///
/// # Errors
/// `StateError::NotFound` if nothing of type `T` was attached
pub fn state_from<T: Send + Sync + 'static>(states: &StateMap) -> Result<State<T>, StateError> {
    let boxed = states.get(&TypeId::of::<T>()).ok_or(StateError::NotFound)?;

    let arc = boxed
        .downcast_ref::<Arc<T>>()
        .ok_or(StateError::NotFound)?;

    Ok(State(arc.clone()))
}

pub struct Client<M: CompletionModel> {
    completion_model: Arc<RwLock<M>>,
    history: MessageHistory,

    // common prompt parameters
    temperature: f64,
    max_tokens: usize,
    tools: Box<ToolSet>,

    token_usage: TokenUsage,
    states: StateMap,
}

pub struct PromptBuilder<'a, M: CompletionModel> {
    prompt: String,
    client: &'a mut Client<M>,
    execute_tools: bool,
    with_tools: bool,
    append_tool_response: bool,
    one_shot: (bool, Option<MessageHistory>),
}

impl<'a, M: CompletionModel> PromptBuilder<'a, M> {
    fn new(client: &'a mut Client<M>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            client,
            execute_tools: true,
            with_tools: true,
            append_tool_response: false,
            one_shot: (false, None),
        }
    }

    /// Execute the tool calls if the LLM responds with a Tool call request, `true` by default
    #[must_use]
    pub fn execute_tools(mut self, execute: bool) -> Self {
        self.execute_tools = execute;
        self
    }

    /// Wether to send any tool definitions with the prompt, `true` by default
    #[must_use]
    pub fn with_tools(mut self, with_tools: bool) -> Self {
        self.with_tools = with_tools;
        self
    }

    /// Create a `Message::User` with the tool reponses and append it to the client history,
    /// `false` by default
    #[must_use]
    pub fn append_tool_response(mut self, append: bool) -> Self {
        self.append_tool_response = append;
        self
    }

    /// Prompt the LLM with a custom history, and get a response.
    /// Response won't be stored in the client's history
    #[must_use]
    pub fn one_shot(mut self, one_shot: bool, history: Option<MessageHistory>) -> Self {
        self.one_shot = (one_shot, history);
        self
    }

    /// Sends the prompt to the LLM.
    ///
    /// Returns the assistant's reply, or when tools get executed a `Message::User` carrying the
    /// tool responses.
    pub async fn send(self) -> Result<Message, crate::error::Error> {
        let tools = if self.with_tools && !self.client.tools.is_empty() {
            Some(&*self.client.tools)
        } else {
            None
        };
        let one_shot_history = self.one_shot.1.unwrap_or_default();
        let history = if self.one_shot.0 {
            &one_shot_history
        } else {
            &self.client.history
        };
        let (mut response, token_usage) = self
            .client
            .send_prompt(
                &self.prompt,
                history,
                tools,
                self.client.temperature,
                self.client.max_tokens,
            )
            .await?;

        if !self.one_shot.0 {
            self.client.history.push(Message::User {
                content: self.prompt.clone(),
                tool_responses: None,
            });
            self.client.history.push(response.clone());
        }

        self.client.update_token_usage(&token_usage);
        if token_usage.total_tokens.is_some() {
            info!(
                "Prompt used up: {:?} tokens, Total tokens used: {:?}",
                token_usage.total_tokens, self.client.token_usage.total_tokens
            );
        }

        if self.execute_tools {
            if let Some(calls) = response.tool_calls().map(<[ToolCall]>::to_vec) {
                let values = self.client.run_tools(Some(calls.as_slice())).await?;
                response = Message::User {
                    content: String::new(),
                    tool_responses: Some(values),
                };
                if self.append_tool_response && !self.one_shot.0 {
                    self.client.append_history(&[response.clone()]);
                }
            }
        }

        Ok(response)
    }
}

impl<M: CompletionModel> Client<M> {
    pub fn new(
        completion_model: M,
        preamble: impl AsRef<str>,
        temperature: f64,
        max_tokens: usize,
        tools: ToolSet,
    ) -> Self {
        Self {
            completion_model: Arc::new(RwLock::new(completion_model)),
            history: vec![Message::Preamble(String::from(preamble.as_ref()))],
            tools: Box::new(tools),
            temperature,
            max_tokens,
            token_usage: TokenUsage::default(),
            states: DashMap::new(),
        }
    }

    /// Clear conversation history while maintaining premble
    pub fn clear_history(&mut self) {
        self.history.retain(|m| matches!(m, Message::Preamble(_)));
    }

    #[must_use]
    pub fn export_history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn append_history(&mut self, messages: &[Message]) {
        messages.iter().for_each(|m| self.history.push(m.clone()));
    }

    #[must_use]
    pub fn token_usage(&self) -> &TokenUsage {
        &self.token_usage
    }

    #[must_use]
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn with_state<T: Send + Sync + 'static>(self, state: T) -> Result<Self, CompletionError> {
        let type_id = TypeId::of::<T>();
        if self.states.contains_key(&type_id) {
            return Err(CompletionError::StateError(StateError::AlreadyExists(
                std::any::type_name::<T>().to_string(),
            )));
        }
        self.states.insert(type_id, Box::new(Arc::new(state)));
        Ok(self)
    }

    pub fn get_state<T: Send + Sync + 'static>(&self) -> Result<State<T>, StateError> {
        state_from(&self.states)
    }

    /// Creates a `PromptBuilder` instance .
    pub fn prompt(&mut self, prompt: impl Into<String>) -> PromptBuilder<M> {
        PromptBuilder::new(self, prompt)
    }

    /// Executes `calls`, or the calls of the last assistant message in the history when `None`
    pub async fn run_tools(
        &self,
        calls: Option<&[ToolCall]>,
    ) -> Result<Vec<ToolResponse>, ToolSetError> {
        let calls = match calls {
            Some(calls) => calls,
            None => {
                let last = self
                    .history
                    .last()
                    .ok_or(ToolSetError::EmptyMessageHistory)?;
                last.tool_calls()
                    .ok_or(ToolSetError::LastMessageNotAToolCall)?
            }
        };

        let mut values = vec![];
        match self.tools.1 {
            ExecutionStrategy::FailEarly => {
                for call in calls {
                    values.push(
                        self.tools
                            .call(&call.id, &call.name, &call.arguments, &self.states)
                            .await?,
                    );
                }
            }
            ExecutionStrategy::BestEffort => {
                for call in calls {
                    let tr = self
                        .tools
                        .call(&call.id, &call.name, &call.arguments, &self.states)
                        .await;
                    if let Ok(v) = tr {
                        values.push(v);
                    }
                }
            }
        }

        Ok(values)
    }

    fn update_token_usage(&mut self, usage: &TokenUsage) {
        self.token_usage.prompt_tokens =
            combine_options(self.token_usage.prompt_tokens, usage.prompt_tokens);
        self.token_usage.completion_tokens =
            combine_options(self.token_usage.completion_tokens, usage.completion_tokens);
        self.token_usage.total_tokens =
            combine_options(self.token_usage.total_tokens, usage.total_tokens);
    }

    async fn send_prompt(
        &self,
        prompt: &str,
        history: &MessageHistory,
        tools: Option<&ToolSet>,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<(Message, TokenUsage), crate::error::Error> {
        let message = Message::User {
            content: prompt.to_string(),
            tool_responses: None,
        };

        let model = self.completion_model.clone();
        let mut guard = model.write().await;
        guard
            .send(message, history, tools, temperature, max_tokens)
            .await
            .map_err(crate::error::Error::from)
    }
}

fn combine_options(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a_val), Some(b_val)) => Some(a_val + b_val),
        (None, b) => b,
        (a, None) => a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{availability_tools, AvailabilityTool};
    use crate::slots::{InMemorySlotSource, SlotRecord, SlotStore};

    /// Replies with a canned message and remembers what it was sent
    struct ScriptedModel {
        reply: Message,
        seen_history_len: Vec<usize>,
        seen_tools: Vec<bool>,
    }

    impl ScriptedModel {
        fn new(reply: Message) -> Self {
            Self {
                reply,
                seen_history_len: vec![],
                seen_tools: vec![],
            }
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn send(
            &mut self,
            _message: Message,
            history: &MessageHistory,
            tools: Option<&ToolSet>,
            _temperature: f64,
            _max_tokens: usize,
        ) -> Result<(Message, TokenUsage), CompletionError> {
            self.seen_history_len.push(history.len());
            self.seen_tools.push(tools.is_some());
            Ok((
                self.reply.clone(),
                TokenUsage {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(5),
                    total_tokens: Some(15),
                },
            ))
        }
    }

    fn doctor_call() -> Message {
        Message::Assistant {
            content: String::new(),
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                name: "check_availability_by_doctor".to_string(),
                arguments: r#"{"desired_date":{"date":"07-08-2024"},"doctor_name":"john doe"}"#
                    .to_string(),
            }]),
        }
    }

    fn store() -> SlotStore {
        SlotStore::new(InMemorySlotSource::new(vec![SlotRecord::new(
            "07-08-2024",
            "09:00",
            "john doe",
            "general_dentist",
            true,
        )]))
    }

    fn client(reply: Message) -> Client<ScriptedModel> {
        Client::new(
            ScriptedModel::new(reply),
            "You are a medical assistant",
            0.0,
            100,
            availability_tools(&AvailabilityTool::ALL, ExecutionStrategy::FailEarly),
        )
    }

    #[tokio::test]
    async fn send_executes_requested_tools() {
        let mut client = client(doctor_call()).with_state(store()).unwrap();
        let response = client
            .prompt("When is john doe free on 07-08-2024?")
            .append_tool_response(true)
            .send()
            .await
            .unwrap();

        let Message::User {
            tool_responses: Some(responses),
            ..
        } = &response
        else {
            panic!("expected tool responses, got {response:?}");
        };
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses[0].text(),
            "This availability for 07-08-2024\nAvailable slots: 09:00"
        );

        // preamble, prompt, assistant tool call, tool responses
        assert_eq!(client.export_history().len(), 4);
        assert_eq!(client.export_history().last(), Some(&response));
        assert_eq!(client.token_usage().total_tokens, Some(15));
    }

    #[tokio::test]
    async fn send_without_execution_returns_the_call() {
        let mut client = client(doctor_call()).with_state(store()).unwrap();
        let response = client
            .prompt("When is john doe free?")
            .execute_tools(false)
            .send()
            .await
            .unwrap();
        assert_eq!(response, doctor_call());

        let outputs = client.run_tools(None).await.unwrap();
        assert_eq!(outputs[0].id, "call_1");
    }

    #[tokio::test]
    async fn one_shot_leaves_history_alone() {
        let reply = Message::Assistant {
            content: "hello".to_string(),
            tool_calls: None,
        };
        let mut client = client(reply.clone());
        let response = client
            .prompt("hi")
            .one_shot(true, None)
            .with_tools(false)
            .send()
            .await
            .unwrap();
        assert_eq!(response, reply);
        assert_eq!(client.export_history().len(), 1);

        let model = client.completion_model.read().await;
        assert_eq!(model.seen_history_len, vec![0]);
        assert_eq!(model.seen_tools, vec![false]);
    }

    #[tokio::test]
    async fn unknown_tool_name_fails() {
        let reply = Message::Assistant {
            content: String::new(),
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                name: "book_appointment".to_string(),
                arguments: "{}".to_string(),
            }]),
        };
        let mut client = client(reply).with_state(store()).unwrap();
        let err = client.prompt("book me in").send().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::ToolSet(ToolSetError::ToolNotFound(n)) if n == "book_appointment"
        ));
    }

    #[tokio::test]
    async fn best_effort_skips_failing_calls() {
        let reply = Message::Assistant {
            content: String::new(),
            tool_calls: Some(vec![
                ToolCall {
                    id: "bad".to_string(),
                    name: "check_availability_by_doctor".to_string(),
                    arguments: r#"{"desired_date":{"date":"7-8-2024"},"doctor_name":"john doe"}"#
                        .to_string(),
                },
                match doctor_call() {
                    Message::Assistant {
                        tool_calls: Some(mut calls),
                        ..
                    } => calls.remove(0),
                    _ => unreachable!(),
                },
            ]),
        };
        let mut client = Client::new(
            ScriptedModel::new(reply),
            "preamble",
            0.0,
            100,
            availability_tools(&AvailabilityTool::ALL, ExecutionStrategy::BestEffort),
        )
        .with_state(store())
        .unwrap();

        let response = client.prompt("when?").send().await.unwrap();
        let Message::User {
            tool_responses: Some(responses),
            ..
        } = response
        else {
            panic!("expected tool responses");
        };
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "call_1");
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let client = client(doctor_call()).with_state(3u32).unwrap();
        assert!(matches!(
            client.with_state(7u32),
            Err(CompletionError::StateError(StateError::AlreadyExists(_)))
        ));
    }

    #[test]
    fn state_lookup() {
        let client = client(doctor_call()).with_state(store()).unwrap();
        assert!(client.get_state::<SlotStore>().is_ok());
        assert!(matches!(
            client.get_state::<String>(),
            Err(StateError::NotFound)
        ));
    }

    #[test]
    fn clear_history_keeps_preamble() {
        let mut client = client(doctor_call());
        client.append_history(&[Message::User {
            content: "hi".to_string(),
            tool_responses: None,
        }]);
        assert_eq!(client.export_history().len(), 2);
        client.clear_history();
        assert_eq!(
            client.export_history(),
            &vec![Message::Preamble("You are a medical assistant".to_string())]
        );
    }

    #[tokio::test]
    async fn run_tools_needs_a_tool_call() {
        let client = client(doctor_call());
        assert!(matches!(
            client.run_tools(None).await,
            Err(ToolSetError::LastMessageNotAToolCall)
        ));
    }

    #[test]
    fn token_usage_accumulates() {
        assert_eq!(combine_options(Some(1), Some(2)), Some(3));
        assert_eq!(combine_options(None, Some(2)), Some(2));
        assert_eq!(combine_options(Some(1), None), Some(1));
        assert_eq!(combine_options(None, None), None);
    }
}
