use tracing::{info, instrument};

use crate::{
    completion::{Client, CompletionModel, Message},
    config::AssistantConfig,
    error::Error,
    providers::completions::OpenAICompatible,
    slots::{CsvSlotSource, SlotStore},
    tools::{availability_tools, ExecutionStrategy, ToolResponse},
};

/// The model's reply to one prompt and the output of every tool it asked for
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub reply: Message,
    pub tool_responses: Vec<ToolResponse>,
}

/// Wires `model` to the tools selected in `config` and attaches the CSV backed slot store
///
/// # Errors
/// Only if the store state is attached twice, which can't happen on a fresh client
pub fn assistant_client<M: CompletionModel>(
    model: M,
    config: &AssistantConfig,
) -> Result<Client<M>, Error> {
    let tools = availability_tools(&config.tools, ExecutionStrategy::FailEarly);
    info!(tools = ?tools.list_tools(), data_path = %config.data_path.display(), "Binding tools");
    let client = Client::new(
        model,
        &config.system_prompt,
        config.temperature,
        config.max_tokens,
        tools,
    )
    .with_state(SlotStore::new(CsvSlotSource::new(&config.data_path)))?;
    Ok(client)
}

/// Builds the configured provider's model and wires it up like `assistant_client`
///
/// # Errors
/// If the provider's API key isn't available
pub fn build_client(config: &AssistantConfig) -> Result<Client<OpenAICompatible>, Error> {
    let model = config.completion_model()?;
    assistant_client(model, config)
}

/// Sends `prompt` once and runs whatever tool calls come back.
///
/// A call naming a tool that isn't bound fails the whole exchange.
///
/// # Errors
/// On provider failures, unknown tools, invalid arguments or unreadable slot data
#[instrument(skip(client))]
pub async fn ask<M: CompletionModel>(
    client: &mut Client<M>,
    prompt: &str,
) -> Result<Exchange, Error> {
    let reply = client.prompt(prompt).execute_tools(false).send().await?;

    let tool_responses = match reply.tool_calls() {
        Some(calls) => {
            info!(
                calls = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model requested tools"
            );
            client.run_tools(Some(calls)).await?
        }
        None => {
            info!("Model answered without calling a tool");
            vec![]
        }
    };

    Ok(Exchange {
        reply,
        tool_responses,
    })
}
