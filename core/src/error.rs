use crate::{
    completion::CompletionError, config::ConfigError, slots::SlotError, tools::ToolSetError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
    #[error("ToolSet error: {0}")]
    ToolSet(#[from] ToolSetError),
    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
