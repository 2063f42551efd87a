pub(crate) mod openai_compatible;

pub use openai_compatible::{OpenAICompatibleCompletionModel as OpenAICompatible, Provider};
