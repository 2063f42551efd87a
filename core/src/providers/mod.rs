/// Chat-completion providers
pub mod completions;
