use clap::Parser;
use slotdesk::{assistant, completion::Message, config::AssistantConfig, error::Error};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ask the slot assistant about doctor availability
#[derive(Parser, Debug)]
#[command(name = "slotdesk", version, about)]
struct Cli {
    /// Question to ask, defaults to the configured prompt
    prompt: Option<String>,

    /// JSON config file, takes precedence over `SLOTDESK_CONFIG`
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match cli.config {
        Some(path) => AssistantConfig::from_file(path)?,
        None => AssistantConfig::load()?,
    };
    let prompt = cli.prompt.unwrap_or_else(|| config.prompt.clone());

    let mut client = assistant::build_client(&config)?;
    let exchange = assistant::ask(&mut client, &prompt).await?;

    if let Message::Assistant { content, .. } = &exchange.reply {
        if !content.is_empty() {
            println!("{content}");
        }
    }
    for response in &exchange.tool_responses {
        println!("Tool Output: {}", response.text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{error::ErrorKind, CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn question_is_positional() {
        let cli = Cli::try_parse_from(["slotdesk", "Is john doe free on 07-08-2024?"]).unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("Is john doe free on 07-08-2024?"));
        assert_eq!(cli.config, None);

        let cli = Cli::try_parse_from(["slotdesk", "--config", "slotdesk.json"]).unwrap();
        assert_eq!(cli.prompt, None);
        assert_eq!(cli.config, Some(PathBuf::from("slotdesk.json")));
    }

    #[test]
    fn flags_are_not_taken_as_questions() {
        let help = Cli::try_parse_from(["slotdesk", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);

        let unknown = Cli::try_parse_from(["slotdesk", "-v"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownArgument);
    }
}
