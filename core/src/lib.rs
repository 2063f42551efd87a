//! # slotdesk
//!
//! slotdesk answers doctor-availability questions by letting a chat model call lookup tools
//! over a CSV table of appointment slots.
//!
//! ## Features
//!
//! - **Slot store** read fresh from a CSV file on every lookup
//! - **Availability queries** by doctor or by specialization
//! - **Tools** exposing the queries to the model, with JSON-schema arguments generated from the
//!   Rust types (closed sets of doctors and specializations become `enum`s)
//! - **LLM client** for OpenAI-compatible chat-completion APIs (Groq, OpenAI, DeepSeek, xAI)
//!
//! ## Asking once
//!
//! ```rust,no_run
//! use slotdesk::{assistant, config::AssistantConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), slotdesk::error::Error> {
//!     let config = AssistantConfig::load()?;
//!     let mut client = assistant::build_client(&config)?;
//!
//!     let exchange = assistant::ask(&mut client, "Is john doe free on 07-08-2024?").await?;
//!     for response in exchange.tool_responses {
//!         println!("{}", response.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Querying without a model
//!
//! ```rust,no_run
//! use slotdesk::slots::{CsvSlotSource, Doctor, SlotDate, SlotStore};
//!
//! let store = SlotStore::new(CsvSlotSource::new("data/doctor_availability.csv"));
//! let date = SlotDate::parse("07-08-2024").unwrap();
//! println!("{}", store.by_doctor(&date, Doctor::JohnDoe).unwrap());
//! ```

/// Prompt once, dispatch the returned tool calls
pub mod assistant;

/// Language model completion and conversation management
///
/// Contains:
/// - Client for managing LLM interactions
/// - Message history tracking
/// - Typed state shared with tools
pub mod completion;

/// Assistant configuration
pub mod config;

/// Error types for all library operations
pub mod error;

/// Builtin completion model providers
pub mod providers;

/// Appointment slots, their loading and the availability queries
pub mod slots;

/// Function calling and tool execution support
pub mod tools;
