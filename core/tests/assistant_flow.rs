use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slotdesk::{
    assistant::{self, Exchange},
    completion::{CompletionError, Message},
    config::AssistantConfig,
    error::Error,
    providers::completions::OpenAICompatible,
    slots::NO_AVAILABILITY,
    tools::{AvailabilityTool, ToolSetError},
};

const SLOTS: &str = "date_slot,specialization,doctor_name,is_available,patient_to_attend
07-08-2024 09:00,general_dentist,john doe,True,
07-08-2024 10:30,general_dentist,john doe,False,1000082
07-08-2024 13:30,general_dentist,emily johnson,True,
07-08-2024 08:00,orthodontist,lisa brown,True,
";

fn slot_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SLOTS.as_bytes()).unwrap();
    file
}

fn config(data: &NamedTempFile, tools: Vec<AvailabilityTool>) -> AssistantConfig {
    AssistantConfig {
        data_path: data.path().to_path_buf(),
        tools,
        temperature: 0.0,
        ..AssistantConfig::default()
    }
}

fn model(server: &MockServer) -> OpenAICompatible {
    OpenAICompatible::with_api_key(
        "test-key".to_string(),
        format!("{}/openai/v1/chat/completions", server.uri()),
        "openai/gpt-oss-20b".to_string(),
    )
}

fn tool_call_reply(name: &str, arguments: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            }
        }],
        "usage": {"prompt_tokens": 210, "completion_tokens": 40, "total_tokens": 250}
    })
}

async fn ask_once(
    server: &MockServer,
    config: &AssistantConfig,
    prompt: &str,
) -> Result<Exchange, Error> {
    let mut client = assistant::assistant_client(model(server), config)?;
    assistant::ask(&mut client, prompt).await
}

#[tokio::test]
async fn specialization_question_runs_the_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-oss-20b",
            "messages": [
                {"role": "system", "content": "You are a medical assistant. If user asks about doctor availability, you MUST call the tool."},
                {"role": "user", "content": "What are the available slots for general dentist on 07-08-2024?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(
            "check_availability_by_specialization",
            json!({"desired_date": {"date": "07-08-2024"}, "specialization": "general_dentist"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data = slot_file();
    let exchange = ask_once(
        &server,
        &config(&data, AvailabilityTool::ALL.to_vec()),
        "What are the available slots for general dentist on 07-08-2024?",
    )
    .await
    .unwrap();

    assert_eq!(exchange.reply.tool_calls().map(|calls| calls.len()), Some(1));
    assert_eq!(exchange.tool_responses.len(), 1);
    assert_eq!(exchange.tool_responses[0].id, "call_abc");
    assert_eq!(
        exchange.tool_responses[0].text(),
        "This availability for 07-08-2024\n\
         emily johnson. Available slots: \n1:30 PM\n\
         john doe. Available slots: \n9:00 AM\n"
    );
}

#[tokio::test]
async fn request_carries_the_bound_tools_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(
            "check_availability_by_doctor",
            json!({"desired_date": {"date": "07-08-2024"}, "doctor_name": "susan davis"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data = slot_file();
    let exchange = ask_once(
        &server,
        &config(&data, vec![AvailabilityTool::ByDoctor]),
        "Is susan davis free on 07-08-2024?",
    )
    .await
    .unwrap();
    assert_eq!(exchange.tool_responses[0].text(), NO_AVAILABILITY);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let tools = body["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["type"], "function");
    assert_eq!(tools[0]["function"]["name"], "check_availability_by_doctor");
}

#[tokio::test]
async fn both_tools_are_sent_when_both_are_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Which date?"}}]
        })))
        .mount(&server)
        .await;

    let data = slot_file();
    ask_once(&server, &config(&data, AvailabilityTool::ALL.to_vec()), "Any dentist free?")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let mut names = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(
        names,
        vec![
            "check_availability_by_doctor".to_string(),
            "check_availability_by_specialization".to_string()
        ]
    );
}

#[tokio::test]
async fn unbound_tool_is_not_dispatched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(
            "check_availability_by_specialization",
            json!({"desired_date": {"date": "07-08-2024"}, "specialization": "orthodontist"}),
        )))
        .mount(&server)
        .await;

    let data = slot_file();
    let err = ask_once(
        &server,
        &config(&data, vec![AvailabilityTool::ByDoctor]),
        "Any orthodontist on 07-08-2024?",
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        Error::ToolSet(ToolSetError::ToolNotFound(name))
            if name == "check_availability_by_specialization"
    ));
}

#[tokio::test]
async fn malformed_date_from_the_model_fails_the_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(
            "check_availability_by_specialization",
            json!({"desired_date": {"date": "7-8-2024"}, "specialization": "general_dentist"}),
        )))
        .mount(&server)
        .await;

    let data = slot_file();
    let err = ask_once(
        &server,
        &config(&data, AvailabilityTool::ALL.to_vec()),
        "What are the available slots for general dentist on 7-8-2024?",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::ToolSet(ToolSetError::ToolError(..))));
}

#[tokio::test]
async fn plain_answer_runs_no_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello! How can I help?"}}]
        })))
        .mount(&server)
        .await;

    let data = slot_file();
    let exchange = ask_once(&server, &config(&data, AvailabilityTool::ALL.to_vec()), "hi")
        .await
        .unwrap();
    assert!(exchange.tool_responses.is_empty());
    assert_eq!(
        exchange.reply,
        Message::Assistant {
            content: "Hello! How can I help?".to_string(),
            tool_calls: None
        }
    );
}

#[tokio::test]
async fn provider_errors_are_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let data = slot_file();
    let err = ask_once(&server, &config(&data, AvailabilityTool::ALL.to_vec()), "hi")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Completion(CompletionError::ProviderError(401, ref body))
            if body == "invalid api key"
    ));
}

#[tokio::test]
async fn missing_slot_file_surfaces_as_tool_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(
            "check_availability_by_doctor",
            json!({"desired_date": {"date": "07-08-2024"}, "doctor_name": "john doe"}),
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = AssistantConfig {
        data_path: dir.path().join("missing.csv"),
        ..AssistantConfig::default()
    };
    let err = ask_once(&server, &config, "Is john doe free on 07-08-2024?")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolSet(ToolSetError::ToolError(..))));
}
