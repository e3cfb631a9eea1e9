mod harness;

use harness::config::{config, provider};
use harness::mock_vendor::{MockVendor, Reply, anthropic_text};
use relay_llm::{Content, OperateRequest, OutputFormat};
use serde_json::json;

#[tokio::test]
async fn messages_request_carries_auth_system_and_max_tokens() {
    let mock = MockVendor::start(vec![Reply::ok(anthropic_text("Hi!"))]).await.unwrap();
    let provider = provider(&config("anthropic", &mock.base_url())).await;

    let result = provider
        .operate("Hello", OperateRequest::new().with_system("Be cheerful"))
        .await
        .unwrap();

    assert_eq!(result.content.as_text(), Some("Hi!"));
    assert_eq!(result.usage[0].provider, "anthropic");
    assert_eq!(result.usage[0].total_tokens, 13);

    let received = &mock.received()[0];
    assert_eq!(received.path, "/v1/messages");
    assert_eq!(received.headers["x-api-key"], "sk-ant-test");
    assert_eq!(received.headers["anthropic-version"], "2023-06-01");
    assert_eq!(received.body["system"], "Be cheerful");
    assert_eq!(received.body["max_tokens"], 4096);
    assert_eq!(received.body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn structured_output_goes_through_forced_tool() {
    let mock = MockVendor::start(vec![Reply::ok(json!({
        "id": "msg_mock",
        "model": "mock-model",
        "content": [{"type": "tool_use", "id": "toolu_1", "name": "structured_output", "input": {"city": "Rome"}}],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 30, "output_tokens": 10},
    }))])
    .await
    .unwrap();
    let provider = provider(&config("anthropic", &mock.base_url())).await;
    let request = OperateRequest::new().with_format(OutputFormat::Fields(json!({"city": "string"})));

    let result = provider.operate("Capital of Italy?", request).await.unwrap();

    assert_eq!(result.content, Content::Structured(json!({"city": "Rome"})));
    let body = &mock.received()[0].body;
    assert_eq!(body["tools"][0]["name"], "structured_output");
    assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "structured_output"}));
}
