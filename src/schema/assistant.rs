//! Schema 生成助手：自然语言描述 -> schema 描述文本（一次性结构化生成）

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PlaygroundError;
use crate::llm::{ChatMessage, LlmClient, ObjectSpec, StepRequest};

/// 助手的固定输出形状：单字段 schema 文本
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DraftedSchema {
    /// A valid schema string that can be used with z.object()
    pub schema: String,
}

const SYSTEM_PROMPT: &str = r#"You are a schema generator. Given a description of data structure, generate a valid Zod schema string.

Rules:
- Output ONLY the schema code, starting with z.object({...})
- Use appropriate Zod types: z.string(), z.number(), z.boolean(), z.array(), z.object(), z.enum([])
- Add .describe() to fields to help the AI understand what data to extract
- Keep schemas reasonably simple and focused
- Use snake_case or camelCase consistently for field names

Example output for "product with name and price":
z.object({
  name: z.string().describe("Product name"),
  price: z.number().describe("Product price in USD"),
  currency: z.string().default("USD"),
})"#;

/// 由自然语言描述生成 schema 描述文本
pub async fn draft_schema(
    client: &dyn LlmClient,
    model: &str,
    description: &str,
) -> Result<String, PlaygroundError> {
    if description.trim().is_empty() {
        return Err(PlaygroundError::MissingPrompt);
    }

    let req = StepRequest::new(
        model,
        vec![
            ChatMessage::System(SYSTEM_PROMPT.to_string()),
            ChatMessage::User(format!("Generate a Zod schema for: {description}")),
        ],
    );
    let schema_value = serde_json::to_value(schema_for!(DraftedSchema))
        .map_err(|e| PlaygroundError::MalformedOutput(e.to_string()))?;
    let spec = ObjectSpec {
        name: "drafted_schema".to_string(),
        schema: Some(schema_value),
    };

    let object = client.complete_object(&req, &spec).await?;
    let drafted: DraftedSchema = serde_json::from_value(object)
        .map_err(|e| PlaygroundError::MalformedOutput(e.to_string()))?;

    info!(model, chars = drafted.schema.len(), "schema drafted");
    Ok(drafted.schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_draft_returns_schema_string() {
        let client = ScriptedLlmClient::new(vec![])
            .with_objects(vec![json!({"schema": "z.object({ name: z.string() })"})]);
        let schema = draft_schema(&client, "openai/gpt-oss-120b", "a person with a name")
            .await
            .unwrap();
        assert_eq!(schema, "z.object({ name: z.string() })");

        let seen = client.seen_requests();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0].messages[0],
            ChatMessage::System(s) if s.contains("schema generator")
        ));
        assert!(matches!(
            &seen[0].messages[1],
            ChatMessage::User(u) if u.contains("a person with a name")
        ));
    }

    #[tokio::test]
    async fn test_blank_description_rejected() {
        let client = ScriptedLlmClient::new(vec![]);
        let err = draft_schema(&client, "m", "  ").await.unwrap_err();
        assert!(matches!(err, PlaygroundError::MissingPrompt));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed_output() {
        let client = ScriptedLlmClient::new(vec![]).with_objects(vec![json!({"nope": 1})]);
        let err = draft_schema(&client, "m", "anything").await.unwrap_err();
        assert!(matches!(err, PlaygroundError::MalformedOutput(_)));
    }
}
