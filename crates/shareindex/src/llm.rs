//! Chat-completions [`LogAnalyst`] with filesystem tool access.
//!
//! Drives an OpenAI-compatible `POST {base_url}/v1/chat/completions` loop:
//! the model may call the `list_files` and `read_file` tools against the
//! mounted share, bounded by `max_tool_turns` round trips. Tool arguments
//! are validated against fixed schemas; a malformed call is answered with
//! an error message in the tool result rather than aborting the analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shareindex_core::error::{Error, Result};
use shareindex_core::files::FileSource;
use shareindex_core::security::{LogAnalyst, Severity};

use crate::config::ReasoningConfig;

pub struct ChatAnalyst {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tool_turns: u32,
    files: Arc<dyn FileSource>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListFilesArgs {
    directory: String,
    #[serde(default = "default_pattern")]
    pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadFileArgs {
    path: String,
}

fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "list_files",
                "description": "List files in a directory on the share, optionally filtered by a glob pattern.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "directory": { "type": "string", "description": "Directory relative to the share root." },
                        "pattern": { "type": "string", "description": "Glob pattern, default *." }
                    },
                    "required": ["directory"],
                    "additionalProperties": false
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "read_file",
                "description": "Read one text file from the share.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File path relative to the share root." }
                    },
                    "required": ["path"],
                    "additionalProperties": false
                }
            }
        }
    ])
}

fn system_prompt(log_directory: &str) -> String {
    format!(
        r#"You are a security analyst AI. Your task is to analyze system logs for security threats and anomalies.

Use the available filesystem tools to:
1. List log files in the "{log_directory}" directory
2. Read syslog files from the last 24 hours
3. Search for suspicious patterns like:
   - Failed login attempts (brute force indicators)
   - Privilege escalation attempts
   - Unusual sudo commands
   - SSH authentication failures
   - Port scans or network anomalies
   - File integrity changes
   - Suspicious process executions

After analyzing the logs, return your findings in VALID JSON format:

{{
  "severity": "none" | "low" | "medium" | "high" | "critical",
  "issues": [
    {{
      "type": "string (e.g., 'Brute Force Attack', 'Privilege Escalation')",
      "description": "string (detailed description)",
      "evidence": ["string array of log entries"],
      "affected_hosts": ["string array of hostnames"]
    }}
  ],
  "summary": "string (overall security summary)",
  "recommendations": ["string array of recommended actions"],
  "logsAnalyzed": number
}}

IMPORTANT: Return ONLY the JSON object, no additional text or markdown formatting."#
    )
}

impl ChatAnalyst {
    pub fn new(config: &ReasoningConfig, files: Arc<dyn FileSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("reasoning http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tool_turns: config.max_tool_turns,
            files,
        })
    }

    async fn completion(&self, messages: &[Value]) -> Result<Value> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tool_definitions(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ReasoningProvider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ReasoningProvider(format!(
                "endpoint error {status}: {body_text}"
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| Error::ReasoningProvider(format!("invalid response body: {e}")))?;
        parsed
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| Error::ReasoningProvider("response missing message".into()))
    }

    /// Execute one tool call. Argument and execution errors come back as
    /// the tool result text so the model can correct itself.
    async fn execute_tool(&self, name: &str, arguments: &str) -> String {
        match name {
            "list_files" => match serde_json::from_str::<ListFilesArgs>(arguments) {
                Ok(args) => match self.files.list_files(&args.directory, &args.pattern).await {
                    Ok(entries) => serde_json::to_string(&entries)
                        .unwrap_or_else(|e| format!("error: serializing listing: {e}")),
                    Err(e) => format!("error: {e}"),
                },
                Err(e) => format!("error: invalid list_files arguments: {e}"),
            },
            "read_file" => match serde_json::from_str::<ReadFileArgs>(arguments) {
                Ok(args) => match self.files.read_file(&args.path).await {
                    Ok(content) => content,
                    Err(e) => format!("error: {e}"),
                },
                Err(e) => format!("error: invalid read_file arguments: {e}"),
            },
            other => format!("error: unknown tool: {other}"),
        }
    }
}

#[async_trait]
impl LogAnalyst for ChatAnalyst {
    async fn analyze(&self, log_directory: &str, focus: Severity) -> Result<String> {
        let mut messages = vec![
            json!({ "role": "system", "content": system_prompt(log_directory) }),
            json!({
                "role": "user",
                "content": format!(
                    "Analyze security logs in directory: {log_directory}. Focus on {} severity and above issues. Use the tools to access the log files.",
                    focus.as_str()
                ),
            }),
        ];

        for turn in 0..self.max_tool_turns {
            let message = self.completion(&messages).await?;

            let tool_calls = message
                .get("tool_calls")
                .and_then(|t| t.as_array())
                .cloned()
                .unwrap_or_default();

            if tool_calls.is_empty() {
                return message
                    .get("content")
                    .and_then(|c| c.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| Error::ReasoningProvider("empty final message".into()));
            }

            debug!(turn, calls = tool_calls.len(), "executing tool calls");
            messages.push(message.clone());

            for call in &tool_calls {
                let id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default();
                let name = call
                    .pointer("/function/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let arguments = call
                    .pointer("/function/arguments")
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}");

                let output = self.execute_tool(name, arguments).await;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": output,
                }));
            }
        }

        warn!(max_tool_turns = self.max_tool_turns, "tool-turn budget exhausted");
        Err(Error::ReasoningProvider(format!(
            "no final answer after {} tool turns",
            self.max_tool_turns
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use shareindex_core::files::FileEntry;

    struct EmptyShare;

    #[async_trait]
    impl FileSource for EmptyShare {
        async fn list_files(&self, _directory: &str, _pattern: &str) -> Result<Vec<FileEntry>> {
            Ok(Vec::new())
        }

        async fn read_file(&self, path: &str) -> Result<String> {
            Err(Error::Storage(format!("unreadable: {path}")))
        }
    }

    /// Serve a canned chat-completions reply that always requests another
    /// tool call, counting round trips.
    async fn spawn_looping_endpoint(hits: Arc<AtomicU32>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let body = serde_json::json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call-1",
                            "function": {
                                "name": "list_files",
                                "arguments": "{\"directory\":\"logs\"}"
                            }
                        }]
                    }
                }]
            })
            .to_string();

            while let Ok((mut socket, _)) = listener.accept().await {
                hits.fetch_add(1, Ordering::SeqCst);
                // Drain the request; the JSON body ends with '}'.
                let mut data = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            data.extend_from_slice(&buf[..n]);
                            if data.ends_with(b"}") {
                                break;
                            }
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_tool_turn_cap_bounds_round_trips() {
        let hits = Arc::new(AtomicU32::new(0));
        let base_url = spawn_looping_endpoint(hits.clone()).await;

        let cfg = ReasoningConfig {
            base_url,
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_tool_turns: 3,
        };
        let analyst = ChatAnalyst::new(&cfg, Arc::new(EmptyShare)).unwrap();

        let err = analyst.analyze("logs", Severity::Medium).await.unwrap_err();
        assert_eq!(err.kind(), "reasoning_provider");
        // A model that never stops calling tools gets exactly the cap.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_list_files_args_reject_unknown_fields() {
        let err = serde_json::from_str::<ListFilesArgs>(r#"{"directory":"logs","recursive":true}"#)
            .unwrap_err();
        assert!(err.to_string().contains("recursive"));
    }

    #[test]
    fn test_list_files_pattern_defaults() {
        let args: ListFilesArgs = serde_json::from_str(r#"{"directory":"logs"}"#).unwrap();
        assert_eq!(args.pattern, "*");
    }

    #[test]
    fn test_read_file_args_require_path() {
        assert!(serde_json::from_str::<ReadFileArgs>(r#"{}"#).is_err());
    }
}
