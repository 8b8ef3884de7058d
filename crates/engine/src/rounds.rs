//! Tool-call resolution for one round.
//!
//! Takes the tool calls an assistant message requested, validates all
//! of them up front, runs the executors concurrently, and produces the
//! tool-role follow-up messages in the original call order. Validation
//! failures (unparsable arguments, unknown tool) abort the whole round
//! before anything runs; executor failures do not — they are captured
//! per call and fed back to the model as text.

use crate::options::{ToolCallHook, ToolResultHook};
use futures::future::join_all;
use std::sync::Arc;
use tabletalk_core::error::EngineError;
use tabletalk_core::message::{Message, MessageToolCall};
use tabletalk_core::tool::{Tool, ToolCall, ToolCallResult, ToolOutcome, ToolRegistry};
use tracing::{debug, warn};

/// Resolves one round of tool calls against a registry.
pub struct ToolCallResolver {
    registry: ToolRegistry,
}

impl ToolCallResolver {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every call and return one tool-role message per call,
    /// in call order, each correlated by call id.
    pub async fn resolve(
        &self,
        calls: &[MessageToolCall],
        on_call: Option<&ToolCallHook>,
        on_result: Option<&ToolResultHook>,
    ) -> Result<Vec<Message>, EngineError> {
        // Validate everything before running anything, so a malformed
        // call never leaves half a round executed.
        let mut validated: Vec<(ToolCall, Arc<dyn Tool>)> = Vec::with_capacity(calls.len());
        for call in calls {
            let parsed = parse_call(call)?;
            let tool = self
                .registry
                .get(&parsed.name)
                .ok_or_else(|| EngineError::UnknownTool {
                    call_id: parsed.id.clone(),
                    name: parsed.name.clone(),
                })?;
            validated.push((parsed, Arc::clone(tool)));
        }

        debug!(calls = validated.len(), "Executing tool round");
        let executions = validated.into_iter().map(|(call, tool)| async move {
            // Per call: pre-call hook, then that call's executor
            if let Some(hook) = on_call {
                hook(&call);
            }
            let outcome = match tool.execute(call.arguments.clone()).await {
                Ok(output) => ToolOutcome::Value(output),
                Err(error) => {
                    warn!(tool = %call.name, call_id = %call.id, %error, "Tool execution failed");
                    ToolOutcome::Error(format!("Error: {error}"))
                }
            };
            ToolCallResult {
                call_id: call.id,
                name: call.name,
                arguments: call.arguments,
                outcome,
            }
        });
        let results = join_all(executions).await;

        let mut messages = Vec::with_capacity(results.len());
        for result in results {
            if let Some(hook) = on_result {
                hook(&result);
            }
            messages.push(Message::tool_result(
                result.call_id.clone(),
                result.content(),
            ));
        }
        Ok(messages)
    }
}

/// Parse a raw provider tool call into an executable one.
///
/// An empty argument string means "no arguments" and parses as `{}`;
/// anything else must be valid JSON.
fn parse_call(call: &MessageToolCall) -> Result<ToolCall, EngineError> {
    if call.name.is_empty() {
        return Err(EngineError::MalformedToolCall {
            call_id: call.id.clone(),
            reason: "missing tool name".into(),
        });
    }
    let arguments = if call.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(&call.arguments).map_err(|e| EngineError::MalformedToolCall {
            call_id: call.id.clone(),
            reason: format!("unparsable arguments: {e}"),
        })?
    };
    Ok(ToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tabletalk_core::error::ToolError;
    use tabletalk_core::message::Role;
    use tabletalk_core::tool::ToolOutput;
    use tokio::time::{sleep, Duration};

    struct WeatherTool;

    #[async_trait]
    impl Tool for WeatherTool {
        fn name(&self) -> &str {
            "get_weather"
        }
        fn description(&self) -> &str {
            "Look up current weather for a city"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("15C"))
        }
    }

    struct SlowTool {
        delay_ms: u64,
        log: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            self.tag
        }
        fn description(&self) -> &str {
            "sleeps then answers"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            sleep(Duration::from_millis(self.delay_ms)).await;
            self.log.lock().unwrap().push(self.tag);
            Ok(ToolOutput::text(self.tag))
        }
    }

    struct TracedTool {
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    }

    #[async_trait]
    impl Tool for TracedTool {
        fn name(&self) -> &str {
            self.tag
        }
        fn description(&self) -> &str {
            "records when its executor starts"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            self.log.lock().unwrap().push(format!("exec {}", self.tag));
            Ok(ToolOutput::text(self.tag))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "no backend".into(),
            })
        }
    }

    fn registry(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_all(tools);
        registry
    }

    fn call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn result_message_correlates_by_call_id() {
        let resolver = ToolCallResolver::new(registry(vec![Arc::new(WeatherTool)]));
        let messages = resolver
            .resolve(&[call("c1", "get_weather", "{\"city\":\"Oslo\"}")], None, None)
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Tool);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[0].content, "15C");
    }

    #[tokio::test]
    async fn results_come_back_in_call_order_despite_timing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ToolCallResolver::new(registry(vec![
            Arc::new(SlowTool {
                delay_ms: 40,
                log: Arc::clone(&log),
                tag: "slow",
            }),
            Arc::new(SlowTool {
                delay_ms: 5,
                log: Arc::clone(&log),
                tag: "fast",
            }),
        ]));

        let messages = resolver
            .resolve(&[call("c1", "slow", "{}"), call("c2", "fast", "{}")], None, None)
            .await
            .unwrap();

        // Finished fast-first, answered in call order
        assert_eq!(*log.lock().unwrap(), vec!["fast", "slow"]);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn executor_failure_becomes_tool_text() {
        let resolver = ToolCallResolver::new(registry(vec![Arc::new(FailingTool)]));
        let messages = resolver
            .resolve(&[call("c1", "broken", "{}")], None, None)
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Error:"));
        assert!(messages[0].content.contains("no backend"));
    }

    #[tokio::test]
    async fn unknown_tool_aborts_before_any_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ToolCallResolver::new(registry(vec![Arc::new(SlowTool {
            delay_ms: 0,
            log: Arc::clone(&log),
            tag: "slow",
        })]));

        let error = resolver
            .resolve(
                &[call("c1", "slow", "{}"), call("c2", "nope", "{}")],
                None,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(error, EngineError::UnknownTool { ref name, .. } if name == "nope"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparsable_arguments_are_fatal() {
        let resolver = ToolCallResolver::new(registry(vec![Arc::new(WeatherTool)]));
        let error = resolver
            .resolve(&[call("c1", "get_weather", "{not json")], None, None)
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::MalformedToolCall { .. }));
    }

    #[tokio::test]
    async fn empty_arguments_parse_as_empty_object() {
        let resolver = ToolCallResolver::new(registry(vec![Arc::new(WeatherTool)]));
        let messages = resolver
            .resolve(&[call("c1", "get_weather", "")], None, None)
            .await
            .unwrap();
        assert_eq!(messages[0].content, "15C");
    }

    #[tokio::test]
    async fn hooks_fire_before_and_after() {
        let before = Arc::new(Mutex::new(Vec::new()));
        let after = Arc::new(Mutex::new(Vec::new()));

        let seen_before = Arc::clone(&before);
        let on_call: ToolCallHook = Arc::new(move |c| {
            seen_before.lock().unwrap().push(c.id.clone());
        });
        let seen_after = Arc::clone(&after);
        let on_result: ToolResultHook = Arc::new(move |r| {
            seen_after.lock().unwrap().push((r.call_id.clone(), r.is_success()));
        });

        let resolver = ToolCallResolver::new(registry(vec![Arc::new(WeatherTool)]));
        resolver
            .resolve(
                &[call("c1", "get_weather", "{}")],
                Some(&on_call),
                Some(&on_result),
            )
            .await
            .unwrap();

        assert_eq!(*before.lock().unwrap(), vec!["c1".to_string()]);
        assert_eq!(*after.lock().unwrap(), vec![("c1".to_string(), true)]);
    }

    #[tokio::test]
    async fn pre_call_hook_fires_immediately_before_its_own_executor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        let on_call: ToolCallHook = Arc::new(move |c| {
            seen.lock().unwrap().push(format!("hook {}", c.id));
        });

        let resolver = ToolCallResolver::new(registry(vec![
            Arc::new(TracedTool {
                log: Arc::clone(&log),
                tag: "alpha",
            }),
            Arc::new(TracedTool {
                log: Arc::clone(&log),
                tag: "beta",
            }),
        ]));

        resolver
            .resolve(
                &[call("c1", "alpha", "{}"), call("c2", "beta", "{}")],
                Some(&on_call),
                None,
            )
            .await
            .unwrap();

        // Each hook directly precedes its own executor, never batched
        // ahead of the whole round.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["hook c1", "exec alpha", "hook c2", "exec beta"]
        );
    }
}
