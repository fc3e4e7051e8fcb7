/// Executors that call out of the engine: action, notification, webhook, script
///
/// Node data is interpolated against the context before it is handed to a
/// collaborator, so `{{variables.x}}` placeholders work in every field.

use super::parse_config;
use crate::runtime::executor::{NodeExecutor, NodeOutput, NodeScope};
use crate::services::{
    AutomationRules, HttpClient, HttpRequest, Notification, Notifier, ScriptRequest, ScriptSandbox,
};
use crate::workflow::types::Node;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionConfig {
    #[serde(alias = "type")]
    action_type: String,
    #[serde(default)]
    parameters: Value,
}

/// Dispatches to the automation-rule collaborator and echoes the request
pub struct ActionExecutor {
    rules: Arc<dyn AutomationRules>,
}

impl ActionExecutor {
    pub fn new(rules: Arc<dyn AutomationRules>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl NodeExecutor for ActionExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let data = scope.context.interpolate(&node.data)?;
        let config: ActionConfig = parse_config(node, &data)?;

        scope.logger.info(format!("⚡ Executing action: {}", config.action_type));
        let result = self.rules.dispatch(&config.action_type, &config.parameters).await?;

        Ok(json!({
            "actionType": config.action_type,
            "parameters": config.parameters,
            "executed": true,
            "result": result,
        })
        .into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationConfig {
    recipients: Vec<String>,
    message: String,
    #[serde(rename = "type", alias = "channel", default = "default_channel")]
    channel: String,
    #[serde(default)]
    subject: Option<String>,
}

fn default_channel() -> String {
    "in_app".to_string()
}

pub struct NotificationExecutor {
    notifier: Arc<dyn Notifier>,
}

impl NotificationExecutor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl NodeExecutor for NotificationExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let data = scope.context.interpolate(&node.data)?;
        let config: NotificationConfig = parse_config(node, &data)?;

        let receipt = self
            .notifier
            .send(Notification {
                recipients: config.recipients.clone(),
                message: config.message.clone(),
                channel: config.channel.clone(),
                subject: config.subject,
            })
            .await?;

        scope.logger.info(format!(
            "📣 Notification sent via {} to {} recipient(s)",
            config.channel, receipt.delivered_to
        ));

        Ok(json!({
            "sent": true,
            "notificationId": receipt.id,
            "type": config.channel,
            "recipients": config.recipients,
            "message": config.message,
            "sentAt": receipt.sent_at,
        })
        .into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Issues an HTTP call; transport failures land in the output, not as errors
pub struct WebhookExecutor {
    http: Arc<dyn HttpClient>,
    max_timeout_ms: u64,
}

impl WebhookExecutor {
    pub fn new(http: Arc<dyn HttpClient>, max_timeout_ms: u64) -> Self {
        Self { http, max_timeout_ms }
    }
}

#[async_trait]
impl NodeExecutor for WebhookExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let data = scope.context.interpolate(&node.data)?;
        let config: WebhookConfig = parse_config(node, &data)?;
        let timeout_ms = config
            .timeout_ms
            .unwrap_or(self.max_timeout_ms)
            .min(self.max_timeout_ms);

        scope.logger.info(format!(
            "🌍 Webhook {} {} (timeout {} ms)",
            config.method, config.url, timeout_ms
        ));

        let request = HttpRequest {
            method: config.method.clone(),
            url: config.url.clone(),
            headers: config.headers,
            body: config.body,
            timeout: Duration::from_millis(timeout_ms),
        };

        let sent = tokio::time::timeout(Duration::from_millis(timeout_ms), self.http.send(request))
            .await
            .unwrap_or_else(|_| Err(anyhow!("Webhook timed out after {} ms", timeout_ms)));

        let output = match sent {
            Ok(response) => {
                if !response.is_success() {
                    scope
                        .logger
                        .warn(format!("⚠️ Webhook responded with status {}", response.status));
                }
                json!({
                    "success": response.is_success(),
                    "status": response.status,
                    "headers": response.headers,
                    "body": response.body,
                    "url": config.url,
                    "method": config.method,
                })
            }
            Err(e) => {
                scope.logger.warn(format!("❌ Webhook call failed: {}", e));
                json!({
                    "success": false,
                    "error": e.to_string(),
                    "url": config.url,
                    "method": config.method,
                })
            }
        };

        Ok(output.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptConfig {
    #[serde(default = "default_language")]
    language: String,
    #[serde(alias = "script")]
    code: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

fn default_language() -> String {
    "lua".to_string()
}

/// Runs code in the script sandbox; a non-zero exit code fails the node
pub struct ScriptExecutor {
    sandbox: Arc<dyn ScriptSandbox>,
    default_timeout_ms: u64,
}

impl ScriptExecutor {
    pub fn new(sandbox: Arc<dyn ScriptSandbox>, default_timeout_ms: u64) -> Self {
        Self {
            sandbox,
            default_timeout_ms,
        }
    }
}

#[async_trait]
impl NodeExecutor for ScriptExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        // Code is passed verbatim; scripts read the context through `input`
        let config: ScriptConfig = parse_config(node, &node.data)?;
        let timeout_ms = config.timeout_ms.unwrap_or(self.default_timeout_ms);

        let input = json!({
            "variables": scope.context.variables,
            "tasks": scope.context.tasks,
            "userId": scope.context.user_id,
            "environment": scope.context.environment,
            "executionId": scope.execution_id,
            "workflowId": scope.workflow_id,
        });

        scope
            .logger
            .info(format!("🧠 Running {} script (timeout {} ms)", config.language, timeout_ms));

        let timeout = Duration::from_millis(timeout_ms);
        let run = self.sandbox.run(ScriptRequest {
            language: config.language,
            code: config.code,
            input,
            timeout,
        });
        let outcome = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| anyhow!("Script timed out after {} ms", timeout_ms))??;

        for line in &outcome.stdout {
            scope.logger.debug(format!("📤 {}", line));
        }

        if outcome.exit_code != 0 {
            return Err(anyhow!(
                "Script exited with code {}: {}",
                outcome.exit_code,
                outcome.error.as_deref().unwrap_or("no error message")
            ));
        }

        Ok(json!({
            "result": outcome.result,
            "exitCode": outcome.exit_code,
            "stdout": outcome.stdout,
            "durationMs": outcome.duration_ms,
        })
        .into())
    }
}
