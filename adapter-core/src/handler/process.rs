use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};

use super::{CallContext, Handler};
use crate::envelope::Payload;
use crate::error::HandlerError;

/// Marker telling the agent to read its prompt from stdin
const STDIN_MARKER: &str = "-";

/// Configuration for the agent process launched per call
#[derive(Clone, Debug)]
pub struct ProcessHandlerConfig {
    /// Program to spawn. Defaults to `codex` (from PATH).
    pub program: PathBuf,
    /// Arguments placed before the per-call `-c` overrides, e.g. a script for an interpreter
    pub leading_args: Vec<String>,
    /// Arguments passed to the program after the overrides. Defaults to a
    /// JSON-emitting `exec` reading the prompt from stdin.
    pub args: Vec<String>,
    /// Kill the process and fail the call after this long (None = no limit)
    pub timeout: Option<Duration>,
}

impl Default for ProcessHandlerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("codex"),
            leading_args: Vec::new(),
            args: vec![
                "exec".to_string(),
                "--json".to_string(),
                "--skip-git-repo-check".to_string(),
                "--dangerously-bypass-approvals-and-sandbox".to_string(),
                STDIN_MARKER.to_string(),
            ],
            timeout: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Instructions {
    base: Option<String>,
    developer: Option<String>,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextFile {
    path: String,
    content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireApi {
    #[default]
    Chat,
    Responses,
    ResponsesWebsocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum SandboxPolicy {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

impl SandboxPolicy {
    fn as_arg(&self) -> &'static str {
        match self {
            SandboxPolicy::ReadOnly => "read-only",
            SandboxPolicy::WorkspaceWrite => "workspace-write",
            SandboxPolicy::DangerFullAccess => "danger-full-access",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderConfig {
    name: String,
    #[serde(default)]
    base_url: Option<String>,
    /// Name of the env var holding the API key
    #[serde(default)]
    env_key: Option<String>,
    #[serde(default)]
    wire_api: WireApi,
    #[serde(default)]
    requires_openai_auth: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct McpServer {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    server_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

/// Per-call agent configuration: model selection, provider, sandbox and MCP servers
#[derive(Debug, Default, Deserialize)]
struct SessionConfig {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    provider: Option<ProviderConfig>,
    #[serde(default)]
    sandbox_policy: Option<SandboxPolicy>,
    #[serde(default)]
    mcp_servers: BTreeMap<String, McpServer>,
}

impl SessionConfig {
    fn model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct RunInput {
    prompt: String,
    #[serde(default)]
    instructions: Instructions,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    context_files: Vec<ContextFile>,
    #[serde(default)]
    session_config: Option<SessionConfig>,
    /// Run in this directory instead of a fresh workspace
    #[serde(default)]
    base_dir: Option<PathBuf>,
}

/// `config.toml` written into `CODEX_HOME`
#[derive(Debug, Serialize)]
struct ConfigFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_provider: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    developer_instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    model_providers: BTreeMap<&'a str, ProviderEntry<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    mcp_servers: BTreeMap<&'a str, &'a McpServer>,
}

#[derive(Debug, Serialize)]
struct ProviderEntry<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<&'a str>,
    wire_api: WireApi,
    #[serde(skip_serializing_if = "Option::is_none")]
    experimental_bearer_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    env_key: Option<&'a str>,
    requires_openai_auth: bool,
}

/// Render the agent's `config.toml`
///
/// When the provider names an `env_key` present in the call's environment,
/// the key is written inline as a bearer token instead of the env reference.
fn generate_config_toml(
    config: &SessionConfig,
    instructions: &Instructions,
    env: &HashMap<String, String>,
) -> Result<String, HandlerError> {
    let mut model_providers = BTreeMap::new();
    if let Some(provider) = &config.provider {
        let token = provider
            .env_key
            .as_ref()
            .and_then(|key| env.get(key))
            .map(String::as_str);
        model_providers.insert(
            provider.name.as_str(),
            ProviderEntry {
                name: &provider.name,
                base_url: provider.base_url.as_deref(),
                wire_api: provider.wire_api,
                experimental_bearer_token: token,
                env_key: provider.env_key.as_deref().filter(|_| token.is_none()),
                requires_openai_auth: provider.requires_openai_auth,
            },
        );
    }

    let file = ConfigFile {
        model: config.model(),
        model_provider: config.provider.as_ref().map(|p| p.name.as_str()),
        instructions: instructions.base.as_deref(),
        developer_instructions: instructions.developer.as_deref(),
        model_providers,
        mcp_servers: config
            .mcp_servers
            .iter()
            .map(|(name, server)| (name.as_str(), server))
            .collect(),
    };

    toml::to_string(&file)
        .map_err(|e| HandlerError::Execution(format!("Failed to render config.toml: {}", e)))
}

/// Runs the agent program once per call in a throwaway workspace
///
/// Stdout lines become `events` (parsed as JSON when they are JSON), stderr
/// lines become `logs`, and the process exit code is reported alongside.
pub struct ProcessHandler {
    config: ProcessHandlerConfig,
}

impl ProcessHandler {
    pub fn new(config: ProcessHandlerConfig) -> Self {
        Self { config }
    }

    /// Full argument list: leading args, `-c` overrides, then the configured
    /// args with any `--sandbox` flag placed before the stdin marker
    fn command_args(&self, session_config: Option<&SessionConfig>) -> Vec<String> {
        let mut args = self.config.leading_args.clone();
        let Some(session_config) = session_config else {
            args.extend(self.config.args.iter().cloned());
            return args;
        };

        if let Some(model) = session_config.model() {
            args.push("-c".to_string());
            args.push(format!("model={}", model));
        }
        if let Some(provider) = &session_config.provider {
            args.push("-c".to_string());
            args.push(format!("model_provider={}", provider.name));
        }

        let mut rest = self.config.args.clone();
        if let Some(policy) = session_config.sandbox_policy {
            let at = match rest.last() {
                Some(last) if last == STDIN_MARKER => rest.len() - 1,
                _ => rest.len(),
            };
            rest.insert(at, policy.as_arg().to_string());
            rest.insert(at, "--sandbox".to_string());
        }
        args.extend(rest);
        args
    }

    async fn run(&self, ctx: &CallContext, input: RunInput) -> Result<Value, HandlerError> {
        let home = TempDir::new()?;
        let work_dir = match &input.base_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => home.path().join("workspace"),
        };
        tokio::fs::create_dir_all(&work_dir).await?;

        if let Some(session_config) = &input.session_config {
            let content = generate_config_toml(session_config, &input.instructions, &input.env)?;
            tokio::fs::write(home.path().join("config.toml"), content).await?;
        }

        write_context_files(&work_dir, &input.context_files).await?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.command_args(input.session_config.as_ref()))
            .current_dir(&work_dir)
            .env("CODEX_HOME", home.path())
            .env("RUST_LOG", "info")
            .envs(&input.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "[{}] - [{}] Starting {} process in {}",
            ctx.request_id,
            ctx.session.session_id,
            self.config.program.display(),
            work_dir.display()
        );

        let mut child = cmd.spawn().map_err(|e| {
            HandlerError::Execution(format!(
                "Failed to spawn {}: {}",
                self.config.program.display(),
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HandlerError::Execution("No stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HandlerError::Execution("No stderr".to_string()))?;

        // Feed stdin while the output is drained, or a chatty child blocks on a full pipe
        let prompt = build_full_prompt(&input.prompt, &input.instructions);
        let writer = child
            .stdin
            .take()
            .map(|stdin| tokio::spawn(write_prompt(stdin, prompt)));

        let logs_task = tokio::spawn(async move {
            let mut logs = Vec::new();
            let mut lines = LossyLines::new(stderr);
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => logs.push(line),
                    Ok(None) => break,
                    Err(e) => {
                        debug!("stderr read failed: {}", e);
                        break;
                    }
                }
            }
            logs
        });

        let mut events = Vec::new();
        let mut lines = LossyLines::new(stdout);
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str::<Value>(&line).unwrap_or(Value::String(line)));
        }

        if let Some(writer) = writer {
            writer
                .await
                .map_err(|e| HandlerError::Execution(format!("stdin writer failed: {}", e)))??;
        }

        let status = child.wait().await?;
        let logs = logs_task
            .await
            .map_err(|e| HandlerError::Execution(format!("stderr reader failed: {}", e)))?;

        info!(
            "[{}] - [{}] Process exited with status: {}",
            ctx.request_id, ctx.session.session_id, status
        );

        Ok(json!({
            "events": events,
            "logs": logs,
            "exit_code": status.code(),
        }))
    }
}

/// Write the prompt and close stdin so the agent sees EOF
async fn write_prompt(mut stdin: ChildStdin, prompt: String) -> Result<(), HandlerError> {
    // A program that never reads its stdin may already be gone
    match stdin.write_all(prompt.as_bytes()).await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e.into()),
        _ => Ok(()),
    }
}

/// Newline-delimited reader that replaces invalid UTF-8 instead of failing
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        if self.buf.ends_with(b"\n") {
            self.buf.pop();
            if self.buf.ends_with(b"\r") {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

#[async_trait]
impl Handler for ProcessHandler {
    async fn handle(&self, ctx: &CallContext, payload: Payload) -> Result<Payload, HandlerError> {
        let input: RunInput = serde_json::from_value(payload.data)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let data = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(ctx, input))
                .await
                .map_err(|_| {
                    HandlerError::Execution(format!("Process timed out after {:?}", limit))
                })??,
            None => self.run(ctx, input).await?,
        };

        Ok(Payload::new(data))
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Instructions first, then the prompt, separated by blank lines
fn build_full_prompt(prompt: &str, instructions: &Instructions) -> String {
    [&instructions.base, &instructions.developer, &instructions.user]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .chain(std::iter::once(prompt))
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn write_context_files(work_dir: &Path, files: &[ContextFile]) -> Result<(), HandlerError> {
    for file in files {
        if file.path.contains("..") || file.path.starts_with('/') {
            warn!("Skipping suspicious file path: {}", file.path);
            continue;
        }
        let path = work_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.content).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_config(value: Value) -> SessionConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_prompt_orders_instructions_before_prompt() {
        let instructions = Instructions {
            base: Some("base".into()),
            developer: None,
            user: Some("user".into()),
        };
        assert_eq!(
            build_full_prompt("do it", &instructions),
            "base\n\nuser\n\ndo it"
        );
        assert_eq!(build_full_prompt("do it", &Instructions::default()), "do it");
    }

    #[test]
    fn test_config_toml_with_provider_and_mcp_servers() {
        let config = session_config(json!({
            "model": "gpt-x",
            "provider": {
                "name": "local",
                "base_url": "http://127.0.0.1:8080/v1",
                "env_key": "LOCAL_KEY",
                "wire_api": "responses"
            },
            "mcp_servers": {
                "files": {"type": "stdio", "command": "mcp-files"},
                "search": {"url": "http://127.0.0.1:9000/mcp"}
            }
        }));
        let instructions = Instructions {
            base: Some("be \"careful\"".into()),
            developer: Some("dev".into()),
            user: None,
        };
        let env = HashMap::from([("LOCAL_KEY".to_string(), "sk-test".to_string())]);

        let rendered = generate_config_toml(&config, &instructions, &env).unwrap();
        let parsed: toml::Value = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed["model"].as_str(), Some("gpt-x"));
        assert_eq!(parsed["model_provider"].as_str(), Some("local"));
        assert_eq!(parsed["instructions"].as_str(), Some("be \"careful\""));
        assert_eq!(parsed["developer_instructions"].as_str(), Some("dev"));

        let provider = &parsed["model_providers"]["local"];
        assert_eq!(provider["name"].as_str(), Some("local"));
        assert_eq!(provider["base_url"].as_str(), Some("http://127.0.0.1:8080/v1"));
        assert_eq!(provider["wire_api"].as_str(), Some("responses"));
        assert_eq!(provider["experimental_bearer_token"].as_str(), Some("sk-test"));
        assert!(provider.get("env_key").is_none());
        assert_eq!(provider["requires_openai_auth"].as_bool(), Some(false));

        assert_eq!(parsed["mcp_servers"]["files"]["type"].as_str(), Some("stdio"));
        assert_eq!(parsed["mcp_servers"]["files"]["command"].as_str(), Some("mcp-files"));
        assert_eq!(
            parsed["mcp_servers"]["search"]["url"].as_str(),
            Some("http://127.0.0.1:9000/mcp")
        );
    }

    #[test]
    fn test_config_toml_keeps_env_key_without_a_value() {
        let config = session_config(json!({
            "provider": {"name": "hosted", "env_key": "HOSTED_KEY"}
        }));
        let rendered =
            generate_config_toml(&config, &Instructions::default(), &HashMap::new()).unwrap();
        let parsed: toml::Value = toml::from_str(&rendered).unwrap();

        assert!(parsed.get("model").is_none());
        let provider = &parsed["model_providers"]["hosted"];
        assert_eq!(provider["env_key"].as_str(), Some("HOSTED_KEY"));
        assert_eq!(provider["wire_api"].as_str(), Some("chat"));
        assert!(provider.get("experimental_bearer_token").is_none());
        assert!(parsed.get("mcp_servers").is_none());
    }

    #[test]
    fn test_command_args_map_session_config() {
        let handler = ProcessHandler::new(ProcessHandlerConfig::default());
        assert_eq!(handler.command_args(None), ProcessHandlerConfig::default().args);

        let config = session_config(json!({
            "model": "gpt-x",
            "provider": {"name": "local"},
            "sandbox_policy": "read-only"
        }));
        assert_eq!(
            handler.command_args(Some(&config)),
            vec![
                "-c",
                "model=gpt-x",
                "-c",
                "model_provider=local",
                "exec",
                "--json",
                "--skip-git-repo-check",
                "--dangerously-bypass-approvals-and-sandbox",
                "--sandbox",
                "read-only",
                "-",
            ]
        );

        // An empty model is no override; without a stdin marker the flag goes last
        let handler = ProcessHandler::new(ProcessHandlerConfig {
            args: vec!["run".to_string()],
            ..Default::default()
        });
        let config = session_config(json!({"model": "", "sandbox_policy": "danger-full-access"}));
        assert_eq!(
            handler.command_args(Some(&config)),
            vec!["run", "--sandbox", "danger-full-access"]
        );
    }

    #[test]
    fn test_unknown_sandbox_policy_is_rejected() {
        let result = serde_json::from_value::<SessionConfig>(json!({"sandbox_policy": "yolo"}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_prompt_is_invalid_payload() {
        let handler = ProcessHandler::new(ProcessHandlerConfig::default());
        let err = handler
            .handle(&tests_support::ctx(), Payload::new(json!({"env": {}})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_unknown_program_is_execution_error() {
        let handler = ProcessHandler::new(ProcessHandlerConfig {
            program: PathBuf::from("definitely-not-a-real-agent-binary"),
            args: vec![],
            ..Default::default()
        });
        let err = handler
            .handle(&tests_support::ctx(), Payload::new(json!({"prompt": "hi"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Execution(_)));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use super::tests_support::ctx;

        fn program(program: &str, args: &[&str]) -> ProcessHandler {
            ProcessHandler::new(ProcessHandlerConfig {
                program: PathBuf::from(program),
                leading_args: vec![],
                args: args.iter().map(|a| a.to_string()).collect(),
                timeout: Some(Duration::from_secs(30)),
            })
        }

        fn shell(script: &str) -> ProcessHandler {
            program("sh", &["-c", script])
        }

        #[tokio::test]
        async fn test_stdout_lines_become_events() {
            let handler = program("cat", &[]);
            let payload = Payload::new(json!({
                "prompt": "{\"type\":\"message\",\"content\":\"hi\"}",
                "instructions": {"base": "be brief"}
            }));

            let out = handler.handle(&ctx(), payload).await.unwrap();
            assert_eq!(out.data["events"][0], json!("be brief"));
            assert_eq!(out.data["events"][1]["type"], "message");
            assert_eq!(out.data["events"].as_array().unwrap().len(), 2);
            assert_eq!(out.data["exit_code"], 0);
        }

        #[tokio::test]
        async fn test_large_prompt_is_streamed_while_output_drains() {
            // Far more than a pipe buffer in both directions
            let prompt = (0..2000)
                .map(|n| format!("{{\"n\":{},\"pad\":\"{}\"}}", n, "x".repeat(190)))
                .collect::<Vec<_>>()
                .join("\n");
            assert!(prompt.len() > 256 * 1024);

            let out = program("cat", &[])
                .handle(&ctx(), Payload::new(json!({"prompt": prompt})))
                .await
                .unwrap();

            let events = out.data["events"].as_array().unwrap();
            assert_eq!(events.len(), 2000);
            assert_eq!(events[0]["n"], 0);
            assert_eq!(events[1999]["n"], 1999);
            assert_eq!(out.data["exit_code"], 0);
        }

        #[tokio::test]
        async fn test_invalid_utf8_output_is_kept_lossily() {
            let handler = shell(
                "echo '{\"a\":1}'; printf '\\377\\n'; echo after; \
                 printf 'bad \\377\\n' 1>&2; echo later 1>&2",
            );
            let out = handler
                .handle(&ctx(), Payload::new(json!({"prompt": "x"})))
                .await
                .unwrap();

            assert_eq!(out.data["events"], json!([{"a": 1}, "\u{fffd}", "after"]));
            assert_eq!(out.data["logs"], json!(["bad \u{fffd}", "later"]));
            assert_eq!(out.data["exit_code"], 0);
        }

        #[tokio::test]
        async fn test_context_files_env_and_stderr() {
            let handler = shell("cat notes/today.txt; echo \"$GREETING\"; echo oops 1>&2; exit 3");
            let payload = Payload::new(json!({
                "prompt": "ignored",
                "env": {"GREETING": "hello"},
                "context_files": [
                    {"path": "notes/today.txt", "content": "from file\n"},
                    {"path": "../escape.txt", "content": "nope"},
                    {"path": "/etc/passwd", "content": "nope"}
                ]
            }));

            let out = handler.handle(&ctx(), payload).await.unwrap();
            assert_eq!(out.data["events"], json!(["from file", "hello"]));
            assert_eq!(out.data["logs"], json!(["oops"]));
            assert_eq!(out.data["exit_code"], 3);
        }

        #[tokio::test]
        async fn test_session_config_reaches_the_agent() {
            // Stand-in agent: echoes its argv, then dumps its config to stderr
            let handler = ProcessHandler::new(ProcessHandlerConfig {
                program: PathBuf::from("sh"),
                leading_args: vec![
                    "-c".to_string(),
                    "printf '%s\\n' \"$@\"; echo \"log=$RUST_LOG\"; cat ctx.txt; \
                     cat \"$CODEX_HOME/config.toml\" 1>&2"
                        .to_string(),
                    "fake-codex".to_string(),
                ],
                args: vec!["exec".to_string(), "-".to_string()],
                timeout: Some(Duration::from_secs(30)),
            });
            let base_dir = TempDir::new().unwrap();
            let payload = Payload::new(json!({
                "prompt": "hi",
                "env": {"LOCAL_KEY": "sk-test"},
                "base_dir": base_dir.path(),
                "context_files": [{"path": "ctx.txt", "content": "in base dir\n"}],
                "session_config": {
                    "model": "gpt-x",
                    "provider": {"name": "local", "env_key": "LOCAL_KEY"},
                    "sandbox_policy": "workspace-write",
                    "mcp_servers": {"files": {"command": "mcp-files"}}
                }
            }));

            let out = handler.handle(&ctx(), payload).await.unwrap();
            assert_eq!(
                out.data["events"],
                json!([
                    "-c",
                    "model=gpt-x",
                    "-c",
                    "model_provider=local",
                    "exec",
                    "--sandbox",
                    "workspace-write",
                    "-",
                    "log=info",
                    "in base dir"
                ])
            );
            assert!(base_dir.path().join("ctx.txt").exists());

            let logs: Vec<String> = serde_json::from_value(out.data["logs"].clone()).unwrap();
            let written: toml::Value = toml::from_str(&logs.join("\n")).unwrap();
            assert_eq!(written["model"].as_str(), Some("gpt-x"));
            assert_eq!(
                written["model_providers"]["local"]["experimental_bearer_token"].as_str(),
                Some("sk-test")
            );
            assert_eq!(
                written["mcp_servers"]["files"]["command"].as_str(),
                Some("mcp-files")
            );
        }

        #[tokio::test]
        async fn test_timeout_fails_the_call() {
            let handler = ProcessHandler::new(ProcessHandlerConfig {
                program: PathBuf::from("sh"),
                leading_args: vec![],
                args: vec!["-c".to_string(), "sleep 5".to_string()],
                timeout: Some(Duration::from_millis(100)),
            });
            let err = handler
                .handle(&ctx(), Payload::new(json!({"prompt": "x"})))
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::Execution(_)));
        }
    }

    mod tests_support {
        use crate::handler::CallContext;
        use crate::session::{SessionSnapshot, SessionState};
        use chrono::Utc;

        pub fn ctx() -> CallContext {
            let now = Utc::now();
            CallContext {
                request_id: "req-1".to_string(),
                session: SessionSnapshot {
                    session_id: "sess-1".to_string(),
                    state: SessionState::Active,
                    created_at: now,
                    last_active_at: now,
                    ended_at: None,
                    request_count: 1,
                },
            }
        }
    }
}
