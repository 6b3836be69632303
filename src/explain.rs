// enveye is a tool for comparing application environment snapshots
// Copyright (C) 2025  Peoples Grocers LLC
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// To purchase a license under different terms contact admin@peoplesgrocers.com
// To request changes, report bugs, or give user feedback contact
// marxism@peoplesgrocers.com
//

//! Natural-language explanations of a diff report.
//!
//! The serialized report is substituted verbatim into a fixed prompt and
//! handed to an [`ExplanationProvider`]; nothing else about the snapshots
//! reaches the provider.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::report::DiffReport;
use serde_json::{json, Value};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant specialized in IT systems and QA testing.";

pub const NO_DIFFERENCES: &str = "No differences found between the two snapshots.";

const PROMPT_TEMPLATE: &str = r#"
You are a helpful assistant specialized in IT system configuration comparisons.
Given the following structured diff between two environment snapshots, do the following:

1. List each DLL file that changed, added, or removed, mentioning the file name and old/new version.
2. List services that were stopped, missing, or started.
3. List environment variables that changed.
4. Provide findings as bullet points, one finding per line.
5. Be detailed but concise.
6. Do NOT repeat generic summary, focus on concrete facts.

Each difference has a "kind" (added, removed, value_changed, type_changed,
sequence_item_added, sequence_item_removed) and a "path" written as a JSON
Pointer into the snapshot.

Here is the diff data:
{diff}
"#;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub trait ExplanationProvider {
    fn name(&self) -> &str;

    fn complete(&self, system: &str, prompt: &str) -> Result<String, Diagnostic>;
}

pub fn build_prompt(report: &DiffReport) -> Result<String, Diagnostic> {
    let serialized = report.to_json_pretty()?;
    Ok(PROMPT_TEMPLATE.replace("{diff}", &serialized))
}

/// Asks `provider` to explain `report`. An empty report is answered locally.
pub fn explain(report: &DiffReport, provider: &dyn ExplanationProvider) -> Result<String, Diagnostic> {
    if report.is_empty() {
        return Ok(NO_DIFFERENCES.to_string());
    }

    let prompt = build_prompt(report)?;
    let start = Instant::now();
    let text = provider.complete(SYSTEM_PROMPT, &prompt)?;

    tracing::info!(
        provider = provider.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        prompt_bytes = prompt.len(),
        response_bytes = text.len(),
        "explanation complete"
    );

    Ok(text.trim().to_string())
}

/// Like [`explain`], but only builds a provider from `config` once there is
/// something to explain.
pub fn explain_with_config(report: &DiffReport, config: ProviderConfig) -> Result<String, Diagnostic> {
    if report.is_empty() {
        return Ok(NO_DIFFERENCES.to_string());
    }

    let provider = config.into_provider()?;
    explain(report, provider.as_ref())
}

/// Provider settings. Each field falls back to an environment variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub command: Option<String>,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.5,
            max_tokens: 500,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            command: non_empty("ENVEYE_LLM_COMMAND"),
            base_url: non_empty("ENVEYE_LLM_URL").unwrap_or(defaults.base_url),
            api_key: non_empty("OPENAI_API_KEY"),
            model: non_empty("ENVEYE_LLM_MODEL").unwrap_or(defaults.model),
            ..defaults
        }
    }

    /// A local command wins over HTTP. The public endpoint needs a key; a
    /// self-hosted `ENVEYE_LLM_URL` may not.
    pub fn into_provider(self) -> Result<Box<dyn ExplanationProvider>, Diagnostic> {
        if let Some(command) = self.command {
            return Ok(Box::new(CommandProvider::new(command)?));
        }

        if self.api_key.is_none() && self.base_url == DEFAULT_BASE_URL {
            return Err(Diagnostic::fatal(
                DiagnosticCode::ProviderMisconfigured,
                "I need an API key to ask for an explanation, but OPENAI_API_KEY is not set."
                    .to_string(),
            )
            .with_advice(
                "Set OPENAI_API_KEY, point ENVEYE_LLM_URL at a compatible server, \
                 or set ENVEYE_LLM_COMMAND to a local command that reads a prompt on stdin."
                    .to_string(),
            ));
        }

        Ok(Box::new(OpenAiProvider { config: self }))
    }
}

/// Chat-completions endpoint speaking the OpenAI wire format.
pub struct OpenAiProvider {
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn request_body(&self, system: &str, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }
}

impl ExplanationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, Diagnostic> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.config.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let mut request = agent.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let mut response = request
            .send_json(self.request_body(system, prompt))
            .map_err(|e| {
                Diagnostic::fatal(
                    DiagnosticCode::ExplanationFailed,
                    format!("I couldn't get an explanation from {}: {}", url, e),
                )
            })?;

        let status = response.status();
        let body: Result<Value, _> = response.body_mut().read_json();

        if !status.is_success() {
            return Err(status_error(&url, status.as_u16(), body.ok().as_ref()));
        }

        let body = body.map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::ExplanationFailed,
                format!("I couldn't read the response from {} as JSON: {}", url, e),
            )
        })?;

        parse_chat_response(&body)
    }
}

/// Error replies carry their reason in `error.message`.
fn status_error(url: &str, status: u16, body: Option<&Value>) -> Diagnostic {
    let reason = body
        .and_then(|b| b.pointer("/error/message"))
        .and_then(Value::as_str)
        .unwrap_or("no error message in the response");

    let diagnostic = Diagnostic::fatal(
        DiagnosticCode::ExplanationFailed,
        format!("{} answered with HTTP status {}: {}", url, status, reason),
    );

    match status {
        401 | 403 => diagnostic.with_advice("Check the key in OPENAI_API_KEY.".to_string()),
        _ => diagnostic,
    }
}

pub fn parse_chat_response(body: &Value) -> Result<String, Diagnostic> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(Diagnostic::fatal(
            DiagnosticCode::ExplanationFailed,
            format!("The explanation service returned an error: {}", message),
        ));
    }

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Diagnostic::fatal(
                DiagnosticCode::ExplanationFailed,
                "The explanation service answered without any message content.".to_string(),
            )
        })
}

/// Runs a local command with the prompt on stdin and takes stdout as the
/// explanation.
pub struct CommandProvider {
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(command: String) -> Result<Self, Diagnostic> {
        let args = shell_words::split(&command).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::ProviderMisconfigured,
                format!("I couldn't parse the explanation command '{}': {}", command, e),
            )
        })?;

        if args.is_empty() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::ProviderMisconfigured,
                "The explanation command is empty.".to_string(),
            ));
        }

        Ok(Self { args })
    }
}

impl ExplanationProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.args[0]
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, Diagnostic> {
        let failed = |what: &str, e: std::io::Error| {
            Diagnostic::fatal(
                DiagnosticCode::ExplanationFailed,
                format!("I couldn't {} '{}': {}", what, self.args[0], e),
            )
        };

        let mut child = Command::new(&self.args[0])
            .args(&self.args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed("start the explanation command", e))?;

        // Written from its own thread so a long prompt can't deadlock against
        // unread output.
        let input = format!("{}\n\n{}", system, prompt);
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| failed("wait for", e))?;

        if let Some(Ok(Err(e))) = writer.map(|handle| handle.join()) {
            return Err(failed("write the prompt to", e));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Diagnostic::fatal(
                DiagnosticCode::ExplanationFailed,
                format!(
                    "The explanation command failed with status {}: {}",
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
