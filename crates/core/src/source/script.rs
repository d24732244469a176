//! Probability source backed by an external script.
//!
//! The script is invoked as
//! `[interpreter] <script> --lat <float> --lon <float> --date <YYYY-MM-DD>`
//! and must print one JSON document. stdout is the canonical channel:
//!
//! 1. the whole trimmed stdout is parsed as JSON;
//! 2. failing that, the last non-empty stdout line is parsed (scripts often
//!    print warnings before their result);
//! 3. failing that, stdout from the last line starting with `{` to the end is
//!    parsed, which finds pretty-printed JSON after warning lines;
//! 4. only if stdout yields nothing, stderr is used when it parses as a
//!    JSON object.
//!
//! The exit code is consulted only when no JSON was found.

use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;

use super::{excerpt, payload_from_json, ProbabilitySource, SourceError, WeatherQuery};
use crate::probabilities::ProbabilityPayload;
use crate::scripting::executor::{ScriptError, ScriptInput, ScriptOutput};
use crate::scripting::subprocess;

/// Default wall-clock limit for one script run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest stdout excerpt carried in a malformed-output message.
const STDOUT_EXCERPT_CHARS: usize = 200;

/// Runs an external probability script.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    /// Program used to run the script (e.g. `python3`); `None` executes the
    /// script directly.
    interpreter: Option<String>,
    script_path: String,
    working_directory: Option<String>,
    env_vars: Vec<(String, String)>,
    timeout: Duration,
}

impl ScriptSource {
    /// A source that executes `script_path` directly with the default timeout.
    pub fn new(script_path: impl Into<String>) -> Self {
        Self {
            interpreter: None,
            script_path: script_path.into(),
            working_directory: None,
            env_vars: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    /// Command-line arguments for `query`.
    pub fn arguments(query: &WeatherQuery) -> Vec<String> {
        vec![
            "--lat".to_string(),
            query.latitude.to_string(),
            "--lon".to_string(),
            query.longitude.to_string(),
            "--date".to_string(),
            query.date_string(),
        ]
    }

    fn command(&self) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.script_path);
                cmd
            }
            None => Command::new(&self.script_path),
        }
    }

    async fn run(&self, query: &WeatherQuery) -> Result<ScriptOutput, ScriptError> {
        if tokio::fs::metadata(&self.script_path).await.is_err() {
            return Err(ScriptError::NotFound(self.script_path.clone()));
        }

        let input = ScriptInput {
            args: Self::arguments(query),
            env_vars: self.env_vars.clone(),
            working_directory: self.working_directory.clone(),
            timeout: self.timeout,
        };
        subprocess::run_command(&mut self.command(), input).await
    }
}

impl ProbabilitySource for ScriptSource {
    async fn fetch(&self, query: &WeatherQuery) -> Result<ProbabilityPayload, SourceError> {
        tracing::debug!(
            script = %self.script_path,
            lat = query.latitude,
            lon = query.longitude,
            date = %query.date_string(),
            "Invoking probability script",
        );

        let output = self.run(query).await.map_err(SourceError::from)?;

        if !output.success() {
            tracing::debug!(
                exit_code = output.exit_code,
                "Probability script exited with non-zero status",
            );
        }

        interpret_output(&output)
    }
}

impl From<ScriptError> for SourceError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::NotFound(path) => SourceError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("script not found: {path}"),
            )),
            ScriptError::Timeout { elapsed_ms } => SourceError::Timeout { elapsed_ms },
            ScriptError::IoError(e) => SourceError::Spawn(e),
        }
    }
}

/// Turn captured process output into a payload or a classified error.
pub fn interpret_output(output: &ScriptOutput) -> Result<ProbabilityPayload, SourceError> {
    if let Some(document) = json_from_stdout(&output.stdout) {
        return payload_from_json(document);
    }
    if let Some(document) = json_object_from(&output.stderr) {
        return payload_from_json(document);
    }

    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        return Err(SourceError::EmptyOutput {
            exit_code: output.exit_code,
            stderr: output.stderr.clone(),
        });
    }

    Err(SourceError::Malformed(format!(
        "exit code {}, stdout is not JSON: {}",
        output.exit_code,
        excerpt(stdout, STDOUT_EXCERPT_CHARS)
    )))
}

fn json_from_stdout(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let last_line = trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| serde_json::from_str(line).ok());
    last_line.or_else(|| trailing_object(trimmed))
}

/// Parse from the last line that opens an object through to the end.
fn trailing_object(stdout: &str) -> Option<Value> {
    let mut offset = stdout.len();
    for line in stdout.lines().rev() {
        // `lines()` drops `\n` (and `\r`); walk back over the line and its break.
        offset = offset.saturating_sub(line.len());
        if line.trim_start().starts_with('{') {
            if let Ok(value) = serde_json::from_str(&stdout[offset..]) {
                return Some(value);
            }
        }
        offset = offset.saturating_sub(1);
        if stdout[..offset].ends_with('\r') {
            offset -= 1;
        }
    }
    None
}

fn json_object_from(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(Value::is_object)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
