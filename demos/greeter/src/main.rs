//! Greeter Example
//!
//! A small bot showing every kind of skill trigger:
//!
//! - `greeter`: answers "hello" by regex or a greeting intent, with a fallback
//!   for everything else
//! - `heartbeat`: a crontab whose schedule comes from the skill's options
//! - `hooks`: a webhook at `POST /skill/hooks/ping`
//!
//! # Usage
//!
//! ```bash
//! # Serve webhooks and tick crontabs until Ctrl+C
//! cargo run --package greeter -- --config demos/greeter/sprocket.toml
//!
//! # Dispatch a single message and exit
//! cargo run --package greeter -- --config demos/greeter/sprocket.toml --say "hello there"
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use sprocket::prelude::*;
use sprocket::runtime::RuntimeBuilder;

#[derive(Parser, Debug)]
#[command(name = "greeter", about = "A greeting bot on the Sprocket skill engine")]
struct Args {
    /// Configuration file; searched in the current directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Dispatch this message once and exit instead of running.
    #[arg(long)]
    say: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct GreeterOptions {
    #[serde(default = "default_greeting")]
    greeting: String,
}

fn default_greeting() -> String {
    "Hello".to_string()
}

async fn greet(
    Options(options): Options<GreeterOptions>,
    MatchParams(params): MatchParams,
    message: Option<MessageEvent>,
) {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            message
                .as_ref()
                .map(|m| m.sender.as_str())
                .filter(|sender| !sender.is_empty())
        })
        .unwrap_or("friend");
    info!("{}, {name}!", options.greeting);
}

async fn fallback(MessageText(text): MessageText) {
    info!(%text, "Did not understand, try saying hello");
}

async fn heartbeat(FireTime(at): FireTime, config: SkillConfig) {
    info!(skill = %config.name, %at, "Still alive");
}

async fn ping(Payload(payload): Payload) -> Result<()> {
    if payload.get("fail").and_then(Value::as_bool) == Some(true) {
        anyhow::bail!("ping asked to fail");
    }
    info!(%payload, "Pong");
    Ok(())
}

// ============================================================================
// Skill modules
// ============================================================================

fn greeter(r: &mut Registrar) {
    r.regex(r"(?i)^(hello|hi|hey)\b\s*(?P<name>\w+)?", greet);
    r.dialogflow_intent("smalltalk.greetings.hello", greet);
    r.always(fallback);
}

fn heartbeat_module(r: &mut Registrar) {
    let schedule = r
        .current_config()
        .option_as::<String>("schedule")
        .unwrap_or_else(|| "* * * * *".to_string());
    r.crontab(&schedule, heartbeat);
}

fn hooks(r: &mut Registrar) {
    r.webhook("ping", ping);
}

fn builder(args: &Args) -> RuntimeBuilder {
    let mut builder = SprocketRuntime::builder()
        .module(skill_module("greeter", greeter))
        .module(skill_module("heartbeat", heartbeat_module))
        .module(skill_module("hooks", hooks));
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    builder
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = builder(&args).build()?;

    if let Some(text) = args.say {
        let report = runtime.load_skills();
        info!(%report, "Skills ready");

        let event = Event::Message(MessageEvent::new(text).sender("cli"));
        let report = runtime.handle_event(event).await;
        for invocation in &report.invocations {
            info!(
                skill = %invocation.skill_name,
                score = invocation.score,
                outcome = invocation.outcome.as_str(),
                "Dispatched"
            );
        }
        return Ok(());
    }

    runtime.run().await?;
    Ok(())
}
