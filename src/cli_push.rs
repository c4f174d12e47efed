//! Command-line notification sender.
//!
//! Posts one notification to a running NotifyHub server and reports the
//! outcome on stdout. The message comes from the arguments, or from stdin
//! when none are given.

use clap::Parser;
use serde_json::{json, Value};
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(about = "Send a notification to a NotifyHub server")]
struct CliArgs {
    /// Notification message (reads from stdin if not provided)
    pub message: Vec<String>,

    /// NotifyHub host
    #[clap(long, default_value = "localhost")]
    pub host: String,

    /// NotifyHub port
    #[clap(long, default_value_t = 9080)]
    pub port: u16,

    /// HTTP proxy
    #[clap(long, default_value = "")]
    pub proxy: String,

    /// Custom notification id
    #[clap(long)]
    pub id: Option<String>,

    /// Verbosity level (0 silences the success line)
    #[clap(long, default_value_t = 1)]
    pub verbose: u8,

    /// Show what would be sent without actually sending
    #[clap(long)]
    pub dry_run: bool,
}

fn read_message(args: &CliArgs) -> String {
    if !args.message.is_empty() {
        return args.message.join(" ");
    }
    let mut buffer = String::new();
    let _ = std::io::stdin().read_to_string(&mut buffer);
    buffer.trim().to_string()
}

fn build_payload(args: &CliArgs, message: &str) -> Value {
    let pwd = std::env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut payload = json!({ "data": { "pwd": pwd, "message": message } });
    if let Some(ref id) = args.id {
        payload["id"] = json!(id);
    }
    payload
}

fn send(address: &str, payload: &Value, proxy: &str) -> Result<Value, String> {
    let mut builder = reqwest::blocking::Client::builder().timeout(Duration::from_secs(5));
    if !proxy.is_empty() {
        let proxy =
            reqwest::Proxy::all(proxy).map_err(|e| format!("Invalid proxy address: {}", e))?;
        builder = builder.proxy(proxy);
    }
    let client = builder
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let response = client
        .post(format!("{}/api/notify", address))
        .json(payload)
        .send()
        .map_err(|_| format!("Network error: Failed to connect to {}", address))?;

    response
        .json()
        .map_err(|e| format!("Unexpected response: {}", e))
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let message = read_message(&args);
    if message.is_empty() {
        eprintln!("✗ No message given (pass it as an argument or on stdin)");
        return ExitCode::FAILURE;
    }

    let address = std::env::var("NOTIFYHUB_ADDRESS")
        .unwrap_or_else(|_| format!("http://{}:{}", args.host, args.port))
        .trim_end_matches('/')
        .to_string();
    let payload = build_payload(&args, &message);

    if args.dry_run {
        println!("Dry run: Would send notification to {}", address);
        println!("Payload: {}", serde_json::to_string_pretty(&payload).unwrap());
        return ExitCode::SUCCESS;
    }

    match send(&address, &payload, &args.proxy) {
        Ok(body) if body.get("success").and_then(Value::as_bool) == Some(true) => {
            if args.verbose != 0 {
                println!("✓ Notification sent successfully");
            }
            ExitCode::SUCCESS
        }
        Ok(body) => {
            match body.get("error").and_then(Value::as_array) {
                Some(errors) => {
                    println!("✗ Backend validation error:");
                    for error in errors {
                        println!("{}", error.as_str().unwrap_or(&error.to_string()));
                    }
                }
                None => println!("✗ Unexpected response: {}", body),
            }
            ExitCode::FAILURE
        }
        Err(message) => {
            println!("✗ {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("notifyhub-push").chain(argv.iter().copied()))
    }

    #[test]
    fn joins_positional_words_into_one_message() {
        let args = args(&["Build", "finished"]);
        assert_eq!(read_message(&args), "Build finished");
    }

    #[test]
    fn payload_carries_message_pwd_and_optional_id() {
        let args = args(&["--id", "n-1", "hello"]);
        let payload = build_payload(&args, "hello");
        assert_eq!(payload["data"]["message"], "hello");
        assert!(payload["data"]["pwd"].is_string());
        assert_eq!(payload["id"], "n-1");

        let args = self::args(&["hello"]);
        let payload = build_payload(&args, "hello");
        assert!(payload.get("id").is_none());
    }
}
