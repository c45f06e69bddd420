use std::env;
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};

use fellah_cli::commands::{chat, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("FELLAH_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failure() {
    with_env(&[("FELLAH_DATABASE_MAX_CONNECTIONS", "many")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("FELLAH_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");
        assert!(first_payload["message"]
            .as_str()
            .unwrap_or_default()
            .starts_with("demo marketplace loaded: 5 products, 4 farmers, 2 clients"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(first_payload["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn chat_answers_each_line_until_quit() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("FELLAH_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed before chatting");

        let mut transcript = Vec::new();
        let input = Cursor::new("bonjour\n\ntomate 3\n/quit\nnot read\n");
        let result = chat::run_with_io(1, "french", input, &mut transcript);

        assert_eq!(result.exit_code, 0, "unexpected outcome: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["message"], "conversation ended after 2 messages");

        let transcript = String::from_utf8(transcript).expect("utf-8 transcript");
        assert!(transcript.starts_with("client 1 (french), type /quit to leave"));
        assert!(transcript.contains("Quel produit souhaitez-vous commander ?"));
        assert!(transcript.contains("Voici les agriculteurs disponibles pour 3kg"));
        assert!(transcript.contains("1. Hassan"));
    });
}

#[test]
fn chat_rejects_unknown_language() {
    with_env(&[("FELLAH_DATABASE_URL", "sqlite::memory:")], || {
        let result = chat::run_with_io(1, "klingon", Cursor::new(""), Vec::new());

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("fellah.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "FELLAH_DATABASE_URL",
        "FELLAH_DATABASE_MAX_CONNECTIONS",
        "FELLAH_DATABASE_TIMEOUT_SECS",
        "FELLAH_LLM_PROVIDER",
        "FELLAH_LLM_API_KEY",
        "FELLAH_LLM_BASE_URL",
        "FELLAH_LLM_MODEL",
        "FELLAH_LLM_TIMEOUT_SECS",
        "FELLAH_LLM_MAX_RETRIES",
        "FELLAH_SERVER_BIND_ADDRESS",
        "FELLAH_SERVER_PORT",
        "FELLAH_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "FELLAH_SESSION_IDLE_TTL_SECS",
        "FELLAH_SESSION_MAX_SESSIONS",
        "FELLAH_SESSION_MAX_TRANSCRIPT_TURNS",
        "FELLAH_SESSION_SWEEP_INTERVAL_SECS",
        "FELLAH_LOGGING_LEVEL",
        "FELLAH_LOGGING_FORMAT",
        "FELLAH_LOG_LEVEL",
        "FELLAH_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
