use std::time::Duration;

use clap::Parser;
use voice_relay_cli::commands::{relay_config, session_config, token_claims};
use voice_relay_cli::{Cli, Commands, RunArgs};

fn run_args(argv: &[&str]) -> RunArgs {
    let cli = Cli::try_parse_from(argv).unwrap();
    match cli.command {
        Commands::Run(args) => args,
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn serve_defaults_to_port_8000() {
    let cli = Cli::try_parse_from(["voice-relay", "serve"]).unwrap();
    match cli.command {
        Commands::Serve { port, static_dir, allowed_origins } => {
            assert_eq!(port, 8000);
            assert!(static_dir.is_none());
            assert!(allowed_origins.is_empty());
        }
        other => panic!("expected serve, got {other:?}"),
    }
}

#[test]
fn serve_accepts_repeated_origins() {
    let cli = Cli::try_parse_from([
        "voice-relay",
        "serve",
        "-p",
        "9000",
        "--static-dir",
        "public",
        "--allow-origin",
        "http://a.test",
        "--allow-origin",
        "http://b.test",
    ])
    .unwrap();
    match cli.command {
        Commands::Serve { port, static_dir, allowed_origins } => {
            assert_eq!(port, 9000);
            assert_eq!(static_dir.unwrap().to_str(), Some("public"));
            assert_eq!(allowed_origins, vec!["http://a.test", "http://b.test"]);
        }
        other => panic!("expected serve, got {other:?}"),
    }
}

#[test]
fn token_requires_identity_and_room() {
    assert!(Cli::try_parse_from(["voice-relay", "token", "--identity", "alice"]).is_err());
    let cli =
        Cli::try_parse_from(["voice-relay", "token", "-i", "alice", "-r", "lobby", "--agent"]).unwrap();
    assert!(matches!(cli.command, Commands::Token { agent: true, .. }));
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["voice-relay", "record"]).is_err());
}

#[test]
fn run_flags_override_session_settings() {
    let args = run_args(&[
        "voice-relay",
        "run",
        "--url",
        "wss://rooms.test",
        "--room",
        "standup",
        "--identity",
        "relay-1",
        "--participant-timeout",
        "5",
        "--local-playback",
    ]);
    assert!(args.local_playback);

    let session = session_config(&args);
    assert_eq!(session.url, "wss://rooms.test");
    assert_eq!(session.room, "standup");
    assert_eq!(session.identity, "relay-1");
    assert_eq!(session.participant_timeout(), Duration::from_secs(5));
}

#[test]
fn agent_url_flag_wins_and_is_validated() {
    let args = run_args(&["voice-relay", "run", "--agent-url", "ws://agent.test:8001/ws"]);
    assert_eq!(relay_config(&args).unwrap().agent_url, "ws://agent.test:8001/ws");

    let args = run_args(&["voice-relay", "run", "--agent-url", "http://agent.test"]);
    assert!(relay_config(&args).is_err());
}

#[test]
fn relay_config_reads_toml_file() {
    let path = std::env::temp_dir().join(format!("voice-relay-cli-{}.toml", std::process::id()));
    std::fs::write(&path, "agent_url = \"ws://file.test/ws\"\nblocksize = 960\n").unwrap();

    let args = run_args(&["voice-relay", "run", "--config", path.to_str().unwrap()]);
    let config = relay_config(&args).unwrap();
    assert_eq!(config.agent_url, "ws://file.test/ws");
    assert_eq!(config.blocksize, 960);
    assert_eq!(config.queue_capacity, 50);

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_config_file_is_an_error() {
    let args = run_args(&["voice-relay", "run", "--config", "/nonexistent/relay.toml"]);
    assert!(relay_config(&args).is_err());
}

#[test]
fn token_claims_from_flags() {
    let claims = token_claims("alice".into(), "lobby".into(), None, false, None);
    assert_eq!(claims.name, "alice");
    assert!(!claims.agent);

    let claims =
        token_claims("bot".into(), "lobby".into(), Some("Bot".into()), true, Some(600));
    assert_eq!(claims.name, "Bot");
    assert!(claims.agent);
    assert_eq!(claims.ttl, Some(Duration::from_secs(600)));
}
