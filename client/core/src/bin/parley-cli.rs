//! Parley CLI
//!
//! Headless line-oriented shell over the parley core. Plain input is sent
//! to the assistant; slash commands drive conversations, folders, uploads
//! and voice capture.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the default local backend
//! parley-cli
//!
//! # Point at another backend
//! PARLEY_BACKEND_URL=http://chat.internal:8000 parley-cli
//!
//! # With verbose logging
//! RUST_LOG=debug parley-cli
//! ```
//!
//! # Commands
//!
//! - `/list` - list stored conversations
//! - `/open <id>` - load a conversation
//! - `/new` - start a fresh conversation
//! - `/delete <id>` - delete a conversation (asks first)
//! - `/folders` - list folders
//! - `/mkfolder <name>` - create a folder
//! - `/rmfolder <id>` - delete a folder (asks first)
//! - `/upload <path>` - ingest a document
//! - `/record`, `/stop`, `/archive` - voice capture
//! - `/reset` - clear all history (asks first)
//! - `/quit` - exit
//!
//! # Environment Variables
//!
//! - `PARLEY_BACKEND_URL`: backend base URL (default: <http://localhost:8000>)
//! - `PARLEY_REQUEST_TIMEOUT_SECS`: per-request timeout
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)

use std::io::Write as _;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use parley_core::capture::MIC_DENIED_ALERT;
use parley_core::{CaptureError, ChatClient, Role, SendOutcome};

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("parley_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let config = parley_core::load_config()?;
    println!("parley - backend {}", config.backend.base_url);

    let client = ChatClient::from_config(&config);
    client.refresh_all().await;
    render_conversations(&client);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&client);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            prompt(&client);
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if !run_command(&client, command, &mut lines).await? {
                break;
            }
        } else {
            if client.send(&line).await == SendOutcome::Busy {
                println!("(a request is already in flight)");
            }
            render_messages(&client);
        }
        prompt(&client);
    }

    Ok(())
}

/// Execute a slash command; returns `false` to exit the shell
async fn run_command(
    client: &ChatClient,
    command: &str,
    lines: &mut InputLines,
) -> anyhow::Result<bool> {
    let (name, argument) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "list" => {
            if let Err(error) = client.store().refresh_conversations().await {
                println!("could not fetch conversations: {error}");
            }
            render_conversations(client);
        }
        "open" if !argument.is_empty() => {
            client.load_conversation(argument).await;
            render_messages(client);
        }
        "new" => {
            client.start_new_chat();
            println!("started a new chat");
        }
        "delete" if !argument.is_empty() => {
            if confirm(&format!("Delete conversation {argument}?"), lines).await? {
                match client.delete_conversation(argument).await {
                    Ok(()) => println!("deleted"),
                    Err(error) => println!("delete failed: {error}"),
                }
            }
        }
        "folders" => {
            if let Err(error) = client.store().refresh_folders().await {
                println!("could not fetch folders: {error}");
            }
            for folder in client.store().folders() {
                println!("  [{}] {}", folder.id, folder.name);
            }
        }
        "mkfolder" if !argument.is_empty() => {
            if let Err(error) = client.create_folder(argument).await {
                println!("folder creation failed: {error}");
            }
        }
        "rmfolder" if !argument.is_empty() => {
            if confirm(&format!("Delete folder {argument}?"), lines).await? {
                match client.delete_folder(argument).await {
                    Ok(()) => println!("deleted"),
                    Err(error) => println!("delete failed: {error}"),
                }
            }
        }
        "upload" if !argument.is_empty() => {
            upload(client, argument).await;
        }
        "record" => match client.start_recording().await {
            Ok(()) => println!("recording... /stop to transcribe, /archive to save"),
            Err(CaptureError::PermissionDenied) => println!("{MIC_DENIED_ALERT}"),
            Err(error) => println!("{error}"),
        },
        "stop" => match client.stop_recording_and_send().await {
            Ok(Some(_)) => render_messages(client),
            Ok(None) => println!("not recording"),
            Err(error) => println!("{error}"),
        },
        "archive" => match client.stop_recording_and_archive().await {
            Ok(Some(_)) => render_messages(client),
            Ok(None) => println!("not recording"),
            Err(error) => println!("{error}"),
        },
        "reset" => {
            if confirm("Clear all history?", lines).await? {
                match client.reset_history().await {
                    Ok(()) => println!("history cleared"),
                    Err(error) => println!("Failed to reset: {error}"),
                }
            }
        }
        "quit" | "exit" => return Ok(false),
        _ => {
            println!("commands: /list /open /new /delete /folders /mkfolder /rmfolder /upload /record /stop /archive /reset /quit");
        }
    }

    Ok(true)
}

async fn upload(client: &ChatClient, path: &str) {
    let filename = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned());
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            client.upload_document(&filename, bytes).await;
            render_messages(client);
        }
        Err(error) => println!("could not read {path}: {error}"),
    }
}

/// Destructive-action gate: ask before the network call
async fn confirm(question: &str, lines: &mut InputLines) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn prompt(client: &ChatClient) {
    if client.is_recording() {
        print!("(listening) > ");
    } else {
        print!("> ");
    }
    let _ = std::io::stdout().flush();
}

fn render_messages(client: &ChatClient) {
    for message in client.session().messages() {
        match message.role {
            Role::User => println!("you> {}", message.text),
            Role::Assistant => println!("  ai> {}", message.text),
            Role::System => println!("   * {}", message.text),
        }
    }
}

fn render_conversations(client: &ChatClient) {
    let conversations = client.store().conversations();
    if conversations.is_empty() {
        println!("No history yet.");
        return;
    }
    println!("Recent:");
    for conversation in conversations {
        println!("  [{}] {}", conversation.id, conversation.title);
    }
}
