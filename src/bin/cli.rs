// PeerStream CLI validation tool
// Drives a running server over its WebSocket to check the watch-party flows by hand or automatically

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;

#[derive(Parser)]
#[command(name = "peerstream-cli")]
#[command(about = "PeerStream watch-party CLI validation tool", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:4000)
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Test WebSocket connection
    Connect,

    /// Create a room as host
    CreateRoom {
        /// Display name (optional)
        #[arg(short, long)]
        name: Option<String>,

        /// Keep connection alive (press Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join a room as guest and print what the room sends
    JoinRoom {
        /// Room code to join
        #[arg(short, long)]
        code: String,

        /// Display name (optional)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Run automated validation scenarios
    Validate {
        /// Run all validation tests
        #[arg(short, long)]
        all: bool,

        /// Test specific scenario
        #[arg(short, long)]
        scenario: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Connect => test_connection(&cli.server).await,
        Commands::CreateRoom { name, keep_alive } => {
            create_room(&cli.server, name.as_deref(), *keep_alive).await
        }
        Commands::JoinRoom { code, name } => join_room(&cli.server, code, name.as_deref()).await,
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_validations(&cli.server).await;
            } else if let Some(s) = scenario {
                run_scenario(&cli.server, s).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
    }
}

fn ws_url(server: &str) -> String {
    format!("ws://{}/peerstream/ws", server)
}

/// Connects and swallows the `connected` greeting. Returns the connection id too.
async fn open(server: &str) -> Result<(Writer, Reader, String), String> {
    let (ws_stream, _) = connect_async(ws_url(server))
        .await
        .map_err(|e| e.to_string())?;
    let (write, mut read) = ws_stream.split();

    let hello = next_json(&mut read, 5)
        .await
        .ok_or_else(|| "no greeting from server".to_string())?;
    if hello["type"] != "connected" {
        return Err(format!("unexpected greeting: {}", hello));
    }
    let id = hello["connectionId"].as_str().unwrap_or_default().to_string();
    Ok((write, read, id))
}

async fn send_json(write: &mut Writer, value: Value) -> bool {
    write.send(Message::Text(value.to_string())).await.is_ok()
}

/// Next text frame as JSON, or `None` on timeout or close.
async fn next_json(read: &mut Reader, secs: u64) -> Option<Value> {
    loop {
        match timeout(Duration::from_secs(secs), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(&text).ok(),
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Err(_) => return None,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) => return None,
        }
    }
}

/// Skips frames until one of type `kind` arrives.
async fn wait_for(read: &mut Reader, kind: &str, secs: u64) -> Option<Value> {
    loop {
        let msg = next_json(read, secs).await?;
        if msg["type"] == kind {
            return Some(msg);
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/peerstream/health", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                println!("{} Health check passed", "✓".green());

                if let Ok(body) = resp.json::<Value>().await {
                    println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                    println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
                    println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
                }
            } else {
                println!("{} Health check failed: {}", "✗".red(), status);
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn test_connection(server: &str) {
    println!("{}", "Testing WebSocket connection...".cyan());

    match open(server).await {
        Ok((_, _, id)) => {
            println!("{} WebSocket connection established", "✓".green());
            println!("  URL: {}", ws_url(server));
            println!("  Connection ID: {}", id);
        }
        Err(e) => println!("{} WebSocket connection failed: {}", "✗".red(), e),
    }
}

async fn create_room(server: &str, name: Option<&str>, keep_alive: bool) {
    println!("{}", "Creating room...".cyan());

    let (mut write, mut read, _) = match open(server).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    if !send_json(&mut write, json!({"type": "create_room", "username": name})).await {
        println!("{} Failed to send create_room", "✗".red());
        return;
    }

    let code = match next_json(&mut read, 5).await {
        Some(resp) if resp["type"] == "room_created" => {
            let code = resp["roomCode"].as_str().unwrap_or("unknown").to_string();
            println!("{} Room created successfully!", "✓".green());
            println!("\n{}", "═".repeat(50).green());
            println!("{} {}", "Room code:".bold(), code.green().bold());
            println!("{}", "═".repeat(50).green());
            code
        }
        Some(resp) => {
            println!("{} Unexpected response: {}", "✗".yellow(), resp);
            return;
        }
        None => {
            println!("{} Timeout waiting for response", "✗".red());
            return;
        }
    };

    if !keep_alive {
        println!("\n{}", "⚠ Note: Connection closed. Room will be deleted.".yellow());
        println!("Use {} to keep the room active.", "--keep-alive".cyan());
        return;
    }

    println!("\n{}", "Connection is being kept alive...".yellow());
    println!("Guests can now join room: {}", code.green().bold());
    println!("Press {} to disconnect and close the room.", "Ctrl+C".bold());
    print_incoming(&mut read).await;
}

async fn join_room(server: &str, code: &str, name: Option<&str>) {
    println!("{}", "Joining room...".cyan());
    println!("  Room code: {}", code);

    let (mut write, mut read, _) = match open(server).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    let msg = json!({"type": "join_room", "roomCode": code, "username": name});
    if !send_json(&mut write, msg).await {
        println!("{} Failed to send join_room", "✗".red());
        return;
    }

    match next_json(&mut read, 5).await {
        Some(resp) if resp["type"] == "room_joined" => {
            let members = resp["users"].as_array().map(Vec::len).unwrap_or(0);
            println!("{} Joined room with {} member(s)", "✓".green(), members);
            println!(
                "  Playing: {}  Position: {}s",
                resp["isPlaying"], resp["currentTime"]
            );
        }
        Some(resp) if resp["type"] == "error" => {
            println!("{} {}", "✗".red(), resp["message"].as_str().unwrap_or("error"));
            return;
        }
        Some(resp) => {
            println!("{} Unexpected response: {}", "✗".yellow(), resp);
            return;
        }
        None => {
            println!("{} Timeout waiting for response", "✗".red());
            return;
        }
    }

    print_incoming(&mut read).await;
}

async fn print_incoming(read: &mut Reader) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => println!("{} {}", "◀".green(), text.bright_white()),
            Ok(Message::Close(_)) => {
                println!("{} Server closed the connection", "✗".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("{} Connection error: {}", "✗".red(), e);
                break;
            }
        }
    }
}

fn list_scenarios() {
    println!("\n{}", "Available scenarios:".bold());
    println!("  {}  - WebSocket connection", "connection".cyan());
    println!("  {} - Host creates a room", "create-room".cyan());
    println!("  {}   - Guest joins and host is notified", "join-room".cyan());
    println!("  {}        - Host seek reaches guests only", "seek".cyan());
    println!("  {} - Bad room codes are rejected", "invalid-room".cyan());
}

async fn run_scenario(server: &str, scenario: &str) {
    let passed = match scenario {
        "connection" => validate_connection(server).await,
        "create-room" => validate_create_room(server).await,
        "join-room" => validate_join_room(server).await,
        "seek" => validate_seek(server).await,
        "invalid-room" => validate_invalid_room(server).await,
        _ => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
            return;
        }
    };
    report(scenario, passed);
}

async fn run_all_validations(server: &str) {
    println!("{}", "Running all validation scenarios...".cyan().bold());

    let results = vec![
        ("connection", validate_connection(server).await),
        ("create-room", validate_create_room(server).await),
        ("join-room", validate_join_room(server).await),
        ("seek", validate_seek(server).await),
        ("invalid-room", validate_invalid_room(server).await),
    ];

    println!("\n{}", "═".repeat(50));
    for (name, passed) in &results {
        report(name, *passed);
    }
    let passed = results.iter().filter(|(_, ok)| *ok).count();
    println!("{}", "═".repeat(50));
    println!("{}/{} scenarios passed", passed, results.len());
}

fn report(name: &str, passed: bool) {
    if passed {
        println!("{} {}", "✓".green(), name);
    } else {
        println!("{} {}", "✗".red(), name);
    }
}

async fn validate_connection(server: &str) -> bool {
    open(server).await.is_ok()
}

/// Creates a room and returns the host's socket halves with the code.
async fn host_room(server: &str) -> Option<(Writer, Reader, String)> {
    let (mut write, mut read, _) = open(server).await.ok()?;
    if !send_json(&mut write, json!({"type": "create_room", "username": "cli-host"})).await {
        return None;
    }
    let resp = wait_for(&mut read, "room_created", 5).await?;
    let code = resp["roomCode"].as_str()?.to_string();
    Some((write, read, code))
}

async fn validate_create_room(server: &str) -> bool {
    match host_room(server).await {
        Some((_, _, code)) => {
            code.len() == 6 && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        }
        None => false,
    }
}

async fn validate_join_room(server: &str) -> bool {
    let Some((_host_write, mut host_read, code)) = host_room(server).await else {
        return false;
    };
    let Ok((mut write, mut read, guest_id)) = open(server).await else {
        return false;
    };

    let msg = json!({"type": "join_room", "roomCode": code, "username": "cli-guest"});
    if !send_json(&mut write, msg).await {
        return false;
    }

    let joined = wait_for(&mut read, "room_joined", 5).await;
    let notified = wait_for(&mut host_read, "peer_joined", 5).await;

    matches!(
        (joined, notified),
        (Some(j), Some(n)) if j["users"].as_array().map(Vec::len) == Some(2)
            && n["peerId"] == guest_id.as_str()
    )
}

async fn validate_seek(server: &str) -> bool {
    let Some((mut host_write, mut host_read, code)) = host_room(server).await else {
        return false;
    };
    let Ok((mut write, mut read, _)) = open(server).await else {
        return false;
    };

    if !send_json(&mut write, json!({"type": "join_room", "roomCode": code})).await {
        return false;
    }
    if wait_for(&mut host_read, "peer_joined", 5).await.is_none() {
        return false;
    }

    send_json(&mut host_write, json!({"type": "seek", "currentTime": 42.0})).await;
    let seek = wait_for(&mut read, "sync_seek", 5).await;

    // The host must not hear its own seek; the next thing it hears is its pause.
    send_json(&mut host_write, json!({"type": "pause", "currentTime": 42.0})).await;
    let next_for_host = next_json(&mut host_read, 5).await;

    matches!(seek, Some(s) if s["currentTime"] == 42.0)
        && matches!(next_for_host, Some(m) if m["type"] == "sync_pause")
}

async fn validate_invalid_room(server: &str) -> bool {
    let Ok((mut write, mut read, _)) = open(server).await else {
        return false;
    };

    send_json(&mut write, json!({"type": "join_room", "roomCode": "NO-WAY"})).await;
    let invalid = next_json(&mut read, 5).await;
    send_json(&mut write, json!({"type": "join_room", "roomCode": "ZZZZZ9"})).await;
    let missing = next_json(&mut read, 5).await;

    matches!(invalid, Some(m) if m["message"] == "Invalid Room Code")
        && matches!(missing, Some(m) if m["message"] == "Room not found")
}
