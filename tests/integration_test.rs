// Integration tests for the PeerStream server
// Each test starts the real warp routes on an ephemeral port and talks to them over WebSockets

use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use peerstream::api;
use peerstream::config::PartyConfig;
use peerstream::party::PartyServer;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Client {
    id: String,
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{}/peerstream/ws", addr);
        let (stream, _) = connect_async(url).await.expect("Failed to connect");
        let (write, read) = stream.split();

        let mut client = Client {
            id: String::new(),
            write,
            read,
        };
        let hello = client.recv().await;
        assert_eq!(hello["type"], "connected");
        client.id = hello["connectionId"].as_str().unwrap().to_string();
        client
    }

    async fn send(&mut self, value: Value) {
        self.write
            .send(Message::Text(value.to_string()))
            .await
            .expect("Failed to send message");
    }

    async fn recv(&mut self) -> Value {
        loop {
            let msg = timeout(Duration::from_secs(2), self.read.next())
                .await
                .expect("Timeout waiting for message");
            match msg {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("Connection ended unexpectedly: {:?}", other),
            }
        }
    }

    /// Reads until a message of the given type shows up.
    async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let msg = self.recv().await;
            if msg["type"] == kind {
                return msg;
            }
        }
    }

    async fn close(mut self) {
        let _ = self.write.send(Message::Close(None)).await;
    }
}

async fn start_server() -> (SocketAddr, Arc<PartyServer>) {
    let party_server = Arc::new(PartyServer::new());
    let routes = api::routes(party_server.clone(), &PartyConfig::default());
    let (addr, serve) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(serve);
    (addr, party_server)
}

async fn create_room(host: &mut Client, name: &str) -> String {
    host.send(json!({"type": "create_room", "username": name})).await;
    let created = host.recv().await;
    assert_eq!(created["type"], "room_created");
    created["roomCode"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _) = start_server().await;

    let resp = reqwest::get(format!("http://{}/peerstream/health", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Health endpoint should return 200 OK");

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_then_join() {
    let (addr, _) = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    alice.send(json!({"type": "create_room", "username": "Alice"})).await;
    let created = alice.recv().await;
    assert_eq!(created["type"], "room_created");
    let code = created["roomCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(
        created["users"],
        json!([{"id": alice.id, "username": "Alice", "isHost": true, "isReady": false}])
    );

    bob.send(json!({"type": "join_room", "roomCode": code, "username": "Bob"})).await;
    let joined = bob.recv().await;
    assert_eq!(joined["type"], "room_joined");
    assert_eq!(joined["roomCode"], code.as_str());
    assert_eq!(joined["users"].as_array().unwrap().len(), 2);

    let update = alice.recv_type("user_list_update").await;
    assert_eq!(update["users"].as_array().unwrap().len(), 2);
    let peer = alice.recv_type("peer_joined").await;
    assert_eq!(peer["peerId"], bob.id.as_str());
    assert_eq!(peer["username"], "Bob");
}

#[tokio::test]
async fn test_join_errors() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"type": "join_room", "roomCode": "AB CD!"})).await;
    assert_eq!(client.recv().await, json!({"type": "error", "message": "Invalid Room Code"}));

    client.send(json!({"type": "join_room", "roomCode": "ZZZZZ9"})).await;
    assert_eq!(client.recv().await, json!({"type": "error", "message": "Room not found"}));
}

#[tokio::test]
async fn test_seek_excludes_sender() {
    let (addr, _) = start_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    let code = create_room(&mut host, "Host").await;
    guest.send(json!({"type": "join_room", "roomCode": code})).await;
    guest.recv_type("ready_status").await;
    host.recv_type("peer_joined").await;

    host.send(json!({"type": "seek", "currentTime": 42.0})).await;
    let seek = guest.recv().await;
    assert_eq!(seek["type"], "sync_seek");
    assert_eq!(seek["currentTime"], 42.0);
    assert!(seek["serverTimestamp"].as_u64().is_some());

    // The next thing the host hears is its own play, not the seek
    host.send(json!({"type": "play", "currentTime": 42.0})).await;
    assert_eq!(host.recv().await["type"], "sync_play");
    assert_eq!(guest.recv().await["type"], "sync_play");
}

#[tokio::test]
async fn test_guest_playback_requests_are_ignored() {
    let (addr, _) = start_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    let code = create_room(&mut host, "Host").await;
    guest.send(json!({"type": "join_room", "roomCode": code})).await;
    guest.recv_type("ready_status").await;
    host.recv_type("peer_joined").await;

    guest.send(json!({"type": "play", "currentTime": 500.0})).await;
    guest.send(json!({"type": "skip", "offset": 30.0})).await;

    // Only the skip request makes it anywhere
    let skip = host.recv().await;
    assert_eq!(skip, json!({"type": "skip_request", "offset": 30.0, "from": guest.id}));
}

#[tokio::test]
async fn test_signaling_relay() {
    let (addr, _) = start_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    let offer = json!({"type": "offer", "sdp": "v=0\r\n"});
    host.send(json!({"type": "webrtc_offer", "targetId": guest.id, "offer": offer}))
        .await;
    assert_eq!(
        guest.recv().await,
        json!({"type": "webrtc_offer", "senderId": host.id, "offer": offer})
    );

    let answer = json!({"type": "answer", "sdp": "v=0\r\n"});
    guest
        .send(json!({"type": "webrtc_answer", "targetId": host.id, "answer": answer}))
        .await;
    assert_eq!(
        host.recv().await,
        json!({"type": "webrtc_answer", "senderId": guest.id, "answer": answer})
    );
}

#[tokio::test]
async fn test_host_disconnect_closes_room() {
    let (addr, party_server) = start_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    let code = create_room(&mut host, "Host").await;
    guest.send(json!({"type": "join_room", "roomCode": code})).await;
    guest.recv_type("ready_status").await;

    host.close().await;

    let closed = guest.recv().await;
    assert_eq!(closed, json!({"type": "room_closed", "message": "Host has left the party"}));
    assert!(party_server.registry().get_room(&code).await.is_none());
}

#[tokio::test]
async fn test_guest_disconnect_updates_room() {
    let (addr, party_server) = start_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    let code = create_room(&mut host, "Host").await;
    guest.send(json!({"type": "join_room", "roomCode": code})).await;
    host.recv_type("peer_joined").await;

    let guest_id = guest.id.clone();
    guest.close().await;

    let update = host.recv().await;
    assert_eq!(update["type"], "user_list_update");
    assert_eq!(update["users"].as_array().unwrap().len(), 1);
    assert_eq!(host.recv().await, json!({"type": "peer_disconnected", "peerId": guest_id}));
    assert_eq!(host.recv().await, json!({"type": "ready_status", "allReady": false}));
    assert!(party_server.registry().get_room(&code).await.is_some());
}
