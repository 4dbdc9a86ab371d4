//! Integration tests for the Noughts server: real WebSocket clients
//! driving full games through the handler, registry and session actors.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use noughts::prelude::*;
use noughts_client::{ClientPhase, ClientView};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(NoughtsServer::builder()).await
}

async fn start_server_with(builder: NoughtsServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, event: ClientEvent) {
    let env = Envelope::new(0, 0, event);
    let json = serde_json::to_string(&env).expect("encode");
    ws.send(Message::Text(json.into())).await.expect("send");
}

async fn send_raw(ws: &mut ClientWs, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("send");
}

async fn recv_envelope(ws: &mut ClientWs) -> Envelope<ServerEvent> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("recv");
        if msg.is_text() || msg.is_binary() {
            return serde_json::from_slice(&msg.into_data()).expect("decode");
        }
    }
}

async fn recv(ws: &mut ClientWs) -> ServerEvent {
    recv_envelope(ws).await.event
}

async fn recv_state(ws: &mut ClientWs) -> Snapshot {
    match recv(ws).await {
        ServerEvent::GameState(snapshot) => snapshot,
        other => panic!("expected GameState, got {other:?}"),
    }
}

async fn recv_error(ws: &mut ClientWs) -> ErrorKind {
    match recv(ws).await {
        ServerEvent::Error { kind, .. } => kind,
        other => panic!("expected Error, got {other:?}"),
    }
}

/// Asserts nothing arrives for a short while.
async fn assert_silent(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

async fn create_game(ws: &mut ClientWs) -> GameId {
    send(ws, ClientEvent::CreateGame).await;
    match recv(ws).await {
        ServerEvent::GameCreated { game_id } => game_id,
        other => panic!("expected GameCreated, got {other:?}"),
    }
}

async fn join(ws: &mut ClientWs, game_id: &GameId) -> Role {
    send(
        ws,
        ClientEvent::JoinGame {
            game_id: game_id.clone(),
        },
    )
    .await;
    match recv(ws).await {
        ServerEvent::PlayerAssigned { symbol } => symbol,
        other => panic!("expected PlayerAssigned, got {other:?}"),
    }
}

async fn make_move(ws: &mut ClientWs, game_id: &GameId, row: usize, col: usize) {
    send(
        ws,
        ClientEvent::MakeMove {
            game_id: game_id.clone(),
            row,
            col,
            symbol: None,
        },
    )
    .await;
}

/// Creates a game, joins X then O, and consumes the activation state on
/// both sockets.
async fn start_game(addr: &str) -> (GameId, ClientWs, ClientWs) {
    let mut x = connect(addr).await;
    let mut o = connect(addr).await;

    let game_id = create_game(&mut x).await;
    assert_eq!(join(&mut x, &game_id).await, Role::Player(Symbol::X));
    assert!(recv_state(&mut x).await.waiting_for_opponent);
    assert_eq!(join(&mut o, &game_id).await, Role::Player(Symbol::O));

    let for_o = recv_state(&mut o).await;
    let for_x = recv_state(&mut x).await;
    assert_eq!(for_o, for_x);
    assert_eq!(for_x.current_turn, Symbol::X);
    (game_id, x, o)
}

/// Plays a move and returns the state both players received.
async fn play(
    mover: &mut ClientWs,
    other: &mut ClientWs,
    game_id: &GameId,
    row: usize,
    col: usize,
) -> Snapshot {
    make_move(mover, game_id, row, col).await;
    let seen = recv_state(mover).await;
    assert_eq!(recv_state(other).await, seen);
    seen
}

// =========================================================================
// Creation and joining
// =========================================================================

#[tokio::test]
async fn test_create_game_returns_short_id() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let first = create_game(&mut ws).await;
    let second = create_game(&mut ws).await;
    assert_eq!(first.as_str().len(), 8);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_join_assigns_x_then_o_then_spectator() {
    let addr = start_server().await;
    let mut x = connect(&addr).await;
    let mut o = connect(&addr).await;
    let mut watcher = connect(&addr).await;

    let game_id = create_game(&mut x).await;
    assert_eq!(join(&mut x, &game_id).await, Role::Player(Symbol::X));
    // X sees the empty board, then nothing more until an opponent arrives.
    let open = recv_state(&mut x).await;
    assert!(open.waiting_for_opponent);
    assert!(!open.game_over);
    assert_eq!(open.board, Board::new());
    assert_silent(&mut x).await;

    assert_eq!(join(&mut o, &game_id).await, Role::Player(Symbol::O));
    let state = recv_state(&mut o).await;
    assert_eq!(recv_state(&mut x).await, state);
    assert!(!state.game_over);
    assert!(!state.waiting_for_opponent);

    assert_eq!(join(&mut watcher, &game_id).await, Role::Spectator);
    assert_eq!(recv_state(&mut watcher).await, state);
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn test_join_unknown_game_is_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        ClientEvent::JoinGame {
            game_id: GameId::from("00000000"),
        },
    )
    .await;
    match recv(&mut ws).await {
        ServerEvent::Error { kind, message } => {
            assert_eq!(kind, ErrorKind::GameNotFound);
            assert!(message.contains("00000000"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

// =========================================================================
// Play
// =========================================================================

#[tokio::test]
async fn test_row_zero_win_then_game_over() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    let s = play(&mut x, &mut o, &game_id, 0, 0).await;
    assert_eq!(s.board.cell(0, 0), Some(Cell::Taken(Symbol::X)));
    assert_eq!(s.current_turn, Symbol::O);

    play(&mut o, &mut x, &game_id, 1, 1).await;
    play(&mut x, &mut o, &game_id, 0, 1).await;
    let s = play(&mut o, &mut x, &game_id, 2, 2).await;
    assert!(!s.game_over);

    let s = play(&mut x, &mut o, &game_id, 0, 2).await;
    assert!(s.game_over);
    assert_eq!(s.winner, Some(Symbol::X));
    assert_eq!(s.outcome, Some(Outcome::Win(Symbol::X)));

    make_move(&mut o, &game_id, 2, 0).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::GameOver);
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn test_full_board_without_line_is_draw() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    // X O X
    // X O O
    // O X X
    let moves = [
        (0, 0),
        (0, 1),
        (0, 2),
        (1, 1),
        (1, 0),
        (1, 2),
        (2, 1),
        (2, 0),
        (2, 2),
    ];
    let mut last = None;
    for (i, (row, col)) in moves.into_iter().enumerate() {
        let s = if i % 2 == 0 {
            play(&mut x, &mut o, &game_id, row, col).await
        } else {
            play(&mut o, &mut x, &game_id, row, col).await
        };
        last = Some(s);
    }

    let s = last.unwrap();
    assert!(s.game_over);
    assert_eq!(s.winner, None);
    assert_eq!(s.outcome, Some(Outcome::Draw));
}

#[tokio::test]
async fn test_rejected_move_only_reaches_requester() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    make_move(&mut o, &game_id, 0, 0).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::NotYourTurn);
    assert_silent(&mut x).await;

    play(&mut x, &mut o, &game_id, 1, 1).await;

    make_move(&mut o, &game_id, 1, 1).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::IllegalMove);
    make_move(&mut o, &game_id, 3, 0).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::IllegalMove);
    assert_silent(&mut x).await;

    // The board is unchanged: O can still take a free cell.
    let s = play(&mut o, &mut x, &game_id, 0, 0).await;
    assert_eq!(s.current_turn, Symbol::X);
}

#[tokio::test]
async fn test_spectator_cannot_move_but_sees_moves() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;
    let mut watcher = connect(&addr).await;
    assert_eq!(join(&mut watcher, &game_id).await, Role::Spectator);
    recv_state(&mut watcher).await;

    make_move(&mut watcher, &game_id, 0, 0).await;
    assert_eq!(recv_error(&mut watcher).await, ErrorKind::SpectatorCannotMove);

    let s = play(&mut x, &mut o, &game_id, 0, 0).await;
    assert_eq!(recv_state(&mut watcher).await, s);
}

#[tokio::test]
async fn test_move_before_opponent_joins_is_rejected() {
    let addr = start_server().await;
    let mut x = connect(&addr).await;
    let game_id = create_game(&mut x).await;
    join(&mut x, &game_id).await;
    recv_state(&mut x).await;

    make_move(&mut x, &game_id, 0, 0).await;
    assert_eq!(recv_error(&mut x).await, ErrorKind::WaitingForOpponent);
}

#[tokio::test]
async fn test_legacy_symbol_field_is_ignored() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    // O claims to be X. The server goes by the binding.
    let frame = format!(
        r#"{{"event": {{"type": "make_move", "game_id": "{game_id}", "row": 0, "col": 0, "symbol": "X"}}}}"#
    );
    send_raw(&mut o, &frame).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::NotYourTurn);
    assert_silent(&mut x).await;
}

// =========================================================================
// Departures
// =========================================================================

#[tokio::test]
async fn test_player_drop_notifies_opponent_and_spectators() {
    let addr = start_server().await;
    let (game_id, x, mut o) = start_game(&addr).await;
    let mut watcher = connect(&addr).await;
    join(&mut watcher, &game_id).await;
    recv_state(&mut watcher).await;

    drop(x);

    for ws in [&mut o, &mut watcher] {
        assert_eq!(recv(ws).await, ServerEvent::PlayerDisconnected);
        let s = recv_state(ws).await;
        assert!(s.game_over);
        assert_eq!(s.winner, None);
        assert_eq!(s.outcome, Some(Outcome::Abandoned));
    }

    make_move(&mut o, &game_id, 1, 1).await;
    assert_eq!(recv_error(&mut o).await, ErrorKind::GameOver);
}

#[tokio::test]
async fn test_leave_game_keeps_connection_open() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    send(
        &mut x,
        ClientEvent::LeaveGame {
            game_id: game_id.clone(),
        },
    )
    .await;
    assert_eq!(recv(&mut o).await, ServerEvent::PlayerDisconnected);
    assert!(recv_state(&mut o).await.game_over);

    // X's socket still works, but its seat is gone for good.
    send(&mut x, ClientEvent::JoinGame { game_id }).await;
    assert_eq!(recv_error(&mut x).await, ErrorKind::SessionTerminated);
}

#[tokio::test]
async fn test_last_departure_retires_game() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    let leave = ClientEvent::LeaveGame {
        game_id: game_id.clone(),
    };
    send(&mut x, leave.clone()).await;
    assert_eq!(recv(&mut o).await, ServerEvent::PlayerDisconnected);
    recv_state(&mut o).await;

    // Requests on one connection are handled in order, so once the
    // heartbeat is answered O's departure has been processed.
    send(&mut o, leave).await;
    send(&mut o, ClientEvent::Heartbeat { client_time: 1 }).await;
    assert!(matches!(recv(&mut o).await, ServerEvent::HeartbeatAck { .. }));

    let mut late = connect(&addr).await;
    send(&mut late, ClientEvent::JoinGame { game_id }).await;
    assert_eq!(recv_error(&mut late).await, ErrorKind::GameNotFound);
}

#[tokio::test]
async fn test_unclaimed_game_is_swept() {
    let builder = NoughtsServer::builder()
        .unclaimed_ttl(Duration::ZERO)
        .sweep_interval(Duration::from_millis(20));
    let addr = start_server_with(builder).await;
    let mut ws = connect(&addr).await;

    let game_id = create_game(&mut ws).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    send(&mut ws, ClientEvent::JoinGame { game_id }).await;
    assert_eq!(recv_error(&mut ws).await, ErrorKind::GameNotFound);
}

// =========================================================================
// Connection housekeeping
// =========================================================================

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientEvent::Heartbeat { client_time: 12345 }).await;
    match recv(&mut ws).await {
        ServerEvent::HeartbeatAck { client_time, .. } => {
            assert_eq!(client_time, 12345);
        }
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_message_reported_and_connection_kept() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_raw(&mut ws, "not json").await;
    assert_eq!(recv_error(&mut ws).await, ErrorKind::InvalidMessage);

    send_raw(&mut ws, r#"{"event": {"type": "make_move", "game_id": "g", "row": -1, "col": 0}}"#)
        .await;
    assert_eq!(recv_error(&mut ws).await, ErrorKind::InvalidMessage);

    send(&mut ws, ClientEvent::Heartbeat { client_time: 9 }).await;
    assert!(matches!(
        recv(&mut ws).await,
        ServerEvent::HeartbeatAck { client_time: 9, .. }
    ));
}

#[tokio::test]
async fn test_outbound_seq_increments_per_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    for client_time in 0..3 {
        send(&mut ws, ClientEvent::Heartbeat { client_time }).await;
    }
    let seqs = [
        recv_envelope(&mut ws).await.seq,
        recv_envelope(&mut ws).await.seq,
        recv_envelope(&mut ws).await.seq,
    ];
    assert_eq!(seqs, [1, 2, 3]);
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let builder = NoughtsServer::builder().idle_timeout(Some(Duration::from_millis(100)));
    let addr = start_server_with(builder).await;
    let mut ws = connect(&addr).await;

    let result = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_games_are_independent() {
    let addr = start_server().await;
    let (first, mut x1, mut o1) = start_game(&addr).await;
    let (second, mut x2, mut o2) = start_game(&addr).await;
    assert_ne!(first, second);

    play(&mut x1, &mut o1, &first, 0, 0).await;
    assert_silent(&mut x2).await;
    assert_silent(&mut o2).await;

    // The second game still starts from an empty board.
    let s = play(&mut x2, &mut o2, &second, 0, 0).await;
    assert_eq!(s.board.cell(1, 1), Some(Cell::Empty));
}

#[tokio::test]
async fn test_silent_socket_does_not_block_other_clients() {
    let addr = start_server().await;

    // Opens TCP but never sends the WebSocket upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(3), connect(&addr))
        .await
        .expect("second client must connect while the first stays silent");
    create_game(&mut ws).await;
}

// =========================================================================
// Client view against a live server
// =========================================================================

#[tokio::test]
async fn test_client_view_tracks_live_game() {
    let addr = start_server().await;
    let (game_id, mut x, mut o) = start_game(&addr).await;

    let mut view = ClientView::new(game_id.clone());
    view.apply(&ServerEvent::PlayerAssigned {
        symbol: Role::Player(Symbol::O),
    });

    // O mirrors X's first move only once the server has confirmed it.
    let s = play(&mut x, &mut o, &game_id, 0, 0).await;
    view.apply(&ServerEvent::GameState(s));
    assert_eq!(view.phase(), ClientPhase::Playing(Symbol::O));
    assert_eq!(view.status(), "Your turn");
    assert!(!view.can_move(0, 0));

    let request = view.request_move(1, 1).expect("O may play the centre");
    send(&mut o, request).await;
    let s = recv_state(&mut o).await;
    assert_eq!(recv_state(&mut x).await, s);
    view.apply(&ServerEvent::GameState(s));
    assert_eq!(view.status(), "Opponent's turn");

    drop(x);
    for _ in 0..2 {
        view.apply(&recv(&mut o).await);
    }
    assert_eq!(view.phase(), ClientPhase::Finished);
    assert_eq!(view.status(), "The other player has disconnected.");
}

#[tokio::test]
async fn test_client_view_waits_for_opponent() {
    let addr = start_server().await;
    let mut x = connect(&addr).await;
    let mut o = connect(&addr).await;
    let game_id = create_game(&mut x).await;

    let mut view = ClientView::new(game_id.clone());
    send(&mut x, view.join_request()).await;
    view.apply(&recv(&mut x).await);
    view.apply(&recv(&mut x).await);
    assert_eq!(view.phase(), ClientPhase::Assigned(Role::Player(Symbol::X)));
    assert_eq!(view.status(), "Waiting for an opponent to join.");
    assert!(view.board().is_some());
    assert!(!view.can_move(0, 0));

    join(&mut o, &game_id).await;
    view.apply(&recv(&mut x).await);
    assert_eq!(view.phase(), ClientPhase::Playing(Symbol::X));
    assert_eq!(view.status(), "Your turn");
    assert!(view.can_move(0, 0));
}
