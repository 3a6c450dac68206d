mod support;

use std::env;
use std::fs;

use minesweeper_client::{
    CellMode, FileTokenStore, GameEvent, GameState, NewStatus, OpenOutcome, Pos, TokenStore,
    level_key,
};
use support::{FakeServer, connect, init_tracing};
use uuid::Uuid;

/// 4x3, mines in the right column except its middle cell:
///
/// ```text
/// 0 0 1 *
/// 0 0 2 2
/// 0 0 1 *
/// ```
fn two_mines() -> FakeServer {
    FakeServer::new(4, 3, &[(3, 0), (3, 2)])
}

fn field_events(events: &[GameEvent]) -> Vec<&minesweeper_client::Board> {
    events
        .iter()
        .filter_map(|event| match event {
            GameEvent::FieldChanged(board) => Some(board),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn winning_stores_the_token() {
    init_tracing();
    let (mut game, server) = connect(FakeServer::new(3, 2, &[(2, 0), (2, 1)]).with_token("Beta7"));
    let mut events = game.subscribe();

    assert_eq!(game.new_game(1).await, Ok(NewStatus::Ok));
    let outcome = game.open_cells(&[Pos::new(0, 0)]).await.unwrap();

    assert_eq!(
        outcome,
        Some(OpenOutcome::Win {
            token: "Beta7".into()
        })
    );
    assert_eq!(game.state(), GameState::Win);
    assert!(!game.loading());
    assert_eq!(game.saved_token(1).as_deref(), Some("Beta7"));
    assert_eq!(game.tokens().load(&level_key(1)).as_deref(), Some("Beta7"));
    assert!(
        events
            .drain()
            .iter()
            .any(|event| matches!(event, GameEvent::StateChanged(GameState::Win)))
    );

    drop(game);
    assert_eq!(server.await.unwrap(), vec!["new 1", "map", "open 0 0"]);
}

#[tokio::test]
async fn opening_a_mine_loses_without_refetching() {
    init_tracing();
    let (mut game, server) = connect(FakeServer::new(2, 2, &[(0, 0)]));

    game.new_game(1).await.unwrap();
    let outcome = game.open_cells(&[Pos::new(0, 0)]).await.unwrap();

    assert_eq!(outcome, Some(OpenOutcome::Lose));
    assert_eq!(game.state(), GameState::Lose);
    assert!(!game.loading());
    assert_eq!(game.board().stats().opening, 0);

    drop(game);
    assert_eq!(server.await.unwrap(), vec!["new 1", "map", "open 0 0"]);
}

#[tokio::test]
async fn cascade_lands_in_a_single_merge() {
    init_tracing();
    let (mut game, server) = connect(two_mines());
    game.new_game(1).await.unwrap();
    let mut events = game.subscribe();

    let outcome = game.open_cells(&[Pos::new(0, 0)]).await.unwrap();
    assert_eq!(outcome, Some(OpenOutcome::Ok));
    assert_eq!(game.state(), GameState::Active);
    assert!(game.start_time().is_some());

    let stats = game.board().stats();
    assert_eq!((stats.opened, stats.blank, stats.opening), (9, 3, 0));
    assert_eq!(
        game.board().get(Pos::new(2, 1)).map(|cell| cell.mode),
        Some(CellMode::Opened { bombs: 2 })
    );

    let events = events.drain();
    let boards = field_events(&events);
    assert_eq!(boards.len(), 2);
    assert_eq!(boards[0].stats().opening, 1);
    assert_eq!(boards[1].stats().opened, 9);

    drop(game);
    assert_eq!(
        server.await.unwrap(),
        vec!["new 1", "map", "open 0 0", "map"]
    );
}

#[tokio::test]
async fn unchanged_map_emits_no_field_event() {
    init_tracing();
    let (mut game, server) = connect(two_mines());
    game.new_game(1).await.unwrap();
    let mut events = game.subscribe();

    // Opened behind the controller's back, so only the next map shows it
    let outcome = game.dispatcher().open(Pos::new(0, 0)).await;
    assert_eq!(outcome, Ok(OpenOutcome::Ok));

    game.update_map().await.unwrap();
    let first = events.drain();
    let boards = field_events(&first);
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].stats().opened, 9);

    game.update_map().await.unwrap();
    let second = events.drain();
    assert!(field_events(&second).is_empty());
    assert!(second.iter().any(|event| matches!(event, GameEvent::Loading(_))));
    assert!(!game.loading());
    assert_eq!(game.board().stats().opened, 9);

    drop(game);
    assert_eq!(
        server.await.unwrap(),
        vec!["new 1", "map", "open 0 0", "map", "map"]
    );
}

#[tokio::test]
async fn any_winning_response_decides_the_round() {
    init_tracing();
    let (mut game, server) = connect(two_mines());
    game.new_game(1).await.unwrap();

    let outcome = game
        .open_cells(&[Pos::new(0, 0), Pos::new(3, 1)])
        .await
        .unwrap();

    assert!(matches!(outcome, Some(OpenOutcome::Win { .. })));
    assert_eq!(game.state(), GameState::Win);

    drop(game);
    assert_eq!(
        server.await.unwrap(),
        vec!["new 1", "map", "open 0 0", "open 3 1"]
    );
}

#[tokio::test]
async fn replay_resets_and_level_change_clears() {
    init_tracing();
    let (mut game, _server) = connect(two_mines());
    game.new_game(1).await.unwrap();
    game.open_cells(&[Pos::new(0, 0)]).await.unwrap();
    game.mark_cells(&[Pos::new(3, 1)]);

    let mut events = game.subscribe();
    game.new_game(1).await.unwrap();
    let replay = events.drain();
    let boards = field_events(&replay);
    let first = boards.first().expect("board reset");
    assert_eq!((first.width(), first.height()), (4, 3));
    assert_eq!(first.stats().blank, 12);
    assert!(game.start_time().is_none());

    game.open_cells(&[Pos::new(0, 0)]).await.unwrap();
    events.drain();
    game.new_game(2).await.unwrap();
    let switch = events.drain();
    let boards = field_events(&switch);
    assert!(boards.first().expect("board cleared").is_empty());
    assert_eq!(game.level(), Some(2));
    assert_eq!(game.board().stats().blank, 12);
}

#[tokio::test]
async fn close_returns_to_init() {
    let (mut game, _server) = connect(two_mines());
    game.new_game(1).await.unwrap();
    assert_eq!(game.state(), GameState::Active);

    game.close();
    assert_eq!(game.state(), GameState::Init);
}

#[tokio::test]
async fn token_file_keeps_wins_across_sessions() {
    let dir = env::temp_dir().join(format!("minesweeper-{}", Uuid::new_v4()));
    let path = dir.join("tokens.json");

    let (game, _server) = connect(FakeServer::new(3, 2, &[(2, 0), (2, 1)]).with_token("Gamma"));
    let mut game = game.with_token_store(Box::new(FileTokenStore::open(&path).unwrap()));
    game.new_game(3).await.unwrap();
    game.open_cells(&[Pos::new(0, 0)]).await.unwrap();
    assert_eq!(game.state(), GameState::Win);

    let reopened = FileTokenStore::open(&path).unwrap();
    assert_eq!(reopened.load("level-3").as_deref(), Some("Gamma"));

    let _ = fs::remove_dir_all(dir);
}
