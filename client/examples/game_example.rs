use minesweeper_client::{ClientConfig, Dispatcher, GameController, GameEvent, GameState, Pos};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_env();
    let dispatcher = Dispatcher::connect(&config.server_url);
    let mut game = GameController::new(dispatcher).with_token_store(config.token_store()?);

    // Subscribe to game events for background listening
    let mut events = game.subscribe();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                GameEvent::FieldChanged(board) => {
                    let stats = board.stats();
                    println!(
                        "📋 Board {}x{}: {} opened, {} marked",
                        board.width(),
                        board.height(),
                        stats.opened,
                        stats.marked
                    );
                }
                GameEvent::StateChanged(GameState::Win) => println!("🎉 You won!"),
                GameEvent::StateChanged(GameState::Lose) => println!("💣 Game over!"),
                GameEvent::StateChanged(state) => println!("Game state: {:?}", state),
                GameEvent::Loading(loading) => {
                    if loading {
                        println!("⏳ Waiting for server...");
                    }
                }
            }
        }
    });

    game.new_game(config.level).await?;
    println!("\nInitial board:\n{}", game.board());

    // Open the corner and mark its diagonal neighbour
    println!("Opening cell (0, 0)...");
    game.open_cells(&[Pos::new(0, 0)]).await?;
    game.mark_cells(&[Pos::new(1, 1)]);
    println!("\n{}", game.board());

    match game.state() {
        GameState::Win => println!("Token: {:?}", game.saved_token(config.level)),
        GameState::Lose => println!("Lost on the first move"),
        _ => println!("Game still running"),
    }

    game.close();
    drop(game);
    let _ = event_handler.await;
    Ok(())
}
