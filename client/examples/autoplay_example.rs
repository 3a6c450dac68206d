use minesweeper_client::{AutoPlayer, AutoplayOutcome, ClientConfig, Dispatcher, GameController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_env();
    let dispatcher = Dispatcher::connect(&config.server_url);
    let mut game = GameController::new(dispatcher).with_token_store(config.token_store()?);

    let mut player = AutoPlayer::new(config.solver);

    // Stop after the current step on Ctrl-C
    let stop = player.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Stopping...");
            stop.stop();
        }
    });

    let report = player.run(&mut game, config.level).await?;
    println!("\n{}", game.board());

    match report.outcome {
        AutoplayOutcome::Won { token } => {
            println!("🎉 Level {} solved, token: {}", config.level, token)
        }
        AutoplayOutcome::Stopped => println!("Stopped"),
        AutoplayOutcome::Stuck => println!("No move left"),
    }
    println!(
        "Games: {}, losses: {}, opened: {}, marked: {}, guesses: {}",
        report.stats.games,
        report.stats.losses,
        report.stats.opened,
        report.stats.marked,
        report.stats.guesses
    );

    game.dispatcher().close();
    Ok(())
}
