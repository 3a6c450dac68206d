//! Minesweeper Client Library
//!
//! This library provides a Rust client for the line-protocol minesweeper
//! server: a command dispatcher over one WebSocket, a game controller that
//! keeps a local board in step with the server, and an autoplay bot driven by
//! the constraint solver.
//!
//! ## Usage
//!
//! ### Game Controller (Recommended)
//!
//! ```rust,no_run
//! use minesweeper_client::{Dispatcher, GameController, GameState, Pos};
//!
//! #[tokio::main]
//! async fn main() -> minesweeper_client::Result<()> {
//!     let dispatcher = Dispatcher::connect("wss://hometask.eg1236.com/game1/");
//!     let mut game = GameController::new(dispatcher);
//!
//!     game.new_game(1).await?;
//!     game.open_cells(&[Pos::new(0, 0)]).await?;
//!     game.mark_cells(&[Pos::new(1, 1)]);
//!
//!     println!("{}", game.board());
//!     if game.state() == GameState::Win {
//!         println!("Token: {:?}", game.saved_token(1));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Autoplay
//!
//! ```rust,no_run
//! use minesweeper_client::{AutoPlayer, ClientConfig, Dispatcher, GameController};
//!
//! #[tokio::main]
//! async fn main() -> minesweeper_client::Result<()> {
//!     let config = ClientConfig::from_env();
//!     let mut game = GameController::new(Dispatcher::connect(&config.server_url))
//!         .with_token_store(config.token_store()?);
//!
//!     let mut player = AutoPlayer::new(config.solver);
//!     let report = player.run(&mut game, config.level).await?;
//!     println!("{:?} after {} games", report.outcome, report.stats.games);
//!     Ok(())
//! }
//! ```
//!
//! ### Dispatcher
//!
//! For raw commands, use the [`Dispatcher`] directly. Requests are queued
//! immediately and answered in order per command kind:
//!
//! ```rust,no_run
//! use minesweeper_client::{Command, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> minesweeper_client::Result<()> {
//!     let dispatcher = Dispatcher::connect("wss://hometask.eg1236.com/game1/");
//!     let status = dispatcher.new_game(1);
//!     let map = dispatcher.dispatch(Command::Map, None);
//!
//!     println!("{:?}", status.await?);
//!     println!("{:?}", map.await?);
//!     Ok(())
//! }
//! ```

mod autoplay;
mod config;
mod dispatcher;
mod error;
mod game;
mod observer;
mod storage;
mod transport;
mod websocket;

pub use autoplay::{AutoPlayer, AutoplayOutcome, AutoplayReport, AutoplayStats, StopHandle};
pub use config::{ClientConfig, DEFAULT_SERVER_URL};
pub use dispatcher::{CommandQueue, ConnectionState, Dispatcher};
pub use error::{Error, Result};
pub use game::{GameController, GameEvent, GameState};
pub use observer::{EventHub, Subscription};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore, level_key};
pub use transport::{Transport, TransportEvent, TransportPeer};
pub use websocket::connect;

// Re-export common types for convenience
pub use minesweeper_common::{models::*, protocol::*};
pub use minesweeper_solver::SolverSettings;
