use std::time::Instant;

use futures_util::future::join_all;
use minesweeper_common::{
    models::{Board, CellMode, Pos},
    protocol::{LEVELS, NewStatus, OpenOutcome},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::observer::{EventHub, Subscription};
use crate::storage::{MemoryTokenStore, TokenStore, level_key};
use crate::{Dispatcher, Error, Result};

/// Where the current game stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Init,
    Active,
    Win,
    Lose,
}

/// Events emitted by the game controller
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// The board changed; carries the new snapshot
    FieldChanged(Board),
    StateChanged(GameState),
    /// A server round-trip started or finished
    Loading(bool),
}

/// Drives one game over a [`Dispatcher`] and keeps the local [`Board`] in
/// step with the server.
///
/// All mutation goes through `&mut self`, so there is a single writer. Board
/// snapshots are cheap to clone; observers get them through [`GameEvent`].
pub struct GameController {
    dispatcher: Dispatcher,
    tokens: Box<dyn TokenStore>,
    events: EventHub<GameEvent>,
    board: Board,
    state: GameState,
    level: Option<u8>,
    loading: bool,
    start_time: Option<Instant>,
}

impl GameController {
    /// Create a controller that keeps win tokens in memory
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            tokens: Box::new(MemoryTokenStore::new()),
            events: EventHub::new(),
            board: Board::new(),
            state: GameState::Init,
            level: None,
            loading: false,
            start_time: None,
        }
    }

    /// Replace the token store
    pub fn with_token_store(mut self, tokens: Box<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn subscribe(&self) -> Subscription<GameEvent> {
        self.events.subscribe()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// When the first move of the current game was made
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    /// Token saved for `level` by an earlier win
    pub fn saved_token(&self, level: u8) -> Option<String> {
        self.tokens.load(&level_key(level))
    }

    /// Start a new game at `level` and load its board.
    ///
    /// Switching levels drops the board; replaying the same level keeps its
    /// shape and blanks every cell. A refused game leaves the state at
    /// [`GameState::Init`] and returns [`NewStatus::Err`].
    pub async fn new_game(&mut self, level: u8) -> Result<NewStatus> {
        if !LEVELS.contains(&level) {
            return Err(Error::InvalidLevel(level));
        }

        let changed = if self.level == Some(level) {
            self.board.reset()
        } else {
            self.board.clear()
        };
        if changed {
            self.emit_field();
        }
        self.level = Some(level);
        self.start_time = None;
        self.set_state(GameState::Init);
        self.set_loading(true);

        info!("Starting new game at level {}", level);
        let status = match self.dispatcher.new_game(level).await {
            Ok(status) => status,
            Err(e) => return Err(self.fail(e)),
        };

        if status == NewStatus::Err {
            warn!("Server refused a new game at level {}", level);
            self.set_loading(false);
            return Ok(status);
        }

        if let Err(e) = self.refresh_map().await {
            return Err(self.fail(e));
        }
        self.set_state(GameState::Active);
        self.set_loading(false);
        Ok(status)
    }

    /// Open `cells` in one round.
    ///
    /// Requests go out together; a win or loss in any of them decides the
    /// outcome, otherwise the last response does. After a plain `Ok` the
    /// board is refreshed once. Returns `None` when `cells` is empty.
    pub async fn open_cells(&mut self, cells: &[Pos]) -> Result<Option<OpenOutcome>> {
        if cells.is_empty() {
            return Ok(None);
        }
        self.touch();
        self.set_loading(true);

        let marked = self.board.update(cells, |mode| match mode {
            CellMode::Blank | CellMode::Marked => Some(CellMode::Opening),
            _ => None,
        });
        if marked {
            self.emit_field();
        }

        debug!("Opening {} cells", cells.len());
        let requests: Vec<_> = cells.iter().map(|&pos| self.dispatcher.open(pos)).collect();
        let outcomes = match join_all(requests).await.into_iter().collect::<Result<Vec<_>>>() {
            Ok(outcomes) => outcomes,
            Err(e) => return Err(self.fail(e)),
        };

        let outcome = decisive_outcome(outcomes);
        match &outcome {
            Some(OpenOutcome::Lose) => {
                info!("Game lost");
                self.settle_opening();
                self.set_state(GameState::Lose);
            }
            Some(OpenOutcome::Win { token }) => {
                info!("Game won");
                self.settle_opening();
                self.set_state(GameState::Win);
                self.save_token(token);
            }
            _ => {
                if let Err(e) = self.refresh_map().await {
                    return Err(self.fail(e));
                }
            }
        }

        self.set_loading(false);
        Ok(outcome)
    }

    /// Toggle the local mark on each of `cells`. Opened cells are left alone.
    pub fn mark_cells(&mut self, cells: &[Pos]) {
        if cells.is_empty() {
            return;
        }
        self.touch();
        if self.board.toggle_marks(cells) {
            self.emit_field();
        }
    }

    /// Fetch the board from the server and merge it in
    pub async fn update_map(&mut self) -> Result<()> {
        self.set_loading(true);
        if let Err(e) = self.refresh_map().await {
            return Err(self.fail(e));
        }
        self.set_loading(false);
        Ok(())
    }

    /// Leave the current game
    pub fn close(&mut self) {
        self.set_state(GameState::Init);
    }

    async fn refresh_map(&mut self) -> Result<()> {
        let map = self.dispatcher.map().await?;
        if self.board.merge(&map) {
            self.emit_field();
        }
        Ok(())
    }

    fn save_token(&mut self, token: &str) {
        let Some(level) = self.level else {
            return;
        };
        if let Err(e) = self.tokens.save(&level_key(level), token) {
            warn!("Failed to store token for level {}: {}", level, e);
        }
    }

    /// Turn cells still waiting on an open back into blanks
    fn settle_opening(&mut self) {
        let opening: Vec<Pos> = self
            .board
            .cells()
            .filter(|cell| cell.mode == CellMode::Opening)
            .map(|cell| cell.pos)
            .collect();

        if self.board.update(&opening, |_| Some(CellMode::Blank)) {
            self.emit_field();
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        warn!("Game request failed: {}", error);
        self.settle_opening();
        self.set_state(GameState::Init);
        self.set_loading(false);
        error
    }

    fn touch(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    fn emit_field(&self) {
        self.events.emit(GameEvent::FieldChanged(self.board.clone()));
    }

    fn set_state(&mut self, state: GameState) {
        if self.state == state {
            return;
        }
        debug!("Game state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.events.emit(GameEvent::StateChanged(state));
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading == loading {
            return;
        }
        self.loading = loading;
        self.events.emit(GameEvent::Loading(loading));
    }
}

/// First win or loss, else the last outcome
fn decisive_outcome(outcomes: Vec<OpenOutcome>) -> Option<OpenOutcome> {
    let mut last = None;
    for outcome in outcomes {
        if outcome.is_terminal() {
            return Some(outcome);
        }
        last = Some(outcome);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use crate::transport::TransportPeer;

    fn controller() -> (GameController, TransportPeer) {
        let (transport, peer) = Transport::loopback();
        peer.open();
        (GameController::new(Dispatcher::spawn(transport)), peer)
    }

    /// Answer each expected line in order
    async fn serve(peer: &mut TransportPeer, script: &[(&str, &str)]) {
        for (line, reply) in script {
            assert_eq!(peer.next_line().await.as_deref(), Some(*line));
            peer.reply(*reply);
        }
    }

    #[test]
    fn decisive_outcome_prefers_terminal() {
        let win = OpenOutcome::Win {
            token: "abc".into(),
        };
        assert_eq!(decisive_outcome(vec![]), None);
        assert_eq!(
            decisive_outcome(vec![OpenOutcome::Ok, OpenOutcome::Ok]),
            Some(OpenOutcome::Ok)
        );
        assert_eq!(
            decisive_outcome(vec![OpenOutcome::Ok, win.clone(), OpenOutcome::Lose]),
            Some(win)
        );
    }

    #[tokio::test]
    async fn invalid_level_is_rejected_locally() {
        let (mut game, mut peer) = controller();
        assert_eq!(game.new_game(0).await, Err(Error::InvalidLevel(0)));
        assert_eq!(game.new_game(5).await, Err(Error::InvalidLevel(5)));
        assert!(peer.try_next_line().is_none());
        assert_eq!(game.state(), GameState::Init);
    }

    #[tokio::test]
    async fn new_game_loads_the_board() {
        let (mut game, mut peer) = controller();
        let mut events = game.subscribe();

        let server = async {
            serve(&mut peer, &[("new 2", "new: OK"), ("map", "map:\n□□□\n□□□")]).await;
        };
        let (status, ()) = tokio::join!(game.new_game(2), server);

        assert_eq!(status, Ok(NewStatus::Ok));
        assert_eq!(game.state(), GameState::Active);
        assert_eq!(game.level(), Some(2));
        assert!(!game.loading());
        assert_eq!((game.board().width(), game.board().height()), (3, 2));
        assert!(game.start_time().is_none());

        let events = events.drain();
        assert!(matches!(events.first(), Some(GameEvent::Loading(true))));
        assert!(matches!(events.last(), Some(GameEvent::Loading(false))));
        assert!(
            events
                .iter()
                .any(|event| matches!(event, GameEvent::StateChanged(GameState::Active)))
        );
    }

    #[tokio::test]
    async fn refused_new_game_stays_in_init() {
        let (mut game, mut peer) = controller();
        let server = async {
            serve(&mut peer, &[("new 1", "new: Err")]).await;
        };
        let (status, ()) = tokio::join!(game.new_game(1), server);

        assert_eq!(status, Ok(NewStatus::Err));
        assert_eq!(game.state(), GameState::Init);
        assert!(!game.loading());
    }

    #[tokio::test]
    async fn transport_failure_returns_to_init() {
        let (mut game, mut peer) = controller();
        let server = async {
            assert_eq!(peer.next_line().await.as_deref(), Some("new 3"));
            peer.fail("broken pipe");
        };
        let (status, ()) = tokio::join!(game.new_game(3), server);

        assert_eq!(status, Err(Error::Transport("broken pipe".into())));
        assert_eq!(game.state(), GameState::Init);
        assert!(!game.loading());
    }

    #[tokio::test]
    async fn marks_toggle_and_start_the_clock() {
        let (mut game, mut peer) = controller();
        let server = async {
            serve(&mut peer, &[("new 1", "new: OK"), ("map", "map:\n□□\n□□")]).await;
        };
        let (status, ()) = tokio::join!(game.new_game(1), server);
        status.unwrap();

        game.mark_cells(&[Pos::new(0, 0), Pos::new(1, 1)]);
        assert!(game.start_time().is_some());
        assert_eq!(game.board().stats().marked, 2);

        game.mark_cells(&[Pos::new(0, 0)]);
        assert_eq!(game.board().stats().marked, 1);
    }

    #[tokio::test]
    async fn loss_reverts_pending_cells_without_refetch() {
        let (mut game, mut peer) = controller();
        let server = async {
            serve(&mut peer, &[("new 1", "new: OK"), ("map", "map:\n□□\n□□")]).await;
        };
        let (status, ()) = tokio::join!(game.new_game(1), server);
        status.unwrap();

        let server = async {
            serve(&mut peer, &[("open 1 0", "open: You lose")]).await;
        };
        let cells = [Pos::new(1, 0)];
        let (outcome, ()) = tokio::join!(game.open_cells(&cells), server);

        assert_eq!(outcome, Ok(Some(OpenOutcome::Lose)));
        assert_eq!(game.state(), GameState::Lose);
        assert!(!game.loading());
        assert_eq!(game.board().stats().opening, 0);
        assert!(peer.try_next_line().is_none());
    }

    #[tokio::test]
    async fn empty_open_is_a_no_op() {
        let (mut game, mut peer) = controller();
        assert_eq!(game.open_cells(&[]).await, Ok(None));
        assert!(peer.try_next_line().is_none());
        assert!(game.start_time().is_none());
    }
}
