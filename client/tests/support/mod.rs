#![allow(dead_code)]

use minesweeper_client::{Dispatcher, GameController, Pos, Transport, TransportPeer};
use tokio::task::JoinHandle;

/// In-process line-protocol server with a fixed mine layout
pub struct FakeServer {
    width: usize,
    height: usize,
    bombs: Vec<bool>,
    revealed: Vec<bool>,
    revealed_count: usize,
    /// Reply repeated for every open once the game is decided
    outcome: Option<String>,
    token: String,
}

impl FakeServer {
    pub fn new(width: usize, height: usize, bombs: &[(usize, usize)]) -> Self {
        let mut cells = vec![false; width * height];
        for &(x, y) in bombs {
            cells[x + y * width] = true;
        }
        Self {
            width,
            height,
            bombs: cells,
            revealed: vec![false; width * height],
            revealed_count: 0,
            outcome: None,
            token: "ThisIsTheToken".to_string(),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    pub fn handle(&mut self, line: &str) -> String {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("new") => {
                self.revealed.iter_mut().for_each(|r| *r = false);
                self.revealed_count = 0;
                self.outcome = None;
                "new: OK".to_string()
            }
            Some("open") => {
                let x = parts.next().and_then(|v| v.parse().ok());
                let y = parts.next().and_then(|v| v.parse().ok());
                match (x, y) {
                    (Some(x), Some(y)) if x < self.width && y < self.height => {
                        format!("open: {}", self.open(Pos::new(x, y)))
                    }
                    _ => "open: Out of bounds".to_string(),
                }
            }
            Some("map") => format!("map:\n{}", self.render()),
            _ => "error: Unknown command".to_string(),
        }
    }

    fn open(&mut self, pos: Pos) -> String {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        if self.bombs[self.index(pos)] {
            return self.decide("You lose".to_string());
        }

        self.reveal_recursive(pos);
        if self.has_won() {
            self.decide(format!("You win. The password for this level is: {}", self.token))
        } else {
            "OK".to_string()
        }
    }

    fn decide(&mut self, outcome: String) -> String {
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn reveal_recursive(&mut self, pos: Pos) {
        if pos.x >= self.width || pos.y >= self.height {
            return;
        }
        let index = self.index(pos);
        if self.revealed[index] {
            return;
        }
        self.revealed[index] = true;
        self.revealed_count += 1;

        if self.adjacent(pos) != 0 {
            return;
        }
        for next in pos.around() {
            self.reveal_recursive(next);
        }
    }

    fn adjacent(&self, pos: Pos) -> usize {
        pos.around()
            .filter(|p| p.x < self.width && p.y < self.height)
            .filter(|p| self.bombs[self.index(*p)])
            .count()
    }

    fn has_won(&self) -> bool {
        let bombs = self.bombs.iter().filter(|b| **b).count();
        self.width * self.height == bombs + self.revealed_count
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Pos::new(x, y);
                if self.revealed[self.index(pos)] {
                    out.push_str(&self.adjacent(pos).to_string());
                } else {
                    out.push('□');
                }
            }
            out.push('\n');
        }
        out
    }

    fn index(&self, pos: Pos) -> usize {
        pos.x + pos.y * self.width
    }
}

/// Answer every line until the client hangs up; yields the lines received
pub fn serve(mut peer: TransportPeer, mut server: FakeServer) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = Vec::new();
        peer.open();
        while let Some(line) = peer.next_line().await {
            let reply = server.handle(&line);
            lines.push(line);
            if !peer.reply(reply) {
                break;
            }
        }
        lines
    })
}

/// A controller wired to `server` over a loopback transport
pub fn connect(server: FakeServer) -> (GameController, JoinHandle<Vec<String>>) {
    let (transport, peer) = Transport::loopback();
    let handle = serve(peer, server);
    (GameController::new(Dispatcher::spawn(transport)), handle)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
