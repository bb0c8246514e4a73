use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GRID_ROWS: usize = 4;
pub const GRID_COLS: usize = 4;
pub const PLANT_COST: u32 = 5;
pub const HARVEST_REWARD: u32 = 12;
pub const GROW_DURATION_MS: u64 = 10_000;
pub const STARTING_COINS: u32 = 40;
/// A ripe plot can only be stolen from while it holds at least this share of the harvest reward
pub const STEAL_MIN_YIELD_PERCENT: u32 = 20;
/// Upper bound of a single steal, as a share of the plot's remaining yield
pub const STEAL_MAX_PERCENT: u32 = 25;
pub const DEFAULT_PORT: u16 = 5050;

/// Opaque identifier of a farm owner
pub type PlayerId = String;

/// Board as sent on the wire, indexed `[row][col]`
pub type Board = [[PlotState; GRID_COLS]; GRID_ROWS];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlotState {
    #[default]
    Empty,
    Growing,
    Ripe,
}

/// Requests sent by a client, one JSON object per line tagged by `op`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientMessage {
    Login {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Plant {
        row: i32,
        col: i32,
    },
    Harvest {
        row: i32,
        col: i32,
    },
    Steal {
        row: i32,
        col: i32,
    },
    View {
        target: PlayerId,
    },
    Quit,
}

impl ClientMessage {
    pub fn op(&self) -> &'static str {
        match self {
            ClientMessage::Login { .. } => "login",
            ClientMessage::Plant { .. } => "plant",
            ClientMessage::Harvest { .. } => "harvest",
            ClientMessage::Steal { .. } => "steal",
            ClientMessage::View { .. } => "view",
            ClientMessage::Quit => "quit",
        }
    }
}

/// Messages pushed by the server, tagged by `type`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    State {
        #[serde(rename = "clientId")]
        client_id: PlayerId,
        msg: String,
        coins: u32,
        board: Board,
        /// Every connected player mapped to the farm they are currently viewing
        players: BTreeMap<PlayerId, PlayerId>,
    },
    Error {
        msg: String,
    },
}

/// Serializes a message as a single newline-terminated JSON line
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parses one line of the protocol, ignoring surrounding whitespace
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
