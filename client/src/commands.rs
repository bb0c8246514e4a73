//! Typed console commands and their translation into protocol requests

use shared::{ClientMessage, ServerMessage};

pub const HELP: &str = "Commands:
  plant r c
  harvest r c
  steal r c
  view <player-id>
  players
  help
  quit";

/// One parsed line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(ClientMessage),
    ShowPlayers,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0}")]
    BadNumber(String),
}

/// Parses a console line such as `plant 0 1` or `view abc`
///
/// Command words are case-insensitive; ids passed to `view` are kept verbatim.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(word) = parts.first() else {
        return Err(CommandError::Empty);
    };

    match word.to_ascii_lowercase().as_str() {
        "plant" => {
            let (row, col) = coords(&parts, "plant r c")?;
            Ok(Command::Send(ClientMessage::Plant { row, col }))
        }
        "harvest" => {
            let (row, col) = coords(&parts, "harvest r c")?;
            Ok(Command::Send(ClientMessage::Harvest { row, col }))
        }
        "steal" => {
            let (row, col) = coords(&parts, "steal r c")?;
            Ok(Command::Send(ClientMessage::Steal { row, col }))
        }
        "view" => match parts.as_slice() {
            [_, target] => Ok(Command::Send(ClientMessage::View {
                target: target.to_string(),
            })),
            _ => Err(CommandError::Usage("view <player-id>")),
        },
        "quit" | "exit" => Ok(Command::Send(ClientMessage::Quit)),
        "players" => Ok(Command::ShowPlayers),
        "help" | "?" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn coords(parts: &[&str], usage: &'static str) -> Result<(i32, i32), CommandError> {
    match parts {
        [_, row, col] => Ok((number(row)?, number(col)?)),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn number(text: &str) -> Result<i32, CommandError> {
    text.parse()
        .map_err(|_| CommandError::BadNumber(text.to_string()))
}

/// Renders a server message for the terminal
pub fn render(message: &ServerMessage) -> String {
    match message {
        ServerMessage::State {
            client_id,
            msg,
            coins,
            board,
            players,
        } => {
            let viewing = players
                .get(client_id)
                .map(String::as_str)
                .unwrap_or(client_id.as_str());
            let mut out = format!("[{}] {} | coins: {} | viewing: {}\n", client_id, msg, coins, viewing);
            for row in board {
                let cells: Vec<&str> = row
                    .iter()
                    .map(|state| match state {
                        shared::PlotState::Empty => ".",
                        shared::PlotState::Growing => "g",
                        shared::PlotState::Ripe => "R",
                    })
                    .collect();
                out.push_str("  ");
                out.push_str(&cells.join(" "));
                out.push('\n');
            }
            out
        }
        ServerMessage::Error { msg } => format!("error: {}\n", msg),
    }
}
