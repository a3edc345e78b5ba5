//! Line-oriented console commands.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;

use crate::application::services::{BoardError, BoardHandle};
use crate::domain::entity::EntityId;
use crate::domain::view::SortField;

/// Usage text printed for `:help` and invalid commands.
pub const HELP: &str = ":sort <id|name|price|type>  toggle sort on a column\n\
                        :fav <id>                    toggle a favorite\n\
                        :quit                        exit\n\
                        anything else                filter text (empty line clears)";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// New raw filter text.
    Filter(String),
    /// Header click on a column.
    Sort(SortField),
    /// Favorite button click on a row.
    Favorite(EntityId),
    /// Print usage.
    Help,
    /// Stop the program.
    Quit,
    /// Unrecognised or malformed command.
    Invalid(String),
}

/// Parse one line of console input.
///
/// Lines starting with `:` are commands; everything else, including the
/// empty line, is filter text taken verbatim.
#[must_use]
pub fn parse_command(line: &str) -> ConsoleCommand {
    let Some(command) = line.trim().strip_prefix(':') else {
        return ConsoleCommand::Filter(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (verb, arg) {
        ("sort", Some(field)) => field
            .parse()
            .map_or_else(|e| ConsoleCommand::Invalid(format!("{e}")), ConsoleCommand::Sort),
        ("fav", Some(id)) => id.parse().map_or_else(
            |_| ConsoleCommand::Invalid(format!("invalid id: {id}")),
            ConsoleCommand::Favorite,
        ),
        ("help", None) => ConsoleCommand::Help,
        ("quit" | "q", None) => ConsoleCommand::Quit,
        _ => ConsoleCommand::Invalid(format!("unknown command: {}", line.trim())),
    }
}

/// Feeds console lines into a board.
pub struct CommandReader<R> {
    input: R,
    handle: BoardHandle,
}

impl<R> CommandReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Create a reader forwarding to `handle`.
    pub const fn new(input: R, handle: BoardHandle) -> Self {
        Self { input, handle }
    }

    /// Dispatch lines until end of input or cancellation. `:quit` cancels
    /// `cancel`.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Closed` if the board stops first.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BoardError> {
        let mut lines = LinesStream::new(self.input.lines());

        loop {
            let line = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                next = lines.next() => match next {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Failed to read console input");
                        return Ok(());
                    }
                    None => {
                        tracing::debug!("Console input closed");
                        return Ok(());
                    }
                },
            };

            match parse_command(&line) {
                ConsoleCommand::Filter(text) => self.handle.text_filter_changed(text).await?,
                ConsoleCommand::Sort(field) => self.handle.sort_header_clicked(field).await?,
                ConsoleCommand::Favorite(id) => self.handle.favorite_toggled(id).await?,
                ConsoleCommand::Help => eprintln!("{HELP}"),
                ConsoleCommand::Quit => {
                    tracing::info!("Quit requested");
                    cancel.cancel();
                    return Ok(());
                }
                ConsoleCommand::Invalid(reason) => {
                    tracing::warn!(%reason, "Ignoring console input");
                    eprintln!("{HELP}");
                }
            }
        }
    }
}
