//! Chat command -> playlist operation -> one reply line.
//!
//! Commands are a closed enum so the dispatch `match` stays exhaustive. Text
//! that doesn't name a known command is reported back as `Dispatch::Ignored`
//! and gets no reply.

use crate::error::{RelayError, RelayResult};
use crate::service::PlaylistService;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Add,
    Skip,
    Delete,
    Playlist,
    Pause,
    Resume,
    Help,
}

impl CommandName {
    /// Help listing order.
    pub const ALL: [CommandName; 7] = [
        CommandName::Add,
        CommandName::Skip,
        CommandName::Delete,
        CommandName::Playlist,
        CommandName::Pause,
        CommandName::Resume,
        CommandName::Help,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(CommandName::Add),
            "skip" => Some(CommandName::Skip),
            "delete" => Some(CommandName::Delete),
            "playlist" => Some(CommandName::Playlist),
            "pause" => Some(CommandName::Pause),
            "resume" => Some(CommandName::Resume),
            "help" => Some(CommandName::Help),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Add => "add",
            CommandName::Skip => "skip",
            CommandName::Delete => "delete",
            CommandName::Playlist => "playlist",
            CommandName::Pause => "pause",
            CommandName::Resume => "resume",
            CommandName::Help => "help",
        }
    }

    pub fn takes_argument(self) -> bool {
        matches!(self, CommandName::Add | CommandName::Delete)
    }

    /// e.g. `song add <track>`
    pub fn usage(self, prefix: &str) -> String {
        let mut s = format!("{} {}", prefix.trim(), self.as_str());
        if self.takes_argument() {
            s.push_str(" <track>");
        }
        s
    }
}

/// One chat message split into its command word and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

impl Command {
    /// Split on the first whitespace. `None` for blank text.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let (name, args) = match text.split_once(char::is_whitespace) {
            Some((n, rest)) => (n, rest.trim()),
            None => (text, ""),
        };
        Some(Command {
            name: name.to_string(),
            args: args.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Reply(String),
    /// Not a known command; nothing is sent back.
    Ignored { name: String },
}

pub struct Dispatcher {
    service: PlaylistService,
    prefix: String,
}

impl Dispatcher {
    pub fn new(service: PlaylistService, prefix: impl Into<String>) -> Self {
        Self {
            service,
            prefix: prefix.into(),
        }
    }

    pub fn service(&self) -> &PlaylistService {
        &self.service
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn help_text(&self) -> String {
        let usages: Vec<String> = CommandName::ALL
            .iter()
            .map(|c| c.usage(&self.prefix))
            .collect();
        format!("Commands: {}", usages.join(", "))
    }

    /// Command text of a chat message, or `None` when it doesn't start with the prefix.
    pub fn strip_prefix<'a>(&self, message: &'a str) -> Option<&'a str> {
        message.trim_start().strip_prefix(self.prefix.as_str())
    }

    /// Handle the text after the prefix. Every failure becomes the reply; nothing escapes.
    pub async fn dispatch(&self, text: &str) -> Dispatch {
        let cmd = match Command::parse(text) {
            Some(c) => c,
            None => return Dispatch::Ignored { name: String::new() },
        };
        let name = match CommandName::parse(&cmd.name) {
            Some(n) => n,
            None => {
                debug!(command = %cmd.name, "ignoring unrecognized command");
                return Dispatch::Ignored { name: cmd.name };
            }
        };
        let reply = match self.execute(name, &cmd.args).await {
            Ok(reply) => {
                info!(command = name.as_str(), args = %cmd.args, "command handled");
                reply
            }
            Err(e) => {
                match &e {
                    RelayError::RemoteService(cause) => {
                        warn!(command = name.as_str(), args = %cmd.args, "remote call failed: {:#}", cause)
                    }
                    other => info!(command = name.as_str(), args = %cmd.args, "command rejected: {}", other),
                }
                e.reply_text()
            }
        };
        Dispatch::Reply(reply)
    }

    fn required_arg<'a>(&self, name: CommandName, args: &'a str) -> RelayResult<&'a str> {
        let arg = args.trim();
        if arg.is_empty() {
            return Err(RelayError::InvalidCommandUsage {
                usage: name.usage(&self.prefix),
            });
        }
        Ok(arg)
    }

    /// Run one recognised command and produce its success reply.
    pub async fn execute(&self, name: CommandName, args: &str) -> RelayResult<String> {
        match name {
            CommandName::Add => {
                let query = self.required_arg(name, args)?;
                let track = self
                    .service
                    .search_track(query)
                    .await?
                    .ok_or_else(|| RelayError::NotFound(query.to_string()))?;
                self.service.enqueue(&track.uri).await?;
                Ok(format!("{} added successfully to the playlist!", query))
            }
            CommandName::Skip => {
                self.service.skip().await?;
                Ok("Current track skipped successfully!".to_string())
            }
            CommandName::Delete => {
                let query = self.required_arg(name, args)?;
                let track = self
                    .service
                    .search_track(query)
                    .await?
                    .ok_or_else(|| RelayError::NotFound(query.to_string()))?;
                self.service.remove(&track.uri).await?;
                Ok(format!("{} deleted successfully from the playlist!", query))
            }
            CommandName::Playlist => {
                let names = self.service.list_tracks().await?;
                Ok(format!("Current Playlist: {}", names.join(", ")))
            }
            CommandName::Pause => {
                self.service.pause().await?;
                Ok("Track paused successfully!".to_string())
            }
            CommandName::Resume => {
                self.service.resume().await?;
                Ok("Track resumed successfully!".to_string())
            }
            CommandName::Help => Ok(self.help_text()),
        }
    }
}
