pub mod irc;

use crate::config::Config;
use crate::dispatcher::{Dispatch, Dispatcher};
use anyhow::{anyhow, Context, Result};
use irc::IrcMessage;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connection identity for the chat side.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub nick: String,
    pub password: String,
    pub channel: String,
}

impl ChatSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            nick: cfg.bot_username.trim().to_ascii_lowercase(),
            password: cfg.irc_password(),
            channel: cfg.irc_channel(),
        }
    }
}

/// A prefixed chat message waiting to be dispatched.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: String,
    pub channel: String,
    /// Text after the command prefix.
    pub text: String,
}

/// Connect to the configured IRC endpoint and relay commands until the connection ends.
pub async fn run_bot(cfg: &Config, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let addr = format!("{}:{}", cfg.irc_host, cfg.irc_port);
    info!("connecting to chat at {}", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    let (reader, writer) = stream.into_split();
    run_session(reader, writer, &ChatSettings::from_config(cfg), dispatcher).await
}

/// Drive one chat session over an already-open byte stream.
///
/// The read loop answers keepalives itself and hands prefixed messages to a
/// single worker task, so commands run one at a time in arrival order while
/// PINGs keep being answered. All outgoing lines go through one writer task.
pub async fn run_session<R, W>(
    reader: R,
    mut writer: W,
    settings: &ChatSettings,
    dispatcher: Arc<Dispatcher>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    writer
        .write_all(format!("PASS {}\r\nNICK {}\r\n", settings.password, settings.nick).as_bytes())
        .await
        .context("sending login")?;

    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer_task = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<_, anyhow::Error>(())
    });

    // unbounded so a stuck remote call never backs up into the read loop
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ChatMessage>();
    let worker = tokio::spawn(handle_commands(dispatcher.clone(), cmd_rx, out_tx.clone()));

    let result = read_loop(reader, settings, &dispatcher, &cmd_tx, &out_tx).await;

    // let queued commands finish and their replies go out before closing
    drop(cmd_tx);
    worker.await.context("command worker panicked")?;
    drop(out_tx);
    writer_task.await.context("chat writer panicked")??;
    result
}

async fn read_loop<R>(
    reader: R,
    settings: &ChatSettings,
    dispatcher: &Dispatcher,
    cmd_tx: &mpsc::UnboundedSender<ChatMessage>,
    out_tx: &mpsc::Sender<String>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut logged_in = false;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("reading from chat")?;
        if n == 0 {
            break;
        }
        // a stray non-UTF-8 byte must not end the session
        let line = String::from_utf8_lossy(&buf);
        let msg = match IrcMessage::parse(&line) {
            Some(m) => m,
            None => continue,
        };
        match msg.command.as_str() {
            "PING" => {
                let token = msg.trailing().unwrap_or("tmi.twitch.tv");
                send(out_tx, irc::pong(token)).await?;
            }
            "001" => {
                logged_in = true;
                info!("logged in to chat as {}; joining {}", settings.nick, settings.channel);
                send(out_tx, format!("JOIN {}\r\n", settings.channel)).await?;
            }
            "NOTICE" if !logged_in => {
                let text = msg.trailing().unwrap_or_default();
                return Err(anyhow!("chat login failed: {}", text));
            }
            "RECONNECT" => {
                warn!("chat server requested a reconnect");
                return Err(anyhow!("chat server requested reconnect"));
            }
            "PRIVMSG" => {
                let (channel, text) = match (msg.params.first(), msg.params.get(1)) {
                    (Some(c), Some(t)) => (c, t),
                    _ => continue,
                };
                let sender = msg.nick().unwrap_or_default().to_string();
                if sender.eq_ignore_ascii_case(&settings.nick) {
                    continue;
                }
                if let Some(rest) = dispatcher.strip_prefix(text) {
                    let m = ChatMessage {
                        sender,
                        channel: channel.clone(),
                        text: rest.to_string(),
                    };
                    cmd_tx
                        .send(m)
                        .map_err(|_| anyhow!("command worker stopped"))?;
                }
            }
            other => debug!("chat: ignoring {}", other),
        }
    }
    info!("chat connection closed");
    Ok(())
}

async fn handle_commands(
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::UnboundedReceiver<ChatMessage>,
    out_tx: mpsc::Sender<String>,
) {
    while let Some(m) = rx.recv().await {
        debug!(sender = %m.sender, text = %m.text, "dispatching chat command");
        match dispatcher.dispatch(&m.text).await {
            Dispatch::Reply(reply) => {
                if out_tx.send(irc::privmsg(&m.channel, &reply)).await.is_err() {
                    warn!("chat writer gone; dropping reply to {}", m.sender);
                    return;
                }
            }
            Dispatch::Ignored { name } => {
                debug!(sender = %m.sender, "no reply for unrecognized command {:?}", name);
            }
        }
    }
}

async fn send(out_tx: &mpsc::Sender<String>, line: String) -> Result<()> {
    out_tx
        .send(line)
        .await
        .map_err(|_| anyhow!("chat writer stopped"))
}
