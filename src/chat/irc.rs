/// Twitch drops chat lines longer than this.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// One parsed IRC line. IRCv3 tags are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Option<IrcMessage> {
        let mut rest = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ').map(|(_, r)| r).unwrap_or("");
        }
        rest = rest.trim_start();

        let mut prefix = None;
        if let Some(p) = rest.strip_prefix(':') {
            let (pre, r) = p.split_once(' ')?;
            prefix = Some(pre.to_string());
            rest = r.trim_start();
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((h, t)) => (h, Some(t)),
            None => (rest, None),
        };
        let mut words = head.split_whitespace();
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(|w| w.to_string()).collect();
        if let Some(t) = trailing {
            params.push(t.to_string());
        }
        Some(IrcMessage {
            prefix,
            command,
            params,
        })
    }

    /// Nickname part of `nick!user@host`.
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map(|(n, _)| n).unwrap_or(p))
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(|s| s.as_str())
    }
}

/// Collapse line breaks and cap the length so one reply stays one chat line.
pub fn sanitize(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    flat.trim().chars().take(MAX_MESSAGE_CHARS).collect()
}

pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG {} :{}\r\n", channel, sanitize(text))
}

pub fn pong(token: &str) -> String {
    format!("PONG :{}\r\n", token)
}
