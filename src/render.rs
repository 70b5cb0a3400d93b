use std::{
    collections::{BTreeMap, VecDeque},
    io::Write,
};

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    config::RenderCfg,
    error::ChatResult,
    formats::time::format_clock,
    model::{Message, Metadata, NULL_TEAM},
    sync::TickResult,
};

static EMOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":([A-Za-z0-9]+):").unwrap());

const GREEN_PREFIX: &str = "&gt;";

/// Display-ready form of one chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub timestamp_ms: i64,
    pub user: String,
    pub user_class: String,
    pub team_icon: Option<String>,
    pub green: bool,
    pub body_html: String,
    #[serde(skip)]
    pub body_text: String,
}

pub trait Renderer {
    fn clear(&mut self) -> ChatResult<()>;
    fn append(&mut self, msg: &Message) -> ChatResult<()>;

    /// Drops the oldest rendered entries past the retention cap.
    fn trim(&mut self) -> ChatResult<()> {
        Ok(())
    }

    fn render(&mut self, result: &TickResult) -> ChatResult<()> {
        if result.did_reset {
            self.clear()?;
        }
        if result.to_append.is_empty() {
            return Ok(());
        }
        for m in &result.to_append {
            self.append(m)?;
        }
        self.trim()
    }
}

/// Replaces `:name:` tokens that stand alone (start of text or whitespace before,
/// end of text or whitespace after) using `replace(name, icon_src)`.
/// Tokens without a known emote are left as they are.
pub fn substitute_emotes_with(
    text: &str,
    emotes: &BTreeMap<String, String>,
    mut replace: impl FnMut(&str, &str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(caps) = EMOTE_RE.captures_at(text, pos) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        let before_ok = text[..whole.start()]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        let after_ok = text[whole.end()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace);

        if !(before_ok && after_ok) {
            pos = whole.start() + 1;
            continue;
        }

        if let Some(src) = emotes.get(name.as_str()) {
            out.push_str(&text[copied..whole.start()]);
            out.push_str(&replace(name.as_str(), src));
            copied = whole.end();
        }
        pos = whole.end();
    }

    out.push_str(&text[copied..]);
    out
}

pub fn substitute_emotes(text: &str, emotes: &BTreeMap<String, String>) -> String {
    substitute_emotes_with(text, emotes, |_, src| {
        format!(r#"<img class="emote" src="{}">"#, escape_html(src))
    })
}

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Builds the display form of `msg`, or `None` if its author is muted.
pub fn render_message(msg: &Message, metadata: &Metadata, cfg: &RenderCfg) -> Option<RenderedMessage> {
    if cfg.muted_users.iter().any(|u| *u == msg.user_name) {
        return None;
    }

    let mut class_parts = vec!["team", cfg.league.as_str()];
    if !msg.team_id.is_empty() && msg.team_id != NULL_TEAM {
        class_parts.push(msg.team_id.as_str());
    }

    let body_text =
        substitute_emotes_with(&msg.text, &metadata.emotes, |name, _| format!("[{name}]"));

    Some(RenderedMessage {
        timestamp_ms: msg.timestamp_ms,
        user: msg.user_name.clone(),
        user_class: class_parts.join("-"),
        team_icon: metadata.team_icon(&msg.team_id).map(str::to_string),
        green: msg.text.starts_with(GREEN_PREFIX),
        body_html: substitute_emotes(&msg.text, &metadata.emotes),
        body_text: decode_entities(&body_text),
    })
}

fn decode_entities(s: &str) -> String {
    s.replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Html,
    Json,
}

/// Bounded chat window that also streams each appended message to `out`.
///
/// Entries are kept newest first, the way the chat column shows them.
pub struct ChatWindow<W: Write> {
    metadata: Metadata,
    cfg: RenderCfg,
    format: OutputFormat,
    entries: VecDeque<RenderedMessage>,
    out: W,
}

impl<W: Write> ChatWindow<W> {
    pub fn new(metadata: Metadata, cfg: RenderCfg, format: OutputFormat, out: W) -> Self {
        Self {
            metadata,
            cfg,
            format,
            entries: VecDeque::new(),
            out,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &RenderedMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_entry(&mut self, r: &RenderedMessage) -> ChatResult<()> {
        match self.format {
            OutputFormat::Text => {
                let head = format!("[{}] {}: ", format_clock(r.timestamp_ms), r.user);
                if r.body_text.trim().is_empty() {
                    writeln!(self.out, "{}", head.trim_end())?;
                    return Ok(());
                }
                let indent = " ".repeat(head.chars().count());
                let opts = textwrap::Options::new(self.cfg.wrap_width.max(head.len() + 8))
                    .initial_indent(&head)
                    .subsequent_indent(&indent);
                for line in textwrap::wrap(&r.body_text, opts) {
                    writeln!(self.out, "{line}")?;
                }
            }
            OutputFormat::Html => {
                let icon = r
                    .team_icon
                    .as_deref()
                    .map(|src| format!(r#"<img class="team" src="{}">"#, escape_html(src)))
                    .unwrap_or_default();
                let msg_class = if r.green { "msg green" } else { "msg" };
                // Message bodies are stored pre-escaped; only names and attributes need it.
                writeln!(
                    self.out,
                    r#"<div class="chat-message"><div class="user-info">{icon}<span class="user {}">{}:</span></div><span class="{msg_class}">{}</span></div>"#,
                    escape_html(&r.user_class),
                    escape_html(&r.user),
                    r.body_html
                )?;
            }
            OutputFormat::Json => {
                let line = serde_json::to_string(r).map_err(std::io::Error::other)?;
                writeln!(self.out, "{line}")?;
            }
        }
        Ok(())
    }
}

impl<W: Write> Renderer for ChatWindow<W> {
    fn clear(&mut self) -> ChatResult<()> {
        self.entries.clear();
        match self.format {
            OutputFormat::Text => writeln!(self.out, "--- chat cleared ---")?,
            OutputFormat::Html => writeln!(self.out, "<!-- chat cleared -->")?,
            OutputFormat::Json => writeln!(self.out, r#"{{"event":"clear"}}"#)?,
        }
        Ok(())
    }

    fn append(&mut self, msg: &Message) -> ChatResult<()> {
        let Some(rendered) = render_message(msg, &self.metadata, &self.cfg) else {
            return Ok(());
        };
        self.write_entry(&rendered)?;
        self.entries.push_front(rendered);
        Ok(())
    }

    fn trim(&mut self) -> ChatResult<()> {
        self.entries.truncate(self.cfg.retention);
        self.out.flush()?;
        Ok(())
    }
}
