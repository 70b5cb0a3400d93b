use std::{
    fs,
    io::Read,
    path::PathBuf,
    thread,
};

use crate::{
    config::Config,
    error::{ChatError, ChatResult},
    formats,
    model::{Metadata, PlaybackWindow, Transcript},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Path(PathBuf),
}

impl Source {
    /// `-` means stdin, anything else is a file path.
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            Source::Stdin
        } else {
            Source::Path(PathBuf::from(s))
        }
    }

    pub fn name(&self) -> String {
        match self {
            Source::Stdin => "<stdin>".to_string(),
            Source::Path(p) => p.display().to_string(),
        }
    }

    pub fn read_to_string(&self) -> ChatResult<String> {
        match self {
            Source::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
            Source::Path(p) => Ok(fs::read_to_string(p)?),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub transcript: Transcript,
    pub metadata: Metadata,
}

/// Reads the chat transcript and (optionally) its metadata side by side.
///
/// Metadata problems never fail the load: they are logged and the session runs
/// without icons. Transcript problems are returned to the caller.
pub fn load(
    chat: &Source,
    metadata: Option<&Source>,
    window: &PlaybackWindow,
    cfg: &Config,
) -> ChatResult<Loaded> {
    let (transcript, metadata) = load_parts(chat, metadata, window, cfg);
    Ok(Loaded {
        transcript: transcript?,
        metadata,
    })
}

/// Like [`load`], but a transcript failure only disables chat.
pub fn load_or_disable(
    chat: &Source,
    metadata: Option<&Source>,
    window: &PlaybackWindow,
    cfg: &Config,
) -> Loaded {
    let (transcript, metadata) = load_parts(chat, metadata, window, cfg);
    let transcript = transcript.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "chat disabled, transcript unavailable");
        Transcript::default()
    });
    Loaded {
        transcript,
        metadata,
    }
}

/// Each source is read exactly once; stdin cannot be read a second time.
fn load_parts(
    chat: &Source,
    metadata: Option<&Source>,
    window: &PlaybackWindow,
    cfg: &Config,
) -> (ChatResult<Transcript>, Metadata) {
    let span = tracing::info_span!(
        "load",
        chat = chat.name().as_str(),
        start_offset_ms = window.start_offset_ms,
        duration_ms = window.duration_ms
    );
    let _g = span.enter();

    let (transcript, metadata) = thread::scope(|s| {
        let meta_task = metadata.map(|src| s.spawn(move || load_metadata(src)));

        let transcript = load_transcript(chat, window, cfg.loader.strict_rows);

        let metadata = match meta_task {
            Some(task) => task.join().unwrap_or_else(|_| {
                tracing::error!("metadata loader panicked");
                Metadata::default()
            }),
            None => Metadata::default(),
        };

        (transcript, metadata)
    });

    if let Ok(t) = &transcript {
        log_transcript_summary(t, cfg);
    }
    (transcript, metadata)
}

pub fn load_transcript(chat: &Source, window: &PlaybackWindow, strict: bool) -> ChatResult<Transcript> {
    let raw = chat.read_to_string()?;
    tracing::info!(bytes = raw.len(), "read chat transcript");
    formats::tsv::parse_chat_tsv(&raw, window, strict)
}

pub fn load_metadata(src: &Source) -> Metadata {
    let result = src
        .read_to_string()
        .map_err(|e| ChatError::Load {
            source_name: src.name(),
            reason: e.to_string(),
        })
        .and_then(|raw| formats::json::parse_metadata(&raw, &src.name()));

    match result {
        Ok(meta) => {
            tracing::info!(
                teams = meta.teams.len(),
                emotes = meta.emotes.len(),
                "loaded chat metadata"
            );
            meta
        }
        Err(e) => {
            tracing::warn!(error = %e, "unable to load chat metadata, icons disabled");
            Metadata::default()
        }
    }
}

fn log_transcript_summary(t: &Transcript, cfg: &Config) {
    tracing::info!(
        messages = t.len(),
        last_ms = t.last_timestamp_ms(),
        "loaded chat messages"
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let n = cfg.logging.debug_message_samples.min(t.len());
        for (i, m) in t.messages().iter().take(n).enumerate() {
            tracing::debug!(
                idx = i,
                timestamp_ms = m.timestamp_ms,
                team = m.team_id.as_str(),
                user = m.user_name.as_str(),
                chars = m.text.chars().count(),
                "message sample"
            );
        }
    }
}
