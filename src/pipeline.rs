use anyhow::{Context, Result, anyhow};
use std::{fs, path::Path};

use chat_replay::{
    clock::{PlaybackClock, SimulatedClock},
    config::Config,
    formats::{
        self,
        time::{format_time_param, parse_time_param, seconds_to_ms, set_time_query, time_from_url},
    },
    input::parse_script,
    loader::{self, Source},
    model::PlaybackWindow,
    render::ChatWindow,
    session::Session,
};

use crate::cli::{ExportCmd, LinkCmd, ReplayCmd, VideoArgs};

fn window_of(video: &VideoArgs) -> PlaybackWindow {
    PlaybackWindow::new(video.start_offset_ms, video.duration_ms)
}

pub fn run_replay(cmd: ReplayCmd, cfg: &Config) -> Result<()> {
    let span = tracing::info_span!("replay", chat = cmd.video.chat.as_str(), format = ?cmd.format);
    let _g = span.enter();

    let mut cfg = cfg.clone();
    if let Some(n) = cmd.max_messages {
        cfg.sync.max_messages = n;
    }

    let window = window_of(&cmd.video);
    let chat = Source::parse(&cmd.video.chat);
    let metadata = cmd.metadata.as_deref().map(Source::parse);
    let loaded = loader::load_or_disable(&chat, metadata.as_ref(), &window, &cfg);

    let initial = match cmd.t.as_deref() {
        Some(t) => Some(parse_time_param(t).context("invalid --t value")?),
        None => time_from_url(&cmd.url).context("invalid --url")?,
    };

    let script = match &cmd.script {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading script: {}", path.display()))?;
            Some(parse_script(&raw)?)
        }
        None => None,
    };

    let stdout = std::io::stdout().lock();
    let renderer = ChatWindow::new(loaded.metadata, cfg.render.clone(), cmd.format, stdout);
    let clock = SimulatedClock::new(window.duration_ms);
    let mut session = Session::open(loaded.transcript, clock, renderer, &cfg, &cmd.url);

    session.seek_initial(initial);
    if cmd.delay_ms != 0 {
        session.adjust_delay(cmd.delay_ms);
    }

    match script {
        Some(steps) => {
            tracing::info!(steps = steps.len(), "running control script");
            session.run_script(&steps)?;
        }
        None => {
            session.clock_mut().play();
            session.run_until(cmd.until_ms)?;
        }
    }

    let position = session.clock().current_time_ms().max(0) as u64;
    tracing::info!(
        position_ms = position,
        shown = session.renderer().len(),
        resume = set_time_query(&cmd.url, position)?.as_str(),
        "replay finished"
    );

    session.close();
    Ok(())
}

pub fn run_export(cmd: ExportCmd, cfg: &Config) -> Result<()> {
    let span = tracing::info_span!("export", chat = cmd.video.chat.as_str());
    let _g = span.enter();

    let window = window_of(&cmd.video);
    let chat = Source::parse(&cmd.video.chat);
    let loaded = loader::load(&chat, None, &window, cfg)
        .with_context(|| format!("failed loading chat from {}", chat.name()))?;

    let rendered = formats::tsv::write_chat_tsv(&loaded.transcript, window.start_offset_ms)?;

    if cmd.stdout {
        print!("{rendered}");
        tracing::info!(mode = "stdout", "wrote output");
        return Ok(());
    }

    let out_path = derive_output_path(&cmd)?;
    write_output(&out_path, &rendered, cmd.overwrite)?;
    tracing::info!(path = out_path.as_str(), "wrote output file");

    Ok(())
}

pub fn run_link(cmd: LinkCmd) -> Result<()> {
    match cmd {
        LinkCmd::Format { seconds, url } => {
            let ms = seconds_to_ms(seconds)?;
            match url {
                Some(u) => println!("{}", set_time_query(&u, ms)?),
                None => println!("{}", format_time_param(ms)),
            }
        }
        LinkCmd::Parse { value } => {
            let ms = if value.contains("://") {
                time_from_url(&value)?.ok_or_else(|| anyhow!("no 't' parameter in {value}"))?
            } else {
                parse_time_param(&value)?
            };
            println!("{:.3}", ms as f64 / 1000.0);
        }
    }
    Ok(())
}

fn derive_output_path(cmd: &ExportCmd) -> Result<String> {
    if let Some(o) = &cmd.output {
        return Ok(o.clone());
    }

    if cmd.video.chat == "-" {
        return Err(anyhow!(
            "output path required when input is stdin and --stdout is not set"
        ));
    }

    let p = Path::new(&cmd.video.chat);
    let stem = p
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("bad input filename"))?;

    let parent = p.parent().unwrap_or_else(|| Path::new("."));
    let out = parent.join(format!("{stem}.trimmed.tsv"));
    Ok(out.to_string_lossy().to_string())
}

fn write_output(path: &str, data: &str, overwrite: bool) -> Result<()> {
    if Path::new(path).exists() && !overwrite {
        return Err(anyhow!(
            "refusing to overwrite existing file (pass --overwrite): {path}"
        ));
    }
    fs::write(path, data)?;
    Ok(())
}
