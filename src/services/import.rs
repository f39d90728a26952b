use crate::models::{ChannelInfo, ImportEvent, VideoRecord};
use crate::services::ytdlp::{ExtractMode, YtDlp};
use log::{debug, info, warn};
use serde_json::Value;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

const COUNT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 64;

/// Errors surfaced by the import pipeline. Per-line decode failures are not
/// part of this taxonomy on purpose: they are dropped inside the stream.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to start extraction tool: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("could not capture extraction tool output")]
    Capture,

    #[error("extraction tool timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("extraction tool exited with {status}: {stderr}")]
    ToolFailed { status: ExitStatus, stderr: String },

    #[error("failed to parse extraction tool output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unexpected extraction tool output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn configure(cmd: &mut Command) -> &mut Command {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
}

/// Last non-empty stderr line, enough to diagnose a failed invocation.
fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "(no stderr)".to_string())
}

/// Run a bounded invocation to completion. The child is killed when the
/// timeout fires, since the command is spawned with kill_on_drop.
async fn run_bounded(mut cmd: Command, limit: Duration) -> Result<Output, ImportError> {
    configure(&mut cmd);
    let child = cmd.spawn().map_err(ImportError::Spawn)?;
    match timeout(limit, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(ImportError::Timeout(limit)),
    }
}

/// Map one decoded tool document into a VideoRecord. `url` and `thumbnail`
/// are derived from the id, never taken from the document itself, and the
/// description is forced empty unless descriptions were requested.
pub(crate) fn video_from_value(value: &Value, descriptions: bool) -> VideoRecord {
    let id = value["id"].as_str().unwrap_or("").to_string();
    let description = if descriptions {
        value["description"].as_str().unwrap_or("").to_string()
    } else {
        String::new()
    };
    VideoRecord {
        title: value["title"].as_str().unwrap_or("").to_string(),
        url: format!("https://www.youtube.com/watch?v={id}"),
        duration: value["duration"]
            .as_f64()
            .filter(|secs| *secs >= 0.0)
            .map(|secs| secs as i64)
            .unwrap_or(0),
        thumbnail: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
        description,
        id,
    }
}

/// Strict decode-or-skip step for one NDJSON line. A line that fails to
/// decode must never poison the rest of the playlist.
fn decode_video_line(line: &str, descriptions: bool) -> Option<VideoRecord> {
    match serde_json::from_str::<Value>(line) {
        Ok(value) if value.is_object() => Some(video_from_value(&value, descriptions)),
        Ok(_) => {
            debug!("Dropping non-object extraction line");
            None
        }
        Err(e) => {
            debug!("Dropping undecodable extraction line: {e}");
            None
        }
    }
}

pub(crate) fn channel_from_value(value: &Value) -> ChannelInfo {
    ChannelInfo {
        title: value["channel"]
            .as_str()
            .or_else(|| value["uploader"].as_str())
            .unwrap_or("")
            .to_string(),
        channel_id: value["channel_id"].as_str().unwrap_or("").to_string(),
        thumbnail: value["thumbnail"].as_str().unwrap_or("").to_string(),
    }
}

fn total_from_probe(stdout: &[u8]) -> Result<u64, ImportError> {
    let value: Value = serde_json::from_slice(stdout)?;
    if let Some(total) = value["playlist_count"].as_u64() {
        return Ok(total);
    }
    value["entries"]
        .as_array()
        .map(|entries| entries.len() as u64)
        .ok_or_else(|| {
            ImportError::Malformed("probe output has neither playlist_count nor entries".to_string())
        })
}

async fn probe_total(cmd: Command) -> Result<u64, ImportError> {
    let output = run_bounded(cmd, COUNT_PROBE_TIMEOUT).await?;
    if !output.status.success() {
        return Err(ImportError::ToolFailed {
            status: output.status,
            stderr: stderr_excerpt(&output.stderr),
        });
    }
    total_from_probe(&output.stdout)
}

/// The one event-producing primitive behind both the streaming and the
/// synchronous import: spawn `extract`, optionally probe for a total count,
/// then decode stdout line by line into events.
///
/// Ordering: `Count` (if the probe succeeded) before any `Video`, `Video`
/// events in arrival order with a 1-based running `current`, exactly one
/// terminal `Done`. When the consumer drops the receiver the sender task
/// stops and the child is killed rather than left orphaned, even while the
/// child is idle between lines.
///
/// The extraction child is spawned before the probe runs, so both tools
/// briefly overlap while the probe is in flight; spawning up front is what
/// lets a spawn failure reach the caller as an `Err` instead of vanishing
/// inside the task.
pub(crate) fn stream_process_events(
    mut extract: Command,
    probe: Option<Command>,
    descriptions: bool,
) -> Result<mpsc::Receiver<ImportEvent>, ImportError> {
    configure(&mut extract);
    let mut child = extract.spawn().map_err(ImportError::Spawn)?;
    let stdout = child.stdout.take().ok_or(ImportError::Capture)?;

    // Stderr is diagnostic only, never parsed.
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("yt-dlp: {line}");
            }
        });
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        if let Some(probe_cmd) = probe {
            let probed = tokio::select! {
                result = probe_total(probe_cmd) => result,
                _ = tx.closed() => return,
            };
            match probed {
                Ok(total) => {
                    if tx.send(ImportEvent::Count { total }).await.is_err() {
                        return;
                    }
                }
                // An unknown total is a normal outcome; the absence of a
                // Count event is the signal the consumer gets.
                Err(e) => warn!("Playlist count probe failed: {e}"),
            }
        }

        let mut videos: Vec<VideoRecord> = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        loop {
            // Returning drops the child handle, which kills the process.
            let next = tokio::select! {
                line = lines.next_line() => line,
                _ = tx.closed() => {
                    debug!("Consumer disconnected, stopping extraction");
                    return;
                }
            };
            match next {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let Some(video) = decode_video_line(line, descriptions) else {
                        continue;
                    };
                    videos.push(video.clone());
                    let current = videos.len();
                    if tx.send(ImportEvent::Video { video, current }).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading extraction output: {e}");
                    break;
                }
            }
        }

        match child.wait().await {
            // --ignore-errors makes partial success the normal case, so a
            // non-zero exit still terminates with whatever was decoded.
            Ok(status) if !status.success() => {
                info!(
                    "Extraction tool exited with {status}, keeping {} decoded entries",
                    videos.len()
                );
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to wait for extraction tool: {e}"),
        }
        let _ = tx.send(ImportEvent::Done { videos }).await;
    });

    Ok(rx)
}

/// Live import of a playlist or channel URL as a stream of ImportEvents.
pub fn stream_playlist(
    tool: &YtDlp,
    url: &str,
    descriptions: bool,
) -> Result<mpsc::Receiver<ImportEvent>, ImportError> {
    let extract = tool.command(url, ExtractMode::Full { descriptions });
    let probe = tool.command(url, ExtractMode::CountProbe);
    stream_process_events(extract, Some(probe), descriptions)
}

pub(crate) async fn drain_to_done(mut events: mpsc::Receiver<ImportEvent>) -> Vec<VideoRecord> {
    while let Some(event) = events.recv().await {
        if let ImportEvent::Done { videos } = event {
            return videos;
        }
    }
    // A conformant pipeline always ends with Done; never hang on a stream
    // that closed without one.
    Vec::new()
}

/// Synchronous form of the playlist import: drains the event stream and
/// returns only the terminal record list.
pub async fn import_playlist(
    tool: &YtDlp,
    url: &str,
    descriptions: bool,
) -> Result<Vec<VideoRecord>, ImportError> {
    let events = stream_playlist(tool, url, descriptions)?;
    Ok(drain_to_done(events).await)
}

async fn lookup_value(tool: &YtDlp, url: &str) -> Result<Value, ImportError> {
    let output = run_bounded(tool.command(url, ExtractMode::Lookup), LOOKUP_TIMEOUT).await?;
    if !output.status.success() {
        return Err(ImportError::ToolFailed {
            status: output.status,
            stderr: stderr_excerpt(&output.stderr),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// One bounded lookup for channel metadata, bypassing the event stream.
pub async fn fetch_channel(tool: &YtDlp, url: &str) -> Result<ChannelInfo, ImportError> {
    let value = lookup_value(tool, url).await?;
    Ok(channel_from_value(&value))
}

/// One bounded lookup for a single video, mapped through the same
/// derivation rules as the playlist pipeline.
pub async fn fetch_video(tool: &YtDlp, url: &str) -> Result<VideoRecord, ImportError> {
    let value = lookup_value(tool, url).await?;
    Ok(video_from_value(&value, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    async fn collect(mut events: mpsc::Receiver<ImportEvent>) -> Vec<ImportEvent> {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    }

    #[test]
    fn video_fields_are_derived_from_id() {
        let value = json!({"id": "abc123", "title": "Ep 1 🎬", "duration": 600});
        let video = video_from_value(&value, true);
        assert_eq!(video.title, "Ep 1 🎬");
        assert_eq!(video.id, "abc123");
        assert_eq!(video.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(video.duration, 600);
        assert_eq!(video.thumbnail, "https://i.ytimg.com/vi/abc123/hqdefault.jpg");
        assert_eq!(video.description, "");
    }

    #[test]
    fn derived_fields_override_tool_supplied_ones() {
        let value = json!({
            "id": "xyz",
            "url": "https://evil.example/clickme",
            "thumbnail": "https://evil.example/thumb.png"
        });
        let video = video_from_value(&value, false);
        assert_eq!(video.url, "https://www.youtube.com/watch?v=xyz");
        assert_eq!(video.thumbnail, "https://i.ytimg.com/vi/xyz/hqdefault.jpg");
    }

    #[test]
    fn description_forced_empty_when_not_requested() {
        let value = json!({"id": "a", "description": "spoilers"});
        assert_eq!(video_from_value(&value, false).description, "");
        assert_eq!(video_from_value(&value, true).description, "spoilers");
    }

    #[test]
    fn missing_duration_maps_to_zero() {
        let value = json!({"id": "a", "duration": null});
        assert_eq!(video_from_value(&value, false).duration, 0);
        let negative = json!({"id": "a", "duration": -3});
        assert_eq!(video_from_value(&negative, false).duration, 0);
    }

    #[test]
    fn channel_title_falls_back_to_uploader() {
        let value = json!({"uploader": "Some Channel", "channel_id": "UC123", "thumbnail": "t"});
        let info = channel_from_value(&value);
        assert_eq!(info.title, "Some Channel");
        assert_eq!(info.channel_id, "UC123");

        let with_channel = json!({"channel": "Named", "uploader": "Ignored"});
        assert_eq!(channel_from_value(&with_channel).title, "Named");
    }

    #[test]
    fn probe_prefers_playlist_count_over_entries() {
        assert_eq!(total_from_probe(br#"{"playlist_count": 42}"#).unwrap(), 42);
        assert_eq!(
            total_from_probe(br#"{"entries": [{}, {}, {}]}"#).unwrap(),
            3
        );
        assert_eq!(
            total_from_probe(br#"{"playlist_count": 7, "entries": [{}]}"#).unwrap(),
            7
        );
        assert!(total_from_probe(br#"{"title": "no counts here"}"#).is_err());
        assert!(total_from_probe(b"not json").is_err());
    }

    #[tokio::test]
    async fn malformed_and_blank_lines_are_dropped() {
        let script = r#"printf '%s\n' '{"id":"abc","title":"One"}' 'garbage' '   ' '{"id":"def","title":"Two","duration":12}'"#;
        let events = collect(stream_process_events(sh(script), None, false).unwrap()).await;
        assert_eq!(events.len(), 3);
        match &events[0] {
            ImportEvent::Video { video, current } => {
                assert_eq!(*current, 1);
                assert_eq!(video.id, "abc");
            }
            other => panic!("expected first video event, got {other:?}"),
        }
        match &events[1] {
            ImportEvent::Video { video, current } => {
                assert_eq!(*current, 2);
                assert_eq!(video.id, "def");
                assert_eq!(video.duration, 12);
            }
            other => panic!("expected second video event, got {other:?}"),
        }
        match &events[2] {
            ImportEvent::Done { videos } => {
                let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
                assert_eq!(ids, ["abc", "def"]);
            }
            other => panic!("expected terminal done event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_json_lines_are_dropped() {
        let script = r#"printf '%s\n' '42' '"text"' '[{"id":"x"}]' '{"id":"abc","title":"One"}'"#;
        let events = collect(stream_process_events(sh(script), None, false).unwrap()).await;
        assert_eq!(events.len(), 2);
        match &events[0] {
            ImportEvent::Video { video, current } => {
                assert_eq!(*current, 1);
                assert_eq!(video.id, "abc");
            }
            other => panic!("expected video event, got {other:?}"),
        }
        match &events[1] {
            ImportEvent::Done { videos } => assert_eq!(videos.len(), 1),
            other => panic!("expected terminal done event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn consumer_disconnect_kills_the_extraction_tool() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("outlived-consumer");
        let script = format!(
            r#"printf '%s\n' '{{"id":"abc","title":"One"}}'; sleep 2; touch '{}'"#,
            marker.display()
        );
        let mut events = stream_process_events(sh(&script), None, false).unwrap();
        assert!(matches!(events.recv().await, Some(ImportEvent::Video { .. })));
        drop(events);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(
            !marker.exists(),
            "extraction tool kept running after the consumer disconnected"
        );
    }

    #[tokio::test]
    async fn count_event_precedes_all_videos() {
        let probe = sh(r#"printf '%s' '{"playlist_count": 42}'"#);
        let extract = sh(r#"printf '%s\n' '{"id":"abc","title":"One"}'"#);
        let events = collect(stream_process_events(extract, Some(probe), false).unwrap()).await;
        assert!(matches!(events[0], ImportEvent::Count { total: 42 }));
        assert!(matches!(events[1], ImportEvent::Video { .. }));
        assert!(matches!(events[2], ImportEvent::Done { .. }));
    }

    #[tokio::test]
    async fn failed_probe_yields_no_count_event() {
        let probe = sh("printf 'not json'; exit 1");
        let extract = sh(r#"printf '%s\n' '{"id":"abc","title":"One"}'"#);
        let events = collect(stream_process_events(extract, Some(probe), false).unwrap()).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ImportEvent::Video { .. }));
        assert!(matches!(events[1], ImportEvent::Done { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_still_terminates_with_done() {
        let extract = sh(r#"printf '%s\n' '{"id":"abc","title":"One"}'; exit 3"#);
        let events = collect(stream_process_events(extract, None, false).unwrap()).await;
        match events.last() {
            Some(ImportEvent::Done { videos }) => assert_eq!(videos.len(), 1),
            other => panic!("expected done event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extraction_spawn_failure_surfaces_to_caller() {
        let cmd = Command::new("/nonexistent/extraction-tool");
        match stream_process_events(cmd, None, false) {
            Err(ImportError::Spawn(_)) => {}
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_returns_only_the_done_payload() {
        let script = r#"printf '%s\n' '{"id":"a","title":"A"}' '{"id":"b","title":"B"}'"#;
        let events = stream_process_events(sh(script), None, false).unwrap();
        let videos = drain_to_done(events).await;
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[1].id, "b");
    }

    #[tokio::test]
    async fn bounded_runs_time_out() {
        let result = run_bounded(sh("sleep 5"), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ImportError::Timeout(_))));
    }
}
