//! Stimulus Listener
//!
//! Reads one command per line from an async reader (stdin in production)
//! and forwards it to the runtime mailbox.
//!
//! ```text
//! quit                 stop the daemon
//! touch head 2         touch sensor, tap count optional
//! head 2               shorthand for a head touch
//! touch cheek_left     cheek taps adjust the volume
//! laugh                any catalog event or touch token
//! tell me a joke       anything else is classified as an utterance
//! ```

use face_core::{FaceCommand, StimulusEvent, Touch};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputLine {
    /// Nothing to do
    Blank,
    /// Stop the daemon
    Quit,
    /// A structured stimulus
    Stimulus(StimulusEvent),
    /// Free text for the keyword classifier
    Utterance(String),
    /// Malformed command
    Invalid(String),
}

/// Parse one line of input
pub fn parse_line(line: &str) -> InputLine {
    let line = line.trim();
    if line.is_empty() {
        return InputLine::Blank;
    }

    let mut words = line.split_whitespace();
    let first = words.next().unwrap_or_default().to_lowercase();

    match first.as_str() {
        "quit" | "exit" if words.next().is_none() => InputLine::Quit,
        "touch" => parse_touch(words.next(), words.next()),
        "head" => parse_touch(Some("head"), words.next()),
        _ => match StimulusEvent::from_token(line) {
            Some(event) => InputLine::Stimulus(event),
            None => InputLine::Utterance(line.to_string()),
        },
    }
}

fn parse_touch(location: Option<&str>, taps: Option<&str>) -> InputLine {
    let Some(location) = location else {
        return InputLine::Invalid("touch needs a location".to_string());
    };

    let touch = match location.to_lowercase().as_str() {
        "head" => {
            let taps = match taps {
                None => 1,
                Some(raw) => match raw.parse::<u8>() {
                    Ok(n) => n,
                    Err(_) => return InputLine::Invalid(format!("bad tap count: {raw}")),
                },
            };
            Touch::head(taps)
        }
        "cheek_left" | "left" => Touch::CheekLeft,
        "cheek_right" | "right" => Touch::CheekRight,
        "cheek_both" | "both" => Touch::CheekBoth,
        other => return InputLine::Invalid(format!("unknown touch location: {other}")),
    };

    InputLine::Stimulus(StimulusEvent::Touch(touch))
}

/// Forward lines from `reader` until EOF, `quit`, or the runtime goes away
///
/// With `exit_on_eof`, reaching the end of input also shuts the runtime
/// down; otherwise the face keeps running without input.
///
/// # Errors
///
/// Returns the underlying read error.
pub async fn listen<R>(
    reader: R,
    commands: mpsc::Sender<FaceCommand>,
    exit_on_eof: bool,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            InputLine::Blank => continue,
            InputLine::Quit => FaceCommand::Shutdown,
            InputLine::Stimulus(event) => FaceCommand::Stimulus(event),
            InputLine::Utterance(text) => FaceCommand::Utterance(text),
            InputLine::Invalid(reason) => {
                warn!(line = %line, reason = %reason, "Ignoring input");
                continue;
            }
        };

        let quit = command == FaceCommand::Shutdown;
        if commands.send(command).await.is_err() {
            debug!("Runtime stopped, input listener exiting");
            return Ok(());
        }
        if quit {
            return Ok(());
        }
    }

    info!(exit_on_eof, "Input reached end of file");
    if exit_on_eof {
        // The runtime may already be gone
        let _ = commands.send(FaceCommand::Shutdown).await;
    }
    Ok(())
}
