//! Interactive command parsing for the terminal control surface

/// A user action typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture the current preview frame into the gallery
    Snap,
    /// Start the continuous transcription session
    Record,
    /// Stop the transcription session
    Stop,
    /// List saved photos
    Photos,
    /// Delete a saved photo by filename
    Delete(String),
    /// Show the command summary
    Help,
    /// Release everything and exit
    Quit,
}

/// Parse one input line into a command, if it is one
pub fn parse(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "snap" | "s" => Some(Command::Snap),
        "rec" | "record" => Some(Command::Record),
        "stop" => Some(Command::Stop),
        "photos" | "ls" => Some(Command::Photos),
        "delete" | "rm" => parts.next().map(|name| Command::Delete(name.to_string())),
        "help" | "?" => Some(Command::Help),
        "quit" | "q" | "exit" => Some(Command::Quit),
        _ => None,
    }
}
