//! Bot command parsing and the static reply texts.

/// Greeting sent in response to `/start`.
pub const START_TEXT: &str = "Welcome to the Video Converter Bot!\n\n\
    I can convert any video file into a streamable format.\n\n\
    Simply send me a video file and I will do the rest.\n\n\
    For more information, use the /help command.";

/// Usage instructions sent in response to `/help`.
pub const HELP_TEXT: &str = "Video Converter Bot Help\n\n\
    How to use:\n\
    1. Send any video file to me.\n\
    2. I will download it, convert it to a streamable format, and send it back to you.\n\n\
    Commands:\n\
    /start - Display the welcome message.\n\
    /help - Display this help message.\n\
    /cancel - Cancel the current operation.";

/// A recognized bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the welcome message.
    Start,
    /// Show usage instructions.
    Help,
    /// Abort the caller's active session.
    Cancel,
}

/// Parses the leading command out of a message text.
///
/// Accepts an optional `@BotName` suffix and ignores anything after the
/// first whitespace. Returns `None` for plain text and unknown commands.
#[must_use]
pub fn parse(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let command = command.split('@').next().unwrap_or(command);
    match command {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "cancel" => Some(Command::Cancel),
        _ => None,
    }
}
