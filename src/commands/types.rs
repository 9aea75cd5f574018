/// A recognized user command. Anything unparsed falls through to plain chat.
///
/// `target` carries the optional phone number some commands accept so one
/// user can administer another's session; `None` means "the sender".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Clear history and pending image, keep prompt and enabled flag.
    Reset { target: Option<String> },
    ChatOn { target: Option<String> },
    ChatOff { target: Option<String> },
    /// Override the session's system prompt. Never blank: the parser rejects
    /// empty arguments before they reach the session store.
    SetSystemPrompt {
        target: Option<String>,
        prompt: String,
    },
    /// Web search with a non-empty query.
    Search(String),
    News,
    /// Current weather for a non-empty city.
    Weather(String),
    /// Follow-up question about the most recent saved image.
    AskAboutImage(String),
    /// A command was recognized but malformed; reply with this hint.
    Usage(&'static str),
}
