use super::types::Command;
use crate::config::CommandsConfig;

pub const USAGE_SEARCH: &str = "Uso: busca en internet <tu búsqueda>";
pub const USAGE_WEATHER: &str = "Uso: /clima <ciudad>";
pub const USAGE_CHAT_ON: &str = "Uso: /chat-on <número> o /chat-on";
pub const USAGE_CHAT_OFF: &str = "Uso: /chat-off <número> o /chat-off";
pub const USAGE_PROMPT: &str =
    "Uso: /prompt <nuevo prompt del sistema>\no: /prompt <número> <nuevo prompt del sistema>";

/// Parse an inbound message against the configured command table.
///
/// Matching is case-insensitive; argument text keeps its original casing.
/// Returns `None` for plain conversation, which the text flow routes to the
/// model instead. Malformed arguments become [`Command::Usage`] so blank or
/// invalid input never reaches the session store.
pub fn parse_command(input: &str, commands: &CommandsConfig) -> Option<Command> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();

    if lowered == commands.news {
        return Some(Command::News);
    }

    if let Some(rest) = commands
        .reset
        .iter()
        .find_map(|alias| strip_word_ci(trimmed, alias))
    {
        // A non-numeric trailer is ignored: the sender resets their own chat.
        return Some(Command::Reset {
            target: phone_number(rest.trim()),
        });
    }

    if let Some(rest) = strip_word_ci(trimmed, &commands.chat_on) {
        return Some(match optional_phone_target(rest.trim()) {
            Ok(target) => Command::ChatOn { target },
            Err(()) => Command::Usage(USAGE_CHAT_ON),
        });
    }
    if let Some(rest) = strip_word_ci(trimmed, &commands.chat_off) {
        return Some(match optional_phone_target(rest.trim()) {
            Ok(target) => Command::ChatOff { target },
            Err(()) => Command::Usage(USAGE_CHAT_OFF),
        });
    }

    if let Some(rest) = strip_word_ci(trimmed, &commands.system_prompt) {
        let rest = rest.trim();
        let (target, prompt) = match rest.split_once(char::is_whitespace) {
            Some((first, remainder)) if phone_number(first).is_some() => {
                (phone_number(first), remainder.trim())
            }
            _ => (None, rest),
        };
        if prompt.is_empty() {
            return Some(Command::Usage(USAGE_PROMPT));
        }
        return Some(Command::SetSystemPrompt {
            target,
            prompt: prompt.to_string(),
        });
    }

    if let Some(rest) = strip_prefix_ci(trimmed, &commands.image_prefix) {
        return Some(Command::AskAboutImage(rest.trim().to_string()));
    }
    if let Some(rest) = strip_prefix_ci(trimmed, &commands.search) {
        let query = rest.trim();
        if query.is_empty() {
            return Some(Command::Usage(USAGE_SEARCH));
        }
        return Some(Command::Search(query.to_string()));
    }
    if let Some(rest) = strip_word_ci(trimmed, &commands.weather) {
        let city = rest.trim();
        if city.is_empty() {
            return Some(Command::Usage(USAGE_WEATHER));
        }
        return Some(Command::Weather(city.to_string()));
    }

    // Phrases like "en la foto" mark a plain message as an image follow-up.
    if commands
        .image_references
        .iter()
        .any(|phrase| lowered.contains(phrase.as_str()))
    {
        return Some(Command::AskAboutImage(trimmed.to_string()));
    }

    None
}

/// Empty arg means "the sender"; digits are a target; anything else is junk.
fn optional_phone_target(arg: &str) -> Result<Option<String>, ()> {
    if arg.is_empty() {
        Ok(None)
    } else if let Some(number) = phone_number(arg) {
        Ok(Some(number))
    } else {
        Err(())
    }
}

fn phone_number(arg: &str) -> Option<String> {
    (!arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit())).then(|| arg.to_string())
}

/// Case-insensitive prefix strip; prefixes like `"busca en internet "` carry
/// their own trailing separator.
fn strip_prefix_ci<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    // `get` keeps multibyte input safe when the cut lands mid-character.
    let head = input.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &input[prefix.len()..])
}

/// Like `strip_prefix_ci` but the prefix is a standalone word: `/clima` must
/// not match `/climatizar`.
fn strip_word_ci<'a>(input: &'a str, word: &str) -> Option<&'a str> {
    let rest = strip_prefix_ci(input, word)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}
