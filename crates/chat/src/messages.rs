//! Texts sent by the bot.

use hourbot_core::domain::hours::{Hours, HoursPolicy};
use hourbot_core::domain::user::UserId;

pub const PROMPT_TEXT: &str = "Input your hours for the week as a Float (ex: 10.0, 5.7):";
pub const REMINDER_TEXT: &str =
    "Hey don't forget to input your hours here as a Float (10.0, 5.7):";
pub const ALREADY_REGISTERED_TEXT: &str = "User already added";
pub const EMPTY_ROSTER_TEXT: &str =
    "No users are registered yet. Use the add command to join the hours roster.";
pub const STORE_RETRY_TEXT: &str =
    "I could not record your hours right now. Please send the value again.";

pub fn confirmation(hours: Hours) -> String {
    format!("Recording {hours} hours for the week")
}

pub fn registered(user_id: &UserId) -> String {
    format!("Added <@{user_id}> to the hours roster")
}

pub fn round_summary(asked: usize, unreachable: usize) -> String {
    let summary = match asked {
        1 => "Asked 1 user for their hours".to_owned(),
        n => format!("Asked {n} users for their hours"),
    };
    match unreachable {
        0 => summary,
        n => format!("{summary} ({n} could not be reached)"),
    }
}

pub fn invalid_hours(raw: &str) -> String {
    format!("`{}` is not a number. {PROMPT_TEXT}", raw.trim())
}

pub fn hours_out_of_range(hours: Hours, policy: &HoursPolicy) -> String {
    format!(
        "{hours} is outside the accepted range {min} to {max}. {PROMPT_TEXT}",
        min = policy.min,
        max = policy.max
    )
}

pub fn help(prefix: &str) -> String {
    [
        "Hours bot commands:".to_owned(),
        format!("`{prefix} add` - add yourself to the hours roster"),
        format!("`{prefix} dm` - ask every registered user for their weekly hours"),
        format!("`{prefix} help` - show this message"),
    ]
    .join("\n")
}

pub fn unsupported_command(prefix: &str, verb: &str) -> String {
    format!("Unsupported command `{prefix} {verb}`. Try `{prefix} help`.")
}
