//! Terminal presentation: the login prompt or the identity card, plus the
//! commands the user can type.

use std::fmt::Write as _;

use strum::{Display, EnumString};

use crate::auth::{Identity, LoginOutcome, Session};

const CARD_WIDTH: usize = 48;

/// What the screen currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen<'a> {
    Login,
    Profile {
        identity: &'a Identity,
        avatar_url: String,
    },
}

impl<'a> Screen<'a> {
    /// Pick the screen for the current session state.
    pub fn for_session(session: Option<&'a Session>, cdn_base_url: &str) -> Self {
        match session {
            Some(session) => Self::Profile {
                identity: &session.identity,
                avatar_url: session.identity.avatar_url(cdn_base_url),
            },
            None => Self::Login,
        }
    }

    /// Commands offered on this screen.
    pub fn commands(&self) -> &'static [Command] {
        match self {
            Self::Login => &[Command::Login, Command::Quit],
            Self::Profile { .. } => &[Command::Logout, Command::Quit],
        }
    }

    pub fn offers(&self, command: Command) -> bool {
        command == Command::Help || self.commands().contains(&command)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "─".repeat(CARD_WIDTH);
        let _ = writeln!(out, "┌{rule}┐");
        match self {
            Self::Login => {
                card_line(&mut out, "👤");
                card_line(&mut out, "");
                card_line(&mut out, "Sign in with Discord");
            }
            Self::Profile {
                identity,
                avatar_url,
            } => {
                card_line(&mut out, identity.display_name());
                if identity.display_name() != identity.username {
                    card_line(&mut out, &format!("@{}", identity.username));
                }
                card_line(&mut out, "");
                card_line(&mut out, &format!("avatar: {avatar_url}"));
            }
        }
        let _ = writeln!(out, "└{rule}┘");
        let hints: Vec<String> = self
            .commands()
            .iter()
            .map(|c| format!("[{}]", c.hint()))
            .collect();
        let _ = write!(out, "{}", hints.join("  "));
        out
    }
}

fn card_line(out: &mut String, text: &str) {
    let _ = writeln!(out, "│ {text}");
}

/// A command typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Command {
    #[strum(to_string = "login", serialize = "l")]
    Login,
    #[strum(to_string = "logout", serialize = "o")]
    Logout,
    #[strum(to_string = "help", serialize = "h", serialize = "?")]
    Help,
    #[strum(to_string = "quit", serialize = "q", serialize = "exit")]
    Quit,
}

impl Command {
    /// Parse one input line; `None` for blank lines.
    pub fn parse_line(line: &str) -> Option<Result<Self, String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.parse::<Self>().map_err(|_| trimmed.to_string()))
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::Login => "l: log in",
            Self::Logout => "o: log out",
            Self::Help => "h: help",
            Self::Quit => "q: quit",
        }
    }
}

/// One-line status shown after a login attempt.
pub fn describe_outcome(outcome: &LoginOutcome) -> String {
    match outcome {
        LoginOutcome::Authenticated(identity) => {
            format!("✅ Signed in as {}", identity.display_name())
        }
        LoginOutcome::Cancelled => "Sign-in cancelled".to_string(),
        // Details are in the log; the prompt stays on the login screen.
        LoginOutcome::Failed(_) => "❌ Sign-in failed, please try again".to_string(),
    }
}
