use client_core::SortMode;
use shared::domain::CreatureId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A missing password is prompted for on the next line.
    Login {
        username: String,
        password: Option<String>,
    },
    Logout,
    Whoami,
    Search(String),
    Sort(SortMode),
    Page(u32),
    Next,
    Prev,
    Retry,
    Show(CreatureId),
    View,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid sort mode `{0}`, expected one of: unset, id, name")]
    InvalidSort(String),
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "login" => {
                let mut args = rest.split_whitespace();
                let username = args
                    .next()
                    .ok_or(CommandError::Usage("login <username> [password]"))?;
                Command::Login {
                    username: username.to_string(),
                    password: args.next().map(str::to_string),
                }
            }
            "logout" => Command::Logout,
            "whoami" => Command::Whoami,
            "search" | "s" | "/" => Command::Search(rest.to_string()),
            "clear" => Command::Search(String::new()),
            "sort" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("sort <unset|id|name>"));
                }
                Command::Sort(
                    rest.parse()
                        .map_err(|_| CommandError::InvalidSort(rest.to_string()))?,
                )
            }
            "page" => Command::Page(
                rest.parse()
                    .map_err(|_| CommandError::Usage("page <number>"))?,
            ),
            "next" | "n" => Command::Next,
            "prev" | "p" => Command::Prev,
            "retry" | "r" => Command::Retry,
            "show" => Command::Show(CreatureId(
                rest.trim_start_matches('#')
                    .parse()
                    .map_err(|_| CommandError::Usage("show <id>"))?,
            )),
            "view" | "ls" => Command::View,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(keyword.to_string())),
        };
        Ok(Some(command))
    }

    /// Commands that talk to the catalog and so need an authenticated session.
    pub fn needs_session(&self) -> bool {
        matches!(
            self,
            Command::Search(_)
                | Command::Sort(_)
                | Command::Page(_)
                | Command::Next
                | Command::Prev
                | Command::Retry
                | Command::Show(_)
                | Command::View
        )
    }
}

pub const HELP: &str = "\
commands:
  login <username> [password]   sign in (prompts for the password if omitted)
  logout                        sign out and forget the saved session
  whoami                        show the current session
  search <text>                 search by name, or by number when every term is numeric
  clear                         clear the search text
  sort <unset|id|name>          choose how results are ordered
  page <n> | next | prev        move between result pages
  retry                         repeat the last failed request
  show <id>                     show one creature in detail
  view                          redraw the current results
  help                          this text
  quit                          leave";

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
