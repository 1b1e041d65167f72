//! Console input parsing.

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Connect a user: `join <id> <name> [use] [admin]`.
    Join {
        /// User id.
        id: u64,
        /// Display name.
        name: String,
        /// Holds `modmail.use`.
        can_use: bool,
        /// Holds `modmail.admin`.
        admin: bool,
    },
    /// Disconnect a user: `leave <id>`.
    Leave(u64),
    /// Run a chat command as a user: `<id> /<command>`.
    Command {
        /// User id.
        id: u64,
        /// Command name without the slash.
        name: String,
    },
    /// Write a note into the user's open mailbox: `write <id> <text>`.
    Write {
        /// User id.
        id: u64,
        /// Note text, `\n` sequences become line breaks.
        text: String,
    },
    /// Close whatever surface the user has open: `close <id>`.
    Close(u64),
    /// Show connected users and open surfaces.
    List,
    /// Show usage.
    Help,
    /// Exit.
    Quit,
}

/// Usage text printed by `help`.
pub const USAGE: &str = "\
commands:
  join <id> <name> [use] [admin]   connect a user with the given permissions
  leave <id>                       disconnect a user
  <id> /<command>                  run a chat command as a user
  write <id> <text>                put a note in the user's open mailbox
  close <id>                       close the user's open mailbox or archive
  list                             show users and open surfaces
  quit                             exit";

/// Parses one input line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns a message describing what is wrong with the line.
pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = split_word(line);
    let input = match head {
        "join" => {
            let (id, rest) = split_word(rest);
            let (name, rest) = split_word(rest);
            if name.is_empty() {
                return Err("usage: join <id> <name> [use] [admin]".to_string());
            }
            let flags: Vec<&str> = rest.split_whitespace().collect();
            if let Some(unknown) = flags.iter().find(|f| !matches!(**f, "use" | "admin")) {
                return Err(format!("unknown permission {unknown:?}"));
            }
            Input::Join {
                id: parse_id(id)?,
                name: name.to_string(),
                can_use: flags.contains(&"use"),
                admin: flags.contains(&"admin"),
            }
        }
        "leave" => Input::Leave(parse_id(rest)?),
        "write" => {
            let (id, text) = split_word(rest);
            Input::Write {
                id: parse_id(id)?,
                text: text.replace("\\n", "\n"),
            }
        }
        "close" => Input::Close(parse_id(rest)?),
        "list" => Input::List,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        id => {
            let Some(name) = rest.strip_prefix('/') else {
                return Err(format!("unknown input {line:?}, try `help`"));
            };
            Input::Command {
                id: parse_id(id)?,
                name: name.trim().to_string(),
            }
        }
    };

    Ok(Some(input))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.split_once(char::is_whitespace)
        .map_or((s, ""), |(word, rest)| (word, rest.trim_start()))
}

fn parse_id(s: &str) -> Result<u64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid user id {:?}", s.trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        assert_eq!(
            parse("join 7 Alice use admin").unwrap(),
            Some(Input::Join {
                id: 7,
                name: "Alice".to_string(),
                can_use: true,
                admin: true,
            })
        );
        assert_eq!(
            parse("join 8 Bob").unwrap(),
            Some(Input::Join {
                id: 8,
                name: "Bob".to_string(),
                can_use: false,
                admin: false,
            })
        );
        assert!(parse("join 8").is_err());
        assert!(parse("join 8 Bob root").is_err());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse("7 /sendmail").unwrap(),
            Some(Input::Command {
                id: 7,
                name: "sendmail".to_string(),
            })
        );
        assert!(parse("7 sendmail").is_err());
        assert!(parse("x /sendmail").is_err());
    }

    #[test]
    fn test_parse_write_keeps_spacing() {
        assert_eq!(
            parse("write 7 two  spaces\\nnext line").unwrap(),
            Some(Input::Write {
                id: 7,
                text: "two  spaces\nnext line".to_string(),
            })
        );
        assert_eq!(
            parse("write 7").unwrap(),
            Some(Input::Write {
                id: 7,
                text: String::new(),
            })
        );
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("close 3").unwrap(), Some(Input::Close(3)));
        assert_eq!(parse("leave 3").unwrap(), Some(Input::Leave(3)));
        assert_eq!(parse("list").unwrap(), Some(Input::List));
        assert_eq!(parse("quit").unwrap(), Some(Input::Quit));
    }
}
