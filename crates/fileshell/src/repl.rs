//! Line parser for the interactive shell.

use std::path::PathBuf;

use thiserror::Error;

/// Help text printed by `help`.
pub const HELP: &str = "\
Commands:
  ls [PATH]            list the working directory or PATH
  cd [PATH]            change directory (home or / without PATH)
  pwd                  print the working directory
  rm NAME              delete NAME
  cp NAME [NEW]        copy NAME to NEW, or onto the clipboard
  cut NAME             put NAME on the clipboard for moving
  paste                write the oldest clipboard entry here
  clear                empty the clipboard
  mv OLD NEW           rename OLD to NEW
  mkdir [NAME]         create directory NAME (or the working directory)
  put FILE             upload a local FILE here
  get NAME [FILE]      download NAME (to FILE, or stdout)
  login [USER]         authenticate, prompting for the password
  logout               forget credentials
  whoami               show the authenticated identity
  help                 show this text
  exit                 leave the shell";

/// Errors produced while parsing a shell line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplError {
    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("unknown command: {0} (try `help`)")]
    UnknownCommand(String),

    #[error("{command}: missing {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{0}: too many arguments")]
    TooManyArguments(&'static str),
}

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Ls(Option<String>),
    Cd(Option<String>),
    Pwd,
    Rm(String),
    Cp { name: String, new_name: Option<String> },
    Cut(String),
    Paste,
    Clear,
    Mv { old_name: String, new_name: String },
    Mkdir(Option<String>),
    Put(PathBuf),
    Get { name: String, output: Option<PathBuf> },
    Login(Option<String>),
    Logout,
    Whoami,
    Help,
    Exit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, ReplError> {
    let words = tokenize(line)?;
    let Some((command, rest)) = words.split_first() else {
        return Ok(None);
    };
    if command.starts_with('#') {
        return Ok(None);
    }

    let mut args = Args {
        command: "",
        words: rest.iter(),
    };

    let parsed = match command.as_str() {
        "ls" | "dir" => {
            args.command = "ls";
            ShellCommand::Ls(args.optional())
        }
        "cd" => {
            args.command = "cd";
            ShellCommand::Cd(args.optional())
        }
        "pwd" => ShellCommand::Pwd,
        "rm" | "del" => {
            args.command = "rm";
            ShellCommand::Rm(args.required("NAME")?)
        }
        "cp" => {
            args.command = "cp";
            ShellCommand::Cp {
                name: args.required("NAME")?,
                new_name: args.optional(),
            }
        }
        "cut" => {
            args.command = "cut";
            ShellCommand::Cut(args.required("NAME")?)
        }
        "paste" => ShellCommand::Paste,
        "clear" => ShellCommand::Clear,
        "mv" => {
            args.command = "mv";
            ShellCommand::Mv {
                old_name: args.required("OLD")?,
                new_name: args.required("NEW")?,
            }
        }
        "mkdir" => {
            args.command = "mkdir";
            ShellCommand::Mkdir(args.optional())
        }
        "put" => {
            args.command = "put";
            ShellCommand::Put(PathBuf::from(args.required("FILE")?))
        }
        "get" => {
            args.command = "get";
            ShellCommand::Get {
                name: args.required("NAME")?,
                output: args.optional().map(PathBuf::from),
            }
        }
        "login" => {
            args.command = "login";
            ShellCommand::Login(args.optional())
        }
        "logout" => ShellCommand::Logout,
        "whoami" => ShellCommand::Whoami,
        "help" | "?" => ShellCommand::Help,
        "exit" | "quit" => ShellCommand::Exit,
        other => return Err(ReplError::UnknownCommand(other.to_string())),
    };

    args.finish(command_name(&parsed))?;
    Ok(Some(parsed))
}

struct Args<'a> {
    command: &'static str,
    words: std::slice::Iter<'a, String>,
}

impl Args<'_> {
    fn optional(&mut self) -> Option<String> {
        self.words.next().cloned()
    }

    fn required(&mut self, argument: &'static str) -> Result<String, ReplError> {
        self.words.next().cloned().ok_or(ReplError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn finish(mut self, command: &'static str) -> Result<(), ReplError> {
        match self.words.next() {
            Some(_) => Err(ReplError::TooManyArguments(command)),
            None => Ok(()),
        }
    }
}

fn command_name(command: &ShellCommand) -> &'static str {
    match command {
        ShellCommand::Ls(_) => "ls",
        ShellCommand::Cd(_) => "cd",
        ShellCommand::Pwd => "pwd",
        ShellCommand::Rm(_) => "rm",
        ShellCommand::Cp { .. } => "cp",
        ShellCommand::Cut(_) => "cut",
        ShellCommand::Paste => "paste",
        ShellCommand::Clear => "clear",
        ShellCommand::Mv { .. } => "mv",
        ShellCommand::Mkdir(_) => "mkdir",
        ShellCommand::Put(_) => "put",
        ShellCommand::Get { .. } => "get",
        ShellCommand::Login(_) => "login",
        ShellCommand::Logout => "logout",
        ShellCommand::Whoami => "whoami",
        ShellCommand::Help => "help",
        ShellCommand::Exit => "exit",
    }
}

/// Split a line into words, honoring single quotes, double quotes and
/// backslash escapes.
fn tokenize(line: &str) -> Result<Vec<String>, ReplError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ReplError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
