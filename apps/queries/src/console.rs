use std::str::FromStr;

use thiserror::Error;

pub const HELP: &str = "\
commands:
  search <text>      filter by text (empty clears)
  tags [tag ...]     filter by tags (none clears)
  sort <column>      sort by a column, again to reverse
  page <n>           go to page n
  size <n>           show n items per page
  select <id>        toggle selection of a query on this page
  all                toggle selection of every live query on this page
  vocab              list known tags
  back | forward     move through list history
  reload             fetch the current page again
  help               show this text
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Tags(Vec<String>),
    Sort(String),
    Page(u32),
    Size(u32),
    Select(i64),
    All,
    Vocab,
    Back,
    Forward,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'; type 'help'")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "search" | "q" => Ok(Command::Search(rest.to_string())),
            "tags" => Ok(Command::Tags(
                rest.split_whitespace().map(str::to_string).collect(),
            )),
            "sort" if !rest.is_empty() => Ok(Command::Sort(rest.to_string())),
            "sort" => Err(CommandError::BadArgument {
                command: "sort",
                expected: "a column name",
            }),
            "page" => number(rest, "page").map(Command::Page),
            "size" => number(rest, "size").map(Command::Size),
            "select" => rest
                .parse::<i64>()
                .map(Command::Select)
                .map_err(|_| CommandError::BadArgument {
                    command: "select",
                    expected: "a query id",
                }),
            "all" => Ok(Command::All),
            "vocab" => Ok(Command::Vocab),
            "back" => Ok(Command::Back),
            "forward" => Ok(Command::Forward),
            "reload" => Ok(Command::Reload),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn number(raw: &str, command: &'static str) -> Result<u32, CommandError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(CommandError::BadArgument {
            command,
            expected: "a positive number",
        }),
    }
}
