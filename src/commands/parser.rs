use std::path::PathBuf;

// Command enum to represent store commands
#[derive(Debug, PartialEq)]
pub enum Command {
    Put { key: String, source: PathBuf },
    Get(String),
    List(String),
    Delete(String),
    Copy { from: String, to: String },
    Move { from: String, to: String },
    Stat(String),
    Help,
    Unknown(String),
}

pub const USAGE: &str = "\
usage: rax-store <command> [args]

commands:
  put <key> <local-file>   store a local file under key
  get <key>                write an object to stdout
  list [prefix]            list objects under prefix
  delete <key>             delete an object or prefix
  copy <from> <to>         copy an object or prefix
  move <from> <to>         move an object or prefix
  stat <key>               show object size and modification time
  help                     show this message
";

// Parse a raw command line into Command enum
pub fn parse_command(raw: &str) -> Command {
    parse_args(raw.split_whitespace().map(str::to_string))
}

// Parse already split arguments (program name excluded)
pub fn parse_args<I>(args: I) -> Command
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let Some((verb, rest)) = args.split_first() else {
        return Command::Help;
    };

    match (verb.to_ascii_lowercase().as_str(), rest) {
        ("put", [key, source]) => Command::Put {
            key: key.clone(),
            source: PathBuf::from(source),
        },
        ("get", [key]) => Command::Get(key.clone()),
        ("list" | "ls", []) => Command::List(String::new()),
        ("list" | "ls", [prefix]) => Command::List(prefix.clone()),
        ("delete" | "rm", [key]) => Command::Delete(key.clone()),
        ("copy" | "cp", [from, to]) => Command::Copy {
            from: from.clone(),
            to: to.clone(),
        },
        ("move" | "mv", [from, to]) => Command::Move {
            from: from.clone(),
            to: to.clone(),
        },
        ("stat", [key]) => Command::Stat(key.clone()),
        ("help" | "-h" | "--help", _) => Command::Help,
        _ => Command::Unknown(args.join(" ")),
    }
}
