//! Console commands.  Indices are typed 1-based and stored 0-based.

use radio_core::directory::SearchKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Countries,
    Languages,
    Tags,
    Search { kind: SearchKind, value: String },
    Results,
    Play(usize),
    History,
    Favorites,
    Replay(usize),
    FavoritePlay(usize),
    Favorite,
    Unfavorite(usize),
    Pause,
    Resume,
    Toggle,
    Stop,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  countries | languages | tags          list what can be searched
  search <country|language|tag> <name>  find stations
  results                               show the last search results
  play <n>                              play search result n
  history | favorites                   show the lists
  replay <n>                            play history entry n
  fav-play <n>                          play favorite n
  fav                                   add the current station to favorites
  unfav <n>                             remove favorite n
  pause | resume | toggle | stop        playback control
  status                                what is playing
  help | quit";

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "countries" => Command::Countries,
            "languages" => Command::Languages,
            "tags" => Command::Tags,
            "search" | "s" => {
                let (kind, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: search <country|language|tag> <name>".to_string())?;
                let kind = kind.parse::<SearchKind>().map_err(|e| e.to_string())?;
                Command::Search {
                    kind,
                    value: value.trim().to_string(),
                }
            }
            "results" | "r" => Command::Results,
            "play" | "p" => Command::Play(index(rest)?),
            "history" | "h" => Command::History,
            "favorites" | "favs" | "f" => Command::Favorites,
            "replay" => Command::Replay(index(rest)?),
            "fav-play" => Command::FavoritePlay(index(rest)?),
            "fav" => Command::Favorite,
            "unfav" => Command::Unfavorite(index(rest)?),
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "toggle" | "t" | "space" => Command::Toggle,
            "stop" => Command::Stop,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(cmd))
    }
}

fn index(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("expected a number from 1, got '{}'", arg)),
    }
}
