//! Viewer line input parsing

/// One line typed by the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerInput {
    /// Command for the host, with any `!` or `/` chat prefix removed
    Command(String),
    /// Zero-based option of the shown menu
    Select(usize),
    Back,
    Close,
    Quit,
    Help,
    Empty,
}

/// Menus are numbered from 1 on screen; `0` is not an option.
pub fn parse_line(line: &str) -> ViewerInput {
    let line = line.trim();
    if line.is_empty() {
        return ViewerInput::Empty;
    }

    if let Ok(number) = line.parse::<usize>() {
        return match number.checked_sub(1) {
            Some(option) => ViewerInput::Select(option),
            None => ViewerInput::Command(line.to_string()),
        };
    }

    match line.to_ascii_lowercase().as_str() {
        "b" | "back" => ViewerInput::Back,
        "q" | "close" => ViewerInput::Close,
        "quit" | "exit" => ViewerInput::Quit,
        "h" | "help" | "?" => ViewerInput::Help,
        _ => {
            let command = line.trim_start_matches(['!', '/']);
            ViewerInput::Command(command.to_string())
        }
    }
}

pub const HELP: &str = "\
Commands:
  servers      open the server directory (also !servers, /css_servers)
  <number>     pick an option of the shown menu
  b, back      go back one menu
  q, close     close the menu
  quit         disconnect and exit";
