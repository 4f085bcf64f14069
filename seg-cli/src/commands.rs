//! REPL command parsing.

/// One line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Plain text to reply to.
    Say(String),
    /// Advance simulated time. `None` picks 1 to 30 days at random.
    Tick(Option<f64>),
    /// Dream, optionally at a given intensity.
    Dream(Option<f32>),
    /// List memories, optionally filtered.
    Memories(Option<String>),
    /// Add a user memory.
    Add(String),
    /// Prune a memory by id.
    Prune(String),
    /// Make a memory a core anchor.
    Pin(String),
    /// Export the state to the export directory.
    Export,
    /// Replace the state from a file.
    Import(String),
    /// Generate a new persona, optionally of an archetype.
    Persona(Option<String>),
    /// Save the current persona to the library.
    Save(Option<String>),
    /// List or search the library.
    Library(Option<String>),
    /// Load a persona from the library.
    Load(String),
    /// Rate a library entry.
    Rate(String, u8),
    /// Make a library entry the default.
    Default(String),
    /// Library statistics.
    Stats,
    /// Show the persona and mood.
    Whoami,
    /// Show help.
    Help,
    /// Leave.
    Quit,
}

/// Help text.
pub const HELP: &str = "\
Commands:
  /tick [days]          advance simulated time (random 1-30 days if omitted)
  /dream [intensity]    dream from the most salient memories
  /memories [query]     list memories, strongest first
  /add <text>           add a memory of your own
  /prune <id>           remove a memory (anchors are kept)
  /pin <id>             make a memory a core anchor
  /export               write the state to the export directory
  /import <path>        replace the state from an export
  /persona [archetype]  generate a new persona (scholar, artisan, wanderer, guardian, mystic)
  /save [name]          save the persona to the library
  /library [query]      list or search saved personas
  /load <id>            switch to a saved persona
  /rate <id> <1-5>      rate a saved persona
  /default <id>         load this persona on startup
  /stats                library statistics
  /whoami               current persona and mood
  /quit                 leave";

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
///
/// A usage message for unknown commands or bad arguments.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    let required = |usage: &str| arg.map(str::to_string).ok_or_else(|| format!("usage: {usage}"));

    let command = match name.to_lowercase().as_str() {
        "tick" => Command::Tick(match arg {
            Some(a) => Some(
                a.parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .ok_or_else(|| format!("not a day count: {a}"))?,
            ),
            None => None,
        }),
        "dream" => Command::Dream(match arg {
            Some(a) => Some(
                a.parse::<f32>()
                    .ok()
                    .filter(|i| (0.0..=1.0).contains(i))
                    .ok_or_else(|| format!("intensity must be between 0 and 1: {a}"))?,
            ),
            None => None,
        }),
        "memories" | "mem" => Command::Memories(arg.map(str::to_string)),
        "add" => Command::Add(required("/add <text>")?),
        "prune" => Command::Prune(required("/prune <id>")?),
        "pin" => Command::Pin(required("/pin <id>")?),
        "export" => Command::Export,
        "import" => Command::Import(required("/import <path>")?),
        "persona" => Command::Persona(arg.map(str::to_string)),
        "save" => Command::Save(arg.map(str::to_string)),
        "library" | "lib" => Command::Library(arg.map(str::to_string)),
        "load" => Command::Load(required("/load <id>")?),
        "rate" => {
            let usage = "usage: /rate <id> <1-5>";
            let a = arg.ok_or_else(|| usage.to_string())?;
            let (id, stars) = a.split_once(char::is_whitespace).ok_or_else(|| usage.to_string())?;
            let stars = stars.trim().parse::<u8>().map_err(|_| usage.to_string())?;
            Command::Rate(id.to_string(), stars)
        }
        "default" => Command::Default(required("/default <id>")?),
        "stats" => Command::Stats,
        "whoami" => Command::Whoami,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command /{other} (try /help)")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_speech() {
        assert_eq!(parse("  hello there ").expect("parse"), Some(Command::Say("hello there".into())));
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn tick_days_optional() {
        assert_eq!(parse("/tick").expect("parse"), Some(Command::Tick(None)));
        assert_eq!(parse("/tick 7").expect("parse"), Some(Command::Tick(Some(7.0))));
        assert!(parse("/tick soon").is_err());
        assert!(parse("/tick -3").is_err());
    }

    #[test]
    fn dream_intensity_bounds() {
        assert_eq!(parse("/dream 0.5").expect("parse"), Some(Command::Dream(Some(0.5))));
        assert!(parse("/dream 2").is_err());
    }

    #[test]
    fn required_arguments() {
        assert!(parse("/add").is_err());
        assert_eq!(
            parse("/add the lighthouse at dusk").expect("parse"),
            Some(Command::Add("the lighthouse at dusk".into()))
        );
        assert_eq!(
            parse("/rate persona_abc 4").expect("parse"),
            Some(Command::Rate("persona_abc".into(), 4))
        );
        assert!(parse("/rate persona_abc").is_err());
    }

    #[test]
    fn unknown_command() {
        let err = parse("/fly away").expect_err("unknown");
        assert!(err.contains("/fly"));
        assert_eq!(parse("/QUIT").expect("parse"), Some(Command::Quit));
    }
}
