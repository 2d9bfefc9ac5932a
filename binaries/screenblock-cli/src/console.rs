//! Line commands for `screenblock run`

use anyhow::{anyhow, bail, Result};
use screenblock_core::{Pattern, PatternPolicy};

pub const HELP: &str = "\
  tap              tap the bubble (blocks, or opens the prompt when armed)
  block            raise the curtain
  unlock           unlock tap (needs a tap within the grace window)
  trace            start tracing on the prompt (stops the timeout)
  enter <ids>      finish a pattern, e.g. enter 0,1,2
  dismiss          close the prompt
  drag <dx> <dy>   move the bubble
  state            show state and surfaces
  help             this text
  stop             end the session";

#[derive(Debug)]
pub enum ConsoleCommand {
    Tap,
    Block,
    Unlock,
    Trace,
    Enter(Pattern),
    Dismiss,
    Drag { dx: i32, dy: i32 },
    State,
    Help,
    Stop,
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str, policy: &PatternPolicy) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "tap" => ConsoleCommand::Tap,
        "block" => ConsoleCommand::Block,
        "unlock" => ConsoleCommand::Unlock,
        "trace" => ConsoleCommand::Trace,
        "enter" => {
            let rest: Vec<&str> = words.by_ref().collect();
            if rest.is_empty() {
                bail!("usage: enter <ids>");
            }
            // Any grid walk may be tried, only registration enforces a length
            let candidates = PatternPolicy {
                min_length: 1,
                ..*policy
            };
            ConsoleCommand::Enter(candidates.parse(&rest.join(" "))?)
        }
        "dismiss" => ConsoleCommand::Dismiss,
        "drag" => {
            let dx = parse_delta(words.next())?;
            let dy = parse_delta(words.next())?;
            ConsoleCommand::Drag { dx, dy }
        }
        "state" | "status" => ConsoleCommand::State,
        "help" | "?" => ConsoleCommand::Help,
        "stop" | "quit" | "exit" => ConsoleCommand::Stop,
        other => bail!("unknown command '{}', try 'help'", other),
    };

    if words.next().is_some() {
        bail!("too many arguments for '{}'", verb);
    }
    Ok(Some(command))
}

fn parse_delta(word: Option<&str>) -> Result<i32> {
    let word = word.ok_or_else(|| anyhow!("usage: drag <dx> <dy>"))?;
    word.parse()
        .map_err(|_| anyhow!("'{}' is not a pixel offset", word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PatternPolicy {
        PatternPolicy {
            min_length: 4,
            ..PatternPolicy::default()
        }
    }

    #[test]
    fn test_simple_verbs() {
        assert!(matches!(parse("tap", &policy()).unwrap(), Some(ConsoleCommand::Tap)));
        assert!(matches!(parse("  BLOCK ", &policy()).unwrap(), Some(ConsoleCommand::Block)));
        assert!(matches!(parse("quit", &policy()).unwrap(), Some(ConsoleCommand::Stop)));
        assert!(parse("", &policy()).unwrap().is_none());
        assert!(parse("   ", &policy()).unwrap().is_none());
    }

    #[test]
    fn test_enter_ignores_min_length() {
        match parse("enter 2,1,0", &policy()).unwrap() {
            Some(ConsoleCommand::Enter(pattern)) => assert_eq!(pattern.nodes(), &[2, 1, 0]),
            other => panic!("unexpected {:?}", other),
        }
        match parse("enter 0 4 8", &policy()).unwrap() {
            Some(ConsoleCommand::Enter(pattern)) => assert_eq!(pattern.nodes(), &[0, 4, 8]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_enter_rejects_bad_nodes() {
        assert!(parse("enter", &policy()).is_err());
        assert!(parse("enter 0,0", &policy()).is_err());
        assert!(parse("enter 0,9", &policy()).is_err());
    }

    #[test]
    fn test_drag() {
        match parse("drag -5 12", &policy()).unwrap() {
            Some(ConsoleCommand::Drag { dx, dy }) => assert_eq!((dx, dy), (-5, 12)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("drag 5", &policy()).is_err());
        assert!(parse("drag a b", &policy()).is_err());
        assert!(parse("drag 1 2 3", &policy()).is_err());
    }

    #[test]
    fn test_unknown() {
        assert!(parse("fly", &policy()).is_err());
        assert!(parse("tap twice", &policy()).is_err());
    }
}
