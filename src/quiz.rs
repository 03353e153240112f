pub mod error;
pub mod flowchart;
pub mod node;
pub mod notation;
pub mod outline;
pub mod session;
pub mod source;
pub mod tree;
pub mod validate;

use std::io::{BufRead, Write};
use std::sync::OnceLock;

use anyhow::Result;
use log::{debug, info, warn};
use regex::Regex;

use crate::quiz::session::{Session, PATH_DELIMITER};
use crate::quiz::tree::{DecisionTree, Node};
use crate::store::StateStore;
use crate::tally::Tally;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Node text is authored for the web and may carry inline HTML.
fn strip_html(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap());
    tag.replace_all(text, "").trim().to_string()
}

fn show_node(out: &mut impl Write, node: &Node, step: usize, total_steps: usize) -> Result<()> {
    writeln!(out)?;
    if let Some(text) = node.content.text_str() {
        writeln!(out, "{}", strip_html(text))?;
    }
    if let Some(image) = node.content.image_str() {
        writeln!(out, "[image: {image}]")?;
    }

    if !node.is_terminal() {
        writeln!(out, "(question {step} of up to {total_steps})")?;
        for (i, option) in node.options.iter().enumerate() {
            let marker = if i == 0 { "*" } else { " " };
            let label = option
                .content
                .text_str()
                .map(strip_html)
                .or_else(|| option.content.image_str().map(|img| format!("[image: {img}]")))
                .unwrap_or_default();
            writeln!(out, " {marker}[{}] {label}", i + 1)?;
        }
    }

    if let Some(info) = &node.content.info {
        writeln!(out, "\n  {}", strip_html(info))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Outcome screen
// ---------------------------------------------------------------------------

/// Outcome of a single round.
#[derive(Debug, PartialEq, Eq)]
pub enum QuizOutcome {
    /// User reached a recommendation.
    Finished {
        terminal_node_id: String,
        path_key: String,
        /// How many people have taken this exact path, if the tally answered.
        /// Always `None` when no question was asked.
        count: Option<u64>,
    },
    /// User typed quit mid-quiz.
    Quit,
}

fn show_outcome(out: &mut impl Write, outcome: &QuizOutcome) -> Result<()> {
    writeln!(out, "\n========================================")?;
    match outcome {
        QuizOutcome::Finished {
            count: Some(count), ..
        } => {
            writeln!(
                out,
                "  You're one of {count} people who arrived at this recommendation!"
            )?;
        }
        QuizOutcome::Finished { path_key, .. } if path_key.is_empty() => {
            writeln!(out, "  No questions asked, nothing to count.")?;
        }
        QuizOutcome::Finished { count: None, .. } => {
            writeln!(out, "  (Could not reach the tally.)")?;
        }
        QuizOutcome::Quit => {
            writeln!(out, "  Progress saved. Run again to pick up where you left off.")?;
        }
    }
    writeln!(out, "========================================\n")?;
    Ok(())
}

/// Read the user's post-quiz choice. Returns `true` to restart, `false` to quit.
fn prompt_restart(input: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "  [r] Restart    [q] Quit\n")?;
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "r" => return Ok(true),
            "q" => return Ok(false),
            _ => writeln!(out, "  Press [r] to restart or [q] to quit.")?,
        }
    }
}

// ---------------------------------------------------------------------------
// Single round
// ---------------------------------------------------------------------------

/// Map what the user typed to an option id: the id itself, or else a
/// 1-based number.
fn choose<'n>(node: &'n Node, answer: &str) -> Option<&'n str> {
    if let Some(option) = node.option(answer) {
        return Some(option.id.as_str());
    }
    let n = answer.parse::<usize>().ok()?;
    n.checked_sub(1)
        .and_then(|i| node.options.get(i))
        .map(|o| o.id.as_str())
}

/// Count for the path just finished. Only a selection that lands on the
/// terminal records it; a session resumed at a terminal only reads it back.
fn tally_path(tally: &dyn Tally, path_key: &str, arrived: bool) -> Option<u64> {
    let result = if arrived {
        tally.record(path_key).map(Some)
    } else {
        tally.count(path_key)
    };
    match result {
        Ok(count) => count,
        Err(err) => {
            warn!("Failed to tally {path_key:?}: {err}");
            None
        }
    }
}

/// Runs one pass through the tree, starting from wherever `session` is.
pub fn play_round(
    session: &mut Session<'_>,
    tally: &dyn Tally,
    store: &dyn StateStore,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<QuizOutcome> {
    let total_steps = session.tree().total_steps();
    info!("Round started at node: {}", session.current().id);
    let mut arrived = false;

    loop {
        let node = session.current();
        show_node(out, node, session.answers().len() + 1, total_steps)?;

        if session.is_terminal() {
            let path_key = session.path_key();
            // A tree whose root is already an outcome asks nothing, so there
            // is no path to count.
            let count = if session.answers().is_empty() {
                None
            } else {
                tally_path(tally, &path_key, arrived)
            };
            info!("Finished at {} (path={path_key}, count={count:?})", node.id);
            return Ok(QuizOutcome::Finished {
                terminal_node_id: node.id.clone(),
                path_key,
                count,
            });
        }

        write!(out, "\n> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(QuizOutcome::Quit);
        }
        let answer = line.trim();

        if answer.is_empty() {
            writeln!(out, "(Pick an option.)")?;
            continue;
        }
        if answer.eq_ignore_ascii_case("quit") || answer.eq_ignore_ascii_case("exit") {
            return Ok(QuizOutcome::Quit);
        }
        if answer.eq_ignore_ascii_case("reset") {
            info!("User reset the quiz");
            session.reset();
            store.clear()?;
            continue;
        }

        let Some(option_id) = choose(node, answer) else {
            debug!("Unrecognised answer {answer:?} at {}", node.id);
            writeln!(out, "(No option {answer:?}. Type its number.)")?;
            continue;
        };
        match session.select(option_id) {
            Ok(next) => {
                arrived = next.is_terminal();
                store.save(&session.snapshot())?;
            }
            Err(err) => {
                warn!("{err}");
                writeln!(out, "({err})")?;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point: runs rounds until the user quits
// ---------------------------------------------------------------------------

/// Start a session, resuming saved progress when it still fits `tree`.
pub fn start_session<'t>(tree: &'t DecisionTree, store: &dyn StateStore) -> Session<'t> {
    let saved = match store.load() {
        Ok(saved) => saved,
        Err(err) => {
            warn!("Ignoring saved progress: {err:#}");
            None
        }
    };
    match saved.map(|state| Session::resume(tree, &state)) {
        Some(Ok(session)) => {
            info!("Resuming at {}", session.current().id);
            session
        }
        Some(Err(err)) => {
            warn!("Saved progress no longer matches the tree: {err}");
            Session::new(tree)
        }
        None => Session::new(tree),
    }
}

pub fn run(
    title: &str,
    tree: &DecisionTree,
    tally: &dyn Tally,
    store: &dyn StateStore,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = start_session(tree, store);

    loop {
        writeln!(out, "\n========================================")?;
        writeln!(out, "   {title}")?;
        writeln!(out, "========================================")?;
        writeln!(out, "Type an option number, `reset` to start over or `quit`.")?;

        let outcome = play_round(&mut session, tally, store, input, out)?;
        show_outcome(out, &outcome)?;
        if outcome == QuizOutcome::Quit {
            break;
        }

        // A finished path is not resumable.
        store.clear()?;
        if !prompt_restart(input, out)? {
            writeln!(out, "Thanks for playing!")?;
            break;
        }
        info!("User chose to restart");
        session.reset();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Results: every tallied path and where it ends
// ---------------------------------------------------------------------------

/// Print every path in the tally with the recommendation it reaches in
/// `tree`. Paths that no longer fit the tree are listed as such.
pub fn show_results(tree: &DecisionTree, tally: &dyn Tally, out: &mut impl Write) -> Result<()> {
    let entries = tally.entries()?;
    info!("Listing {} tallied paths", entries.len());
    if entries.is_empty() {
        writeln!(out, "Nobody has finished the quiz yet.")?;
        return Ok(());
    }

    for (key, count) in entries {
        let answers: Vec<String> = key.split(PATH_DELIMITER).map(str::to_string).collect();
        let outcome = match Session::replay(tree, &answers) {
            Ok(session) if session.is_terminal() => {
                let node = session.current();
                let text = node.content.text_str().map(strip_html).unwrap_or_default();
                format!("{text} ({})", node.id)
            }
            Ok(session) => {
                debug!("Path {key:?} stops at question {}", session.current().id);
                "(unfinished path)".to_string()
            }
            Err(err) => {
                debug!("Path {key:?} does not fit the tree: {err}");
                "(not in this tree)".to_string()
            }
        };
        writeln!(out, "{count:>6}  {outcome}")?;
        writeln!(out, "        {key}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::quiz::node::{Content, DecisionNode};
    use crate::quiz::tree::should_you_use_vercel;
    use crate::store::MemoryStateStore;
    use crate::tally::MemoryTally;

    fn play(tree: &DecisionTree, tally: &dyn Tally, store: &dyn StateStore, script: &str) -> (QuizOutcome, String) {
        let mut session = start_session(tree, store);
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let outcome = play_round(&mut session, tally, store, &mut input, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("Using <a target=\"_blank\" href=\"https://nextjs.org/\">Next.js</a>?"),
            "Using Next.js?"
        );
    }

    #[test]
    fn test_round_records_tally() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (first, screen) = play(&tree, &tally, &store, "2\n");
        assert_eq!(
            first,
            QuizOutcome::Finished {
                terminal_node_id: "dont-use-vercel-no-framework".into(),
                path_key: "no-framework".into(),
                count: Some(1),
            }
        );
        assert!(screen.contains("Are you using a framework like Next.js or Remix?"));
        assert!(screen.contains("Why are you even thinking about using Vercel?"));

        store.clear().unwrap();
        let (second, _) = play(&tree, &tally, &store, "no-framework\n");
        assert!(matches!(second, QuizOutcome::Finished { count: Some(2), .. }));
    }

    #[test]
    fn test_bad_input_reprompts() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (outcome, screen) = play(&tree, &tally, &store, "7\nmaybe\n\n1\nquit\n");
        assert_eq!(outcome, QuizOutcome::Quit);
        assert!(screen.contains("(No option \"7\"."));
        assert_eq!(store.load().unwrap().unwrap().current, "brand-new-project");
    }

    #[test]
    fn test_quit_then_resume() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (outcome, _) = play(&tree, &tally, &store, "1\n2\nquit\n");
        assert_eq!(outcome, QuizOutcome::Quit);

        let (outcome, _) = play(&tree, &tally, &store, "1\n2\n");
        assert_eq!(
            outcome,
            QuizOutcome::Finished {
                terminal_node_id: "use-vercel-no-server-experience".into(),
                path_key: "yes-use-framework>>>no-use-framework>>>yes-project-traffic>>>no-server-experience"
                    .into(),
                count: Some(1),
            }
        );
    }

    #[test]
    fn test_reset_command_starts_over() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (outcome, _) = play(&tree, &tally, &store, "1\nreset\n2\n");
        assert!(matches!(
            outcome,
            QuizOutcome::Finished { ref path_key, .. } if path_key == "no-framework"
        ));
    }

    #[test]
    fn test_terminal_root_records_nothing() {
        let tree = DecisionTree::new(DecisionNode::new("only", Content::text("Just use Vercel"))).unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (outcome, screen) = play(&tree, &tally, &store, "");
        assert_eq!(
            outcome,
            QuizOutcome::Finished {
                terminal_node_id: "only".into(),
                path_key: String::new(),
                count: None,
            }
        );
        assert!(screen.contains("Just use Vercel"));
        assert!(tally.entries().unwrap().is_empty());
    }

    #[test]
    fn test_resumed_finished_path_is_not_counted_twice() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();

        let (first, _) = play(&tree, &tally, &store, "2
");
        assert!(matches!(first, QuizOutcome::Finished { count: Some(1), .. }));

        // The saved state still ends on the terminal.
        let (again, _) = play(&tree, &tally, &store, "");
        assert!(matches!(again, QuizOutcome::Finished { count: Some(1), .. }));
        assert_eq!(tally.count("no-framework").unwrap(), Some(1));
    }

    #[test]
    fn test_numeric_option_id_wins_over_position() {
        let root = DecisionNode::new("q", Content::text("Pick"))
            .with_choice("2", Content::text("Two"), DecisionNode::new("two", Content::text("2")))
            .with_choice("1", Content::text("One"), DecisionNode::new("one", Content::text("1")));
        let tree = DecisionTree::new(root).unwrap();
        let node = tree.root();
        assert_eq!(choose(node, "2"), Some("2"));
        assert_eq!(choose(node, "1"), Some("1"));

        let root = DecisionNode::new("q", Content::text("Pick"))
            .with_choice("yes", Content::text("Yes"), DecisionNode::new("a", Content::text("A")))
            .with_choice("no", Content::text("No"), DecisionNode::new("b", Content::text("B")));
        let tree = DecisionTree::new(root).unwrap();
        assert_eq!(choose(tree.root(), "2"), Some("no"));
        assert_eq!(choose(tree.root(), "3"), None);
    }

    #[test]
    fn test_results_map_paths_to_outcomes() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        tally.record("no-framework").unwrap();
        tally.record("no-framework").unwrap();
        tally.record("yes-use-framework>>>no-use-framework>>>yes-project-traffic>>>no-server-experience").unwrap();
        tally.record("yes-use-framework").unwrap();
        tally.record("gone").unwrap();

        let mut out = Vec::new();
        show_results(&tree, &tally, &mut out).unwrap();
        let screen = String::from_utf8(out).unwrap();
        assert!(screen.contains("     2  Don't use Vercel (dont-use-vercel-no-framework)"));
        assert!(screen.contains("     1  Just use Vercel (use-vercel-no-server-experience)"));
        assert!(screen.contains("(unfinished path)"));
        assert!(screen.contains("(not in this tree)"));
    }

    #[test]
    fn test_results_with_empty_tally() {
        let tree = should_you_use_vercel().unwrap();
        let mut out = Vec::new();
        show_results(&tree, &MemoryTally::new(), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Nobody has finished"));
    }

    #[test]
    fn test_run_restarts_and_quits() {
        let tree = should_you_use_vercel().unwrap();
        let tally = MemoryTally::new();
        let store = MemoryStateStore::default();
        let mut input = Cursor::new(b"2\nr\n2\nq\n".to_vec());
        let mut out = Vec::new();

        run("Should you use Vercel?", &tree, &tally, &store, &mut input, &mut out).unwrap();
        let screen = String::from_utf8(out).unwrap();
        assert!(screen.contains("You're one of 1 people"));
        assert!(screen.contains("You're one of 2 people"));
        assert!(screen.contains("Thanks for playing!"));
        assert_eq!(store.load().unwrap(), None);
    }
}
