//! Terminal front end of a tab
//!
//! Each input line is one command, parsed with clap in multicall mode. A
//! line starting with `/` is shorthand for `go <line>`. The consent prompt
//! reads from the same input as the command loop, so redirect-backs from the
//! listener are handed to the loop as [`Delivery`] values and run between
//! commands. Only one party reads the input at a time.

use std::io::Write;
use std::sync::Arc;

use auth_flow::{CallbackQuery, Landing, Tab, TabStatus};
use clap::{Parser, Subcommand};
use host::{BoxFuture, ConsentPrompt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Navigate to a route
    Go { route: String },
    /// Deliver a provider redirect (full URL or route)
    Callback { target: String },
    /// Show tab, identity and token state
    Status,
    /// Re-check the access token with the provider
    Verify,
    /// Drop the session identity and the access token
    Logout,
    /// Close the tab, discarding any pending authorization
    Close,
    /// Close the tab and exit
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    Empty,
    /// Help or usage text to show instead of running anything.
    Message(String),
}

pub fn parse(line: &str) -> Parsed {
    let line = line.trim();
    if line.is_empty() {
        return Parsed::Empty;
    }
    if line.starts_with('/') {
        return Parsed::Command(Command::Go {
            route: line.to_string(),
        });
    }
    match Line::try_parse_from(line.split_whitespace()) {
        Ok(parsed) => Parsed::Command(parsed.command),
        Err(e) => Parsed::Message(e.render().to_string()),
    }
}

/// Line source shared by the command loop and the consent prompt.
pub struct LineInput {
    lines: Mutex<Lines<Box<dyn AsyncBufRead + Unpin + Send>>>,
}

impl LineInput {
    pub fn new(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }

    /// `None` at end of input.
    pub async fn next_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Blocking `[y/N]` question on the terminal. End of input declines.
pub struct TerminalConsent {
    input: Arc<LineInput>,
}

impl TerminalConsent {
    pub fn new(input: Arc<LineInput>) -> Self {
        Self { input }
    }
}

impl ConsentPrompt for TerminalConsent {
    fn confirm<'a>(&'a self, message: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            prompt(&format!("{message} [y/N] "));
            let accepted = match self.input.next_line().await {
                Ok(Some(answer)) => is_yes(&answer),
                Ok(None) => false,
                Err(e) => {
                    debug!(error = %e, "consent input failed");
                    false
                }
            };
            info!(accepted, "consent answered");
            accepted
        })
    }
}

pub fn render_landing(landing: &Landing) -> String {
    match landing {
        Landing::View(route) => format!("viewing {route}"),
        Landing::External => {
            "waiting for authorization; finish it in the browser (or `callback` to abandon)".into()
        }
        Landing::Blocked => "navigation blocked".into(),
    }
}

pub fn render_status(status: &TabStatus) -> String {
    let identity = status
        .identity
        .as_ref()
        .map_or("unresolved", |identity| identity.user_id.as_str());
    let token = match (status.token.present, status.token.ensured) {
        (false, _) => "none",
        (true, false) => "present (not yet verified)",
        (true, true) => "verified",
    };
    let mut out = format!(
        "tab:      {}\nroute:    {}\nidentity: {identity}\ntoken:    {token}",
        status.tab,
        status.current.as_deref().unwrap_or("-"),
    );
    if status.redirect_outstanding || status.pending.next.is_some() {
        out.push_str(&format!(
            "\npending:  {} (from {})",
            status.pending.next.as_deref().unwrap_or("?"),
            status.pending.previous.as_deref().unwrap_or("-"),
        ));
    }
    out
}

fn callback_query(target: &str) -> CallbackQuery {
    match Url::parse(target) {
        Ok(url) => CallbackQuery::from_url(&url),
        Err(_) => CallbackQuery::from_route(target),
    }
}

/// A provider redirect-back received by the listener.
#[derive(Debug)]
pub struct Delivery {
    pub query: CallbackQuery,
    /// Where the tab landed once the redirect was handled.
    pub landed: oneshot::Sender<Landing>,
}

/// How the command loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `quit`/`close`: tab storage discarded.
    Closed,
    /// Input ran out: tab storage kept for a later `--tab` restart.
    EndOfInput,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Print(String),
    Exit(Exit),
}

pub async fn execute(tab: &Tab, command: Command) -> Step {
    match command {
        Command::Go { route } => Step::Print(render_landing(&tab.navigate(&route).await)),
        Command::Callback { target } => {
            let landing = tab.complete_callback(&callback_query(&target)).await;
            Step::Print(render_landing(&landing))
        }
        Command::Status => Step::Print(render_status(&tab.status().await)),
        Command::Verify => Step::Print(if tab.verify().await {
            "token verified".into()
        } else {
            "no valid token".into()
        }),
        Command::Logout => {
            tab.logout().await;
            Step::Print("logged out".into())
        }
        Command::Close | Command::Quit => {
            tab.close().await;
            Step::Exit(Exit::Closed)
        }
    }
}

/// Read and run commands until the tab is closed or input ends.
///
/// Redirect-backs waiting in `callbacks` go before the next typed line.
pub async fn run(
    tab: &Tab,
    input: &LineInput,
    mut callbacks: mpsc::Receiver<Delivery>,
) -> Result<Exit> {
    loop {
        prompt(&format!("{}> ", tab.name()));
        let line = tokio::select! {
            biased;
            Some(delivery) = callbacks.recv() => {
                let landing = tab.complete_callback(&delivery.query).await;
                println!("\n{}", render_landing(&landing));
                let _ = delivery.landed.send(landing);
                continue;
            }
            line = input.next_line() => line.map_err(Error::Input)?,
        };
        let Some(line) = line else {
            return Ok(Exit::EndOfInput);
        };
        match parse(&line) {
            Parsed::Empty => {}
            Parsed::Message(text) => println!("{text}"),
            Parsed::Command(command) => match execute(tab, command).await {
                Step::Print(text) => println!("{text}"),
                Step::Exit(exit) => return Ok(exit),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{elevated, identity_server, tab_reading, test_tab};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn parses_commands_and_route_shorthand() {
        assert_eq!(
            parse("go /results/1"),
            Parsed::Command(Command::Go {
                route: "/results/1".into()
            })
        );
        assert_eq!(
            parse("  /results/1?tab=2 "),
            Parsed::Command(Command::Go {
                route: "/results/1?tab=2".into()
            })
        );
        assert_eq!(parse("status"), Parsed::Command(Command::Status));
        assert_eq!(parse("exit"), Parsed::Command(Command::Quit));
        assert_eq!(parse("   "), Parsed::Empty);
    }

    #[test]
    fn unknown_or_incomplete_commands_produce_usage() {
        assert!(matches!(parse("fly /x"), Parsed::Message(_)));
        assert!(matches!(parse("go"), Parsed::Message(_)));
        assert!(matches!(parse("help"), Parsed::Message(text) if text.contains("callback")));
    }

    #[test]
    fn only_explicit_yes_accepts() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn callback_target_accepts_url_or_route() {
        let q = callback_query("http://127.0.0.1:8765/callback?code=c&state=s");
        assert_eq!(q.code.as_deref(), Some("c"));
        let q = callback_query("/callback?state=s");
        assert_eq!(q.state.as_deref(), Some("s"));
        assert_eq!(q.code, None);
    }

    #[tokio::test]
    async fn consent_reads_one_line() {
        let input = Arc::new(LineInput::new(&b"yes\nno\n"[..]));
        let consent = TerminalConsent::new(input.clone());
        assert!(consent.confirm("allow?").await);
        assert!(!consent.confirm("allow?").await);
        assert!(!consent.confirm("allow?").await, "end of input declines");
    }

    #[tokio::test]
    async fn quit_closes_tab() {
        let server = identity_server().await;
        let tab = test_tab(&server, &b""[..]);

        assert_eq!(execute(&tab, Command::Quit).await, Step::Exit(Exit::Closed));
    }

    #[tokio::test]
    async fn declined_consent_lands_on_safe_route() {
        let server = identity_server().await;
        let tab = test_tab(&server, &b"n\n"[..]);

        let step = execute(
            &tab,
            Command::Go {
                route: "/results/1".into(),
            },
        )
        .await;
        assert_eq!(step, Step::Print("viewing /".into()));

        let Step::Print(status) = execute(&tab, Command::Status).await else {
            panic!("status prints");
        };
        assert!(status.contains("identity: alice"), "got: {status}");
        assert!(status.contains("token:    none"), "got: {status}");
    }

    #[tokio::test]
    async fn run_stops_at_end_of_input() {
        let server = identity_server().await;
        let tab = test_tab(&server, &b""[..]);
        let commands = LineInput::new(&b"/questionnaires\nstatus\n"[..]);
        let (_, no_callbacks) = mpsc::channel(1);

        assert_eq!(
            run(&tab, &commands, no_callbacks).await.unwrap(),
            Exit::EndOfInput
        );
        assert_eq!(tab.status().await.current.as_deref(), Some("/questionnaires"));
    }

    #[tokio::test]
    async fn consent_after_redirect_back_gets_the_typed_answer() {
        let server = identity_server().await;
        let (mut keyboard, terminal) = tokio::io::duplex(256);
        let input = Arc::new(LineInput::new(BufReader::new(terminal)));
        // the safe route is elevated too, so resuming there asks again
        let tab = tab_reading(&server, vec![elevated("/*")], input.clone());
        let (callbacks, rx) = mpsc::channel(4);
        let shell = tokio::spawn({
            let (tab, input) = (tab.clone(), input.clone());
            async move { run(&tab, &input, rx).await }
        });

        let (landed, landing) = oneshot::channel();
        callbacks
            .send(Delivery {
                query: CallbackQuery::from_query("code=a&state=unknown"),
                landed,
            })
            .await
            .unwrap();
        keyboard.write_all(b"y\n").await.unwrap();

        assert_eq!(landing.await.unwrap(), Landing::External);
        assert!(tab.status().await.redirect_outstanding);

        drop(keyboard);
        assert_eq!(shell.await.unwrap().unwrap(), Exit::EndOfInput);
    }
}
