//! Terminal implementations of the navigation, login and alert seams

use tracing::{info, warn};
use url::Url;

use crate::{Alerts, FirstPartyLogin, Navigator};

/// Prints the external URL for the user to open in a browser.
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn assign(&self, url: &Url) {
        info!(host = url.host_str().unwrap_or_default(), "leaving for external authorization");
        println!("Open this URL to continue:\n  {url}");
    }
}

/// Points the user at the first-party login page.
#[derive(Debug)]
pub struct ConsoleLogin {
    login_url: Option<String>,
}

impl ConsoleLogin {
    pub fn new(login_url: Option<String>) -> Self {
        Self { login_url }
    }
}

impl FirstPartyLogin for ConsoleLogin {
    fn require_login(&self, target: &str) {
        warn!(target, "no first-party session");
        match &self.login_url {
            Some(url) => println!("Log in at {url}, then retry {target}"),
            None => println!("Log in to the application, then retry {target}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleAlerts;

impl Alerts for ConsoleAlerts {
    fn alert(&self, message: &str) {
        eprintln!("! {message}");
    }
}
