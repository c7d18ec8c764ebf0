//! Terminal front end. Plays the UI layer: submits the login form, moves between
//! screens through the route guard, and renders every error at this boundary.

use serde_json::Value;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::identity::{AuthService, Navigation, RouteGuard, LOGIN_PATH};

pub mod repl;

pub use repl::{run_once, run_repl};

pub const HELP: &str = "\
Commands:
  login <email> <password>   sign in and open your dashboard
  logout                     sign out (also the 'return to login' action)
  status                     show who is signed in and the current screen
  open <path>                navigate to a screen, e.g. open /manager/dashboard
  get <path>                 authenticated GET, e.g. get /manager/products
  delete <path>              authenticated DELETE
  post <path> <json>         authenticated POST with a JSON body
  put <path> <json>          authenticated PUT with a JSON body
  clear                      dismiss the last error message
  help                       show this help
  quit | exit                leave the console";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Status,
    Open(String),
    Get(String),
    Delete(String),
    Post(String, Value),
    Put(String, Value),
    Clear,
    Help,
    Quit,
    Empty,
}

fn path_arg(verb: &str, rest: &str) -> Result<String, String> {
    let p = rest.trim();
    if p.is_empty() { Err(format!("usage: {} <path>", verb)) } else { Ok(p.to_string()) }
}

fn path_and_body(verb: &str, rest: &str) -> Result<(String, Value), String> {
    let rest = rest.trim();
    let (path, json) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if path.is_empty() || json.trim().is_empty() {
        return Err(format!("usage: {} <path> <json>", verb));
    }
    let body: Value = serde_json::from_str(json.trim()).map_err(|e| format!("invalid JSON body: {}", e))?;
    Ok((path.to_string(), body))
}

/// Parse one console line. Missing login fields are kept empty so the gateway's
/// validation reports them like the form would.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match verb.to_ascii_lowercase().as_str() {
        "login" => {
            let mut parts = rest.split_whitespace();
            let email = parts.next().unwrap_or("").to_string();
            let password = parts.next().unwrap_or("").to_string();
            if parts.next().is_some() {
                return Err("usage: login <email> <password>".into());
            }
            Ok(Command::Login { email, password })
        }
        "logout" => Ok(Command::Logout),
        "status" => Ok(Command::Status),
        "open" => path_arg("open", rest).map(Command::Open),
        "get" => path_arg("get", rest).map(Command::Get),
        "delete" => path_arg("delete", rest).map(Command::Delete),
        "post" => path_and_body("post", rest).map(|(p, b)| Command::Post(p, b)),
        "put" => path_and_body("put", rest).map(|(p, b)| Command::Put(p, b)),
        "clear" => Ok(Command::Clear),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}'; type 'help'", other)),
    }
}

pub struct Console {
    auth: AuthService,
    guard: RouteGuard,
    api: ApiClient,
    screen: String,
}

impl Console {
    /// Starts on the signed-in user's dashboard, or the login screen.
    pub fn new(auth: AuthService, guard: RouteGuard, api: ApiClient) -> Self {
        let start = auth
            .context()
            .snapshot()
            .role()
            .and_then(|r| guard.routes().dashboard_for(r))
            .unwrap_or(LOGIN_PATH)
            .to_string();
        let screen = guard.navigate(&start).path().to_string();
        Self { auth, guard, api, screen }
    }

    pub fn screen(&self) -> &str { &self.screen }

    fn render_error(&mut self, e: &ClientError) -> String {
        let mut out = format!("error: {}", e.user_message());
        if let Some(target) = e.redirect_target() {
            self.screen = target.to_string();
            out.push_str(&format!("\n→ {}", target));
        }
        out
    }

    fn render_value(v: &Value) -> String {
        serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
    }

    fn api_result(&mut self, res: Result<Value, ClientError>) -> String {
        match res {
            Ok(v) => Self::render_value(&v),
            Err(e) => self.render_error(&e),
        }
    }

    /// Run one command and return what to print; `None` means leave.
    pub async fn execute(&mut self, cmd: Command) -> Option<String> {
        let out = match cmd {
            Command::Empty => String::new(),
            Command::Quit => return None,
            Command::Help => HELP.to_string(),
            Command::Clear => {
                self.auth.clear_error();
                "ok".to_string()
            }
            Command::Login { email, password } => match self.auth.login(&email, &password).await {
                Ok(dashboard) => {
                    let nav = self.guard.navigate(&dashboard);
                    self.screen = nav.path().to_string();
                    let st = self.auth.context().snapshot();
                    format!(
                        "signed in as {} ({})\n→ {}",
                        st.user().unwrap_or("?"),
                        st.role().map(|r| r.as_str()).unwrap_or("?"),
                        self.screen
                    )
                }
                // a failed submit stays on the form, whatever the error kind
                Err(e) => format!("error: {}", e.user_message()),
            },
            Command::Logout => {
                self.screen = self.auth.logout().await;
                format!("signed out\n→ {}", self.screen)
            }
            Command::Status => {
                let st = self.auth.context().snapshot();
                let mut s = match (st.user(), st.role()) {
                    (Some(u), Some(r)) => format!("signed in as {} ({})", u, r),
                    _ => "not signed in".to_string(),
                };
                s.push_str(&format!("\nscreen: {}", self.screen));
                if let Some(err) = st.error() {
                    s.push_str(&format!("\nerror: {}", err));
                }
                s
            }
            Command::Open(path) => match self.guard.navigate(&path) {
                Navigation::Render(p) => {
                    self.screen = p;
                    format!("→ {}", self.screen)
                }
                Navigation::Redirect(p) => {
                    self.screen = p;
                    format!("access denied\n→ {}", self.screen)
                }
            },
            Command::Get(path) => {
                let res = self.api.get(&path).await;
                self.api_result(res)
            }
            Command::Delete(path) => {
                let res = self.api.delete(&path).await;
                self.api_result(res)
            }
            Command::Post(path, body) => {
                let res = self.api.post(&path, &body).await;
                self.api_result(res)
            }
            Command::Put(path, body) => {
                let res = self.api.put(&path, &body).await;
                self.api_result(res)
            }
        };
        Some(out)
    }
}
