//!
//! stockroom console
//! -----------------
//! Terminal front end for the inventory backend. Restores the stored session on
//! startup, then runs either one command (`-c`) or the interactive console.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stockroom::api::ApiClient;
use stockroom::cli::{run_once, run_repl, Console};
use stockroom::config::{parse_api_base, ClientConfig};
use stockroom::identity::{
    AuthContext, AuthGateway, AuthService, FileSessionStore, MemorySessionStore, RoleRouteTable, RouteGuard, SessionStore,
};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--session-dir <dir>] [--memory] [-c \"<command>\"]\n\nFlags:\n  --api <url>            Backend API root (env STOCKROOM_API_URL, default http://localhost:8080/api)\n  --session-dir <dir>    Where the session record is kept (env STOCKROOM_SESSION_DIR, default ~/.stockroom)\n  --memory               Keep the session in memory only; nothing survives exit\n  -c, --command <cmd>    Run one console command and exit\n  -h, --help             Show this help\n\n{}",
        stockroom::cli::HELP
    );
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut cfg = ClientConfig::from_env()?;
    let mut memory = false;
    let mut one_shot: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" => {
                if i + 1 >= args.len() { eprintln!("--api requires a URL"); print_usage(&program); std::process::exit(2); }
                cfg.api_base = parse_api_base(&args[i + 1])?;
                i += 2; continue;
            }
            "--session-dir" => {
                if i + 1 >= args.len() { eprintln!("--session-dir requires a value"); print_usage(&program); std::process::exit(2); }
                cfg.session_dir = PathBuf::from(&args[i + 1]);
                i += 2; continue;
            }
            "--memory" => { memory = true; i += 1; continue; }
            "-c" | "--command" => {
                if i + 1 >= args.len() { eprintln!("--command requires a value"); print_usage(&program); std::process::exit(2); }
                one_shot = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    info!(
        target: "stockroom",
        "stockroom starting: api='{}', session='{}', memory={}",
        cfg.api_base, cfg.session_dir.join(format!("{}.json", cfg.session_key)).display(), memory
    );

    let store: Arc<dyn SessionStore> = if memory {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(FileSessionStore::new(cfg.session_dir.clone(), cfg.session_key.clone()))
    };
    let ctx = Arc::new(AuthContext::initialize(store));
    let routes = RoleRouteTable::standard();
    let gateway = AuthGateway::new(cfg.api_base.clone(), cfg.request_timeout)?;
    let auth = AuthService::new(gateway, ctx.clone(), routes.clone());
    let guard = RouteGuard::new(ctx.clone(), routes);
    let api = ApiClient::new(cfg.api_base.clone(), cfg.request_timeout, ctx)?;
    let mut console = Console::new(auth, guard, api);

    let rt = tokio::runtime::Runtime::new()?;
    match one_shot {
        Some(line) => run_once(&rt, &mut console, &line),
        None => run_repl(&rt, &mut console),
    }
}
