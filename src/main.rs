//!
//! crisp-session CLI
//! -----------------
//! Inspect and drive the persisted CRISP client session from a terminal: show who is
//! logged in, evaluate the route guard for a path, and log in/out against the backend.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crisp_session::identity::{HttpAuthProvider, LoginRequest, RegisterRequest};
use crisp_session::storage::FileStorage;
use crisp_session::{AlertSink, AuthController, Config, HistoryNavigator, Navigator};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file>] status\n  {program} [--config <file>] guard <path>\n  {program} [--config <file>] login <username> <password>\n  {program} [--config <file>] register <username> <password> [--email <e>] [--role <r>] [--organization <o>]\n  {program} [--config <file>] logout\n\nFlags:\n  --config <file>   JSON config (default: crisp.json in the working directory, optional)\n  -h, --help        Show this help\n\nEnvironment:\n  CRISP_STORAGE_DIR       directory holding session.json (default .crisp)\n  CRISP_API_BASE          backend base URL (default http://localhost:8000/api)\n  CRISP_TRUST_POLICY      privileged_role | admin_only\n  CRISP_API_TIMEOUT_SECS  backend request timeout\n  RUST_LOG                log filter (default info)"
    );
}

struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn alert(&self, message: &str) { eprintln!("! {}", message); }
}

fn flag_value(args: &mut Vec<String>, name: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == name)?;
    if pos + 1 >= args.len() { return None; }
    let val = args.remove(pos + 1);
    args.remove(pos);
    Some(val)
}

fn print_json(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()));
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }
    let config_path = flag_value(&mut args, "--config").unwrap_or_else(|| "crisp.json".to_string());
    let config = Config::load(&config_path)?.apply_env()?;
    info!(
        target: "crisp",
        "crisp-session: storage='{}', api='{}', trust_policy={:?}",
        config.storage_path().display(), config.api.base_url, config.trust_policy
    );

    let storage = Arc::new(FileStorage::new(config.storage_path()));
    let nav = Arc::new(HistoryNavigator::default());
    let ctl = AuthController::from_config(&config, storage, nav.clone(), Arc::new(ConsoleAlerts));
    ctl.init();

    let cmd = args.remove(0);
    match cmd.as_str() {
        "status" => {
            let s = ctl.get_session();
            let c = ctl.classification();
            print_json(&json!({
                "authenticated": s.is_authenticated(),
                "username": s.username(),
                "role": s.identity().and_then(|i| i.role_str()),
                "is_admin": c.is_admin,
                "admin_rule": c.matched.map(|r| r.as_str()),
                "state": format!("{:?}", ctl.access_state()),
                "has_refresh_token": s.refresh_token().is_some(),
                "expires_at": s.expires_at().map(|t| t.to_rfc3339()),
            }));
        }
        "guard" => {
            let path = args.first().ok_or_else(|| anyhow!("guard requires a path"))?;
            let decision = ctl.guard(path);
            print_json(&json!({
                "path": path,
                "decision": decision,
                "redirect": decision.redirect_target(ctl.routes()),
            }));
        }
        "login" => {
            let (Some(username), Some(password)) = (args.first(), args.get(1)) else {
                return Err(anyhow!("login requires <username> <password>"));
            };
            let provider = HttpAuthProvider::new(config.api.clone())?;
            let req = LoginRequest { username: username.clone(), password: password.clone() };
            ctl.login_with(&provider, &req).await?;
            print_json(&json!({"status": "ok", "username": username, "is_admin": ctl.is_admin(), "location": nav.current_path()}));
        }
        "register" => {
            let email = flag_value(&mut args, "--email");
            let role = flag_value(&mut args, "--role");
            let organization = flag_value(&mut args, "--organization");
            let (Some(username), Some(password)) = (args.first(), args.get(1)) else {
                return Err(anyhow!("register requires <username> <password>"));
            };
            let provider = HttpAuthProvider::new(config.api.clone())?;
            let req = RegisterRequest { username: username.clone(), password: password.clone(), email, role, organization };
            ctl.register_with(&provider, &req).await?;
            print_json(&json!({"status": "ok", "username": username}));
        }
        "logout" => {
            ctl.on_logout()?;
            print_json(&json!({"status": "ok", "location": nav.current_path()}));
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command '{}'", other));
        }
    }
    Ok(())
}
