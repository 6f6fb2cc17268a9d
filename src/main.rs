mod auth;
mod db;
mod ipc;
mod session;
mod status;
mod validate;

use std::io::{self, BufRead, Write};

fn main() {
    // stdout carries the protocol; all diagnostics go to stderr.
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        session: session::Session::new(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                log::debug!("unparsable request line: {}", e);
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
