//! Basic logger usage example
//!
//! Logs each kind of value to stdout as JSON Lines, then panics under the
//! recover guard so the final line carries the stack trace and the process
//! exits with status 1.
//!
//! Run with: cargo run --example basic_usage

use rust_jsonl_logger::prelude::*;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Request {
    #[serde(rename = "Method")]
    method: &'static str,
    #[serde(rename = "Path")]
    path: &'static str,
    #[serde(rename = "Status")]
    status: u16,
}

fn handle(path: &'static str) -> u16 {
    if path == "/panic" {
        panic!("handler for {} hit an invariant violation", path);
    }
    200
}

fn main() {
    let _guard = recover_guard();

    // {"File":"demos/basic_usage.rs:<line>"}
    json(&());

    // {"File":"...","Message":"Server started"}
    json("Server started");

    // {"File":"...","Method":"GET","Path":"/health","Status":200}
    let status = handle("/health");
    json(&Request {
        method: "GET",
        path: "/health",
        status,
    });

    // {"File":"...","Item":[1,2,3]}
    json(&[1, 2, 3]);

    // {"File":"...","Error":{"Message":"config.toml not found"},"Message":"config.toml not found"}
    json_error(&std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "config.toml not found",
    ));

    // Writes through the shared lock stay whole
    {
        let mut stdout = output().lock();
        writeln!(stdout, "{{\"Source\":\"external\"}}").expect("Failed to write to stdout");
    }

    // {"Error":"handler for /panic hit an invariant violation","Stack":"..."} then exit 1
    handle("/panic");
}
