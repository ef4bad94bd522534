//! Console implementation of the three-way arbitration prompt.

use std::collections::BTreeSet;
use std::io::{self, Write};

use rigsync_core::session::{Arbiter, ArbitrationDecision};

/// Blocks on stdin for a proceed/retry/abort decision.
///
/// The prompt runs on a blocking task so the orchestration runtime is
/// never re-entered from inside the prompt.
pub struct ConsoleArbiter;

impl Arbiter for ConsoleArbiter {
    async fn decide(&self, missing: &BTreeSet<String>) -> ArbitrationDecision {
        let missing: Vec<String> = missing.iter().cloned().collect();
        tokio::task::spawn_blocking(move || prompt(&missing))
            .await
            .unwrap_or(ArbitrationDecision::Abort)
    }
}

fn prompt(missing: &[String]) -> ArbitrationDecision {
    eprintln!("The following cameras could not be found:");
    for name in missing {
        eprintln!("  {}", name);
    }

    loop {
        eprint!("[p]roceed with available cameras, [r]etry discovery, [a]bort? ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            // EOF or a broken pipe cannot answer; abort rather than spin.
            Ok(0) | Err(_) => return ArbitrationDecision::Abort,
            Ok(_) => {}
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "proceed" => return ArbitrationDecision::Proceed,
            "r" | "retry" => return ArbitrationDecision::Retry,
            "a" | "abort" => return ArbitrationDecision::Abort,
            _ => eprintln!("please answer p, r, or a"),
        }
    }
}
