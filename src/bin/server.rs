//! LlamaTamer search proxy and static file server.
//! Run with: cargo run --bin llama-tamer-server

use std::process::ExitCode;

use llama_tamer::start_llama_tamer;

fn main() -> ExitCode {
    start_llama_tamer::run()
}
