use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod cmd;

use clap::Parser;

/// `.env` entries win over the process environment. a missing file is fine.
fn load_env_file() {
    if let Ok(entries) = dotenv::dotenv_iter() {
        override_env(entries.flatten());
    }
}

fn override_env(entries: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in entries {
        std::env::set_var(key, value);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();

    let args = cmd::Cli::parse();
    args.execute().await
}
