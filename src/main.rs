use clap::Parser;
use std::io;
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_upload::app;
use youtube_upload::auth::{BrowserRedirect, CodeAcquirer, ConsolePrompt};
use youtube_upload::interrupt::Interrupts;
use youtube_upload::options::Options;
use youtube_upload::youtube::Endpoints;
use youtube_upload::{exit_code, Result};

async fn run(options: &Options, interrupts: Interrupts) -> Result<()> {
    let acquirer: Box<dyn CodeAcquirer> = if options.auth_browser {
        Box::new(BrowserRedirect::bind(interrupts).await?)
    } else {
        Box::new(ConsolePrompt::stdin())
    };
    app::run(
        options,
        &Endpoints::default(),
        acquirer.as_ref(),
        &mut io::stdout(),
    )
    .await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let options = Options::parse();
    let interrupts = Interrupts::install();

    let result = run(&options, interrupts).await;
    if let Err(err) = &result {
        error!("[{}] {}", err.kind_name(), err);
    }
    std::process::exit(exit_code(&result));
}
