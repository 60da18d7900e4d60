use std::process;

use anyhow::Result;
use clap::Parser;
use cpaudit::Cli;
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;

#[cfg(not(tarpaulin_include))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let subscriber = FmtSubscriber::builder()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .without_time()
    .with_ansi(!cli.no_color)
    .with_writer(std::io::stderr)
    .finish();
  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

  let (config, destdir) = match cli.required_paths() {
    Ok(paths) => paths,
    Err(missing) => {
      eprintln!("{}", missing.message);
      process::exit(missing.exit_code);
    }
  };

  if let Err(err) = cli.run(config, destdir).await {
    eprintln!("{err:?}");
    process::exit(1);
  }

  Ok(())
}
