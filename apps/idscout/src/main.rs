use clap::Parser;

use idscout::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	idscout::run(args).await
}
