mod cli;
mod context;
mod migrate_cmd;
mod records_cmd;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Migrate(args) => migrate_cmd::run(args).await,
        cli::Command::Add(args) => records_cmd::add(args).await,
        cli::Command::List(args) => records_cmd::list(args).await,
        cli::Command::Sum(args) => records_cmd::sum(args).await,
        cli::Command::Update(args) => records_cmd::update(args).await,
        cli::Command::Delete(args) => records_cmd::delete(args).await,
        cli::Command::Ping(args) => records_cmd::ping(args).await,
    }
}
