use crate::cli::{MigrateAction, MigrateArgs};
use crate::context::{connect, resolve_config};
use subledger::migrate::{self, MigrationSource};

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.conn)?;
    let dir = args
        .dir
        .or_else(|| config.migrations.dir.as_ref().map(Into::into));
    let source = MigrationSource::from_dir(dir);
    let mut client = connect(&config.database.url).await?;

    match args.action {
        MigrateAction::Up => {
            let applied = migrate::up(&mut client, &source).await?;
            if applied.is_empty() {
                println!("no migrations to apply");
            } else {
                println!("applied {} migration(s)", applied.len());
                for version in applied {
                    println!("  V{version}");
                }
            }
        }
        MigrateAction::Down => {
            let reverted = migrate::down(&mut client, &source).await?;
            if reverted.is_empty() {
                println!("no migrations to roll back");
            } else {
                println!("rolled back {} migration(s)", reverted.len());
                for m in reverted {
                    println!("  V{}__{}", m.version, m.name);
                }
            }
        }
        MigrateAction::Version => match migrate::version(&client).await? {
            Some(m) => println!("version: {} ({})", m.version, m.name),
            None => println!("version: none (database empty)"),
        },
    }
    Ok(())
}
