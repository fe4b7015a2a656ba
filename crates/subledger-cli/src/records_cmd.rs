use crate::cli::{AddArgs, ConnArgs, DeleteArgs, ListArgs, SumArgs, UpdateArgs};
use crate::context::open_store;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use subledger::{FilterSpec, PatchSpec, Subscription, SubscriptionStore};

pub async fn add(args: AddArgs) -> anyhow::Result<()> {
    let store = open_store(&args.conn)?;
    let mut sub = Subscription::new(args.user, args.service, args.price, args.start);
    if let Some(end) = args.end {
        sub = sub.ending(end);
    }
    store.insert(&sub).await?;
    println!(
        "{} {} for {} from {}",
        "saved".green(),
        sub.service_name,
        sub.user_id,
        sub.start_date.format("%Y-%m-%d")
    );
    Ok(())
}

pub async fn list(args: ListArgs) -> anyhow::Result<()> {
    let store = open_store(&args.conn)?;
    let records = match args.user {
        Some(user) => store.list_by_user(user).await?,
        None => store.list_all().await?,
    };
    if records.is_empty() {
        println!("no subscriptions");
        return Ok(());
    }
    println!("{}", subscriptions_table(&records));
    println!("{} subscription(s)", records.len());
    Ok(())
}

pub async fn sum(args: SumArgs) -> anyhow::Result<()> {
    let store = open_store(&args.conn)?;
    let filter = FilterSpec::new()
        .user_id_opt(args.user)
        .service_name_opt(args.service)
        .from_opt(args.from)
        .to_opt(args.to);
    let total = store.filter_sum(&filter).await?;
    println!("{total}");
    Ok(())
}

pub async fn update(args: UpdateArgs) -> anyhow::Result<()> {
    let store = open_store(&args.conn)?;
    let mut patch = PatchSpec::new();
    if let Some(price) = args.price {
        patch = patch.price(price);
    }
    if let Some(end) = args.end {
        patch = patch.end_date(end);
    }
    let updated = store.update_by_user(args.user, &patch).await?;
    println!("updated {updated} subscription(s)");
    Ok(())
}

pub async fn delete(args: DeleteArgs) -> anyhow::Result<()> {
    let store = open_store(&args.conn)?;
    let deleted = store.delete_by_user(args.user).await?;
    println!("deleted {deleted} subscription(s)");
    Ok(())
}

pub async fn ping(conn: ConnArgs) -> anyhow::Result<()> {
    let store = open_store(&conn)?;
    match store.ping().await {
        Ok(()) => {
            println!("{} database reachable", "✓".green().bold());
            Ok(())
        }
        Err(err) => {
            println!("{} database unreachable", "✗".red().bold());
            Err(err.into())
        }
    }
}

fn subscriptions_table(records: &[Subscription]) -> Table {
    let header = ["User", "Service", "Price", "Start", "End"]
        .into_iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect::<Vec<_>>();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for sub in records {
        let end = match sub.end_date {
            Some(end) => Cell::new(end.format("%Y-%m-%d").to_string()),
            None => Cell::new("open").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(sub.user_id.to_string()).fg(Color::Yellow),
            Cell::new(&sub.service_name),
            Cell::new(sub.price.to_string()).fg(Color::Magenta),
            Cell::new(sub.start_date.format("%Y-%m-%d").to_string()),
            end,
        ]);
    }
    table
}
