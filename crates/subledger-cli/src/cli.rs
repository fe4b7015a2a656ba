use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use uuid::Uuid;

/// Config file used when neither `--config` nor `SUBLEDGER_CONFIG` is given.
pub const DEFAULT_CONFIG: &str = "subledger.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Migrate,
    Add,
    List,
    Sum,
    Update,
    Delete,
    Ping,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Migrate(MigrateArgs),
    Add(AddArgs),
    List(ListArgs),
    Sum(SumArgs),
    Update(UpdateArgs),
    Delete(DeleteArgs),
    Ping(ConnArgs),
}

/// Where to find the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnArgs {
    pub config: PathBuf,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    Up,
    Down,
    Version,
}

#[derive(Debug, Clone)]
pub struct MigrateArgs {
    pub action: MigrateAction,
    pub conn: ConnArgs,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AddArgs {
    pub conn: ConnArgs,
    pub user: Uuid,
    pub service: String,
    pub price: i64,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ListArgs {
    pub conn: ConnArgs,
    pub user: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SumArgs {
    pub conn: ConnArgs,
    pub user: Option<Uuid>,
    pub service: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UpdateArgs {
    pub conn: ConnArgs,
    pub user: Uuid,
    pub price: Option<i64>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DeleteArgs {
    pub conn: ConnArgs,
    pub user: Uuid,
}

/// `--name value` / `--name=value` pairs plus positionals of one subcommand.
#[derive(Debug, Default)]
struct Flags {
    values: Vec<(&'static str, String)>,
    positionals: Vec<String>,
    help: bool,
}

impl Flags {
    fn parse<'a>(
        mut it: impl Iterator<Item = &'a str>,
        allowed: &[&'static str],
    ) -> anyhow::Result<Self> {
        let mut flags = Flags::default();
        while let Some(token) = it.next() {
            if token == "-h" || token == "--help" {
                flags.help = true;
                continue;
            }
            let Some(body) = token.strip_prefix("--") else {
                if token.starts_with('-') {
                    anyhow::bail!("unknown argument: {token}");
                }
                flags.positionals.push(token.to_string());
                continue;
            };

            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let Some(name) = allowed.iter().copied().find(|a| *a == name) else {
                anyhow::bail!("unknown argument: {token}");
            };
            let value = match inline {
                Some(v) => v.to_string(),
                None => {
                    let Some(v) = it.next() else {
                        anyhow::bail!("--{name} requires a value");
                    };
                    v.to_string()
                }
            };
            flags.values.retain(|(n, _)| *n != name);
            flags.values.push((name, value));
        }
        Ok(flags)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)
            .ok_or_else(|| anyhow::anyhow!("--{name} is required"))
    }

    fn conn(&self) -> ConnArgs {
        let config = self
            .get("config")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("SUBLEDGER_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        ConnArgs {
            config,
            database: self.get("database").map(str::to_string),
        }
    }

    fn no_positionals(&self, command: &str) -> anyhow::Result<()> {
        if let Some(extra) = self.positionals.first() {
            anyhow::bail!("unexpected positional argument for `{command}`: {extra}");
        }
        Ok(())
    }
}

const CONN_FLAGS: [&str; 2] = ["config", "database"];

fn with_conn(extra: &[&'static str]) -> Vec<&'static str> {
    CONN_FLAGS.iter().chain(extra).copied().collect()
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(|s| s.as_str());
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "migrate" => parse_migrate(it),
        "add" => parse_add(it),
        "list" => parse_list(it),
        "sum" => parse_sum(it),
        "update" => parse_update(it),
        "delete" => parse_delete(it),
        "ping" => parse_ping(it),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_migrate<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["dir"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Migrate));
    }

    let action = match flags.positionals.as_slice() {
        [] => return Ok(Command::Help(HelpTopic::Migrate)),
        [one] => match one.as_str() {
            "up" => MigrateAction::Up,
            "down" => MigrateAction::Down,
            "version" => MigrateAction::Version,
            other => anyhow::bail!("unknown subcommand: {other} (use up|down|version)"),
        },
        [_, extra, ..] => anyhow::bail!("unexpected positional argument: {extra}"),
    };

    Ok(Command::Migrate(MigrateArgs {
        action,
        conn: flags.conn(),
        dir: flags.get("dir").map(PathBuf::from),
    }))
}

fn parse_add<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["user", "service", "price", "start", "end"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Add));
    }
    flags.no_positionals("add")?;

    Ok(Command::Add(AddArgs {
        conn: flags.conn(),
        user: parse_uuid("user", flags.require("user")?)?,
        service: flags.require("service")?.to_string(),
        price: parse_price(flags.require("price")?)?,
        start: parse_date("start", flags.require("start")?)?,
        end: flags.get("end").map(|v| parse_date("end", v)).transpose()?,
    }))
}

fn parse_list<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["user"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::List));
    }
    flags.no_positionals("list")?;

    Ok(Command::List(ListArgs {
        conn: flags.conn(),
        user: flags.get("user").map(|v| parse_uuid("user", v)).transpose()?,
    }))
}

fn parse_sum<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["user", "service", "from", "to"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Sum));
    }
    flags.no_positionals("sum")?;

    Ok(Command::Sum(SumArgs {
        conn: flags.conn(),
        user: flags.get("user").map(|v| parse_uuid("user", v)).transpose()?,
        service: flags.get("service").map(str::to_string),
        from: flags.get("from").map(|v| parse_date("from", v)).transpose()?,
        to: flags.get("to").map(|v| parse_date("to", v)).transpose()?,
    }))
}

fn parse_update<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["user", "price", "end"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Update));
    }
    flags.no_positionals("update")?;

    Ok(Command::Update(UpdateArgs {
        conn: flags.conn(),
        user: parse_uuid("user", flags.require("user")?)?,
        price: flags.get("price").map(parse_price).transpose()?,
        end: flags.get("end").map(|v| parse_date("end", v)).transpose()?,
    }))
}

fn parse_delete<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &with_conn(&["user"]))?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Delete));
    }
    flags.no_positionals("delete")?;

    Ok(Command::Delete(DeleteArgs {
        conn: flags.conn(),
        user: parse_uuid("user", flags.require("user")?)?,
    }))
}

fn parse_ping<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let flags = Flags::parse(it, &CONN_FLAGS)?;
    if flags.help {
        return Ok(Command::Help(HelpTopic::Ping));
    }
    flags.no_positionals("ping")?;
    Ok(Command::Ping(flags.conn()))
}

fn parse_uuid(flag: &str, raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| anyhow::anyhow!("invalid --{flag} value {raw}: {e}"))
}

fn parse_price(raw: &str) -> anyhow::Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| anyhow::anyhow!("invalid --price value: {raw}"))
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_date(flag: &str, raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            anyhow::anyhow!("invalid --{flag} value: {raw} (expected YYYY-MM-DD or RFC 3339)")
        })
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
subledger - subscription ledger over PostgreSQL

USAGE:
  subledger <COMMAND> [OPTIONS]

COMMANDS:
  migrate       Schema migrations (up/down/version)
  add           Insert a subscription, or correct an existing period
  list          List subscriptions
  sum           Total price of matching subscriptions
  update        Change price and/or end date of a user's subscriptions
  delete        Delete all subscriptions of a user
  ping          Check database connectivity

GLOBAL OPTIONS:
  --config <FILE>       Config file (default: $SUBLEDGER_CONFIG or subledger.toml)
  --database <URL>      Override database.url from config (fallback: $DATABASE_URL)

Run `subledger <command> --help` for more."
            );
        }
        HelpTopic::Migrate => {
            println!(
                "\
USAGE:
  subledger migrate up [OPTIONS]
  subledger migrate down [OPTIONS]
  subledger migrate version [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path
  --database <URL>      Override database.url from config
  --dir <DIR>           Migrations dir (default: migrations.dir from config, else built-in)
  -h, --help            Print help

`down` reverts every applied migration."
            );
        }
        HelpTopic::Add => {
            println!(
                "\
USAGE:
  subledger add --user <UUID> --service <NAME> --price <INT> --start <DATE> [--end <DATE>]

Re-adding the same user, service and start date overwrites price and end date.
DATE is YYYY-MM-DD or RFC 3339."
            );
        }
        HelpTopic::List => {
            println!(
                "\
USAGE:
  subledger list [--user <UUID>]

Without --user every subscription is listed, ordered by user, service and start date."
            );
        }
        HelpTopic::Sum => {
            println!(
                "\
USAGE:
  subledger sum [--user <UUID>] [--service <NAME>] [--from <DATE>] [--to <DATE>]

Sums subscriptions whose [start, end] period intersects [from, to].
Open-ended subscriptions match any --from. Prints 0 when nothing matches."
            );
        }
        HelpTopic::Update => {
            println!(
                "\
USAGE:
  subledger update --user <UUID> [--price <INT>] [--end <DATE>]

At least one of --price and --end is required."
            );
        }
        HelpTopic::Delete => {
            println!(
                "\
USAGE:
  subledger delete --user <UUID>

Fails when the user has no subscriptions."
            );
        }
        HelpTopic::Ping => {
            println!(
                "\
USAGE:
  subledger ping [--config <FILE>] [--database <URL>]"
            );
        }
    }
}
