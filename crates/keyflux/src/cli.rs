use anyhow::{Context, bail};
use keyflux_core::{KeyType, TypeFilter};
use keyflux_driver_redis::RedisParams;

pub const USAGE: &str = "\
Usage: keyflux <redis-uri> [options]
       keyflux --host HOST [--port PORT] [--user USER] [--password PASS] [--tls] [options]

Options:
  --db N               Select logical database N after connecting
  --tree               Show keys grouped by delimiter
  --filter TEXT        Case-insensitive substring filter
  --type TYPE          Only show keys of TYPE (string, list, set, hash, zset, stream)
  --scope PATH         Only show keys under PATH
  --delimiter SEP      Path separator for grouping (default from config)
  --watch SECS         Keep running and refresh every SECS seconds
  -h, --help           Print this help";

/// Where to connect: a full URI, or discrete connection fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Uri(String),
    Params(RedisParams),
}

impl Default for Target {
    fn default() -> Self {
        Target::Params(RedisParams::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliArgs {
    pub target: Target,
    pub database: Option<u32>,
    pub tree: bool,
    pub filter: Option<String>,
    pub type_filter: TypeFilter,
    pub scope: Option<String>,
    pub delimiter: Option<String>,
    pub watch_secs: Option<u32>,
}

/// Parses arguments after the program name. Returns `None` for `--help`.
pub fn parse(args: &[String]) -> anyhow::Result<Option<CliArgs>> {
    let mut parsed = CliArgs::default();
    let mut uri = None;
    let mut host = None;
    let mut params = RedisParams::default();
    let mut uses_params = false;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--tree" => parsed.tree = true,
            "--filter" => parsed.filter = Some(value(&mut iter, arg)?),
            "--scope" => parsed.scope = Some(value(&mut iter, arg)?),
            "--delimiter" => parsed.delimiter = Some(value(&mut iter, arg)?),
            "--type" => parsed.type_filter = parse_type(&value(&mut iter, arg)?)?,
            "--db" => parsed.database = Some(number(&value(&mut iter, arg)?, arg)?),
            "--host" => host = Some(value(&mut iter, arg)?),
            "--port" => {
                params.port = number(&value(&mut iter, arg)?, arg)?;
                uses_params = true;
            }
            "--user" => {
                params.user = Some(value(&mut iter, arg)?);
                uses_params = true;
            }
            "--password" => {
                params.password = Some(value(&mut iter, arg)?);
                uses_params = true;
            }
            "--tls" => {
                params.tls = true;
                uses_params = true;
            }
            "--watch" => {
                let secs: u32 = number(&value(&mut iter, arg)?, arg)?;
                if secs == 0 {
                    bail!("--watch needs a positive number of seconds");
                }
                parsed.watch_secs = Some(secs);
            }
            flag if flag.starts_with('-') => bail!("unknown option '{}'", flag),
            positional => {
                if uri.replace(positional.to_string()).is_some() {
                    bail!("unexpected argument '{}'", positional);
                }
            }
        }
    }

    parsed.target = match (uri, host) {
        (Some(_), Some(_)) => bail!("give either <redis-uri> or --host, not both"),
        (Some(_), None) if uses_params => {
            bail!("--port, --user, --password and --tls need --host")
        }
        (Some(uri), None) => Target::Uri(uri),
        (None, Some(host)) => {
            params.host = host;
            params.database = parsed.database;
            Target::Params(params)
        }
        (None, None) => bail!("missing <redis-uri> or --host"),
    };

    Ok(Some(parsed))
}

fn number<T: std::str::FromStr>(text: &str, flag: &str) -> anyhow::Result<T> {
    text.parse()
        .ok()
        .with_context(|| format!("invalid {} value '{}'", flag, text))
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<String> {
    iter.next()
        .cloned()
        .with_context(|| format!("{} needs a value", flag))
}

fn parse_type(name: &str) -> anyhow::Result<TypeFilter> {
    let filter = TypeFilter::parse(name);
    if let TypeFilter::Only(KeyType::Unknown) = filter {
        bail!("unknown key type '{}'", name);
    }
    Ok(filter)
}
