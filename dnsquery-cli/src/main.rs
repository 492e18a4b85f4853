use anyhow::Context;
use clap::{ArgGroup, Parser};
use dnsquery::dns::resolver::transporter::system_nameservers;
use dnsquery::dns::resolver::{
    IdPolicy, QueryMode, RecordType, ResolutionStatus, Resolver, ResolverConfig,
};
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod formatter;
mod server;

use formatter::{JsonFormatter, ResultFormatter, ZoneFormatter};
use server::ServerArg;

#[derive(Parser, Debug)]
#[command(name = "dnsquery")]
#[command(version)]
#[command(about = "Query DNS records recursively or by walking the delegation chain")]
#[command(group(ArgGroup::new("qtype").args(["a", "mx", "loc"])))]
#[command(group(ArgGroup::new("mode").args(["recursive", "trace"])))]
struct Cli {
    /// Name to resolve
    name: String,

    /// DNS server to ask, defaults to the first nameserver of /etc/resolv.conf
    #[arg(value_name = "@SERVER[:PORT]")]
    server: Option<ServerArg>,

    /// Query A records (default)
    #[arg(short = 'a')]
    a: bool,

    /// Query MX records
    #[arg(short = 'm', long)]
    mx: bool,

    /// Query LOC records
    #[arg(short = 'l', long)]
    loc: bool,

    /// Recursive resolution (default)
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Iterative resolution from the root, printing every step
    #[arg(short = 't', long)]
    trace: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Per-attempt timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 3000)]
    timeout: u64,

    /// Retries after the first attempt of each query
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Use a random query ID instead of the process ID
    #[arg(long)]
    random_id: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn record_type(&self) -> RecordType {
        if self.mx {
            RecordType::Mx
        } else if self.loc {
            RecordType::Loc
        } else {
            RecordType::A
        }
    }

    fn mode(&self) -> QueryMode {
        if self.trace {
            QueryMode::Iterative
        } else {
            QueryMode::Recursive
        }
    }

    fn resolver_config(&self, nameservers: Vec<std::net::IpAddr>) -> ResolverConfig {
        let mut config = ResolverConfig::new(&self.name, self.record_type())
            .with_mode(self.mode())
            .with_nameservers(nameservers)
            .with_timeout(Duration::from_millis(self.timeout))
            .with_retries(self.retries);

        if let Some(server) = self.server {
            debug!(%server, family = %server.target_type, "using explicit server");
            config = config.with_server(server.ip);
            if let Some(port) = server.port {
                config = config.with_port(port);
            }
        }
        if self.random_id {
            config = config.with_id_policy(IdPolicy::Random);
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = cli.log_level.as_str();
    init_tracing(&[("dnsquery", level), ("dnsquery_cli", level)]);

    let nameservers = match system_nameservers() {
        Ok(nameservers) => nameservers,
        Err(error) => {
            warn!(%error, "could not read the system nameservers");
            Vec::new()
        }
    };
    let config = cli.resolver_config(nameservers);
    debug!(?config, "resolver configuration");

    let resolution = Resolver::udp(&config)
        .resolve(&config)
        .with_context(|| format!("could not resolve {} {}", config.name, config.record_type))?;

    if cli.json {
        println!("{}", JsonFormatter.format(&config, &resolution)?);
    } else {
        print!(
            "{}",
            ZoneFormatter {
                show_trace: cli.trace
            }
            .format(&config, &resolution)
        );
    }

    if resolution.status == ResolutionStatus::Exhausted {
        warn!(name = %config.name, "no answer after following the delegation chain");
    }
    Ok(())
}

fn init_tracing(filter: &[(&str, &str)]) {
    let filter = filter
        .iter()
        .map(|(name, level)| format!("{}={}", name, level))
        .collect::<Vec<_>>()
        .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
