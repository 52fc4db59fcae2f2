//! ip2asn: describe IP addresses and ASNs from an iptoasn.com table.

use clap::{Args, Parser, Subcommand, ValueEnum};
use ip2asn::{AsnRecord, Database, DatabaseConfig, Interval, IpVersion, LookupResult};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ip2asn")]
#[command(version)]
#[command(about = "Describes IP addresses and ASNs from an ip2asn database", long_about = None)]
#[command(after_help = "Example Usage: ip2asn lookup -f ip2asn-v4-u32.tsv 1.1.1.1")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatabaseArgs {
    /// The ip2asn database file to use (download from iptoasn.com)
    #[arg(short = 'f', long = "ip2asn-database", default_value_os_t = default_database())]
    database: PathBuf,

    /// Read and write a binary cache next to the database file
    #[arg(long)]
    cache: bool,

    /// Only accept addresses of this family (4 or 6)
    #[arg(long, value_parser = parse_ip_version)]
    ip_version: Option<IpVersion>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output the results to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Output FSDB (tab-separated) rows, same as --format fsdb
    #[arg(short = 'F', long, conflicts_with = "format")]
    output_fsdb: bool,
}

impl OutputArgs {
    fn format(&self) -> OutputFormat {
        if self.output_fsdb {
            OutputFormat::Fsdb
        } else {
            self.format
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print information about one or more addresses
    Lookup {
        #[command(flatten)]
        db: DatabaseArgs,

        #[command(flatten)]
        out: OutputArgs,

        /// Addresses to print information about
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// List the ranges announced by an ASN
    Asn {
        #[command(flatten)]
        db: DatabaseArgs,

        #[command(flatten)]
        out: OutputArgs,

        /// Stop after this many ranges
        #[arg(short, long)]
        limit: Option<usize>,

        /// Autonomous system number
        asn: String,
    },

    /// Parse the database and write its binary cache
    Cache {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Cache file to write (defaults to <database>.cache)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human readable blocks
    Text,
    /// Tab-separated FSDB rows
    Fsdb,
    /// One JSON object per line
    Json,
}

fn default_database() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join("lib").join("ip2asn-v4-u32.tsv")
}

fn parse_ip_version(s: &str) -> Result<IpVersion, String> {
    IpVersion::from_str_opt(s).ok_or_else(|| format!("unknown IP version '{}', expected 4 or 6", s))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lookup { db, out, addresses } => lookup_addresses(&db, &out, &addresses),
        Commands::Asn {
            db,
            out,
            limit,
            asn,
        } => lookup_asn(&db, &out, &asn, limit),
        Commands::Cache { db, output } => write_cache(&db, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open_database(args: &DatabaseArgs) -> ip2asn::Result<Database> {
    let mut config = DatabaseConfig::default()
        .with_use_cache(args.cache)
        .with_cache_contents(args.cache);
    if let Some(version) = args.ip_version {
        config = config.with_ip_version(version);
    }
    Database::open(&args.database, config)
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn lookup_addresses(
    db_args: &DatabaseArgs,
    out: &OutputArgs,
    addresses: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_database(db_args)?;
    let mut to = open_output(out.output.as_deref())?;
    let format = out.format();

    if format == OutputFormat::Fsdb {
        writeln!(to, "#fsdb -F t address ip_numeric ASN owner country ip_range")?;
    }

    for address in addresses {
        let row = match db.lookup_address_row(address) {
            Ok(Some(row)) => row,
            Ok(None) => {
                eprintln!("ERROR: address '{}' was not found in the database", address);
                continue;
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                continue;
            }
        };
        let numeric = db.codec().parse(address)?;
        let result = LookupResult::new(address, numeric, &row);

        match format {
            OutputFormat::Text => print_result(&mut to, &result, &row)?,
            OutputFormat::Fsdb => writeln!(
                to,
                "{}\t{}\t{}\t{}\t{}\t{}",
                result.ip_text,
                result.ip_numeric,
                result.asn,
                result.owner,
                result.country,
                format_range(result.ip_range)
            )?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut to, &result)?;
                writeln!(to)?;
            }
        }
    }

    to.flush()?;
    Ok(())
}

fn print_result(to: &mut dyn Write, result: &LookupResult, row: &Interval) -> io::Result<()> {
    let prefixes: Vec<String> = row.prefixes().iter().map(|p| p.to_string()).collect();

    writeln!(to, "Address: {}", result.ip_text)?;
    writeln!(to, "  Numeric ip: {}", result.ip_numeric)?;
    writeln!(to, "         ASN: {}", result.asn)?;
    writeln!(to, "       Owner: {}", result.owner)?;
    writeln!(to, "     Country: {}", result.country)?;
    writeln!(to, "    ip_range: {}", format_range(result.ip_range))?;
    writeln!(to, "    Prefixes: {}", prefixes.join(" "))?;
    writeln!(to)
}

fn format_range(range: [u128; 2]) -> String {
    format!("[{}, {}]", range[0], range[1])
}

fn lookup_asn(
    db_args: &DatabaseArgs,
    out: &OutputArgs,
    asn: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_database(db_args)?;
    let records = db.lookup_asn(asn.trim(), limit);
    if records.is_empty() {
        eprintln!("ERROR: ASN '{}' was not found in the database", asn);
        return Ok(());
    }

    let mut to = open_output(out.output.as_deref())?;
    let format = out.format();
    if format == OutputFormat::Fsdb {
        writeln!(to, "#fsdb -F t ASN owner country ip_range")?;
    }

    for record in &records {
        match format {
            OutputFormat::Text => print_record(&mut to, record)?,
            OutputFormat::Fsdb => writeln!(
                to,
                "{}\t{}\t{}\t{}",
                record.asn,
                record.owner,
                record.country,
                format_range(record.ip_range)
            )?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut to, record)?;
                writeln!(to)?;
            }
        }
    }

    to.flush()?;
    Ok(())
}

fn print_record(to: &mut dyn Write, record: &AsnRecord) -> io::Result<()> {
    let interval = Interval::new(
        record.ip_range[0],
        record.ip_range[1],
        record.asn.as_str(),
        record.country.as_str(),
        record.owner.as_str(),
    );
    let prefixes: Vec<String> = interval.prefixes().iter().map(|p| p.to_string()).collect();

    writeln!(to, "         ASN: {}", record.asn)?;
    writeln!(to, "       Owner: {}", record.owner)?;
    writeln!(to, "     Country: {}", record.country)?;
    writeln!(to, "    ip_range: {} - {}", interval.start_text(), interval.end_text())?;
    writeln!(to, "    Prefixes: {}", prefixes.join(" "))?;
    writeln!(to)
}

fn write_cache(db_args: &DatabaseArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match db_args.ip_version {
        Some(version) => DatabaseConfig::default().with_ip_version(version),
        None => DatabaseConfig::default(),
    };
    let db = Database::open(&db_args.database, config.with_use_cache(false))?;
    let path = db.save_cache(output)?;

    println!("Wrote {} ranges to {:?}", db.len(), path);
    Ok(())
}
