use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use jmxmon::commands;

fn scope_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("keyspace")
            .short('k')
            .long("keyspace")
            .value_name("KEYSPACE")
            .help("Keyspace of the sampled table"),
    )
    .arg(
        Arg::new("scope")
            .short('s')
            .long("scope")
            .value_name("TABLE")
            .help("Table (metric scope) to sample"),
    )
}

fn build_cli() -> Command {
    Command::new("jmxmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Samples Cassandra JMX metrics while a stress workload runs")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Config file (defaults to the user config directory)"),
        )
        .subcommand(
            scope_args(
                Command::new("run")
                    .about("Run cassandra-stress and sample JMX metrics until it finishes"),
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .value_name("HOST")
                    .help("JMX host"),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .value_parser(value_parser!(u16))
                    .help("JMX port"),
            )
            .arg(
                Arg::new("interval")
                    .short('i')
                    .long("interval")
                    .value_name("MS")
                    .value_parser(value_parser!(u64))
                    .help("Milliseconds between poll cycles"),
            )
            .arg(
                Arg::new("count")
                    .short('n')
                    .long("count")
                    .value_name("N")
                    .value_parser(value_parser!(u64))
                    .help("Number of writes issued by the workload"),
            )
            .arg(
                Arg::new("threads")
                    .short('t')
                    .long("threads")
                    .value_name("T")
                    .value_parser(value_parser!(u32))
                    .help("Workload client threads"),
            )
            .arg(
                Arg::new("capture")
                    .long("capture")
                    .value_name("PATH")
                    .help("Where to save the raw capture"),
            )
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("PATH")
                    .help("Where to save the time series JSON"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .help("Print the time series as JSON instead of a summary")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(
            scope_args(Command::new("parse").about("Parse a saved capture file"))
                .arg(
                    Arg::new("capture")
                        .help("Capture file written by 'jmxmon run'")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .help("Also save the time series JSON here"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the time series as JSON instead of a summary")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(scope_args(
            Command::new("queries").about("Show the jmxterm queries issued every cycle"),
        ))
        .subcommand(
            Command::new("config")
                .about("Inspect or create the config file")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(
                    Command::new("init")
                        .about("Write a default config file")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config_path = commands::config::config_path(&matches);

    match matches.subcommand() {
        // run sets up logging itself once the log file is known
        Some(("run", sub_matches)) => commands::run::execute(sub_matches, config_path),
        Some((name, sub_matches)) => {
            jmxmon::init_logging(None);
            match name {
                "parse" => commands::parse::execute(sub_matches, config_path),
                "queries" => commands::queries::execute(sub_matches, config_path),
                "config" => commands::config::execute(sub_matches, config_path),
                "version" => commands::version(),
                _ => unreachable!("clap only yields declared subcommands"),
            }
        }
        None => {
            println!("Use 'jmxmon --help' for more information.");
            Ok(())
        }
    }
}
