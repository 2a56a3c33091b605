//! `reqtrace` command-line front end

mod commands;
mod store_file;

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::{Report, Session};
use reqtrace_core::EngineConfig;
use reqtrace_model::{Bump, VersionId};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn project_arg() -> Arg {
    Arg::new("project")
        .long("project")
        .short('p')
        .required(true)
        .help("Project name")
}

fn bump_arg(default: &'static str) -> Arg {
    Arg::new("bump")
        .long("bump")
        .default_value(default)
        .value_parser(commands::parse_bump)
        .help("Component to increment: major, minor or revision")
}

fn version_arg(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(long)
        .required(true)
        .value_parser(commands::parse_version)
        .help(help)
}

fn cli() -> Command {
    Command::new("reqtrace")
        .version(reqtrace_core::VERSION)
        .about("Versioned commit and delta engine for requirements traceability")
        .subcommand_required(true)
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .default_value("reqtrace.json")
                .value_parser(value_parser!(PathBuf))
                .help("JSON store file, created when missing"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("project")
                .about("Manage projects")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Create a project")
                        .arg(Arg::new("name").required(true).help("Project name"))
                        .arg(
                            Arg::new("description")
                                .long("description")
                                .default_value("")
                                .help("Free-form description"),
                        )
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .action(ArgAction::Append)
                                .help("Accepted artifact type (repeatable; none accepts any)"),
                        ),
                )
                .subcommand(Command::new("list").about("List projects")),
        )
        .subcommand(
            Command::new("version")
                .about("Manage versions")
                .subcommand_required(true)
                .subcommand(
                    Command::new("new")
                        .about("Allocate the next version")
                        .arg(project_arg())
                        .arg(bump_arg("revision")),
                )
                .subcommand(
                    Command::new("list")
                        .about("List versions")
                        .arg(project_arg()),
                ),
        )
        .subcommand(
            Command::new("commit")
                .about("Commit a change set into a new version")
                .arg(project_arg())
                .arg(
                    Arg::new("changes")
                        .long("changes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Change set JSON file"),
                )
                .arg(bump_arg("revision"))
                .arg(
                    Arg::new("fail-on-error")
                        .long("fail-on-error")
                        .action(ArgAction::SetTrue)
                        .help("Abort on any validation error"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Compare two versions")
                .arg(project_arg())
                .arg(version_arg("from", "from", "Baseline version (x.y.z)"))
                .arg(version_arg("to", "to", "Target version (x.y.z)"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show everything live in a version")
                .arg(project_arg())
                .arg(version_arg("version", "version", "Version to show (x.y.z)")),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn string<'a>(args: &'a ArgMatches, name: &str) -> &'a str {
    args.get_one::<String>(name).map_or("", String::as_str)
}

fn run(matches: &ArgMatches) -> Result<Report> {
    let config = load_config(matches)?;
    let store = matches
        .get_one::<PathBuf>("store")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("reqtrace.json"));
    let session = Session::open(&store, config)?;

    match matches.subcommand() {
        Some(("project", sub)) => match sub.subcommand() {
            Some(("create", args)) => {
                let types: Vec<String> = args
                    .get_many::<String>("type")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();
                commands::project_create(
                    &session,
                    string(args, "name"),
                    string(args, "description"),
                    &types,
                )
            }
            _ => commands::project_list(&session),
        },
        Some(("version", sub)) => match sub.subcommand() {
            Some(("new", args)) => {
                let bump = args.get_one::<Bump>("bump").copied().unwrap_or(Bump::Revision);
                commands::version_new(&session, string(args, "project"), bump)
            }
            Some((_, args)) => commands::version_list(&session, string(args, "project")),
            None => anyhow::bail!("missing version subcommand"),
        },
        Some(("commit", args)) => {
            let changes = args
                .get_one::<PathBuf>("changes")
                .ok_or_else(|| anyhow::anyhow!("--changes is required"))?;
            let bump = args.get_one::<Bump>("bump").copied().unwrap_or(Bump::Revision);
            commands::commit(
                &session,
                string(args, "project"),
                changes,
                bump,
                args.get_flag("fail-on-error"),
            )
        }
        Some(("diff", args)) => {
            let from = version(args, "from")?;
            let to = version(args, "to")?;
            commands::diff(&session, string(args, "project"), from, to, args.get_flag("json"))
        }
        Some(("show", args)) => {
            let at = version(args, "version")?;
            commands::show(&session, string(args, "project"), at)
        }
        _ => anyhow::bail!("unknown command"),
    }
}

fn version(args: &ArgMatches, name: &str) -> Result<VersionId> {
    args.get_one::<VersionId>(name)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("--{name} is required"))
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(&matches) {
        Ok(report) => {
            if !report.text.is_empty() {
                println!("{}", report.text);
            }
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let matches = cli()
            .try_get_matches_from([
                "reqtrace",
                "diff",
                "-p",
                "demo",
                "--from",
                "1.0.0",
                "--to",
                "1.0.1",
                "--store",
                "other.json",
                "--log-json",
            ])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        assert_eq!(
            matches.get_one::<PathBuf>("store").unwrap(),
            &PathBuf::from("other.json")
        );
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(version(args, "to").unwrap(), VersionId::new(1, 0, 1));
    }

    #[test]
    fn bad_bump_is_rejected_at_parse_time() {
        let err = cli()
            .try_get_matches_from(["reqtrace", "version", "new", "-p", "demo", "--bump", "patch"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
