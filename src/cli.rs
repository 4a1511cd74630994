//! The worker's CLI management, parsing CLI arguments given by the orchestrator or the user.
//!
//! This module provides a complete handling on CLI arguments, including parsing arguments, but
//! also displaying the help and version commands. When arguments cannot get parsed, it exits the
//! program, displaying an appropriate message and returning the proper error code to the parent
//! shell.
//!
//! Handled arguments:
//! * `--persistent_worker`: serve work requests on stdin, until its end.
//! * `--dev_server`: build once, then rebuild on each notification received on stdin.
//! * `-c`, `--config`: it takes a value as parameter, being the path to the runtime configuration
//! file used for the current execution.
//! * any other argument is part of the build's command line (`@@`-prefixed arguments name bundle
//! configuration files). Without a mode flag, a single build runs for these arguments.

use clap::App;
use clap::crate_name;
use clap::crate_version;
use clap::Arg;
use clap::ArgMatches;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    SingleBuild,
    PersistentWorker,
    DevServer,
}

#[derive(Debug)]
pub struct Arguments {
    pub mode: Mode,
    pub configuration_path: Option<String>,
    pub build_arguments: Vec<String>,
}

pub struct Application {}

impl Application {
    /// Handle current CLI arguments. When arguments cannot get parsed, it exits the program,
    /// displaying the corresponding message, and returning the proper error code.
    pub fn handle_arguments() -> Arguments {
        Self::arguments_from(Self::app().get_matches())
    }

    fn app() -> App<'static> {
        App::new(crate_name!())
            .version(crate_version!())
            .arg(
                Arg::new("persistent_worker")
                    .long("persistent_worker")
                    .help("Serves work requests on stdin until its end")
            )
            .arg(
                Arg::new("dev_server")
                    .long("dev_server")
                    .conflicts_with("persistent_worker")
                    .help("Builds once, then rebuilds on each build notification on stdin")
            )
            .arg(
                Arg::new("configuration_path")
                    .short('c')
                    .long("config")
                    .takes_value(true)
                    .value_name("FILE")
                    .help("Sets the path of the runtime configuration file")
            )
            .arg(
                Arg::new("build_arguments")
                    .value_name("ARGUMENTS")
                    .multiple_values(true)
                    .help("Sets the build's command line (@@FILE arguments name bundle configuration files)")
            )
            .help_template("USAGE: {usage}\n\n{all-args}")
    }

    fn arguments_from(matches: ArgMatches) -> Arguments {
        let mode = match (matches.is_present("persistent_worker"), matches.is_present("dev_server")) {
            (true, _) => Mode::PersistentWorker,
            (false, true) => Mode::DevServer,
            (false, false) => Mode::SingleBuild,
        };

        Arguments {
            mode,
            configuration_path: matches.value_of("configuration_path").map(|path| path.to_string()),
            build_arguments: match matches.values_of("build_arguments") {
                Some(values) => values.map(|value| value.to_string()).collect(),
                None => Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(arguments: &[&str]) -> Result<Arguments, clap::Error> {
        let mut command_line = vec!["bundle-worker"];
        command_line.extend_from_slice(arguments);

        Application::app().try_get_matches_from(command_line).map(Application::arguments_from)
    }

    #[test]
    fn test_modes() {
        let arguments = parse(&["--persistent_worker"]).unwrap();
        assert_eq!(arguments.mode, Mode::PersistentWorker);
        assert!(arguments.build_arguments.is_empty());

        let arguments = parse(&["--dev_server", "@@bundle.toml"]).unwrap();
        assert_eq!(arguments.mode, Mode::DevServer);
        assert_eq!(arguments.build_arguments, vec!["@@bundle.toml"]);

        let arguments = parse(&["-c", "worker.toml", "@@base.toml", "@@override.toml"]).unwrap();
        assert_eq!(arguments.mode, Mode::SingleBuild);
        assert_eq!(arguments.configuration_path.as_deref(), Some("worker.toml"));
        assert_eq!(arguments.build_arguments, vec!["@@base.toml", "@@override.toml"]);
    }

    #[test]
    fn test_invalid() {
        assert!(parse(&["--persistent_worker", "--dev_server"]).is_err());
        assert!(parse(&["--unknown"]).is_err());
        assert!(parse(&["--config"]).is_err());
    }
}
