extern crate log;
extern crate nom;
extern crate simple_logger;

mod build;
mod bundle;
mod cli;
mod configuration;
mod dev_server;
mod engine;
mod logger;
mod protocol;
mod reclaim;
mod worker;

use cli::{Application, Mode};
use configuration::Configuration;
use dev_server::{bridge, Rebuilder};
use engine::shell::ShellFactory;
use engine::EngineFactory;
use logger::{LogSink, Logger};
use protocol::framing::Framer;
use std::io;
use std::process;
use worker::Worker;

fn main() {
    let arguments = Application::handle_arguments();

    let configuration = match Configuration::new(arguments.configuration_path.as_deref()) {
        Ok(configuration) => configuration,
        Err(error) => {
            eprintln!("Unable to load the runtime configuration: {}", error);
            process::exit(build::FAILURE);
        },
    };

    let sink = LogSink::new();
    if let Err(error) = Logger::initialize(configuration.log.level.into(), sink.clone()) {
        eprintln!("Unable to initialize the logger: {}", error);
        process::exit(build::FAILURE);
    }

    let factory = ShellFactory::new(configuration.engine.program, configuration.engine.arguments);
    let exit_code = match arguments.mode {
        Mode::PersistentWorker => {
            // Persistent workers get their build arguments through the requests on stdin.
            sink.start_buffering();
            let framer = Framer::new(configuration.worker.max_message_length);

            persistent_worker(factory, sink, framer)
        },
        Mode::DevServer => dev_server(&arguments.build_arguments, &factory, sink),
        Mode::SingleBuild => build::single(&arguments.build_arguments, &factory, &sink),
    };

    process::exit(exit_code);
}

/// Serve work requests until the end of stdin. Only fatal failures end the worker with an error.
fn persistent_worker(factory: ShellFactory, sink: LogSink, framer: Framer) -> i32 {
    let events = match worker::input::spawn(io::stdin()) {
        Ok(events) => events,
        Err(error) => {
            eprintln!("Unable to read work requests: {}", error);

            return build::FAILURE;
        },
    };

    let mut worker = Worker::new(factory, sink.clone(), io::stdout(), framer);
    match worker.run(&events) {
        Ok(_) => build::SUCCESS,
        Err(error) => {
            // Diagnostics still buffered would never reach the orchestrator.
            let pending = sink.flush();
            if !pending.is_empty() {
                eprintln!("{}", pending);
            }
            eprintln!("{}", error);

            build::FAILURE
        },
    }
}

/// Build once, then rebuild each time the file watcher notifies a completed build on stdin.
fn dev_server(arguments: &[String], factory: &dyn EngineFactory, sink: LogSink) -> i32 {
    let config = match bundle::load(arguments, &sink) {
        Ok(config) => config,
        Err(error) => {
            sink.write(error);

            return build::FAILURE;
        },
    };
    let engine = match factory.create(&config) {
        Ok(engine) => engine,
        Err(error) => {
            sink.write(format!("Could not create a new engine instance: {}", error));

            return build::FAILURE;
        },
    };

    let server = Rebuilder::new(engine, sink.clone());
    server.start();
    log::info!("Waiting for build notifications on stdin.");

    match bridge::listen(io::stdin().lock(), &server) {
        Ok(_) => build::SUCCESS,
        Err(error) => {
            sink.write(format!("Unable to read build notifications: {}", error));

            build::FAILURE
        },
    }
}
