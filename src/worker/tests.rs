use super::*;
use crate::build::SUCCESS;
use crate::bundle::tests::write;
use crate::bundle::BundleConfig;
use crate::engine::Engine;
use crate::protocol::Input;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

/// An engine recording the start and the end of its runs.
struct Recorder {
    journal: Journal,
    runs: AtomicUsize,
    report: Report,
}

impl Engine for Recorder {
    fn run(&self, sink: &LogSink) -> Result<Report, EngineError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        record(&self.journal, format!("start {}", run));
        // Leave time for a concurrent build to start, if any could.
        thread::sleep(Duration::from_millis(20));
        sink.write(format!("run {}", run));
        record(&self.journal, format!("end {}", run));

        match self.report.text.as_str() {
            "throw" => Err(EngineError::Invocation(String::from("compiler crashed"))),
            "panic" => panic!("engine bug"),
            _ => Ok(self.report.clone()),
        }
    }
}

struct Factory {
    journal: Journal,
    attempts: Arc<AtomicUsize>,
    failing_attempts: usize,
    report: Report,
}

impl Factory {
    fn new(journal: &Journal) -> Self {
        Self {
            journal: Arc::clone(journal),
            attempts: Arc::new(AtomicUsize::new(0)),
            failing_attempts: 0,
            report: Report {
                has_errors: false,
                text: String::from("bundle.js  1.2 KiB"),
            },
        }
    }
}

impl EngineFactory for Factory {
    fn create(&self, _config: &BundleConfig) -> Result<Arc<dyn Engine>, EngineError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match attempt <= self.failing_attempts {
            true => Err(EngineError::Construction(String::from("invalid loader configuration"))),
            false => Ok(Arc::new(Recorder {
                journal: Arc::clone(&self.journal),
                runs: AtomicUsize::new(0),
                report: self.report.clone(),
            })),
        }
    }
}

/// The worker's stdout, journaling every flushed response.
#[derive(Clone)]
struct Output {
    bytes: Arc<Mutex<Vec<u8>>>,
    journal: Journal,
}

impl Write for Output {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buffer);

        Ok(buffer.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        record(&self.journal, String::from("response"));

        Ok(())
    }
}

impl Output {
    fn responses(&self) -> Vec<WorkResponse> {
        let mut accumulator = Accumulator::new(Framer::default());
        accumulator.extend(&self.bytes.lock().unwrap());

        let mut responses = Vec::new();
        loop {
            match accumulator.next::<WorkResponse>() {
                Decoded::Message { message, .. } => responses.push(message),
                Decoded::Incomplete => break,
                Decoded::Malformed => panic!("The worker wrote a malformed response."),
            };
        }
        assert!(accumulator.is_empty());

        responses
    }
}

fn request(arguments: &[String]) -> Vec<u8> {
    framing::encode(&WorkRequest {
        arguments: arguments.to_vec(),
        inputs: vec![Input {
            path: String::from("src/index.js"),
            digest: vec![0x01, 0x02],
        }],
    })
}

/// Run a worker on the given chunks of bytes until the end of the stream, returning the written
/// responses and the journal.
fn serve(factory: Factory, journal: &Journal, chunks: Vec<Vec<u8>>) -> (Result<(), WorkerError>, Vec<WorkResponse>) {
    let output = Output {
        bytes: Arc::new(Mutex::new(Vec::new())),
        journal: Arc::clone(journal),
    };
    let sink = LogSink::with_stream(Box::new(io::sink()));
    sink.start_buffering();
    let reclaim_journal = Arc::clone(journal);
    let mut worker = Worker::new(factory, sink, output.clone(), Framer::default())
        .with_reclaim(move || record(&reclaim_journal, String::from("reclaim")));

    let (sender, receiver) = unbounded();
    for chunk in chunks {
        sender.send(Event::Bytes(chunk)).unwrap();
    }
    sender.send(Event::Closed).unwrap();

    let result = worker.run(&receiver);

    (result, output.responses())
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_single_in_flight() {
    let journal = journal();
    let mut chunk = request(&[]);
    chunk.extend(request(&[]));

    let (result, responses) = serve(Factory::new(&journal), &journal, vec![chunk]);
    assert!(result.is_ok());
    assert_eq!(responses, vec![
        WorkResponse::new(SUCCESS, String::from("run 1\nbundle.js  1.2 KiB\nCompiling finished.")),
        WorkResponse::new(SUCCESS, String::from("run 2\nbundle.js  1.2 KiB\nCompiling finished.")),
    ]);
    assert_eq!(*journal.lock().unwrap(), vec![
        "start 1", "end 1", "response", "reclaim",
        "start 2", "end 2", "response", "reclaim",
    ]);
}

#[test]
fn test_chunked_request() {
    let journal = journal();
    let chunks = request(&[]).into_iter().map(|byte| vec![byte]).collect();

    let (result, responses) = serve(Factory::new(&journal), &journal, chunks);
    assert!(result.is_ok());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].exit_code, SUCCESS);
}

#[test]
fn test_cache_reuse() {
    let directory = TempDir::new().unwrap();
    let base = write(&directory, "base.toml", "entry = [\"main.js\"]\n[define]\nA = \"1\"\nB = \"2\"\n");
    let reordered = write(&directory, "reordered.toml", "[define]\nB = \"2\"\nA = \"1\"\n");
    let entry = write(&directory, "entry.toml", "entry = [\"main.js\"]\n");
    let production = write(&directory, "production.toml", "mode = \"production\"\n");
    let journal = journal();
    let factory = Factory::new(&journal);
    let attempts = Arc::clone(&factory.attempts);

    let chunks = vec![
        request(&[base.clone()]),
        request(&[entry.clone(), reordered]),
        request(&[base, production]),
        request(&[entry]),
    ];
    let (result, responses) = serve(factory, &journal, chunks);
    assert!(result.is_ok());
    assert_eq!(responses.len(), 4);
    assert!(responses.iter().all(|response| response.exit_code == SUCCESS));
    // The first two requests share an engine, the others differ in configuration.
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(responses[1].output.starts_with("run 2\n"));
    assert!(responses[2].output.starts_with("run 1\n"));
}

#[test]
fn test_construction_failure() {
    let journal = journal();
    let mut factory = Factory::new(&journal);
    factory.failing_attempts = 1;
    let attempts = Arc::clone(&factory.attempts);

    let (result, responses) = serve(factory, &journal, vec![request(&[]), request(&[])]);
    assert!(result.is_ok());
    assert_eq!(responses, vec![
        WorkResponse::new(FAILURE, String::from("Could not create a new engine instance: invalid loader configuration")),
        WorkResponse::new(SUCCESS, String::from("run 1\nbundle.js  1.2 KiB\nCompiling finished.")),
    ]);
    // The failed construction was not cached.
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(*journal.lock().unwrap(), vec![
        "response", "reclaim", "start 1", "end 1", "response", "reclaim",
    ]);
}

#[test]
fn test_build_failure() {
    let journal = journal();
    let mut factory = Factory::new(&journal);
    factory.report = Report {
        has_errors: true,
        text: String::from("ERROR in ./src/index.js"),
    };
    let (result, responses) = serve(factory, &journal, vec![request(&[])]);
    assert!(result.is_ok());
    assert_eq!(responses, vec![
        WorkResponse::new(FAILURE, String::from("run 1\nERROR in ./src/index.js\nCompiling finished.")),
    ]);

    let mut factory = Factory::new(&journal);
    factory.report.text = String::from("throw");
    let (result, responses) = serve(factory, &journal, vec![request(&[]), request(&[])]);
    assert!(result.is_ok());
    // The worker keeps serving after a failing build.
    assert_eq!(responses, vec![
        WorkResponse::new(FAILURE, String::from("run 1\nBuild failed: compiler crashed\nCompiling finished.")),
        WorkResponse::new(FAILURE, String::from("run 2\nBuild failed: compiler crashed\nCompiling finished.")),
    ]);
}

#[test]
fn test_engine_panic() {
    let journal = journal();
    let mut factory = Factory::new(&journal);
    factory.report.text = String::from("panic");
    let attempts = Arc::clone(&factory.attempts);

    let (result, responses) = serve(factory, &journal, vec![request(&[]), request(&[])]);
    assert!(result.is_ok());
    // Both requests are answered, and the engine stays cached.
    assert_eq!(responses, vec![
        WorkResponse::new(FAILURE, String::from("run 1\nBuild failed: build engine panicked: engine bug\nCompiling finished.")),
        WorkResponse::new(FAILURE, String::from("run 2\nBuild failed: build engine panicked: engine bug\nCompiling finished.")),
    ]);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(*journal.lock().unwrap(), vec![
        "start 1", "end 1", "response", "reclaim",
        "start 2", "end 2", "response", "reclaim",
    ]);
}

#[test]
fn test_invalid_configuration() {
    let directory = TempDir::new().unwrap();
    let invalid = write(&directory, "invalid.toml", "mode = \"fast\"\n");
    let journal = journal();
    let factory = Factory::new(&journal);
    let attempts = Arc::clone(&factory.attempts);

    let (result, responses) = serve(factory, &journal, vec![request(&[invalid]), request(&[])]);
    assert!(result.is_ok());
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].exit_code, FAILURE);
    assert!(responses[0].output.starts_with("invalid bundle configuration file"));
    assert_eq!(responses[1].exit_code, SUCCESS);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_malformed_recovery() {
    let journal = journal();
    // A corrupted request, followed in the same read by a valid one lost with it.
    let mut corrupted = vec![0x02, 0x0f, 0x01];
    corrupted.extend(request(&[]));

    let (result, responses) = serve(Factory::new(&journal), &journal, vec![corrupted, request(&[])]);
    assert!(result.is_ok());
    assert_eq!(responses, vec![
        WorkResponse::new(FAILURE, String::from("Discarding a malformed work request.")),
        WorkResponse::new(SUCCESS, String::from("run 1\nbundle.js  1.2 KiB\nCompiling finished.")),
    ]);
}

#[test]
fn test_corrupted_length() {
    let journal = journal();
    let mut corrupted = vec![0xff; 11];
    corrupted.extend(request(&[]));

    let (result, responses) = serve(Factory::new(&journal), &journal, vec![corrupted, request(&[])]);
    assert!(result.is_ok());
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].exit_code, FAILURE);
    assert_eq!(responses[1].exit_code, SUCCESS);
}

#[test]
fn test_closed_stream() {
    let journal = journal();
    let partial = request(&[]);

    // A request cut by the end of the stream is never answered.
    let (result, responses) = serve(Factory::new(&journal), &journal, vec![partial[..3].to_vec()]);
    assert!(result.is_ok());
    assert!(responses.is_empty());

    let (result, responses) = serve(Factory::new(&journal), &journal, vec![]);
    assert!(result.is_ok());
    assert!(responses.is_empty());
}

#[test]
fn test_read_failure() {
    let journal = journal();
    let output = Output {
        bytes: Arc::new(Mutex::new(Vec::new())),
        journal: Arc::clone(&journal),
    };
    let sink = LogSink::with_stream(Box::new(io::sink()));
    sink.start_buffering();
    let mut worker = Worker::new(Factory::new(&journal), sink, output, Framer::default());

    let (sender, receiver) = unbounded();
    sender.send(Event::Failed(IoError::new(io::ErrorKind::Other, "stdin closed"))).unwrap();
    let error = worker.run(&receiver).unwrap_err();
    assert!(matches!(error, WorkerError::Read(_)));
    // The cause is part of the message, and reported only once.
    assert_eq!(error.to_string(), "unable to read work requests: stdin closed");
    assert!(std::error::Error::source(&error).is_none());
}

#[test]
fn test_write_failure() {
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buffer: &[u8]) -> io::Result<usize> {
            Err(IoError::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let journal = journal();
    let sink = LogSink::with_stream(Box::new(io::sink()));
    sink.start_buffering();
    let mut worker = Worker::new(Factory::new(&journal), sink, Broken, Framer::default());

    let (sender, receiver) = unbounded();
    sender.send(Event::Bytes(request(&[]))).unwrap();
    sender.send(Event::Closed).unwrap();
    assert!(matches!(worker.run(&receiver), Err(WorkerError::Write(_))));
}
