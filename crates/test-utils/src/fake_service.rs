use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use execpump::errors::ServiceError;
use execpump::exec::service::ServiceFuture;
use execpump::exec::{
    ExecExit, ExecHandle, ExecIo, ExecSpec, HandleRegistry, PipeReader, PipeWriter,
    RemoteExecService, pipe,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub type FakeFuture = Pin<Box<dyn Future<Output = Result<ExecExit, ServiceError>> + Send>>;
type Program = Arc<dyn Fn(FakeProcess) -> FakeFuture + Send + Sync>;

/// In-memory "filesystem" shared by every process of one fake service.
#[derive(Debug, Clone, Default)]
pub struct FakeFiles {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FakeFiles {
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().get(path).cloned()
    }

    pub fn put(&self, path: &str, contents: Vec<u8>) {
        self.inner.lock().unwrap().insert(path.to_string(), contents);
    }
}

/// What a fake program gets to work with.
pub struct FakeProcess {
    /// Arguments after the program name.
    pub args: Vec<String>,
    pub stdin: Option<PipeReader>,
    pub stdout: PipeWriter,
    pub stderr: PipeWriter,
    pub files: FakeFiles,
}

impl FakeProcess {
    /// Read stdin to EOF; empty when stdin is not attached.
    pub async fn read_stdin(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.read_to_end(&mut buf).await;
        }
        buf
    }

    /// Write to stdout, ignoring a reader that went away.
    pub async fn out(&mut self, bytes: impl AsRef<[u8]>) {
        let _ = self.stdout.write_all(bytes.as_ref()).await;
    }

    /// Write to stderr, ignoring a reader that went away.
    pub async fn err(&mut self, bytes: impl AsRef<[u8]>) {
        let _ = self.stderr.write_all(bytes.as_ref()).await;
    }
}

/// A scriptable `RemoteExecService`:
/// - only targets added with [`with_target`](Self::with_target) register;
/// - commands dispatch on `argv[0]` to registered programs;
/// - `echo`, `cat` and a tiny `sh -c` are built in;
/// - unattached stdout/stderr behave like a closed pipe for the program.
pub struct FakeExecService {
    targets: HashSet<String>,
    stopped: HashSet<String>,
    programs: HashMap<String, Program>,
    registry: HandleRegistry,
    files: FakeFiles,
    registered: Mutex<Vec<ExecSpec>>,
    started: AtomicUsize,
}

impl FakeExecService {
    pub fn new() -> Self {
        Self {
            targets: HashSet::new(),
            stopped: HashSet::new(),
            programs: HashMap::new(),
            registry: HandleRegistry::new(),
            files: FakeFiles::default(),
            registered: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
        }
        .with_program("echo", echo)
        .with_program("cat", cat)
        .with_program("sh", sh)
        .with_program("/bin/sh", sh)
    }

    pub fn with_target(mut self, name: &str) -> Self {
        self.targets.insert(name.to_string());
        self
    }

    /// A target that exists but is not running.
    pub fn with_stopped_target(mut self, name: &str) -> Self {
        self.stopped.insert(name.to_string());
        self
    }

    pub fn with_program<F, Fut>(mut self, name: &str, program: F) -> Self
    where
        F: Fn(FakeProcess) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ExecExit, ServiceError>> + Send + 'static,
    {
        let program: Program = Arc::new(move |process| Box::pin(program(process)) as FakeFuture);
        self.programs.insert(name.to_string(), program);
        self
    }

    pub fn files(&self) -> FakeFiles {
        self.files.clone()
    }

    /// Specs of every successful registration, in order.
    pub fn registered(&self) -> Vec<ExecSpec> {
        self.registered.lock().unwrap().clone()
    }

    /// Number of `start` calls made so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for FakeExecService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecService for FakeExecService {
    fn register(&self, spec: ExecSpec) -> ServiceFuture<'_, ExecHandle> {
        Box::pin(async move {
            if self.stopped.contains(&spec.target) {
                return Err(ServiceError::NotRunning(spec.target));
            }
            if !self.targets.contains(&spec.target) {
                return Err(ServiceError::UnknownTarget(spec.target));
            }
            self.registered.lock().unwrap().push(spec.clone());
            Ok(self.registry.insert(spec))
        })
    }

    fn start(&self, handle: ExecHandle, io: ExecIo) -> ServiceFuture<'_, ExecExit> {
        Box::pin(async move {
            let spec = self.registry.take(&handle)?;
            self.started.fetch_add(1, Ordering::SeqCst);

            let ExecIo {
                stdin,
                stdout,
                stderr,
            } = io;
            let stdout = if spec.attach.stdout { stdout } else { detached() };
            let stderr = if spec.attach.stderr { stderr } else { detached() };

            let mut argv = spec.command.into_iter();
            let name = argv.next().unwrap_or_default();
            let mut process = FakeProcess {
                args: argv.collect(),
                stdin,
                stdout,
                stderr,
                files: self.files.clone(),
            };

            match self.programs.get(&name).cloned() {
                Some(program) => program(process).await,
                None => {
                    process.err(format!("{name}: command not found\n")).await;
                    Ok(ExecExit::code(127))
                }
            }
        })
    }
}

/// A writer whose reader is already gone.
fn detached() -> PipeWriter {
    let (_reader, writer) = pipe();
    writer
}

async fn echo(mut p: FakeProcess) -> Result<ExecExit, ServiceError> {
    let line = format!("{}\n", p.args.join(" "));
    p.out(line).await;
    Ok(ExecExit::code(0))
}

async fn cat(mut p: FakeProcess) -> Result<ExecExit, ServiceError> {
    if p.args.is_empty() || p.args == ["-"] {
        let input = p.read_stdin().await;
        p.out(input).await;
        return Ok(ExecExit::code(0));
    }

    let mut code = 0;
    for path in p.args.clone() {
        match p.files.get(&path) {
            Some(contents) => p.out(contents).await,
            None => {
                p.err(format!("cat: {path}: No such file or directory\n")).await;
                code = 1;
            }
        }
    }
    Ok(ExecExit::code(code))
}

/// Understands `cat - > PATH`, `cat PATH` and `chmod o+x PATH && PATH`.
///
/// "Running" a dropped file prints its contents to stdout.
async fn sh(mut p: FakeProcess) -> Result<ExecExit, ServiceError> {
    let script = match p.args.as_slice() {
        [flag, script] if flag == "-c" => script.clone(),
        _ => {
            p.err("sh: only -c SCRIPT is supported\n").await;
            return Ok(ExecExit::code(2));
        }
    };

    if let Some(dest) = script.strip_prefix("cat - > ") {
        let input = p.read_stdin().await;
        p.files.put(&unquote(dest), input);
        return Ok(ExecExit::code(0));
    }

    if let Some((chmod, run)) = script.split_once(" && ") {
        let path = unquote(run);
        if chmod.strip_prefix("chmod o+x ").map(unquote).as_deref() == Some(path.as_str()) {
            return match p.files.get(&path) {
                Some(contents) => {
                    p.out(contents).await;
                    Ok(ExecExit::code(0))
                }
                None => {
                    p.err(format!("sh: {path}: not found\n")).await;
                    Ok(ExecExit::code(127))
                }
            };
        }
    }

    if let Some(path) = script.strip_prefix("cat ") {
        p.args = vec![unquote(path)];
        return cat(p).await;
    }

    p.err(format!("sh: unsupported script: {script}\n")).await;
    Ok(ExecExit::code(2))
}

fn unquote(word: &str) -> String {
    let word = word.trim();
    match word.strip_prefix('\'').and_then(|w| w.strip_suffix('\'')) {
        Some(inner) => inner.replace("'\\''", "'"),
        None => word.to_string(),
    }
}
