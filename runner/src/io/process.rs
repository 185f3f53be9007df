//! Running agent processes while streaming their output.
//!
//! One child runs at a time. Reader threads drain its output into a shared
//! [`LastLines`] buffer while the calling thread blocks on exit; in live mode
//! a ticker thread redraws the preview from that buffer every [`TICK`].

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tracing::{debug, instrument, warn};

use crate::core::last_lines::LastLines;
use crate::core::stream::{StreamAdapter, TerminalLineSplitter};
use crate::error::ProcessStartError;
use crate::io::agent::{Invocation, OutputProtocol};
use crate::io::display::{self, LiveDisplay, Style};

/// Live preview refresh interval.
pub const TICK: Duration = Duration::from_millis(80);

/// Grace period for the pty reader to drain after the agent exits.
const PTY_DRAIN: Duration = Duration::from_millis(500);

const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 120,
    pixel_width: 0,
    pixel_height: 0,
};

/// How one run is presented.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Human label shown in start and result lines.
    pub title: String,
    /// Live preview instead of raw passthrough.
    pub live: bool,
    pub style: Style,
    /// Capacity of the rolling preview buffer.
    pub last_lines: usize,
}

/// How a finished child exited, plus the last preview lines it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub last_lines: Vec<String>,
}

/// Run `invocation` to completion.
///
/// Headless mode forwards output verbatim. Live mode attaches a pseudo-terminal
/// for [`OutputProtocol::Terminal`] agents and parses event records for
/// [`OutputProtocol::EventStream`] agents. A child that cannot be started
/// yields a [`ProcessStartError`]; an unsuccessful exit is reported through
/// [`ProcessOutcome`].
#[instrument(skip_all, fields(program = %invocation.program.display(), live = options.live))]
pub fn run_streaming(
    invocation: &Invocation,
    protocol: OutputProtocol,
    options: &StreamOptions,
) -> Result<ProcessOutcome> {
    let buffer = Arc::new(LastLines::new(options.last_lines));
    let started = Instant::now();

    if !options.live {
        println!("{}", display::headless_start(options.style, &options.title));
        let outcome = run_piped::<io::Stdout>(invocation, options, &buffer, None)?;
        let elapsed = display::format_elapsed(started.elapsed());
        println!(
            "{}",
            display::result_line(options.style, &options.title, outcome.success, &elapsed)
        );
        return Ok(outcome);
    }

    let live = LiveDisplay::new(io::stdout(), options.title.clone(), options.style);
    run_live(invocation, protocol, options, &buffer, live)
}

fn run_live<W: Write + Send + 'static>(
    invocation: &Invocation,
    protocol: OutputProtocol,
    options: &StreamOptions,
    buffer: &Arc<LastLines>,
    live: LiveDisplay<W>,
) -> Result<ProcessOutcome> {
    match protocol {
        OutputProtocol::EventStream => {
            run_piped(invocation, options, buffer, Some((live, protocol.adapter())))
        }
        OutputProtocol::Terminal => run_pty(invocation, options, buffer, live),
    }
}

type LivePreview<W> = (LiveDisplay<W>, StreamAdapter);

fn run_piped<W: Write + Send + 'static>(
    invocation: &Invocation,
    options: &StreamOptions,
    buffer: &Arc<LastLines>,
    live: Option<LivePreview<W>>,
) -> Result<ProcessOutcome> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning agent");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            if let Some((display, _)) = live {
                finish_display(display, false);
            }
            return Err(start_error(invocation, options, err.to_string()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (adapter, tee, ticker) = match live {
        Some((display, adapter)) => (adapter, false, Some(Ticker::start(display, buffer))),
        None => (StreamAdapter::Plain, true, None),
    };

    let out_buf = Arc::clone(buffer);
    let stdout_handle = thread::spawn(move || {
        let sink = tee.then(io::stdout);
        pump_lines(stdout, sink, &out_buf, adapter)
    });
    let err_buf = Arc::clone(buffer);
    let stderr_handle = thread::spawn(move || {
        let sink = tee.then(io::stderr);
        pump_lines(stderr, sink, &err_buf, StreamAdapter::Plain)
    });

    let status = child.wait().context("wait for agent")?;
    join_reader(stdout_handle).context("join stdout")?;
    join_reader(stderr_handle).context("join stderr")?;

    if let Some(ticker) = ticker {
        ticker.finish(status.success());
    }
    debug!(exit_code = ?status.code(), "agent finished");
    Ok(ProcessOutcome {
        success: status.success(),
        code: status.code(),
        last_lines: buffer.snapshot(),
    })
}

fn run_pty<W: Write + Send + 'static>(
    invocation: &Invocation,
    options: &StreamOptions,
    buffer: &Arc<LastLines>,
    live: LiveDisplay<W>,
) -> Result<ProcessOutcome> {
    let pair = match native_pty_system().openpty(PTY_SIZE) {
        Ok(pair) => pair,
        Err(err) => {
            finish_display(live, false);
            return Err(err.context("open pseudo-terminal"));
        }
    };

    let mut cmd = CommandBuilder::new(&invocation.program);
    cmd.args(&invocation.args);
    cmd.cwd(&invocation.workdir);

    debug!("spawning agent on pty");
    let mut child = match pair.slave.spawn_command(cmd) {
        Ok(child) => child,
        Err(err) => {
            finish_display(live, false);
            return Err(start_error(invocation, options, err.to_string()));
        }
    };
    drop(pair.slave);

    let reader = match pair.master.try_clone_reader() {
        Ok(reader) => reader,
        Err(err) => {
            if let Err(kill_err) = child.kill() {
                debug!(err = %kill_err, "kill agent after pty failure");
            }
            if let Err(wait_err) = child.wait() {
                debug!(err = %wait_err, "reap agent after pty failure");
            }
            finish_display(live, false);
            return Err(err.context("clone pty reader"));
        }
    };
    let ticker = Ticker::start(live, buffer);

    // Never joined: on some platforms the master only reports EOF once it is
    // dropped, and a grandchild holding the slave open keeps it from ending.
    let (drained_tx, drained_rx) = mpsc::channel::<()>();
    let pty_buf = Arc::clone(buffer);
    thread::spawn(move || {
        pump_terminal(reader, &pty_buf);
        let _ = drained_tx.send(());
    });

    let status = child.wait().context("wait for agent")?;
    drop(pair.master);
    if drained_rx.recv_timeout(PTY_DRAIN).is_err() {
        debug!("pty reader still running after agent exit");
    }

    let code = i32::try_from(status.exit_code()).ok();
    ticker.finish(status.success());
    debug!(exit_code = ?code, "agent finished");
    Ok(ProcessOutcome {
        success: status.success(),
        code,
        last_lines: buffer.snapshot(),
    })
}

fn start_error(invocation: &Invocation, options: &StreamOptions, reason: String) -> anyhow::Error {
    warn!(reason = %reason, "failed to start agent");
    ProcessStartError {
        label: options.title.clone(),
        program: invocation.program.display().to_string(),
        reason,
    }
    .into()
}

/// Read `reader` line by line, optionally teeing raw bytes to `sink`, and push
/// the adapter's status lines into `buffer`.
fn pump_lines<R: Read, W: Write>(
    reader: R,
    mut sink: Option<W>,
    buffer: &LastLines,
    adapter: StreamAdapter,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).context("read line")?;
        if n == 0 {
            break;
        }
        if let Some(out) = sink.as_mut()
            && let Err(err) = out.write_all(&line).and_then(|()| out.flush())
        {
            warn!(err = %err, "failed to forward agent output");
        }
        let text = String::from_utf8_lossy(&line);
        for status in adapter.status_lines(text.trim_end_matches(['\r', '\n'])) {
            buffer.push(&status);
        }
    }
    Ok(())
}

fn pump_terminal(mut reader: Box<dyn Read + Send>, buffer: &LastLines) {
    let mut splitter = TerminalLineSplitter::default();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.feed(&chunk[..n]) {
                    buffer.push(&line);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            // EIO once the child side closes.
            Err(err) => {
                debug!(err = %err, "pty reader stopped");
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        buffer.push(&line);
    }
}

fn join_reader(handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Periodic redraw of a [`LiveDisplay`] from a snapshot of the buffer.
struct Ticker<W: Write + Send + 'static> {
    stop: Sender<()>,
    handle: JoinHandle<LiveDisplay<W>>,
}

impl<W: Write + Send + 'static> Ticker<W> {
    fn start(mut display: LiveDisplay<W>, buffer: &Arc<LastLines>) -> Self {
        let (stop, rx) = mpsc::channel::<()>();
        let snapshot_buf = Arc::clone(buffer);
        let handle = thread::spawn(move || {
            loop {
                match rx.recv_timeout(TICK) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = display.tick(&snapshot_buf.snapshot()) {
                            debug!(err = %err, "live display redraw failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            display
        });
        Self { stop, handle }
    }

    fn finish(self, success: bool) {
        let _ = self.stop.send(());
        match self.handle.join() {
            Ok(display) => finish_display(display, success),
            Err(_) => warn!("live display thread panicked"),
        }
    }
}

fn finish_display<W: Write>(display: LiveDisplay<W>, success: bool) {
    if let Err(err) = display.finish(success) {
        debug!(err = %err, "live display final line failed");
    }
}
