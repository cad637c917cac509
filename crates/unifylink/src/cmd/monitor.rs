use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use unifylink_components::{Encoders, Motors, System, Update};
use unifylink_engine::{Link, LinkDriver, LinkError};

use crate::cmd::{parse_duration, MonitorArgs};
use crate::exit::{component_error, io_error, link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

/// Longest a poll waits for device bytes before the loop checks Ctrl-C,
/// counters and pending requests again.
const READ_POLL: Duration = Duration::from_millis(50);
const READ_CHUNK: usize = 512;
const READ_BACKLOG: usize = 16;

type Chunk = io::Result<Vec<u8>>;

/// Device handle for the driver. A reader thread does the blocking reads
/// and hands chunks over a bounded channel, so `read` waits at most one
/// poll period and reports `TimedOut` when the device is quiet. Writes go
/// to the device or, when listening only, nowhere.
struct Device {
    rx: Receiver<Chunk>,
    pending: Vec<u8>,
    poll: Duration,
    tx: Box<dyn Write + Send>,
}

impl Device {
    fn open(path: &Path, listen_only: bool) -> io::Result<Self> {
        let reader = OpenOptions::new().read(true).open(path)?;
        let tx: Box<dyn Write + Send> = if listen_only {
            Box::new(io::sink())
        } else {
            Box::new(OpenOptions::new().write(true).open(path)?)
        };
        Self::spawn(reader, tx, READ_POLL)
    }

    fn spawn<R>(mut reader: R, tx: Box<dyn Write + Send>, poll: Duration) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (chunks, rx) = mpsc::sync_channel::<Chunk>(READ_BACKLOG);
        thread::Builder::new()
            .name("unify-link-reader".to_string())
            .spawn(move || loop {
                let mut chunk = vec![0u8; READ_CHUNK];
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        chunk.truncate(n);
                        if chunks.send(Ok(chunk)).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        let _ = chunks.send(Err(err));
                        break;
                    }
                }
            })?;
        Ok(Self {
            rx,
            pending: Vec::new(),
            poll,
            tx,
        })
    }
}

impl Read for Device {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.poll) {
                Ok(chunk) => self.pending = chunk?,
                Err(RecvTimeoutError::Timeout) => return Err(ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for Device {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tx.flush()
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let device = Device::open(&args.device, args.listen_only).map_err(|err| {
        io_error(&format!("failed to open {}", args.device.display()), err)
    })?;

    let link = Link::new(args.wire.link_config());
    let motors = Motors::new(&link);
    let encoders = Encoders::new(&link);
    let update = Update::new(&link);
    let system = System::new(&link);
    let claimed = link.register_any_unclaimed();
    tracing::debug!(wildcard_keys = claimed, "overlays registered");

    motors.on_feedback(|feedback| {
        tracing::trace!(motor0_position = feedback[0].position, "motor feedback");
    });
    encoders.on_feedback(|feedback| {
        tracing::trace!(encoder0_position = feedback[0].position, "encoder feedback");
    });
    update.on_chunk(|_| tracing::debug!("firmware chunk received"));
    system.on_raw(|payload| tracing::debug!(size = payload.len(), "system payload"));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    tracing::info!(device = %args.device.display(), "monitoring link");
    let mut driver = LinkDriver::new(device, link.clone());
    let mut frames = 0u64;
    let mut last_report = Instant::now();
    let mut last_request: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        if args.request_feedback && last_request.is_none_or(|at| at.elapsed() >= interval) {
            motors
                .request_feedback()
                .map_err(|err| component_error("motor feedback request failed", err))?;
            encoders
                .request_feedback()
                .map_err(|err| component_error("encoder feedback request failed", err))?;
            last_request = Some(Instant::now());
        }

        let report = match driver.poll_once() {
            Ok(report) => report,
            Err(LinkError::Closed) => {
                tracing::info!("device closed");
                break;
            }
            Err(err) => return Err(link_error("link poll failed", err)),
        };
        frames += report.parse.frames as u64;

        if last_report.elapsed() >= interval {
            print_stats(&link.stats(), format);
            last_report = Instant::now();
        }
        if args.count.is_some_and(|count| frames >= count) {
            tracing::debug!(frames, "frame count reached");
            break;
        }
    }

    print_stats(&link.stats(), format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
