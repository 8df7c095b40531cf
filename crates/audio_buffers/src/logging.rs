//! Diagnostics from inside a callback.
//!
//! The pool has things to report mid-callback: a new peak in slot usage, or running out of slots entirely.  Whatever
//! logger the host installed behind `log` may allocate, take locks, or write to a terminal, so a marked audio thread
//! never calls into it.  Instead each `rt_*` macro renders its message into a [LINE_LIMIT]-byte inline string and
//! pushes that onto a ring of [QUEUE_LENGTH] preallocated lines.  A drainer thread, started by [init_rt_logging] or by
//! the first message, pops lines and replays them into `log` with the original level and module.  Unmarked threads skip
//! all of that and call `log` in place.
//!
//! Lines that do not fit are cut at a character boundary and tagged.  When the ring is full the line is lost; the
//! count of lost lines rides along on the next one that gets in.
use std::fmt::Arguments as FmtArgs;
use std::thread::{park, JoinHandle};

use arrayvec::ArrayString;
use thingbuf::{recycling::Recycle, ThingBuf};

const LINE_LIMIT: usize = 256;
const QUEUE_LENGTH: usize = 1024;

type InlineLine = ArrayString<LINE_LIMIT>;

#[derive(Debug)]
enum Line {
    Static(&'static str),
    Inline(InlineLine),
}

#[derive(Debug)]
struct QueuedLine {
    /// Messages this thread failed to enqueue since the last successful push.
    dropped_before: u64,
    level: log::Level,
    module: &'static str,
    line: Line,
    truncated: bool,
}

struct QueuedLineRecycler;

impl Recycle<QueuedLine> for QueuedLineRecycler {
    fn new_element(&self) -> QueuedLine {
        QueuedLine {
            dropped_before: 0,
            level: log::Level::Trace,
            module: module_path!(),
            line: Line::Static(""),
            truncated: false,
        }
    }

    fn recycle(&self, _element: &mut QueuedLine) {
        // Overwritten wholesale on the next push.
    }
}

/// `fmt::Write` over a fixed [InlineLine].  On overflow it sets `truncated` and drops everything after.
struct TruncatingWriter<'a> {
    out: &'a mut InlineLine,
    truncated: &'a mut bool,
}

impl std::fmt::Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if *self.truncated {
            return Ok(());
        }

        if s.len() <= self.out.remaining_capacity() {
            self.out.push_str(s);
            return Ok(());
        }

        *self.truncated = true;
        // Whole chars only, so the cut lands on a UTF-8 boundary.
        for c in s.chars() {
            if self.out.try_push(c).is_err() {
                break;
            }
        }

        Ok(())
    }
}

fn format_line(level: log::Level, args: FmtArgs<'_>, module: &'static str) -> QueuedLine {
    use std::fmt::Write;

    let mut truncated = false;
    let line = match args.as_str() {
        Some(s) => Line::Static(s),
        None => {
            let mut out = InlineLine::new();
            let mut writer = TruncatingWriter {
                out: &mut out,
                truncated: &mut truncated,
            };
            // Overflow is not an error for this writer; a Display impl that fails just leaves the line short.
            let _ = write!(writer, "{}", args);
            Line::Inline(out)
        }
    };

    QueuedLine {
        dropped_before: 0,
        level,
        module,
        line,
        truncated,
    }
}

struct RtLogCtx {
    drainer: JoinHandle<()>,
    queue: ThingBuf<QueuedLine, QueuedLineRecycler>,
}

lazy_static::lazy_static! {
    static ref RT_LOG: RtLogCtx = RtLogCtx {
        // drainer_mainloop reads RT_LOG as well, and lazy_static holds it until this initializer returns.
        drainer: std::thread::spawn(drainer_mainloop),
        queue: ThingBuf::with_recycle(QUEUE_LENGTH, QueuedLineRecycler),
    };
}

/// Push a line for the drainer.  `rt_log!` calls this on marked threads; it never blocks or allocates.
pub fn enqueue(level: log::Level, args: FmtArgs<'_>, module: &'static str) {
    use std::cell::Cell;

    thread_local! {
        static DROPPED: Cell<u64> = const { Cell::new(0) };
    }

    let mut line = format_line(level, args, module);
    line.dropped_before = DROPPED.get();

    match RT_LOG.queue.push(line) {
        Ok(()) => {
            DROPPED.set(0);
            RT_LOG.drainer.thread().unpark();
        }
        Err(_) => DROPPED.set(DROPPED.get() + 1),
    }
}

fn emit(line: QueuedLine) {
    if line.dropped_before != 0 {
        log::warn!(
            "The realtime log queue overflowed; {} messages were dropped",
            line.dropped_before
        );
    }

    let text = match &line.line {
        Line::Static(s) => s,
        Line::Inline(s) => s.as_str(),
    };
    let truncated = if line.truncated { ", truncated" } else { "" };

    log::log!(target: line.module, line.level, "{} (from audio thread{truncated})", text);
}

fn drain() {
    while let Some(line) = RT_LOG.queue.pop() {
        emit(line);
    }
}

fn drainer_mainloop() {
    loop {
        drain();
        // An unpark that lands before park() makes it return at once.
        park();
    }
}

/// Start the drainer thread now.
///
/// Call from setup code before the first callback.  Without it, the first `rt_*` message on the audio thread starts it,
/// spawning a thread mid-callback.
pub fn init_rt_logging() {
    std::hint::black_box(RT_LOG.queue.capacity());
}

/// Replay everything still queued into `log`, on the calling thread.
///
/// For shutdown and fatal paths, where the drainer might never run again.
pub fn flush_rt_log() {
    drain();
}

/// `log::log!` for code that may run inside a callback.  See the module docs; the target is the calling module.
#[macro_export]
macro_rules! rt_log {
    ($level: expr, $fmt: expr $(, $args: expr)* $(,)?) => {
        let macro_level = $level;
        if macro_level <= $crate::__private::log::max_level() {
            if $crate::__private::is_audio_thread() {
                $crate::__private::enqueue(macro_level, format_args!($fmt, $($args),*), module_path!());
            } else {
                $crate::__private::log::log!(macro_level, $fmt, $($args),*);
            }
        }
    }
}

#[macro_export]
macro_rules! rt_error {
    ($($args: tt)+) => {
        $crate::rt_log!($crate::__private::log::Level::Error, $($args)*);
    }
}

#[macro_export]
macro_rules! rt_warn {
    ($($args: tt)+) => {
        $crate::rt_log!($crate::__private::log::Level::Warn, $($args)*);
    }
}

#[macro_export]
macro_rules! rt_info {
    ($($args: tt)+) => {
        $crate::rt_log!($crate::__private::log::Level::Info, $($args)*);
    }
}

#[macro_export]
macro_rules! rt_debug {
    ($($args: tt)+) => {
        $crate::rt_log!($crate::__private::log::Level::Debug, $($args)*);
    }
}
