use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

/// Advisory per-file progress notifications. Never affects results.
pub trait ProgressReporter {
    fn start(&self, _total: usize) {}
    fn advance(&self, _rel_path: &str) {}
    fn finish(&self) {}
}

/// Reporter that ignores every notification.
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Periodic stderr ticker: prints `files done/total` from a background thread.
#[derive(Clone)]
pub struct Progress {
    stage: String,
    current: Arc<Mutex<String>>,
    files_done: Arc<AtomicUsize>,
    files_total: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    /// Bumped by every `start`; a ticker exits once it no longer matches.
    generation: Arc<AtomicUsize>,
    tickers: Arc<AtomicUsize>,
    interval: Duration,
}

impl Progress {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            current: Arc::new(Mutex::new(String::new())),
            files_done: Arc::new(AtomicUsize::new(0)),
            files_total: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicUsize::new(0)),
            tickers: Arc::new(AtomicUsize::new(0)),
            interval: Duration::from_secs(2),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn done(&self) -> usize {
        self.files_done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.files_total.load(Ordering::Relaxed)
    }

    /// Ticker threads still alive.
    pub fn live_tickers(&self) -> usize {
        self.tickers.load(Ordering::SeqCst)
    }

    fn spawn_ticker(&self, generation: usize) {
        let stage = self.stage.clone();
        let current = self.current.clone();
        let files_done = self.files_done.clone();
        let files_total = self.files_total.clone();
        let running = self.running.clone();
        let current_gen = self.generation.clone();
        let tickers = self.tickers.clone();
        let interval = self.interval;
        let live = move || {
            running.load(Ordering::SeqCst) && current_gen.load(Ordering::SeqCst) == generation
        };
        tickers.fetch_add(1, Ordering::SeqCst);
        thread::spawn(move || {
            let t0 = Instant::now();
            while live() {
                thread::sleep(interval);
                if !live() {
                    break;
                }
                let cur = current.lock().map(|g| g.clone()).unwrap_or_default();
                let done = files_done.load(Ordering::Relaxed);
                let total = files_total.load(Ordering::Relaxed);
                let pct = if total > 0 { (done as f64 / total as f64) * 100.0 } else { 0.0 };
                eprintln!(
                    "[{:>4}s] {} | files {}/{} ({}%) | {}",
                    t0.elapsed().as_secs(),
                    stage,
                    done,
                    total,
                    pct as i32,
                    cur
                );
            }
            tickers.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

impl ProgressReporter for Progress {
    fn start(&self, total: usize) {
        self.files_total.store(total, Ordering::Relaxed);
        self.files_done.store(0, Ordering::Relaxed);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        self.spawn_ticker(generation);
    }

    fn advance(&self, rel_path: &str) {
        self.files_done.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut g) = self.current.lock() {
            g.clear();
            g.push_str(rel_path);
        }
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
