use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::trace;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    task: Task,
    completion: Arc<Completion>,
}

struct Completion {
    mutex: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn finish(&self) {
        *self.mutex.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.mutex.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }
}

/// Handle to a task spawned onto a [`ThreadPool`].
///
/// Joins on drop unless explicitly [`detach`](AsyncTask::detach)ed. An empty task
/// (no worker could be spawned) is a valid, already-complete `AsyncTask` — joining or
/// dropping it is an immediate no-op, since there's no task to wait on.
pub struct AsyncTask {
    completion: Option<Arc<Completion>>,
}

impl AsyncTask {
    fn empty() -> Self {
        Self { completion: None }
    }

    /// Blocks until the task completes. Returns immediately if it already has.
    pub fn join(mut self) {
        if let Some(completion) = self.completion.take() {
            completion.wait();
        }
    }

    /// Releases interest in the task's completion without blocking.
    pub fn detach(mut self) {
        self.completion = None;
    }
}

impl Drop for AsyncTask {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.wait();
        }
    }
}

struct WorkerState {
    job: Option<Job>,
    quit: bool,
}

struct WorkerChannel {
    state: Mutex<WorkerState>,
    cond: Condvar,
}

struct PoolInner {
    /// Every worker ever created, for quit-signalling and joining at drop time.
    all: Mutex<Vec<Arc<WorkerChannel>>>,
    /// The subset of `all` currently idle, available to `spawn`.
    idle: Mutex<Vec<Arc<WorkerChannel>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
}

/// A reusable pool of worker threads.
///
/// Workers are created lazily and, once a task completes, return to an idle list
/// instead of exiting, so a burst of short tasks reuses threads rather than spawning
/// a new one each time. Dropping the pool signals every worker (idle or busy) to quit
/// and joins them all before returning.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                all: Mutex::new(Vec::new()),
                idle: Mutex::new(Vec::new()),
                handles: Mutex::new(Vec::new()),
                next_worker_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Hands `f` to an idle worker, or spawns a new one if none is available.
    ///
    /// Returns `None` if the pool needed a new worker and the underlying OS thread
    /// spawn failed; this is the pool's one sentinel-return failure mode.
    pub fn spawn<F>(&self, f: F) -> Option<AsyncTask>
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let job = Job {
            task: Box::new(f),
            completion: completion.clone(),
        };
        let channel = self.get_or_create_worker()?;
        {
            let mut state = channel.state.lock().unwrap();
            state.job = Some(job);
            channel.cond.notify_one();
        }
        Some(AsyncTask {
            completion: Some(completion),
        })
    }

    fn get_or_create_worker(&self) -> Option<Arc<WorkerChannel>> {
        if let Some(channel) = self.inner.idle.lock().unwrap().pop() {
            return Some(channel);
        }
        let channel = Arc::new(WorkerChannel {
            state: Mutex::new(WorkerState {
                job: None,
                quit: false,
            }),
            cond: Condvar::new(),
        });
        let worker_id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let worker_channel = channel.clone();
        let handle = thread::Builder::new()
            .name(format!("dispatch-pool-{worker_id}"))
            .spawn(move || worker_loop(worker_id, inner, worker_channel))
            .ok()?;
        self.inner.all.lock().unwrap().push(channel.clone());
        self.inner.handles.lock().unwrap().push(handle);
        Some(channel)
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(worker_id: usize, inner: Arc<PoolInner>, channel: Arc<WorkerChannel>) {
    trace!("pool worker {worker_id} started");
    loop {
        let job = {
            let mut state = channel.state.lock().unwrap();
            loop {
                if state.quit {
                    trace!("pool worker {worker_id} stopped");
                    return;
                }
                if let Some(job) = state.job.take() {
                    break job;
                }
                state = channel.cond.wait(state).unwrap();
            }
        };
        (job.task)();
        job.completion.finish();
        inner.idle.lock().unwrap().push(channel.clone());
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        trace!("thread pool shutting down");
        for channel in self.inner.all.lock().unwrap().iter() {
            let mut state = channel.state.lock().unwrap();
            state.quit = true;
            channel.cond.notify_one();
        }
        let handles = std::mem::take(&mut *self.inner.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
        trace!("thread pool stopped");
    }
}
