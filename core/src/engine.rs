//! The work scheduler: splits the candidate space into chunks, dispatches them
//! to a fixed pool of workers and stops everyone as soon as a match is confirmed.

use std::{
    any::Any,
    collections::VecDeque,
    ops::ControlFlow,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{at, never, select, tick, unbounded, Receiver, Sender};
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::{
    ctx::{AttackConfig, EngineConfig},
    error::{AuditError, AuditResult},
    event::{CrackHandle, CrackResult, Event, ProgressSnapshot},
    generator::{Chunk, Generator},
    target::Verify,
    ATTEMPT_FLUSH_INTERVAL,
};

/// The lifecycle of a [`WorkScheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Found,
    Exhausted,
    TimedOut,
    Cancelled,
}

/// A chunk assigned to a worker.
#[derive(Debug)]
struct Job {
    phase: usize,
    chunk: Chunk,
    /// Candidates of the chunk already tried by a previous worker.
    skip: u64,
}

/// A message from a worker, one per job received.
enum Message {
    Done,
    Found { candidate: String, remainder: Job },
    Failed {
        worker: usize,
        remainder: Job,
        cause: AuditError,
    },
}

enum Outcome {
    Found(String),
    Exhausted,
    TimedOut,
    Cancelled(String),
}

/// Runs attacks against a verifier.
pub struct WorkScheduler<V> {
    verifier: V,
    config: EngineConfig,
    state: RunState,
    stop: Arc<AtomicBool>,
}

impl<V: Verify> WorkScheduler<V> {
    pub fn new(verifier: V, config: EngineConfig) -> Self {
        Self {
            verifier,
            config,
            state: RunState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs an attack.
    /// Blocks until the plaintext is found, the space is exhausted or the timeout expires.
    pub fn run(&mut self, attack: &AttackConfig) -> AuditResult<CrackResult> {
        self.execute(attack, None)
    }

    fn execute(
        &mut self,
        attack: &AttackConfig,
        events: Option<&Sender<Event>>,
    ) -> AuditResult<CrackResult> {
        if self.state != RunState::Idle {
            return Err(AuditError::Config(
                "a scheduler can only run once".to_owned(),
            ));
        }

        let phases = attack.phases(&self.config)?;
        let result = self.run_phases(&phases, events);

        if let Err(err) = &result {
            warn!("Run aborted: {err}");
            self.state = RunState::Cancelled;
        }

        result
    }

    fn run_phases(
        &mut self,
        phases: &[Box<dyn Generator>],
        events: Option<&Sender<Event>>,
    ) -> AuditResult<CrackResult> {
        let start = Instant::now();
        self.state = RunState::Running;

        let total = phases.iter().try_fold(0u64, |total, phase| {
            phase
                .candidate_count()
                .and_then(|count| total.checked_add(count))
        });
        info!(
            "Starting a run of {} phase(s) on {} worker(s)",
            phases.len(),
            self.config.workers
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("hashaudit-worker-{i}"))
            .build()?;

        let attempts = AtomicU64::new(0);
        let verifier = &self.verifier;
        let config = &self.config;
        let stop = self.stop.as_ref();

        let outcome = pool.in_place_scope(|scope| {
            let (job_sender, job_receiver) = unbounded::<Job>();
            let (message_sender, message_receiver) = unbounded::<Message>();

            for worker in 0..config.workers {
                let jobs = job_receiver.clone();
                let messages = message_sender.clone();
                let attempts = &attempts;

                scope.spawn(move |_| work(worker, phases, verifier, jobs, messages, stop, attempts));
            }

            // the message channel disconnects once every worker has exited
            drop(job_receiver);
            drop(message_sender);

            let mut coordinator = Coordinator {
                phases,
                verifier,
                config,
                events,
                stop,
                attempts: &attempts,
                total,
                start,
                jobs: job_sender,
                messages: message_receiver,
                live: config.workers,
                stopping: None,
            };

            let outcome = coordinator.coordinate();
            // make sure the workers stop even if the coordination failed
            stop.store(true, Ordering::Relaxed);
            outcome
        })?;

        let attempts = attempts.load(Ordering::Relaxed);
        let elapsed = start.elapsed();

        if let Some(events) = events {
            let _ = events.send(Event::Progress(ProgressSnapshot {
                attempts,
                elapsed,
                throughput: attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
                total,
            }));
        }

        let (state, result) = match outcome {
            Outcome::Found(candidate) => (
                RunState::Found,
                CrackResult::Found {
                    candidate,
                    attempts,
                    elapsed,
                },
            ),
            Outcome::Exhausted => (RunState::Exhausted, CrackResult::NotFound { attempts, elapsed }),
            Outcome::TimedOut => (RunState::TimedOut, CrackResult::TimedOut { attempts, elapsed }),
            Outcome::Cancelled(cause) => (
                RunState::Cancelled,
                CrackResult::Cancelled {
                    attempts,
                    elapsed,
                    cause,
                },
            ),
        };

        info!("Run finished after {attempts} attempts in {elapsed:?}: {state:?}");
        self.state = state;
        Ok(result)
    }
}

impl<V: Verify + Send + 'static> WorkScheduler<V> {
    /// Runs an attack, asynchronously.
    /// Returns a handle to get events related to the run and to get its outcome.
    pub fn spawn(mut self, attack: AttackConfig) -> CrackHandle {
        let (sender, receiver) = unbounded();
        let stop = self.stop.clone();
        let handle = thread::spawn(move || self.execute(&attack, Some(&sender)));

        CrackHandle {
            handle,
            receiver,
            stop,
        }
    }
}

/// The state of the coordinating thread.
struct Coordinator<'a, V> {
    phases: &'a [Box<dyn Generator>],
    verifier: &'a V,
    config: &'a EngineConfig,
    events: Option<&'a Sender<Event>>,
    stop: &'a AtomicBool,
    attempts: &'a AtomicU64,
    total: Option<u64>,
    start: Instant,
    jobs: Sender<Job>,
    messages: Receiver<Message>,
    /// Workers that did not fail.
    live: usize,
    /// Set once the run should end. The coordinator then waits for in-flight chunks.
    stopping: Option<Outcome>,
}

impl<V: Verify> Coordinator<'_, V> {
    fn emit(&self, event: Event) {
        if let Some(events) = self.events {
            let _ = events.send(event);
        }
    }

    fn stop_with(&mut self, outcome: Outcome) {
        if self.stopping.is_none() {
            self.stop.store(true, Ordering::Relaxed);
            self.stopping = Some(outcome);
        }
    }

    fn coordinate(&mut self) -> AuditResult<Outcome> {
        let ticker = tick(self.config.progress_interval);
        let deadline = self
            .config
            .timeout
            .and_then(|timeout| self.start.checked_add(timeout));
        let timer = deadline.map_or_else(never, at);
        let messages = self.messages.clone();
        let mut last_report = (Instant::now(), 0);

        for (phase, generator) in self.phases.iter().enumerate() {
            info!(
                "Phase {}/{}: {}",
                phase + 1,
                self.phases.len(),
                generator.name()
            );
            self.emit(Event::Phase {
                phase_number: phase + 1,
                phase_count: self.phases.len(),
                generator: generator.name(),
                candidates: generator.candidate_count(),
            });

            let mut chunks = generator.chunks(self.config.layout())?;
            let mut pending = VecDeque::new();
            let mut in_flight = 0;
            let mut drained = false;

            loop {
                // a stop that was not requested by the coordinator comes from the caller
                if self.stopping.is_none() && self.stop.load(Ordering::Relaxed) {
                    self.stopping = Some(Outcome::Cancelled("cancelled by the caller".to_owned()));
                }

                // at most one chunk in flight per live worker
                while self.stopping.is_none() && in_flight < self.live {
                    let job = match pending.pop_front() {
                        Some(job) => job,
                        None if drained => break,
                        None => match chunks.next() {
                            Some(chunk) => Job {
                                phase,
                                chunk: chunk?,
                                skip: 0,
                            },
                            None => {
                                drained = true;
                                break;
                            }
                        },
                    };

                    match &job.chunk {
                        Chunk::Indices(range) => {
                            debug!("Dispatching candidates {range:?}, skipping {}", job.skip)
                        }
                        Chunk::Lines { lines, .. } => {
                            debug!("Dispatching lines {lines:?}, skipping {}", job.skip)
                        }
                        Chunk::Word {
                            lines, positions, ..
                        } => debug!(
                            "Dispatching candidates {positions:?} of line {}, skipping {}",
                            lines.start, job.skip
                        ),
                    }
                    if self.jobs.send(job).is_err() {
                        break;
                    }
                    in_flight += 1;
                }

                if in_flight == 0 {
                    if let Some(outcome) = self.stopping.take() {
                        return Ok(outcome);
                    }

                    if drained && pending.is_empty() {
                        break;
                    }
                }

                select! {
                    recv(messages) -> message => {
                        let Ok(message) = message else {
                            // every worker has exited
                            let outcome = self.stopping.take().unwrap_or_else(|| {
                                Outcome::Cancelled("every worker has exited".to_owned())
                            });
                            return Ok(outcome);
                        };

                        in_flight -= 1;
                        self.handle(message, &mut pending);
                    },
                    recv(ticker) -> _ => self.report_progress(&mut last_report),
                    recv(timer) -> _ => self.stop_with(Outcome::TimedOut),
                }

                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    self.stop_with(Outcome::TimedOut);
                }
            }

            debug!("Phase {} exhausted", phase + 1);
        }

        Ok(Outcome::Exhausted)
    }

    fn handle(&mut self, message: Message, pending: &mut VecDeque<Job>) {
        match message {
            Message::Done => (),

            Message::Found {
                candidate,
                remainder,
            } => {
                if matches!(self.stopping, Some(Outcome::Found(_))) {
                    return;
                }

                // a match is only final once confirmed
                match self.verifier.verify(&candidate) {
                    Ok(true) => {
                        info!("Match confirmed: {candidate}");
                        self.stopping = None;
                        self.stop_with(Outcome::Found(candidate));
                    }
                    Ok(false) | Err(_) => {
                        warn!("Rejected a match that could not be confirmed: {candidate}");
                        pending.push_back(remainder);
                    }
                }
            }

            Message::Failed {
                worker,
                remainder,
                cause,
            } => {
                self.live -= 1;
                warn!("Worker {worker} failed, {} worker(s) left: {cause}", self.live);
                self.emit(Event::WorkerFailed {
                    worker,
                    cause: cause.to_string(),
                });

                pending.push_back(remainder);

                if self.live == 0 {
                    self.stop_with(Outcome::Cancelled(format!("every worker failed: {cause}")));
                }
            }
        }
    }

    fn report_progress(&self, last_report: &mut (Instant, u64)) {
        let now = Instant::now();
        let attempts = self.attempts.load(Ordering::Relaxed);
        let (last_time, last_attempts) = *last_report;
        let interval = now.duration_since(last_time).as_secs_f64();

        self.emit(Event::Progress(ProgressSnapshot {
            attempts,
            elapsed: now.duration_since(self.start),
            throughput: (attempts - last_attempts) as f64 / interval.max(f64::EPSILON),
            total: self.total,
        }));

        *last_report = (now, attempts);
    }
}

/// The loop of a worker: expands and verifies chunks until the job channel closes.
/// A worker exits after reporting a failure.
fn work<V: Verify>(
    worker: usize,
    phases: &[Box<dyn Generator>],
    verifier: &V,
    jobs: Receiver<Job>,
    messages: Sender<Message>,
    stop: &AtomicBool,
    attempts: &AtomicU64,
) {
    for job in jobs {
        if stop.load(Ordering::Relaxed) {
            if messages.send(Message::Done).is_err() {
                return;
            }
            continue;
        }

        let flush_interval = if verifier.is_slow() {
            1
        } else {
            ATTEMPT_FLUSH_INTERVAL
        };
        let mut tried = 0;
        let mut unflushed = 0;
        let mut found = None;
        let mut error = None;

        let expansion = panic::catch_unwind(AssertUnwindSafe(|| {
            phases[job.phase].expand(&job.chunk, job.skip, &mut |candidate| {
                if stop.load(Ordering::Relaxed) {
                    return ControlFlow::Break(());
                }

                match verifier.verify(candidate) {
                    Ok(matched) => {
                        tried += 1;
                        unflushed += 1;

                        if unflushed == flush_interval {
                            attempts.fetch_add(unflushed, Ordering::Relaxed);
                            unflushed = 0;
                        }

                        if matched {
                            found = Some(candidate.to_owned());
                            return ControlFlow::Break(());
                        }

                        ControlFlow::Continue(())
                    }
                    Err(err) => {
                        error = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })
        }));
        attempts.fetch_add(unflushed, Ordering::Relaxed);

        let remainder = Job {
            skip: job.skip + tried,
            ..job
        };

        let message = match (expansion, error, found) {
            (Err(payload), _, _) => Message::Failed {
                worker,
                remainder,
                cause: AuditError::WorkerPanic(panic_message(payload)),
            },
            (Ok(_), Some(cause), _) => Message::Failed {
                worker,
                remainder,
                cause,
            },
            (Ok(_), None, Some(candidate)) => Message::Found {
                candidate,
                remainder,
            },
            (Ok(_), None, None) => Message::Done,
        };

        let failed = matches!(message, Message::Failed { .. });
        if messages.send(message).is_err() || failed {
            return;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
