//! Hot, buffered, multicast event streams.
//!
//! An [`EventStream`] starts producing as soon as it is created. Every item
//! is appended to an unbounded buffer and forwarded to the observers attached
//! at that moment; an observer that subscribes later first receives the whole
//! buffer, then live items, then the terminal signal. Optional pause and
//! resume hooks fire when the observer count drops to zero or rises from zero
//! while the stream is still running.
//!
//! State changes for one stream are serialised by a single mutex, but
//! observers and hooks are called with that mutex released. One caller at a
//! time delivers: whoever changes the state while nobody is delivering
//! drains every pending item, terminal signal and hook call before
//! returning. Calls made from inside an observer or hook (emitting,
//! subscribing, unsubscribing) only record their change and leave the
//! delivery to that caller, so callbacks may freely use the stream they
//! observe. Each observer tracks how much of the buffer it has seen, which
//! keeps every observer's view in emission order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

/// Receives the items and the terminal signal of an [`EventStream`].
pub trait Observer<T, E>: Send {
    /// Called for every item, replayed or live, in emission order.
    fn on_next(&mut self, item: &T);

    /// Called once when the stream fails.
    fn on_error(&mut self, error: &E);

    /// Called once when the stream completes.
    fn on_complete(&mut self);
}

/// Adapts three closures into an [`Observer`].
pub struct FnObserver<N, R, C> {
    on_next: N,
    on_error: R,
    on_complete: C,
}

impl<N, R, C> FnObserver<N, R, C> {
    /// Wraps the item, error and completion callbacks.
    pub const fn new(on_next: N, on_error: R, on_complete: C) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
        }
    }
}

impl<T, E, N, R, C> Observer<T, E> for FnObserver<N, R, C>
where
    N: FnMut(&T) + Send,
    R: FnMut(&E) + Send,
    C: FnMut() + Send,
{
    fn on_next(&mut self, item: &T) {
        (self.on_next)(item);
    }

    fn on_error(&mut self, error: &E) {
        (self.on_error)(error);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }
}

type PauseHook = Box<dyn FnMut() + Send>;
type ResumeHook<T> = Box<dyn FnMut(&[T]) + Send>;

/// Producer callbacks fired on observer-count edges.
pub struct StreamHooks<T> {
    pause: Option<PauseHook>,
    resume: Option<ResumeHook<T>>,
}

impl<T> StreamHooks<T> {
    /// Hooks that do nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pause: None,
            resume: None,
        }
    }

    /// Called when the last observer leaves a running stream.
    #[must_use]
    pub fn with_pause(mut self, pause: impl FnMut() + Send + 'static) -> Self {
        self.pause = Some(Box::new(pause));
        self
    }

    /// Called with the buffer when an observer arrives at a paused stream.
    #[must_use]
    pub fn with_resume(mut self, resume: impl FnMut(&[T]) + Send + 'static) -> Self {
        self.resume = Some(Box::new(resume));
        self
    }
}

impl<T> Default for StreamHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
enum Terminal<E> {
    Completed,
    Failed(E),
}

enum HookCall {
    Pause,
    Resume,
}

/// One attached observer. `observer` is `None` while a callback on it runs.
struct Slot<T, E> {
    id: u64,
    cursor: usize,
    observer: Option<Box<dyn Observer<T, E>>>,
}

/// A unit of work taken out of the state and performed unlocked.
enum Step<T, E> {
    Next {
        id: u64,
        observer: Box<dyn Observer<T, E>>,
        item: T,
    },
    Terminal {
        observer: Box<dyn Observer<T, E>>,
        terminal: Terminal<E>,
    },
    Pause(PauseHook),
    Resume(ResumeHook<T>, Vec<T>),
}

struct State<T, E> {
    buffer: Vec<T>,
    terminal: Option<Terminal<E>>,
    slots: Vec<Slot<T, E>>,
    next_observer: u64,
    running: bool,
    hooks: StreamHooks<T>,
    pending: VecDeque<HookCall>,
    delivering: bool,
}

impl<T, E> State<T, E> {
    /// Makes the caller the deliverer unless another call already is.
    const fn claim(&mut self) -> bool {
        if self.delivering {
            return false;
        }
        self.delivering = true;
        true
    }
}

impl<T: Clone, E: Clone> State<T, E> {
    /// Observer work comes first, the least advanced observer first, so
    /// an item reaches everyone before the next one does. Hook calls run
    /// once every observer has caught up.
    fn next_step(&mut self) -> Option<Step<T, E>> {
        let available = self.buffer.len();
        let terminated = self.terminal.is_some();
        let behind = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.observer.is_some() && (slot.cursor < available || terminated))
            .min_by_key(|(_, slot)| slot.cursor)
            .map(|(position, _)| position);
        match behind {
            Some(position) => self.observer_step(position),
            None => self.hook_step(),
        }
    }

    fn observer_step(&mut self, position: usize) -> Option<Step<T, E>> {
        let slot = self.slots.get_mut(position)?;
        if let Some(item) = self.buffer.get(slot.cursor) {
            let observer = slot.observer.take()?;
            slot.cursor += 1;
            return Some(Step::Next {
                id: slot.id,
                observer,
                item: item.clone(),
            });
        }
        let terminal = self.terminal.clone()?;
        let observer = self.slots.remove(position).observer?;
        Some(Step::Terminal { observer, terminal })
    }

    fn hook_step(&mut self) -> Option<Step<T, E>> {
        while let Some(call) = self.pending.pop_front() {
            match call {
                HookCall::Pause => {
                    if let Some(pause) = self.hooks.pause.take() {
                        return Some(Step::Pause(pause));
                    }
                }
                HookCall::Resume => {
                    if let Some(resume) = self.hooks.resume.take() {
                        return Some(Step::Resume(resume, self.buffer.clone()));
                    }
                }
            }
        }
        None
    }
}

type Shared<T, E> = Arc<Mutex<State<T, E>>>;

fn lock<T, E>(shared: &Shared<T, E>) -> MutexGuard<'_, State<T, E>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Gives up the deliverer role when a callback panics.
struct Delivering<'a, T, E>(&'a Shared<T, E>);

impl<T, E> Drop for Delivering<'_, T, E> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = lock(self.0);
            state.delivering = false;
            state.slots.retain(|slot| slot.observer.is_some());
        }
    }
}

/// Performs pending work until none is left, then releases the deliverer
/// role. Only the caller that won [`State::claim`] may call this.
fn deliver<T: Clone, E: Clone>(shared: &Shared<T, E>) {
    let _role = Delivering(shared);
    loop {
        let step = {
            let mut state = lock(shared);
            let step = state.next_step();
            if step.is_none() {
                state.delivering = false;
            }
            step
        };
        let Some(step) = step else {
            return;
        };
        match step {
            Step::Next {
                id,
                mut observer,
                item,
            } => {
                observer.on_next(&item);
                restore(shared, id, observer);
            }
            Step::Terminal {
                mut observer,
                terminal,
            } => match terminal {
                Terminal::Completed => observer.on_complete(),
                Terminal::Failed(error) => observer.on_error(&error),
            },
            Step::Pause(mut pause) => {
                pause();
                let mut state = lock(shared);
                if state.terminal.is_none() {
                    state.hooks.pause = Some(pause);
                }
            }
            Step::Resume(mut resume, buffer) => {
                resume(&buffer);
                let mut state = lock(shared);
                if state.terminal.is_none() {
                    state.hooks.resume = Some(resume);
                }
            }
        }
    }
}

/// Puts an observer back unless it unsubscribed during its callback.
fn restore<T, E>(shared: &Shared<T, E>, id: u64, observer: Box<dyn Observer<T, E>>) {
    let mut state = lock(shared);
    if let Some(slot) = state.slots.iter_mut().find(|slot| slot.id == id) {
        slot.observer = Some(observer);
    }
}

/// A hot, replaying, multicast stream of `T` that terminates with `E` or
/// completes.
pub struct EventStream<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Clone for EventStream<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for EventStream<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared);
        f.debug_struct("EventStream")
            .field("buffered", &state.buffer.len())
            .field("observers", &state.slots.len())
            .field("terminated", &state.terminal.is_some())
            .field("running", &state.running)
            .finish()
    }
}

/// The producer side of an [`EventStream`].
pub struct Emitter<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<T, E> Emitter<T, E> {
    /// Returns `true` once `fail` or `finish` has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        lock(&self.shared).terminal.is_some()
    }
}

impl<T: Clone, E: Clone> Emitter<T, E> {
    /// Appends `item` to the buffer and forwards it to the attached observers.
    /// Ignored once the stream has terminated.
    pub fn emit(&self, item: T) {
        let claimed = {
            let mut state = lock(&self.shared);
            if state.terminal.is_some() {
                return;
            }
            state.buffer.push(item);
            state.claim()
        };
        if claimed {
            deliver(&self.shared);
        }
    }

    /// Terminates the stream with `error`. Ignored once terminated.
    pub fn fail(&self, error: E) {
        self.terminate(Terminal::Failed(error));
    }

    /// Completes the stream. Ignored once terminated.
    pub fn finish(&self) {
        self.terminate(Terminal::Completed);
    }

    /// Terminated streams fire no further hooks; they are dropped here.
    /// Observers are released as each receives the terminal signal.
    fn terminate(&self, terminal: Terminal<E>) {
        let (claimed, hooks) = {
            let mut state = lock(&self.shared);
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal);
            state.pending.clear();
            let hooks = std::mem::take(&mut state.hooks);
            (state.claim(), hooks)
        };
        drop(hooks);
        if claimed {
            deliver(&self.shared);
        }
    }
}

impl<T, E> EventStream<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a stream and runs `start` before returning.
    ///
    /// `start` receives the [`Emitter`]; it may emit synchronously or hand
    /// the emitter to another thread. Items emitted before anyone subscribes
    /// are buffered.
    pub fn create(start: impl FnOnce(Emitter<T, E>)) -> Self {
        Self::create_with_hooks(start, StreamHooks::new())
    }

    /// Like [`EventStream::create`] with pause and resume hooks.
    pub fn create_with_hooks(start: impl FnOnce(Emitter<T, E>), hooks: StreamHooks<T>) -> Self {
        let (emitter, stream) = Self::pair(hooks);
        start(emitter);
        stream
    }

    /// Creates a stream whose emitter stays with the caller.
    #[must_use]
    pub fn pair(hooks: StreamHooks<T>) -> (Emitter<T, E>, Self) {
        let shared = Arc::new(Mutex::new(State {
            buffer: Vec::new(),
            terminal: None,
            slots: Vec::new(),
            next_observer: 0,
            running: true,
            hooks,
            pending: VecDeque::new(),
            delivering: false,
        }));
        (
            Emitter {
                shared: Arc::clone(&shared),
            },
            Self { shared },
        )
    }

    /// Attaches `observer`.
    ///
    /// The buffer is replayed to it, followed by the terminal signal on a
    /// terminated stream, in which case the returned subscription is inert.
    /// Otherwise the observer stays attached and a paused producer is
    /// resumed after the replay. When no delivery is in progress all of
    /// this happens before `subscribe` returns; called from inside an
    /// observer or hook, the ongoing delivery performs it.
    pub fn subscribe(&self, observer: impl Observer<T, E> + 'static) -> Subscription<T, E> {
        let (id, terminated, claimed) = {
            let mut state = lock(&self.shared);
            let id = state.next_observer;
            state.next_observer += 1;
            state.slots.push(Slot {
                id,
                cursor: 0,
                observer: Some(Box::new(observer)),
            });
            let terminated = state.terminal.is_some();
            if !terminated && !state.running && state.hooks.resume.is_some() {
                state.running = true;
                state.pending.push_back(HookCall::Resume);
            }
            (id, terminated, state.claim())
        };
        if claimed {
            deliver(&self.shared);
        }
        if terminated {
            return Subscription::inert();
        }
        Subscription {
            shared: Some(Arc::clone(&self.shared)),
            id,
        }
    }

    /// Attaches three closures as an observer.
    pub fn subscribe_with<N, R, C>(&self, on_next: N, on_error: R, on_complete: C) -> Subscription<T, E>
    where
        N: FnMut(&T) + Send + 'static,
        R: FnMut(&E) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.subscribe(FnObserver::new(on_next, on_error, on_complete))
    }

    /// Derives a stream that emits `transform` of every item of this one
    /// and forwards its terminal signal.
    ///
    /// The derived stream observes this one from creation. While it is
    /// paused (its last observer left) it detaches from this stream, which
    /// can then pause in turn; on resume it re-attaches and forwards only
    /// the items it has not forwarded before.
    pub fn map<U, F>(&self, transform: F) -> EventStream<U, E>
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let link = Arc::new(MapLink {
            source: self.clone(),
            target: Mutex::new(Weak::new()),
            transform: Arc::new(transform),
            forwarded: Arc::new(AtomicUsize::new(0)),
            subscription: Mutex::new(None),
        });
        let on_pause = Arc::clone(&link);
        let on_resume = Arc::clone(&link);
        let hooks = StreamHooks::new()
            .with_pause(move || on_pause.detach())
            .with_resume(move |_buffer: &[U]| on_resume.attach());
        let (emitter, derived) = EventStream::pair(hooks);
        *link.target.lock().unwrap_or_else(PoisonError::into_inner) =
            Arc::downgrade(&emitter.shared);
        link.attach();
        derived
    }

    /// Number of observers currently attached.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.shared).slots.len()
    }

    /// Returns `true` once the stream has completed or failed.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        lock(&self.shared).terminal.is_some()
    }

    /// Blocks the calling thread until the stream terminates and returns
    /// every item it emitted, or its error.
    ///
    /// A stream that never terminates blocks forever, as does a call made
    /// from inside one of this stream's own observers or hooks.
    ///
    /// # Errors
    ///
    /// Returns the stream's terminal error.
    pub fn collect_blocking(&self) -> Result<Vec<T>, E> {
        let slot = Arc::new((Mutex::new(None), Condvar::new()));
        let subscription = self.subscribe(CollectObserver {
            items: Vec::new(),
            slot: Arc::clone(&slot),
        });
        let (result, ready) = &*slot;
        let mut guard = result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = guard.take() {
                drop(guard);
                subscription.unsubscribe();
                return outcome;
            }
            guard = ready.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Connection between a mapped stream and its source.
struct MapLink<T, U, E, F> {
    source: EventStream<T, E>,
    target: Mutex<Weak<Mutex<State<U, E>>>>,
    transform: Arc<F>,
    forwarded: Arc<AtomicUsize>,
    subscription: Mutex<Option<Subscription<T, E>>>,
}

impl<T, U, E, F> MapLink<T, U, E, F>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    fn attach(&self) {
        let target = self
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade();
        let Some(shared) = target else {
            return;
        };
        let subscription = self.source.subscribe(MapObserver {
            transform: Arc::clone(&self.transform),
            emitter: Emitter { shared },
            forwarded: Arc::clone(&self.forwarded),
            seen: 0,
        });
        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(subscription);
        if let Some(stale) = previous {
            stale.unsubscribe();
        }
    }

    fn detach(&self) {
        let current = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(attached) = current {
            attached.unsubscribe();
        }
    }
}

/// Forwards source items past the shared `forwarded` mark, so a
/// re-attached observer skips what an earlier one already delivered.
struct MapObserver<F, U, E> {
    transform: Arc<F>,
    emitter: Emitter<U, E>,
    forwarded: Arc<AtomicUsize>,
    seen: usize,
}

impl<T, U, E, F> Observer<T, E> for MapObserver<F, U, E>
where
    F: Fn(&T) -> U + Send + Sync,
    U: Clone + Send,
    E: Clone + Send,
{
    fn on_next(&mut self, item: &T) {
        let index = self.seen;
        self.seen += 1;
        if index < self.forwarded.load(Ordering::SeqCst) {
            return;
        }
        self.forwarded.store(self.seen, Ordering::SeqCst);
        self.emitter.emit((self.transform)(item));
    }

    fn on_error(&mut self, error: &E) {
        self.emitter.fail(error.clone());
    }

    fn on_complete(&mut self) {
        self.emitter.finish();
    }
}

type Outcome<T, E> = Arc<(Mutex<Option<Result<Vec<T>, E>>>, Condvar)>;

struct CollectObserver<T, E> {
    items: Vec<T>,
    slot: Outcome<T, E>,
}

impl<T, E> CollectObserver<T, E> {
    fn settle(&mut self, outcome: Result<Vec<T>, E>) {
        let (result, ready) = &*self.slot;
        *result.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        ready.notify_all();
    }
}

impl<T, E> Observer<T, E> for CollectObserver<T, E>
where
    T: Clone + Send,
    E: Clone + Send,
{
    fn on_next(&mut self, item: &T) {
        self.items.push(item.clone());
    }

    fn on_error(&mut self, error: &E) {
        self.settle(Err(error.clone()));
    }

    fn on_complete(&mut self) {
        let items = std::mem::take(&mut self.items);
        self.settle(Ok(items));
    }
}

/// Handle detaching one observer from an [`EventStream`].
///
/// Dropping the handle leaves the observer attached.
#[must_use = "dropping a subscription keeps the observer attached; call `unsubscribe` to detach it"]
pub struct Subscription<T, E> {
    shared: Option<Shared<T, E>>,
    id: u64,
}

impl<T, E> fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("inert", &self.shared.is_none())
            .finish()
    }
}

impl<T, E> Subscription<T, E> {
    const fn inert() -> Self {
        Self {
            shared: None,
            id: 0,
        }
    }
}

impl<T: Clone, E: Clone> Subscription<T, E> {
    /// Detaches the observer; it receives nothing further, even when called
    /// from inside its own callback. When it was the last one on a running
    /// stream with a pause hook, the producer is paused.
    pub fn unsubscribe(self) {
        let Some(shared) = self.shared else {
            return;
        };
        let (claimed, detached) = {
            let mut state = lock(&shared);
            let Some(position) = state.slots.iter().position(|slot| slot.id == self.id) else {
                return;
            };
            let detached = state.slots.remove(position);
            if state.slots.is_empty()
                && state.terminal.is_none()
                && state.running
                && state.hooks.pause.is_some()
            {
                state.running = false;
                state.pending.push_back(HookCall::Pause);
            }
            (state.claim(), detached)
        };
        drop(detached);
        if claimed {
            deliver(&shared);
        }
    }
}
