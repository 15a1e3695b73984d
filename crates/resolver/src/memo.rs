//! Memoized, demand-driven computations.
//!
//! A [`Memo`] maps keys to computations. The first request for a key starts
//! its computation and caches it as a shared future; every later request,
//! including one made while the first is still suspended, awaits that same
//! future. A computation therefore runs at most once per key for the lifetime
//! of the [`Runtime`] session.
//!
//! Requests are cycle-checked. Every poll of a [`MemoFuture`] pushes a frame
//! onto the runtime's active stack; a frame that is already on the stack when
//! its key is polled again means the computation transitively demands itself.
//! That poll resolves to a [`Cycle`] instead of re-entering the shared future.

use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    hash::Hash,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use rustc_hash::FxHashMap;

/// Identifies one cached computation within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(u32);

/// One computation on the active stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    node: NodeId,
    pub memo: &'static str,
    pub description: String,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.memo)
    }
}

/// State shared by all memo tables of one resolution session.
#[derive(Debug, Default)]
pub struct Runtime {
    stack: RefCell<Vec<Frame>>,
    next_node: Cell<u32>,
}

impl Runtime {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Computations currently being polled, outermost first.
    pub fn active(&self) -> Vec<Frame> {
        self.stack.borrow().clone()
    }

    fn fresh_node(&self) -> NodeId {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        NodeId(id)
    }

    fn cycle_through(&self, frame: &Frame) -> Option<Cycle> {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|active| active.node == frame.node)?;
        let mut frames = stack[start..].to_vec();
        frames.push(frame.clone());
        Some(Cycle { frames })
    }

    fn enter(&self, frame: Frame) -> ActiveGuard<'_> {
        self.stack.borrow_mut().push(frame);
        ActiveGuard(self)
    }
}

struct ActiveGuard<'a>(&'a Runtime);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.stack.borrow_mut().pop();
    }
}

/// A computation that demanded its own result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    frames: Vec<Frame>,
}

impl Cycle {
    /// The cycle in demand order; the first and last frame are the same
    /// computation.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle detected: ")?;
        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", frame.description)?;
        }
        Ok(())
    }
}

impl std::error::Error for Cycle {}

type Describe<K> = Box<dyn Fn(&K) -> String>;
type Compute<K, V> = Box<dyn Fn(K) -> LocalBoxFuture<'static, V>>;

struct Entry<V> {
    node: NodeId,
    future: Shared<LocalBoxFuture<'static, V>>,
}

/// A memoized function from `K` to `V`.
pub struct Memo<K, V>
where
    V: Clone,
{
    name: &'static str,
    runtime: Rc<Runtime>,
    describe: Describe<K>,
    compute: Compute<K, V>,
    cache: RefCell<FxHashMap<K, Entry<V>>>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + 'static,
{
    /// Registers a memoized function. `describe` renders keys for cycle
    /// reports and logs only.
    pub fn create<D, F>(runtime: &Rc<Runtime>, name: &'static str, describe: D, compute: F) -> Self
    where
        D: Fn(&K) -> String + 'static,
        F: Fn(K) -> LocalBoxFuture<'static, V> + 'static,
    {
        Self {
            name,
            runtime: runtime.clone(),
            describe: Box::new(describe),
            compute: Box::new(compute),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Requests the value for `key`, starting its computation if this is
    /// the first request.
    pub fn exec(&self, key: K) -> MemoFuture<V> {
        let description = (self.describe)(&key);
        let cached = self
            .cache
            .borrow()
            .get(&key)
            .map(|entry| (entry.node, entry.future.clone()));

        let (node, future) = match cached {
            Some(cached) => {
                tracing::trace!(target: "memo", memo = self.name, key = %description, "hit");
                cached
            }
            None => {
                tracing::trace!(target: "memo", memo = self.name, key = %description, "miss");
                let node = self.runtime.fresh_node();
                let future = (self.compute)(key.clone()).shared();
                self.cache.borrow_mut().insert(
                    key,
                    Entry {
                        node,
                        future: future.clone(),
                    },
                );
                (node, future)
            }
        };

        MemoFuture {
            frame: Frame {
                node,
                memo: self.name,
                description,
            },
            runtime: self.runtime.clone(),
            future,
        }
    }

    /// The value for `key` if its computation has already finished.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.cache
            .borrow()
            .get(key)
            .and_then(|entry| entry.future.peek().cloned())
    }

    /// Number of keys requested so far, finished or not.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pending request to a [`Memo`].
#[must_use = "futures do nothing unless polled"]
pub struct MemoFuture<V>
where
    V: Clone,
{
    frame: Frame,
    runtime: Rc<Runtime>,
    future: Shared<LocalBoxFuture<'static, V>>,
}

impl<V> Future for MemoFuture<V>
where
    V: Clone,
{
    type Output = Result<V, Cycle>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(cycle) = this.runtime.cycle_through(&this.frame) {
            tracing::debug!(target: "memo", "{cycle}");
            return Poll::Ready(Err(cycle));
        }

        let _active = this.runtime.enter(this.frame.clone());
        this.future.poll_unpin(cx).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use futures::{channel::oneshot, executor::block_on, future::join3};

    use super::*;

    #[test]
    fn computes_each_key_once() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let square = Memo::create(&runtime, "square", |n: &u32| n.to_string(), move |n: u32| {
            counter.set(counter.get() + 1);
            async move { n * n }.boxed_local()
        });

        assert_eq!(block_on(square.exec(4)), Ok(16));
        assert_eq!(block_on(square.exec(4)), Ok(16));
        assert_eq!(block_on(square.exec(5)), Ok(25));
        assert_eq!(calls.get(), 2);
        assert_eq!(square.len(), 2);
        assert_eq!(square.peek(&4), Some(16));
        assert_eq!(square.peek(&6), None);
    }

    #[test]
    fn suspended_computation_is_shared() {
        let runtime = Runtime::new();
        let (sender, receiver) = oneshot::channel::<u32>();
        let receiver = RefCell::new(Some(receiver));
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        let fetch = Memo::create(&runtime, "fetch", |key: &&'static str| key.to_string(), {
            move |_key: &'static str| {
                counter.set(counter.get() + 1);
                let receiver = receiver.borrow_mut().take();
                async move {
                    match receiver {
                        Some(receiver) => receiver.await.unwrap_or(0),
                        None => 0,
                    }
                }
                .boxed_local()
            }
        });

        let (first, second, ()) = block_on(join3(fetch.exec("x"), fetch.exec("x"), async {
            sender.send(7).unwrap();
        }));

        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(calls.get(), 1);
    }

    struct Chain {
        memo: RefCell<Option<Memo<u32, Result<u32, Cycle>>>>,
    }

    fn chain(runtime: &Rc<Runtime>, next: fn(u32) -> Option<u32>) -> Rc<Chain> {
        Rc::new_cyclic(|weak: &std::rc::Weak<Chain>| {
            let weak = weak.clone();
            let memo = Memo::create(runtime, "chain", |n: &u32| format!("node {n}"), move |n| {
                let weak = weak.clone();
                async move {
                    let Some(chain) = weak.upgrade() else {
                        return Ok(n);
                    };
                    match next(n) {
                        Some(m) => {
                            let future = chain.memo.borrow().as_ref().map(|memo| memo.exec(m));
                            match future {
                                Some(future) => future.await?,
                                None => Ok(n),
                            }
                        }
                        None => Ok(n),
                    }
                }
                .boxed_local()
            });
            Chain {
                memo: RefCell::new(Some(memo)),
            }
        })
    }

    fn exec(chain: &Chain, n: u32) -> MemoFuture<Result<u32, Cycle>> {
        chain.memo.borrow().as_ref().unwrap().exec(n)
    }

    #[test]
    fn acyclic_chain_resolves() {
        let runtime = Runtime::new();
        let chain = chain(&runtime, |n| n.checked_sub(1));
        assert_eq!(block_on(exec(&chain, 3)), Ok(Ok(0)));
        assert!(runtime.active().is_empty());
    }

    #[test]
    fn cycles_are_reported_not_deadlocked() {
        let runtime = Runtime::new();
        // 1 -> 2 -> 3 -> 1
        let chain = chain(&runtime, |n| Some(n % 3 + 1));

        let cycle = block_on(exec(&chain, 1)).unwrap().unwrap_err();
        let path: Vec<_> = cycle
            .frames()
            .iter()
            .map(|frame| frame.description.as_str())
            .collect();
        assert_eq!(path, ["node 1", "node 2", "node 3", "node 1"]);
        assert_eq!(
            cycle.to_string(),
            "dependency cycle detected: node 1 -> node 2 -> node 3 -> node 1"
        );
        assert!(runtime.active().is_empty());
    }
}
