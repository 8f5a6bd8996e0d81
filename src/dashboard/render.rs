use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct BarrierState {
    in_flight: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

/// Tracks in-flight render cycles of one binding.
///
/// A render holds a [`RenderGuard`]; [`RenderBarrier::settled`] resolves once
/// no guard is alive. Waiters are released in the order they asked.
#[derive(Clone, Default)]
pub struct RenderBarrier {
    state: Rc<RefCell<BarrierState>>,
}

impl RenderBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a render cycle as started. It ends when the guard is dropped.
    pub fn begin(&self) -> RenderGuard {
        self.state.borrow_mut().in_flight += 1;
        RenderGuard {
            barrier: self.clone(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().in_flight == 0
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    /// Resolves when every render started so far has finished.
    pub fn settled(&self) -> LocalBoxFuture<'static, ()> {
        let mut state = self.state.borrow_mut();
        if state.in_flight == 0 {
            return future::ready(()).boxed_local();
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        // A dropped sender means the barrier itself is gone; nothing is
        // rendering any more.
        rx.map(|_| ()).boxed_local()
    }

    fn finish(&self) {
        let waiters = {
            let mut state = self.state.borrow_mut();
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight > 0 {
                return;
            }
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

/// Keeps a render cycle open.
#[must_use = "the render cycle ends as soon as the guard is dropped"]
pub struct RenderGuard {
    barrier: RenderBarrier,
}

impl RenderGuard {
    pub fn finish(self) {}
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        self.barrier.finish();
    }
}
