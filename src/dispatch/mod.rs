//! The dispatch fabric: routes every inbound frame through hooks,
//! handlers and pending-request continuations before it is forwarded.
//!
//! Registration can happen from any thread while dispatch is in progress.
//! The registries are guarded by plain mutexes held only around mutation
//! and match-snapshotting: matching entries are cloned out and invoked
//! with no lock held, so a slow callback cannot stall unrelated dispatch
//! or registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::protocol::error::{DecodeError, FrameError};
use crate::protocol::frame::{Direction, Frame};
use crate::RelayError;

/// Reaction invoked for every frame matching an opcode + direction.
pub type HandlerFn = dyn Fn(&mut Frame) -> crate::Result<()> + Send + Sync;

/// Frame rewriter invoked before handlers; returning `None` suppresses
/// the frame entirely.
pub type HookFn = dyn Fn(Frame) -> Option<Frame> + Send + Sync;

type Continuation = Box<dyn FnOnce(&mut Frame) + Send>;

/// Token returned by [`DispatchFabric::register_handler`], used to remove
/// the registration later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// Token returned by [`DispatchFabric::register_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(u64);

/// A one-shot continuation awaiting the next frame of a specific opcode.
///
/// Fired at most once, then discarded. Entries whose deadline has passed
/// are never fired and are swept on the next inbound frame of any opcode.
/// Matching is purely by opcode; callers needing finer correlation must
/// check a correlation id inside the payload from their continuation.
pub struct PendingRequest {
    opcode: u16,
    deadline: Instant,
    continuation: Continuation,
}

impl PendingRequest {
    pub fn new(
        opcode: u16,
        ttl: Duration,
        continuation: impl FnOnce(&mut Frame) + Send + 'static,
    ) -> Self {
        Self {
            opcode,
            deadline: Instant::now() + ttl,
            continuation: Box::new(continuation),
        }
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    fn expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// Frame queued for transmission toward one of the two peers.
pub struct Outbound {
    pub frame: Frame,
    pub direction: Direction,
}

struct HandlerEntry {
    id: u64,
    opcode: u16,
    direction: Direction,
    reaction: Arc<HandlerFn>,
}

struct HookEntry {
    id: u64,
    opcode: u16,
    direction: Direction,
    rewrite: Arc<HookFn>,
}

/// The routing core between the proxy channel and application logic.
///
/// One instance is owned by the process-wide networking context,
/// constructed at session start and shared by handle wherever
/// registration or dispatch is needed.
pub struct DispatchFabric {
    handlers: Mutex<Vec<HandlerEntry>>,
    hooks: Mutex<Vec<HookEntry>>,
    pending: Mutex<Vec<PendingRequest>>,
    next_id: AtomicU64,
    transmit: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl DispatchFabric {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            transmit: Mutex::new(None),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a reaction for every frame matching `opcode` + `direction`.
    ///
    /// Duplicates are allowed; all matching handlers run in registration
    /// order. Safe to call while dispatch is in progress; frames already
    /// mid-dispatch are unaffected.
    pub fn register_handler(
        &self,
        opcode: u16,
        direction: Direction,
        reaction: impl Fn(&mut Frame) -> crate::Result<()> + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.allocate_id();
        lock(&self.handlers).push(HandlerEntry {
            id,
            opcode,
            direction,
            reaction: Arc::new(reaction),
        });
        tracing::debug!(opcode, ?direction, id, "handler registered");
        HandlerId(id)
    }

    /// Removes a handler registration; returns whether it was still present.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|entry| entry.id != id.0);
        handlers.len() != before
    }

    /// Registers a frame rewriter that runs before any handler.
    ///
    /// Hooks are chained: each matching hook receives the previous hook's
    /// output and returns a frame to replace it, or `None` to suppress the
    /// message entirely.
    pub fn register_hook(
        &self,
        opcode: u16,
        direction: Direction,
        rewrite: impl Fn(Frame) -> Option<Frame> + Send + Sync + 'static,
    ) -> HookId {
        let id = self.allocate_id();
        lock(&self.hooks).push(HookEntry {
            id,
            opcode,
            direction,
            rewrite: Arc::new(rewrite),
        });
        tracing::debug!(opcode, ?direction, id, "hook registered");
        HookId(id)
    }

    /// Removes a hook registration; returns whether it was still present.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut hooks = lock(&self.hooks);
        let before = hooks.len();
        hooks.retain(|entry| entry.id != id.0);
        hooks.len() != before
    }

    /// Installs the outbound channel of the active proxy session.
    pub fn attach_transport(&self, tx: mpsc::UnboundedSender<Outbound>) {
        *lock(&self.transmit) = Some(tx);
    }

    /// Removes the outbound channel; subsequent sends silently no-op.
    pub fn detach_transport(&self) {
        *lock(&self.transmit) = None;
    }

    /// Number of pending-request entries currently held, expired or not.
    /// Diagnostic only; the table is swept lazily on inbound frames.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Hands a frame to the proxy channel for transmission.
    ///
    /// The frame is locked here, since it is leaving this side's control. An
    /// absent transport means "currently not connected" and the send
    /// no-ops; a closed transport is reported to the caller and never
    /// thrown into the dispatch path.
    pub fn send(&self, mut frame: Frame, direction: Direction) -> crate::Result<()> {
        frame.lock();
        match lock(&self.transmit).as_ref() {
            Some(tx) => tx
                .send(Outbound { frame, direction })
                .map_err(|_| RelayError::ConnectionClosed),
            None => {
                tracing::trace!(?direction, "send without transport; frame dropped");
                Ok(())
            }
        }
    }

    /// Like [`DispatchFabric::send`], but registers each continuation as a
    /// pending request *before* transmission, so an immediate response
    /// cannot race past the registration.
    pub fn send_expect(
        &self,
        frame: Frame,
        direction: Direction,
        continuations: impl IntoIterator<Item = PendingRequest>,
    ) -> crate::Result<()> {
        lock(&self.pending).extend(continuations);
        self.send(frame, direction)
    }

    /// Routes one inbound frame through hooks, handlers and continuations.
    ///
    /// Returns the (possibly hook-replaced) frame to forward to the
    /// opposite peer, or `None` if a hook consumed it or a handler hit a
    /// truncated payload.
    pub fn on_frame_arrived(&self, frame: Frame) -> Option<Frame> {
        let direction = frame.direction();

        let frame = self.run_hooks(frame)?;
        let opcode = frame.opcode();

        let (frame, truncated) = self.run_handlers(frame);
        let frame = self.resolve_pending(frame);

        if truncated {
            tracing::warn!(opcode, ?direction, "dropping truncated frame");
            return None;
        }
        Some(frame)
    }

    fn run_hooks(&self, mut frame: Frame) -> Option<Frame> {
        // Snapshot the whole registry, then re-test each entry against the
        // current frame: a hook that substitutes a frame with a different
        // opcode changes which later hooks match.
        let hooks: Vec<HookEntry> = {
            let guard = lock(&self.hooks);
            guard
                .iter()
                .map(|e| HookEntry {
                    id: e.id,
                    opcode: e.opcode,
                    direction: e.direction,
                    rewrite: Arc::clone(&e.rewrite),
                })
                .collect()
        };

        for hook in hooks {
            if hook.opcode != frame.opcode() || hook.direction != frame.direction() {
                continue;
            }
            match (hook.rewrite)(frame) {
                Some(replacement) => frame = replacement,
                None => {
                    tracing::trace!(opcode = hook.opcode, "frame consumed by hook");
                    return None;
                }
            }
        }
        Some(frame)
    }

    fn run_handlers(&self, mut frame: Frame) -> (Frame, bool) {
        let opcode = frame.opcode();
        let direction = frame.direction();
        let reactions: Vec<Arc<HandlerFn>> = {
            let guard = lock(&self.handlers);
            guard
                .iter()
                .filter(|e| e.opcode == opcode && e.direction == direction)
                .map(|e| Arc::clone(&e.reaction))
                .collect()
        };

        let mut truncated = false;
        for reaction in reactions {
            // Every handler parses from offset 0, blind to the cursor
            // movement of the handlers before it.
            frame.reset_read();
            if let Err(err) = reaction(&mut frame) {
                if is_truncation(&err) {
                    truncated = true;
                }
                tracing::warn!(opcode, ?direction, error = %err, "handler failed");
            }
        }
        (frame, truncated)
    }

    fn resolve_pending(&self, mut frame: Frame) -> Frame {
        // The frame fans out to continuations from here on; freeze it.
        frame.lock();

        let fired = {
            let now = Instant::now();
            let mut pending = lock(&self.pending);
            let mut fired = Vec::new();
            let mut kept = Vec::new();
            for request in pending.drain(..) {
                if request.expired(now) {
                    // Lazy sweep: expired entries are dropped unfired.
                } else if request.opcode == frame.opcode() {
                    fired.push(request.continuation);
                } else {
                    kept.push(request);
                }
            }
            *pending = kept;
            fired
        };

        for continuation in fired {
            frame.reset_read();
            continuation(&mut frame);
        }
        frame.reset_read();
        frame
    }
}

impl Default for DispatchFabric {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_truncation(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::Frame(FrameError::Truncated { .. })
            | RelayError::Decode(DecodeError::Frame(FrameError::Truncated { .. }))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    fn frame_with(opcode: u16, direction: Direction, payload: &[u8]) -> Frame {
        Frame::with_payload(opcode, direction, payload.to_vec())
    }

    #[test]
    fn handlers_run_in_order_and_each_sees_a_fresh_cursor() {
        let fabric = DispatchFabric::new();
        let seen: StdArc<Mutex<Vec<(usize, u32)>>> = StdArc::default();

        for index in 0..3 {
            let seen = StdArc::clone(&seen);
            fabric.register_handler(0x42, Direction::ToClient, move |frame| {
                seen.lock().unwrap().push((index, frame.read_u32()?));
                Ok(())
            });
        }

        let out = fabric.on_frame_arrived(frame_with(0x42, Direction::ToClient, &7u32.to_le_bytes()));
        assert!(out.is_some());
        assert_eq!(&*seen.lock().unwrap(), &[(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn handlers_match_on_opcode_and_direction() {
        let fabric = DispatchFabric::new();
        let hits: StdArc<Mutex<u32>> = StdArc::default();

        let hits_a = StdArc::clone(&hits);
        fabric.register_handler(0x42, Direction::ToServer, move |_| {
            *hits_a.lock().unwrap() += 1;
            Ok(())
        });

        fabric.on_frame_arrived(frame_with(0x42, Direction::ToClient, &[]));
        fabric.on_frame_arrived(frame_with(0x43, Direction::ToServer, &[]));
        assert_eq!(*hits.lock().unwrap(), 0);

        fabric.on_frame_arrived(frame_with(0x42, Direction::ToServer, &[]));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn removed_handler_no_longer_runs() {
        let fabric = DispatchFabric::new();
        let hits: StdArc<Mutex<u32>> = StdArc::default();

        let hits_a = StdArc::clone(&hits);
        let id = fabric.register_handler(0x1, Direction::ToClient, move |_| {
            *hits_a.lock().unwrap() += 1;
            Ok(())
        });

        assert!(fabric.remove_handler(id));
        assert!(!fabric.remove_handler(id));

        fabric.on_frame_arrived(frame_with(0x1, Direction::ToClient, &[]));
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn failing_handler_does_not_stop_the_rest() {
        let fabric = DispatchFabric::new();
        let hits: StdArc<Mutex<u32>> = StdArc::default();

        fabric.register_handler(0x1, Direction::ToClient, |_| {
            Err(RelayError::ConnectionClosed)
        });
        let hits_a = StdArc::clone(&hits);
        fabric.register_handler(0x1, Direction::ToClient, move |_| {
            *hits_a.lock().unwrap() += 1;
            Ok(())
        });

        let out = fabric.on_frame_arrived(frame_with(0x1, Direction::ToClient, &[]));
        assert!(out.is_some());
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn truncation_in_a_handler_drops_the_frame() {
        let fabric = DispatchFabric::new();
        let later_ran: StdArc<Mutex<bool>> = StdArc::default();

        fabric.register_handler(0x1, Direction::ToClient, |frame| {
            frame.read_u32()?;
            Ok(())
        });
        let later = StdArc::clone(&later_ran);
        fabric.register_handler(0x1, Direction::ToClient, move |_| {
            *later.lock().unwrap() = true;
            Ok(())
        });

        // Two bytes cannot satisfy the first handler's read_u32.
        let out = fabric.on_frame_arrived(frame_with(0x1, Direction::ToClient, &[0xAA, 0xBB]));
        assert!(out.is_none());
        assert!(*later_ran.lock().unwrap());
    }

    #[test]
    fn transparent_hook_changes_nothing() {
        let fabric = DispatchFabric::new();
        fabric.register_hook(0x5, Direction::ToServer, Some);

        let out = fabric
            .on_frame_arrived(frame_with(0x5, Direction::ToServer, &[1, 2, 3]))
            .unwrap();
        assert_eq!(out.payload(), &[1, 2, 3]);
    }

    #[test]
    fn hook_replacement_is_observed_downstream() {
        let fabric = DispatchFabric::new();
        fabric.register_hook(0x5, Direction::ToServer, |_| {
            Some(Frame::with_payload(0x6, Direction::ToServer, vec![9]))
        });

        // Matching is re-evaluated against the replacement: this hook is
        // keyed on the substituted opcode and must still run.
        let chained: StdArc<Mutex<bool>> = StdArc::default();
        let chained_a = StdArc::clone(&chained);
        fabric.register_hook(0x6, Direction::ToServer, move |frame| {
            *chained_a.lock().unwrap() = true;
            Some(frame)
        });

        let observed: StdArc<Mutex<Option<u8>>> = StdArc::default();
        let observed_a = StdArc::clone(&observed);
        fabric.register_handler(0x6, Direction::ToServer, move |frame| {
            *observed_a.lock().unwrap() = Some(frame.read_u8()?);
            Ok(())
        });

        let out = fabric
            .on_frame_arrived(frame_with(0x5, Direction::ToServer, &[1]))
            .unwrap();
        assert_eq!(out.opcode(), 0x6);
        assert!(*chained.lock().unwrap());
        assert_eq!(*observed.lock().unwrap(), Some(9));
    }

    #[test]
    fn hook_can_suppress_a_frame() {
        let fabric = DispatchFabric::new();
        fabric.register_hook(0x5, Direction::ToClient, |_| None);

        let handled: StdArc<Mutex<bool>> = StdArc::default();
        let handled_a = StdArc::clone(&handled);
        fabric.register_handler(0x5, Direction::ToClient, move |_| {
            *handled_a.lock().unwrap() = true;
            Ok(())
        });

        assert!(fabric
            .on_frame_arrived(frame_with(0x5, Direction::ToClient, &[]))
            .is_none());
        assert!(!*handled.lock().unwrap());
    }

    #[test]
    fn continuation_fires_exactly_once() {
        let fabric = DispatchFabric::new();
        let fired: StdArc<Mutex<u32>> = StdArc::default();

        let fired_a = StdArc::clone(&fired);
        fabric
            .send_expect(
                Frame::new(0x10, Direction::ToServer),
                Direction::ToServer,
                [PendingRequest::new(0x11, Duration::from_secs(5), move |frame| {
                    assert!(frame.locked());
                    *fired_a.lock().unwrap() += 1;
                })],
            )
            .unwrap();

        fabric.on_frame_arrived(frame_with(0x11, Direction::ToClient, &[]));
        fabric.on_frame_arrived(frame_with(0x11, Direction::ToClient, &[]));
        assert_eq!(*fired.lock().unwrap(), 1);
        assert_eq!(fabric.pending_requests(), 0);
    }

    #[test]
    fn continuations_sharing_an_opcode_all_fire_with_fresh_cursors() {
        let fabric = DispatchFabric::new();
        let values: StdArc<Mutex<Vec<u32>>> = StdArc::default();

        let continuations: Vec<PendingRequest> = (0..2)
            .map(|_| {
                let values = StdArc::clone(&values);
                PendingRequest::new(0x11, Duration::from_secs(5), move |frame| {
                    values.lock().unwrap().push(frame.read_u32().unwrap());
                })
            })
            .collect();
        fabric
            .send_expect(Frame::new(0x10, Direction::ToServer), Direction::ToServer, continuations)
            .unwrap();

        fabric.on_frame_arrived(frame_with(0x11, Direction::ToClient, &3u32.to_le_bytes()));
        assert_eq!(&*values.lock().unwrap(), &[3, 3]);
    }

    #[test]
    fn expired_continuation_never_fires_and_is_swept() {
        let fabric = DispatchFabric::new();
        let fired: StdArc<Mutex<u32>> = StdArc::default();

        let fired_a = StdArc::clone(&fired);
        fabric
            .send_expect(
                Frame::new(0x10, Direction::ToServer),
                Direction::ToServer,
                [PendingRequest::new(0x11, Duration::ZERO, move |_| {
                    *fired_a.lock().unwrap() += 1;
                })],
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(5));

        // Swept by a frame of a *different* opcode: the sweep is lazy and
        // opcode-agnostic.
        fabric.on_frame_arrived(frame_with(0x99, Direction::ToClient, &[]));
        assert_eq!(fabric.pending_requests(), 0);

        fabric.on_frame_arrived(frame_with(0x11, Direction::ToClient, &[]));
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    #[test]
    fn send_without_transport_is_a_silent_noop() {
        let fabric = DispatchFabric::new();
        assert!(fabric
            .send(Frame::new(0x1, Direction::ToServer), Direction::ToServer)
            .is_ok());
    }

    #[test]
    fn send_locks_and_routes_through_the_attached_transport() {
        let fabric = DispatchFabric::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        fabric.attach_transport(tx);

        fabric
            .send(Frame::new(0x7, Direction::ToClient), Direction::ToClient)
            .unwrap();
        let outbound = rx.try_recv().unwrap();
        assert_eq!(outbound.frame.opcode(), 0x7);
        assert_eq!(outbound.direction, Direction::ToClient);
        assert!(outbound.frame.locked());

        fabric.detach_transport();
        drop(rx);
        assert!(fabric
            .send(Frame::new(0x7, Direction::ToClient), Direction::ToClient)
            .is_ok());
    }

    #[test]
    fn send_on_closed_transport_reports_to_the_caller() {
        let fabric = DispatchFabric::new();
        let (tx, rx) = mpsc::unbounded_channel();
        fabric.attach_transport(tx);
        drop(rx);

        let err = fabric
            .send(Frame::new(0x7, Direction::ToServer), Direction::ToServer)
            .unwrap_err();
        assert!(matches!(err, RelayError::ConnectionClosed));
    }
}
