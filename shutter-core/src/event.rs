//! Event slot conventions and the emit surface.
//!
//! Every event occupies contiguous slots in its thread's buffer. Slot 0 is
//! the control word:
//!
//! ```text
//! bits  0..=1   kind (1 = enter, 2 = leave, 3 = instant)
//! bits  2..=7   argument payload size in slots
//! bits  8..=31  scope id (string id of the scope descriptor)
//! ```
//!
//! Slots 1 and 2 carry the microsecond timestamp, low word first, followed
//! by the argument payload. 32-bit arguments take one slot; 64-bit
//! arguments take two, low word first.
//!
//! A scope descriptor is one interned string of the form
//! `"Name: argname1, argname2"`; [`ScopeSite`] interns it once per call
//! site and caches the id so the hot path never touches the string table.

use crate::buffer::SlotReservation;
use crate::runtime::ThreadHandle;
use crate::strings::StringTable;
use crate::types::ScopeId;
use std::sync::OnceLock;

/// Highest scope id a control word can carry.
pub const MAX_SCOPE_ID: u32 = (1 << 24) - 1;

/// Largest argument payload of a single event, in slots.
pub const MAX_ARG_SLOTS: usize = (1 << 6) - 1;

const KIND_MASK: u32 = 0x3;
const ARG_SLOTS_SHIFT: u32 = 2;
const ARG_SLOTS_MASK: u32 = 0x3f;
const SCOPE_SHIFT: u32 = 8;

/// Kind of a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventKind {
    /// A scope was entered.
    Enter = 1,
    /// A scope was left.
    Leave = 2,
    /// An instantaneous event.
    Instant = 3,
}

impl TryFrom<u32> for EventKind {
    type Error = &'static str;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Enter),
            2 => Ok(Self::Leave),
            3 => Ok(Self::Instant),
            _ => Err("Unknown event kind"),
        }
    }
}

/// Packed first slot of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord(u32);

impl ControlWord {
    /// Pack kind, argument slot count, and scope id into one word.
    ///
    /// Events written through the emit methods stay within the field
    /// bounds by construction; debug builds assert them.
    #[must_use]
    pub fn pack(kind: EventKind, arg_slots: usize, scope: ScopeId) -> Self {
        debug_assert!(arg_slots <= MAX_ARG_SLOTS);
        debug_assert!(scope.as_u32() <= MAX_SCOPE_ID);
        Self(
            kind as u32
                | ((arg_slots as u32 & ARG_SLOTS_MASK) << ARG_SLOTS_SHIFT)
                | ((scope.as_u32() & MAX_SCOPE_ID) << SCOPE_SHIFT),
        )
    }

    /// Reconstruct from a raw slot value.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw slot value.
    #[must_use]
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// The event kind.
    ///
    /// # Errors
    /// Fails on a kind field no known event uses.
    pub fn kind(&self) -> std::result::Result<EventKind, &'static str> {
        EventKind::try_from(self.0 & KIND_MASK)
    }

    /// Argument payload size in slots.
    #[must_use]
    pub fn arg_slots(&self) -> usize {
        ((self.0 >> ARG_SLOTS_SHIFT) & ARG_SLOTS_MASK) as usize
    }

    /// The referenced scope id.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        ScopeId::new((self.0 >> SCOPE_SHIFT).into())
    }
}

/// One event argument, ready for slot packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue {
    /// Unsigned 32-bit value, one slot.
    U32(u32),
    /// Signed 32-bit value, one slot.
    I32(i32),
    /// Unsigned 64-bit value, two slots, low word first.
    U64(u64),
    /// Signed 64-bit value, two slots, low word first.
    I64(i64),
}

impl ArgValue {
    /// Slots this argument occupies.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match self {
            Self::U32(_) | Self::I32(_) => 1,
            Self::U64(_) | Self::I64(_) => 2,
        }
    }

    fn write(&self, reservation: &mut SlotReservation<'_>, at: usize) -> usize {
        match *self {
            Self::U32(v) => {
                reservation.set(at, v);
                1
            }
            Self::I32(v) => {
                reservation.set(at, v as u32);
                1
            }
            Self::U64(v) => {
                reservation.set(at, v as u32);
                reservation.set(at + 1, (v >> 32) as u32);
                2
            }
            Self::I64(v) => Self::U64(v as u64).write(reservation, at),
        }
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

/// Per-call-site cache of an interned scope descriptor.
///
/// Declared as a `static` (the `trace_scope!` and `trace_event!` macros do
/// this) so the descriptor is interned exactly once; afterwards resolving
/// the site is a single atomic load. A runtime reset leaves caches stale,
/// as documented on [`crate::runtime::Runtime::reset`].
pub struct ScopeSite {
    descriptor: &'static str,
    id: OnceLock<ScopeId>,
}

impl ScopeSite {
    /// Create a site for a descriptor of the form `"Name: arg1, arg2"`.
    #[must_use]
    pub const fn new(descriptor: &'static str) -> Self {
        Self {
            descriptor,
            id: OnceLock::new(),
        }
    }

    /// The descriptor string.
    #[must_use]
    pub fn descriptor(&self) -> &'static str {
        self.descriptor
    }

    /// Resolve the cached id, interning on first use.
    pub fn resolve(&self, strings: &StringTable) -> ScopeId {
        *self
            .id
            .get_or_init(|| ScopeId::new(strings.intern(self.descriptor)))
    }
}

/// RAII guard for an entered scope; emits the leave event on drop.
#[must_use = "dropping the guard immediately closes the scope"]
pub struct ScopeGuard<'a> {
    handle: &'a ThreadHandle,
    scope: ScopeId,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.handle.leave(self.scope);
    }
}

impl ThreadHandle {
    /// Resolve a scope site against this runtime's string table.
    pub fn resolve(&self, site: &ScopeSite) -> ScopeId {
        site.resolve(&self.strings)
    }

    /// Emit a scope-enter event timestamped by the runtime clock.
    pub fn enter(&self, scope: ScopeId, args: &[ArgValue]) {
        self.enter_at(scope, self.clock.now_micros(), args);
    }

    /// Emit a scope-enter event with an explicit microsecond timestamp.
    pub fn enter_at(&self, scope: ScopeId, timestamp_us: u64, args: &[ArgValue]) {
        self.emit(EventKind::Enter, scope, timestamp_us, args);
    }

    /// Emit a scope-leave event timestamped by the runtime clock.
    pub fn leave(&self, scope: ScopeId) {
        self.leave_at(scope, self.clock.now_micros());
    }

    /// Emit a scope-leave event with an explicit microsecond timestamp.
    pub fn leave_at(&self, scope: ScopeId, timestamp_us: u64) {
        self.emit(EventKind::Leave, scope, timestamp_us, &[]);
    }

    /// Emit an instantaneous event timestamped by the runtime clock.
    pub fn instant(&self, scope: ScopeId, args: &[ArgValue]) {
        self.instant_at(scope, self.clock.now_micros(), args);
    }

    /// Emit an instantaneous event with an explicit microsecond timestamp.
    pub fn instant_at(&self, scope: ScopeId, timestamp_us: u64, args: &[ArgValue]) {
        self.emit(EventKind::Instant, scope, timestamp_us, args);
    }

    /// Enter a scope site, returning a guard that leaves it on drop.
    pub fn scope<'a>(&'a self, site: &ScopeSite) -> ScopeGuard<'a> {
        self.scope_with(site, &[])
    }

    /// Enter a scope site with arguments.
    pub fn scope_with<'a>(&'a self, site: &ScopeSite, args: &[ArgValue]) -> ScopeGuard<'a> {
        let scope = self.resolve(site);
        self.enter(scope, args);
        ScopeGuard {
            handle: self,
            scope,
        }
    }

    fn emit(&self, kind: EventKind, scope: ScopeId, timestamp_us: u64, args: &[ArgValue]) {
        let arg_slots: usize = args.iter().map(ArgValue::slot_count).sum();
        let mut reservation = self.reserve(3 + arg_slots);
        reservation.set(0, ControlWord::pack(kind, arg_slots, scope).raw());
        reservation.set(1, timestamp_us as u32);
        reservation.set(2, (timestamp_us >> 32) as u32);
        let mut at = 3;
        for arg in args {
            at += arg.write(&mut reservation, at);
        }
    }
}
