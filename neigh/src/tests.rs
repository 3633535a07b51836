//! Tests for the generic neighbour cache, exercised through a mock
//! protocol/interface pair rather than the concrete ARP instance.
//!
//! Covers:
//! - T1: `lookup` on an empty table returns `None`.
//! - T2: `create` + `lookup` round-trips the same entry.
//! - T3: `NONE -> INCOMPLETE -> REACHABLE` resolution flushes the queue.
//! - T4: exhausting the probe budget fails the entry and reports the frame.
//! - T5: `REACHABLE -> STALE -> DELAY` on USE past `reachable_time`.
//! - T6: `locktime` refuses a non-admin override within the window.
//! - T7: forced GC reclaims only entries with no external referents.
//! - T8: proxy replies land within their randomized delay window.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use slopos_lib::testing::TestResult;
use slopos_lib::{assert_eq_test, assert_ok, assert_test, define_test_suite, pass};

use crate::addr::{IfaceId, LlAddr, ProtoAddr};
use crate::entry::NudState;
use crate::error::NeighError;
use crate::iface::{Frame, Interface, InterfaceKind};
use crate::nud;
use crate::protocol::Protocol;
use crate::resolve::{resolve_and_send, ResolveOutcome};
use crate::table::Table;
use crate::time::FakeClock;

struct MockInterface {
    id: IfaceId,
    hw: LlAddr,
}

impl Interface for MockInterface {
    fn id(&self) -> IfaceId {
        self.id
    }
    fn hw_address(&self) -> LlAddr {
        self.hw
    }
    fn broadcast_address(&self) -> LlAddr {
        LlAddr::new(&[0xff; 6])
    }
    fn address_length(&self) -> u8 {
        6
    }
    fn mtu(&self) -> u16 {
        1500
    }
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Broadcast
    }
    fn build_header(&self, _frame: &mut Frame, _dst_l2: &LlAddr) -> crate::error::NeighResult<()> {
        Ok(())
    }
    fn dev_transmit(&self, _frame: Frame) -> crate::error::NeighResult<()> {
        TRANSMITTED.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

static TRANSMITTED: AtomicUsize = AtomicUsize::new(0);
static SOLICITS: AtomicU32 = AtomicU32::new(0);
static ERRORS_REPORTED: AtomicUsize = AtomicUsize::new(0);
static PROXY_REPLIES: AtomicUsize = AtomicUsize::new(0);

struct MockProtocol;

impl Protocol for MockProtocol {
    type Interface = MockInterface;

    fn hash(addr: &ProtoAddr, iface: IfaceId, key: u64) -> u64 {
        let mut acc = key ^ (iface.0 as u64);
        for b in addr.as_bytes() {
            acc = acc.wrapping_mul(31).wrapping_add(*b as u64);
        }
        acc
    }

    fn solicit(_iface: &Self::Interface, _target: &ProtoAddr, _probe_num: u32) {
        SOLICITS.fetch_add(1, Ordering::Relaxed);
    }

    fn error_report(_iface: &Self::Interface, _frame: Frame) {
        ERRORS_REPORTED.fetch_add(1, Ordering::Relaxed);
    }

    fn proxy_reply(_iface: &Self::Interface, _target: &ProtoAddr, _request: Frame) {
        PROXY_REPLIES.fetch_add(1, Ordering::Relaxed);
    }

    fn fabricate_l2(_addr: &ProtoAddr, _iface: &Self::Interface) -> Option<LlAddr> {
        None
    }
}

fn reset_counters() {
    TRANSMITTED.store(0, Ordering::Relaxed);
    SOLICITS.store(0, Ordering::Relaxed);
    ERRORS_REPORTED.store(0, Ordering::Relaxed);
    PROXY_REPLIES.store(0, Ordering::Relaxed);
}

fn mock_iface(id: usize) -> Arc<MockInterface> {
    Arc::new(MockInterface {
        id: IfaceId(id),
        hw: LlAddr::new(&[0x02, 0x00, 0x00, 0x00, 0x00, id as u8]),
    })
}

fn mock_frame() -> Frame {
    Frame::new(Box::new([0xAAu8; 16]))
}

fn fresh_table() -> (Table<MockProtocol>, &'static FakeClock) {
    static CLOCK: FakeClock = FakeClock::new();
    CLOCK.set(0);
    (Table::with_clock("test", &CLOCK), &CLOCK)
}

fn addr(last: u8) -> ProtoAddr {
    ProtoAddr::new(&[10, 0, 0, last])
}

pub fn test_lookup_empty_table() -> TestResult {
    let (table, _clock) = fresh_table();
    assert_test!(
        table.lookup(&addr(1), IfaceId(0)).is_none(),
        "lookup on empty table should return None"
    );
    pass!()
}

pub fn test_create_then_lookup_round_trips() -> TestResult {
    let (table, _clock) = fresh_table();
    let iface = mock_iface(0);
    let entry = assert_ok!(table.create(&addr(1), IfaceId(0), iface.clone()));
    let found = table.lookup(&addr(1), IfaceId(0));
    assert_test!(found.is_some(), "lookup should find the just-created entry");
    assert_test!(
        Arc::ptr_eq(&entry, &found.unwrap()),
        "lookup should return the same entry instance"
    );
    assert_eq_test!(table.len(), 1);
    pass!()
}

pub fn test_resolution_flushes_queue() -> TestResult {
    reset_counters();
    let (table, clock) = fresh_table();
    let iface = mock_iface(0);
    let entry = assert_ok!(table.create(&addr(2), IfaceId(0), iface));
    assert_eq_test!(entry.read().nud, NudState::None);

    let outcome = assert_ok!(resolve_and_send(&table, &entry, mock_frame()));
    assert_test!(
        matches!(outcome, ResolveOutcome::Pending),
        "first send on NONE should queue pending resolution"
    );
    assert_eq_test!(entry.read().nud, NudState::Incomplete);

    clock.advance(1);
    nud::on_timer(&table, &entry);
    assert_eq_test!(SOLICITS.load(Ordering::Relaxed), 1);

    let peer_mac = LlAddr::new(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x02]);
    nud::on_solicit_reply(&table, &entry, peer_mac, false);
    assert_eq_test!(entry.read().nud, NudState::Reachable);
    assert_eq_test!(TRANSMITTED.load(Ordering::Relaxed), 1);
    assert_test!(entry.read().queue.is_empty(), "queue should drain on resolve");

    pass!()
}

pub fn test_exhausted_probes_fail_and_report() -> TestResult {
    reset_counters();
    let (table, clock) = fresh_table();
    let iface = mock_iface(0);
    let entry = assert_ok!(table.create(&addr(3), IfaceId(0), iface));
    entry.params.ucast_probes.store(1, Ordering::Relaxed);
    entry.params.mcast_probes.store(0, Ordering::Relaxed);
    entry.params.app_probes.store(0, Ordering::Relaxed);

    let _ = assert_ok!(resolve_and_send(&table, &entry, mock_frame()));
    clock.advance(1);
    nud::on_timer(&table, &entry); // probes 0 -> 1, budget is 1, still INCOMPLETE
    assert_eq_test!(entry.read().nud, NudState::Incomplete);
    clock.advance(entry.params.retrans_time());
    nud::on_timer(&table, &entry); // budget exhausted -> FAILED
    assert_eq_test!(entry.read().nud, NudState::Failed);
    assert_eq_test!(ERRORS_REPORTED.load(Ordering::Relaxed), 1);

    pass!()
}

pub fn test_reachable_use_past_timeout_goes_stale_then_delay() -> TestResult {
    reset_counters();
    let (table, clock) = fresh_table();
    let iface = mock_iface(0);
    let entry = assert_ok!(table.create(&addr(4), IfaceId(0), iface));

    let mac = LlAddr::new(&[1, 2, 3, 4, 5, 6]);
    assert_ok!(nud::update(&table, &entry, mac, NudState::Reachable, true));
    assert_eq_test!(entry.read().nud, NudState::Reachable);

    let reachable_time = entry.params.reachable_time();
    clock.advance(reachable_time + entry.params.delay_probe_time() + 1);
    nud::on_timer(&table, &entry);
    assert_eq_test!(entry.read().nud, NudState::Stale);

    let outcome = assert_ok!(resolve_and_send(&table, &entry, mock_frame()));
    assert_test!(matches!(outcome, ResolveOutcome::Sent));
    assert_eq_test!(entry.read().nud, NudState::Delay);

    pass!()
}

pub fn test_locktime_refuses_rapid_override() -> TestResult {
    let (table, clock) = fresh_table();
    let iface = mock_iface(0);
    let entry = assert_ok!(table.create(&addr(5), IfaceId(0), iface));

    let mac_a = LlAddr::new(&[1, 1, 1, 1, 1, 1]);
    // Admin install establishes the updated_ms baseline without the locktime
    // guard (which only applies to non-admin callers) getting in the way.
    assert_ok!(nud::update(&table, &entry, mac_a, NudState::Stale, true));

    clock.advance(1);
    let mac_b = LlAddr::new(&[2, 2, 2, 2, 2, 2]);
    let result = nud::update(&table, &entry, mac_b, NudState::Stale, false);
    assert_test!(
        matches!(result, Err(NeighError::InvalidUpdate)),
        "override within locktime should be refused"
    );
    assert_eq_test!(entry.read().ll_addr, mac_a);

    // Past the locktime window, a non-admin override is accepted.
    clock.advance(entry.params.locktime());
    assert_ok!(nud::update(&table, &entry, mac_b, NudState::Stale, false));
    assert_eq_test!(entry.read().ll_addr, mac_b);

    pass!()
}

pub fn test_forced_gc_reclaims_unreferenced_only() -> TestResult {
    let (table, _clock) = fresh_table();
    let iface = mock_iface(0);
    let kept = assert_ok!(table.create(&addr(10), IfaceId(0), iface.clone()));
    let transient = assert_ok!(table.create(&addr(11), IfaceId(0), iface));
    // Drop every external reference to the second entry so its refcount is 1.
    drop(transient);
    table.forced_gc();
    // `kept` is still held externally, so only the unreferenced entry is reclaimed.
    assert_eq_test!(table.len(), 1);
    drop(kept);
    table.forced_gc();
    assert_eq_test!(table.len(), 0);

    pass!()
}

pub fn test_proxy_reply_within_delay_window() -> TestResult {
    reset_counters();
    let (table, clock) = fresh_table();
    let iface = mock_iface(0);
    table.proxy.add(addr(20), None);
    assert_test!(table.proxy.matches(&addr(20), IfaceId(0)));

    for t in [0u64, 100, 200] {
        clock.set(t);
        table.proxy.schedule_reply(addr(20), iface.clone(), mock_frame(), t, 800, 64);
    }

    clock.set(0);
    clock.advance(1000);
    let dispatched = table.proxy.poll(clock.now_ms());
    assert_eq_test!(dispatched, 3);
    assert_eq_test!(PROXY_REPLIES.load(Ordering::Relaxed), 3);
    assert_test!(table.proxy.next_deadline().is_none());

    pass!()
}

define_test_suite!(
    neigh,
    [
        test_lookup_empty_table,
        test_create_then_lookup_round_trips,
        test_resolution_flushes_queue,
        test_exhausted_probes_fail_and_report,
        test_reachable_use_past_timeout_goes_stale_then_delay,
        test_locktime_refuses_rapid_override,
        test_forced_gc_reclaims_unreferenced_only,
        test_proxy_reply_within_delay_window,
    ]
);
