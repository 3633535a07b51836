//! Tests for the ARP adapter (`EthernetInterface`/`ArpProtocol`/`handle_rx`).
//!
//! Covers:
//! - interface property plumbing and Ethernet header construction
//! - `fabricate_l2` for broadcast/multicast IPv4 targets
//! - inbound direct-reply, opportunistic learning, DAD, and proxy dispatch

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use slopos_lib::testing::TestResult;
use slopos_lib::{IrqMutex, assert_eq_test, assert_test, define_test_suite, pass};

use slopos_neigh::{Frame, IfaceId, Interface, NeighError, NudState, Protocol, Table};

use super::arp::{ArpProtocol, ArpTable, EthernetInterface, handle_rx};
use super::ethernet::{ETH_ADDR_LEN, ETH_HEADER_LEN, ETHERTYPE_ARP};
use super::netdev::{DEVICE_REGISTRY, NetDevice, NetDeviceFeatures, NetDeviceStats};
use super::packetbuf::PacketBuf;
use super::pool::{BUF_SIZE, PACKET_POOL};
use super::types::{Ipv4Addr, MacAddr, NetError};
use super::{ARP_HEADER_LEN, ARP_HLEN_ETHERNET, ARP_HTYPE_ETHERNET, ARP_OPER_REPLY, ARP_OPER_REQUEST, ARP_PLEN_IPV4, ARP_PTYPE_IPV4};

/// Frames handed to `NetDevice::tx`, shared between a `RecordingDevice` and
/// whichever test registered it.
type SentLog = Arc<IrqMutex<Vec<Box<[u8]>>>>;

/// A device that records every transmitted packet instead of touching real
/// hardware. Never has pending RX — `handle_rx` is driven directly in tests.
struct RecordingDevice {
    mac: MacAddr,
    sent: SentLog,
}

impl NetDevice for RecordingDevice {
    fn tx(&self, pkt: PacketBuf) -> Result<(), NetError> {
        self.sent.lock().push(pkt.payload().to_vec().into_boxed_slice());
        Ok(())
    }
    fn poll_rx(&self, _budget: usize, _pool: &'static super::pool::PacketPool) -> Vec<PacketBuf> {
        Vec::new()
    }
    fn set_up(&self) {}
    fn set_down(&self) {}
    fn mtu(&self) -> u16 {
        1500
    }
    fn mac(&self) -> MacAddr {
        self.mac
    }
    fn stats(&self) -> NetDeviceStats {
        NetDeviceStats::new()
    }
    fn features(&self) -> NetDeviceFeatures {
        NetDeviceFeatures::empty()
    }
}

fn ensure_pool_init() {
    PACKET_POOL.init();
}

fn mock_iface_with_log(mac: MacAddr, ip: Ipv4Addr) -> (Arc<EthernetInterface>, SentLog) {
    let sent: SentLog = Arc::new(IrqMutex::new(Vec::new()));
    let dev = RecordingDevice { mac, sent: sent.clone() };
    let handle = DEVICE_REGISTRY
        .register(Box::new(dev))
        .expect("registry should have free slots for tests");
    (Arc::new(EthernetInterface::new(handle, ip)), sent)
}

fn mock_iface(mac: MacAddr, ip: Ipv4Addr) -> Arc<EthernetInterface> {
    mock_iface_with_log(mac, ip).0
}

/// Returns the device's slot to the registry. The registry has only
/// `MAX_DEVICES` slots, so every test that registers one must give it back.
fn release_iface(iface: &EthernetInterface) {
    DEVICE_REGISTRY.unregister(iface.handle().index());
}

fn arp_request_frame(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> PacketBuf {
    raw_arp_frame(sender_mac, sender_ip, MacAddr::ZERO, target_ip, ARP_OPER_REQUEST)
}

fn raw_arp_frame(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
    oper: u16,
) -> PacketBuf {
    let mut pkt = PacketBuf::alloc().expect("pool should have capacity");

    let arp = pkt.push_header(ARP_HEADER_LEN).expect("headroom for arp header");
    arp[0..2].copy_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
    arp[2..4].copy_from_slice(&ARP_PTYPE_IPV4.to_be_bytes());
    arp[4] = ARP_HLEN_ETHERNET;
    arp[5] = ARP_PLEN_IPV4;
    arp[6..8].copy_from_slice(&oper.to_be_bytes());
    arp[8..14].copy_from_slice(sender_mac.as_bytes());
    arp[14..18].copy_from_slice(sender_ip.as_bytes());
    arp[18..24].copy_from_slice(target_mac.as_bytes());
    arp[24..28].copy_from_slice(target_ip.as_bytes());

    let eth = pkt.push_header(ETH_HEADER_LEN).expect("headroom for eth header");
    eth[0..ETH_ADDR_LEN].copy_from_slice(&[0xff; 6]);
    eth[ETH_ADDR_LEN..ETH_ADDR_LEN * 2].copy_from_slice(sender_mac.as_bytes());
    eth[ETH_ADDR_LEN * 2..ETH_HEADER_LEN].copy_from_slice(&ETHERTYPE_ARP.to_be_bytes());

    pkt
}

pub fn test_interface_reports_device_properties() -> TestResult {
    let mac = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    let ip = Ipv4Addr([10, 0, 0, 1]);
    let iface = mock_iface(mac, ip);

    assert_eq_test!(iface.hw_address().as_bytes(), mac.as_bytes());
    assert_eq_test!(iface.ipv4().as_bytes(), ip.as_bytes());
    assert_eq_test!(iface.broadcast_address().as_bytes(), &[0xff; 6]);
    assert_eq_test!(iface.mtu(), 1500);

    release_iface(&iface);
    pass!()
}

pub fn test_build_header_prepends_ethernet_frame() -> TestResult {
    let mac = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    let iface = mock_iface(mac, Ipv4Addr([10, 0, 0, 2]));
    let dst = slopos_neigh::LlAddr::new(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x09]);

    let mut frame = Frame::new(Box::new([0xAB, 0xCD, 0xEF]));
    iface.build_header(&mut frame, &dst).expect("build_header should succeed");

    assert_eq_test!(frame.payload.len(), ETH_HEADER_LEN + 3);
    assert_eq_test!(&frame.payload[0..6], dst.as_bytes());
    assert_eq_test!(&frame.payload[6..12], mac.as_bytes());
    assert_eq_test!(&frame.payload[ETH_HEADER_LEN..], &[0xAB, 0xCD, 0xEF]);

    release_iface(&iface);
    pass!()
}

pub fn test_dev_transmit_rejects_oversized_frame() -> TestResult {
    let iface = mock_iface(MacAddr([0x02, 0, 0, 0, 0, 3]), Ipv4Addr([10, 0, 0, 3]));
    let oversized = Frame::new(alloc::vec![0u8; BUF_SIZE + 1].into_boxed_slice());

    let result = iface.dev_transmit(oversized);
    assert_test!(matches!(result, Err(NeighError::TransmitFailed)));

    release_iface(&iface);
    pass!()
}

pub fn test_fabricate_l2_covers_broadcast_and_multicast() -> TestResult {
    let iface = mock_iface(MacAddr([0x02, 0, 0, 0, 0, 4]), Ipv4Addr([10, 0, 0, 4]));

    let bcast = slopos_neigh::ProtoAddr::new(Ipv4Addr::BROADCAST.as_bytes());
    let mcast = slopos_neigh::ProtoAddr::new(&[224, 0, 0, 1]);
    let unicast = slopos_neigh::ProtoAddr::new(&[10, 0, 0, 99]);

    assert_test!(ArpProtocol::fabricate_l2(&bcast, &iface) == Some(iface.broadcast_address()));
    assert_test!(ArpProtocol::fabricate_l2(&mcast, &iface) == Some(iface.broadcast_address()));
    assert_test!(ArpProtocol::fabricate_l2(&unicast, &iface).is_none());

    release_iface(&iface);
    pass!()
}

pub fn test_hash_differs_by_interface() -> TestResult {
    let addr = slopos_neigh::ProtoAddr::new(&[10, 0, 0, 5]);
    let h0 = ArpProtocol::hash(&addr, IfaceId(0), 42);
    let h1 = ArpProtocol::hash(&addr, IfaceId(1), 42);
    assert_test!(h0 != h1, "hash should vary with interface id");

    pass!()
}

pub fn test_handle_rx_request_for_our_ip_sends_direct_reply() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 6]);
    let our_ip = Ipv4Addr([10, 0, 0, 6]);
    let (iface, sent) = mock_iface_with_log(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-direct");

    let requester_mac = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x06]);
    let requester_ip = Ipv4Addr([10, 0, 0, 7]);
    let pkt = arp_request_frame(requester_mac, requester_ip, our_ip);

    handle_rx(&table, &iface, pkt);

    let log = sent.lock();
    assert_eq_test!(log.len(), 1, "exactly one reply should be transmitted");
    let reply = &log[0];
    assert_eq_test!(&reply[0..6], requester_mac.as_bytes(), "reply eth dst should be the requester");
    assert_eq_test!(&reply[6..12], our_mac.as_bytes(), "reply eth src should be our mac");
    let arp = &reply[ETH_HEADER_LEN..];
    assert_eq_test!(u16::from_be_bytes([arp[6], arp[7]]), ARP_OPER_REPLY);
    assert_eq_test!(&arp[8..14], our_mac.as_bytes(), "sender hw address should be ours");
    assert_eq_test!(&arp[14..18], our_ip.as_bytes(), "sender protocol address should be our ip");
    assert_eq_test!(&arp[18..24], requester_mac.as_bytes(), "target hw address should be the requester");
    assert_eq_test!(&arp[24..28], requester_ip.as_bytes(), "target protocol address should be the requester");

    drop(log);
    release_iface(&iface);
    pass!()
}

pub fn test_handle_rx_dad_probe_does_not_learn() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 7]);
    let our_ip = Ipv4Addr([10, 0, 0, 8]);
    let (iface, sent) = mock_iface_with_log(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-dad");

    let prober_mac = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x07]);
    let pkt = arp_request_frame(prober_mac, Ipv4Addr::UNSPECIFIED, our_ip);

    handle_rx(&table, &iface, pkt);
    assert_eq_test!(table.len(), 0, "a probe with sender 0.0.0.0 should never be learned as a binding");
    // The target collides with our own address, so we still answer — this is
    // the conflicting-probe case, not a silently dropped packet.
    assert_eq_test!(sent.lock().len(), 1, "a probe targeting our address still gets a reply");

    release_iface(&iface);
    pass!()
}

pub fn test_handle_rx_rejects_broadcast_sender() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 8]);
    let our_ip = Ipv4Addr([10, 0, 0, 9]);
    let iface = mock_iface(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-bcast-sender");

    let pkt = arp_request_frame(MacAddr::BROADCAST, Ipv4Addr([10, 0, 0, 10]), our_ip);
    handle_rx(&table, &iface, pkt);
    assert_eq_test!(table.len(), 0, "broadcast sender hardware address must be dropped");

    release_iface(&iface);
    pass!()
}

pub fn test_handle_rx_learns_incomplete_entry() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 9]);
    let our_ip = Ipv4Addr([10, 0, 0, 11]);
    let iface = mock_iface(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-learn");

    let peer_ip = Ipv4Addr([10, 0, 0, 12]);
    let peer_mac = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x09]);
    let peer_proto = slopos_neigh::ProtoAddr::new(peer_ip.as_bytes());

    let entry = table
        .create(&peer_proto, iface.id(), iface.clone())
        .expect("create should succeed");
    assert_eq_test!(entry.read().nud, NudState::None);
    slopos_neigh::nud::on_use(&table, &entry, Frame::new(Box::new([0u8; 4])));
    assert_eq_test!(entry.read().nud, NudState::Incomplete);

    let pkt = arp_request_frame(peer_mac, peer_ip, Ipv4Addr([10, 0, 0, 250]));
    handle_rx(&table, &iface, pkt);

    assert_eq_test!(entry.read().nud, NudState::Reachable);
    assert_eq_test!(entry.read().ll_addr.as_bytes(), peer_mac.as_bytes());

    drop(entry);
    release_iface(&iface);
    pass!()
}

pub fn test_handle_rx_does_not_create_new_entries() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 10]);
    let our_ip = Ipv4Addr([10, 0, 0, 13]);
    let iface = mock_iface(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-no-create");

    let stranger_mac = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x0A]);
    let stranger_ip = Ipv4Addr([10, 0, 0, 14]);
    let pkt = arp_request_frame(stranger_mac, stranger_ip, Ipv4Addr([10, 0, 0, 250]));

    handle_rx(&table, &iface, pkt);
    assert_eq_test!(table.len(), 0, "passive observation must never create an entry");

    release_iface(&iface);
    pass!()
}

pub fn test_handle_rx_schedules_proxy_reply() -> TestResult {
    ensure_pool_init();
    let our_mac = MacAddr([0x02, 0, 0, 0, 0, 11]);
    let our_ip = Ipv4Addr([10, 0, 0, 15]);
    let iface = mock_iface(our_mac, our_ip);
    let table: ArpTable = Table::new("test-arp-proxy");

    let proxied_ip = Ipv4Addr([10, 0, 0, 16]);
    table.proxy.add(slopos_neigh::ProtoAddr::new(proxied_ip.as_bytes()), None);

    let requester_mac = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x0B]);
    let requester_ip = Ipv4Addr([10, 0, 0, 17]);
    let pkt = arp_request_frame(requester_mac, requester_ip, proxied_ip);

    handle_rx(&table, &iface, pkt);
    assert_test!(table.proxy.next_deadline().is_some(), "proxy reply should be queued");

    release_iface(&iface);
    pass!()
}

define_test_suite!(
    arp,
    [
        test_interface_reports_device_properties,
        test_build_header_prepends_ethernet_frame,
        test_dev_transmit_rejects_oversized_frame,
        test_fabricate_l2_covers_broadcast_and_multicast,
        test_hash_differs_by_interface,
        test_handle_rx_request_for_our_ip_sends_direct_reply,
        test_handle_rx_dad_probe_does_not_learn,
        test_handle_rx_rejects_broadcast_sender,
        test_handle_rx_learns_incomplete_entry,
        test_handle_rx_does_not_create_new_entries,
        test_handle_rx_schedules_proxy_reply,
    ]
);
