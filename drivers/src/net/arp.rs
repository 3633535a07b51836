//! ARP: the concrete address-resolution instance wired into `slopos_neigh`.
//!
//! [`EthernetInterface`] adapts a [`DeviceHandle`] to `slopos_neigh::Interface`;
//! [`ArpProtocol`] implements `slopos_neigh::Protocol` against it, building and
//! parsing RFC 826 frames over the wire. [`handle_rx`] is the inbound path,
//! called once per received ARP frame by the NAPI loop; outbound resolution
//! goes through `slopos_neigh::resolve_and_send` against an [`ArpTable`].

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use slopos_lib::{klog_debug, klog_warn};

use slopos_neigh::{
    nud, Frame, IfaceId, Interface, InterfaceKind, LlAddr, NeighError, NeighResult, NudState,
    ProtoAddr, Protocol, Table,
};

use super::ethernet::{ETH_ADDR_LEN, ETH_BROADCAST, ETH_HEADER_LEN};
use super::netdev::DeviceHandle;
use super::packetbuf::PacketBuf;
use super::types::{Ipv4Addr, MacAddr, NetError};
use super::{
    ARP_HEADER_LEN, ARP_HLEN_ETHERNET, ARP_HTYPE_ETHERNET, ARP_OPER_REPLY, ARP_OPER_REQUEST,
    ARP_PLEN_IPV4, ARP_PTYPE_IPV4, ETHERTYPE_ARP, ETHERTYPE_IPV4,
};

/// The neighbour table instantiated for ARP over Ethernet/IPv4.
pub type ArpTable = Table<ArpProtocol>;

// =============================================================================
// EthernetInterface — the `Interface` adapter
// =============================================================================

/// Adapts a registered [`DeviceHandle`] to `slopos_neigh`'s generic
/// `Interface` trait. Carries the one piece of state the generic trait has
/// no room for: this interface's own IPv4 address, needed to fill the
/// sender-protocol-address field of outgoing ARP frames and to recognize
/// requests addressed to us.
pub struct EthernetInterface {
    handle: DeviceHandle,
    ipv4: AtomicU32,
}

impl EthernetInterface {
    pub fn new(handle: DeviceHandle, ipv4: Ipv4Addr) -> Self {
        Self {
            handle,
            ipv4: AtomicU32::new(ipv4.to_u32_be()),
        }
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::from_u32_be(self.ipv4.load(Ordering::Relaxed))
    }

    pub fn set_ipv4(&self, addr: Ipv4Addr) {
        self.ipv4.store(addr.to_u32_be(), Ordering::Relaxed);
    }

    pub fn mac(&self) -> MacAddr {
        self.handle.mac()
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl Interface for EthernetInterface {
    fn id(&self) -> IfaceId {
        IfaceId(self.handle.index().0)
    }

    fn hw_address(&self) -> LlAddr {
        LlAddr::new(self.handle.mac().as_bytes())
    }

    fn broadcast_address(&self) -> LlAddr {
        LlAddr::new(&ETH_BROADCAST)
    }

    fn address_length(&self) -> u8 {
        ETH_ADDR_LEN as u8
    }

    fn mtu(&self) -> u16 {
        self.handle.mtu()
    }

    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Broadcast
    }

    fn build_header(&self, frame: &mut Frame, dst_l2: &LlAddr) -> NeighResult<()> {
        let mut framed = Vec::with_capacity(ETH_HEADER_LEN + frame.payload.len());
        framed.extend_from_slice(dst_l2.as_bytes());
        framed.extend_from_slice(self.hw_address().as_bytes());
        framed.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        framed.extend_from_slice(&frame.payload);
        frame.payload = framed.into_boxed_slice();
        Ok(())
    }

    fn dev_transmit(&self, frame: Frame) -> NeighResult<()> {
        let pkt = PacketBuf::from_raw_copy(&frame.payload).ok_or(NeighError::TransmitFailed)?;
        self.handle.tx(pkt).map_err(|_| NeighError::TransmitFailed)
    }
}

// =============================================================================
// ArpProtocol — the `Protocol` adapter
// =============================================================================

/// RFC 826 ARP over Ethernet/IPv4, as a `slopos_neigh::Protocol` instance.
pub struct ArpProtocol;

impl Protocol for ArpProtocol {
    type Interface = EthernetInterface;

    fn hash(addr: &ProtoAddr, iface: IfaceId, key: u64) -> u64 {
        let mut acc = key ^ (iface.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        for b in addr.as_bytes() {
            acc = acc.wrapping_mul(0x0000_0100_0000_01B3).wrapping_add(*b as u64);
        }
        acc
    }

    fn solicit(iface: &Self::Interface, target: &ProtoAddr, probe_num: u32) {
        let Some(target_ip) = ipv4_from_proto(target) else {
            return;
        };
        klog_debug!(
            "arp: soliciting {} on dev {} (probe {})",
            target_ip,
            iface.handle().index(),
            probe_num
        );
        if let Err(e) = send_request(iface, target_ip) {
            klog_debug!("arp: solicit tx failed: {}", e);
        }
    }

    fn error_report(iface: &Self::Interface, _frame: Frame) {
        klog_debug!(
            "arp: resolution failed on dev {}, frame discarded",
            iface.handle().index()
        );
    }

    fn proxy_reply(iface: &Self::Interface, target: &ProtoAddr, request: Frame) {
        let Some(target_ip) = ipv4_from_proto(target) else {
            return;
        };
        let Some((requester_mac, requester_ip)) = parse_arp_header(&request.payload) else {
            return;
        };
        if let Err(e) = send_reply(iface, requester_ip, requester_mac, target_ip) {
            klog_debug!("arp: proxy reply tx failed: {}", e);
        }
    }

    fn fabricate_l2(addr: &ProtoAddr, iface: &Self::Interface) -> Option<LlAddr> {
        let target_ip = ipv4_from_proto(addr)?;
        if target_ip.is_broadcast() || target_ip.is_multicast() {
            return Some(iface.broadcast_address());
        }
        None
    }
}

fn ipv4_from_proto(addr: &ProtoAddr) -> Option<Ipv4Addr> {
    let bytes = addr.as_bytes();
    if bytes.len() != 4 {
        return None;
    }
    Some(Ipv4Addr::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn proto_from_ipv4(addr: Ipv4Addr) -> ProtoAddr {
    ProtoAddr::new(addr.as_bytes())
}

/// Recover `(sender_mac, sender_ip)` from a raw, [`ARP_HEADER_LEN`]-byte ARP
/// header, as captured by [`handle_rx`] when scheduling a proxy reply.
fn parse_arp_header(payload: &[u8]) -> Option<(MacAddr, Ipv4Addr)> {
    if payload.len() < ARP_HEADER_LEN {
        return None;
    }
    let mac = MacAddr([
        payload[8], payload[9], payload[10], payload[11], payload[12], payload[13],
    ]);
    let ip = Ipv4Addr::from_bytes([payload[14], payload[15], payload[16], payload[17]]);
    Some((mac, ip))
}

// =============================================================================
// Frame construction
// =============================================================================

/// Build and transmit an Ethernet+ARP frame. `sender_ip` fills the ARP
/// sender-protocol-address field (our own address for a direct reply or
/// request, the proxied address for a proxy reply); the Ethernet and ARP
/// sender hardware address is always this interface's own MAC.
fn build_and_send(
    iface: &EthernetInterface,
    dst_mac: MacAddr,
    oper: u16,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Result<(), NetError> {
    let our_mac = iface.mac();

    let mut pkt = PacketBuf::alloc().ok_or(NetError::NoBufferSpace)?;

    let arp = pkt.push_header(ARP_HEADER_LEN)?;
    arp[0..2].copy_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
    arp[2..4].copy_from_slice(&ARP_PTYPE_IPV4.to_be_bytes());
    arp[4] = ARP_HLEN_ETHERNET;
    arp[5] = ARP_PLEN_IPV4;
    arp[6..8].copy_from_slice(&oper.to_be_bytes());
    arp[8..14].copy_from_slice(our_mac.as_bytes());
    arp[14..18].copy_from_slice(sender_ip.as_bytes());
    arp[18..24].copy_from_slice(target_mac.as_bytes());
    arp[24..28].copy_from_slice(target_ip.as_bytes());

    let eth = pkt.push_header(ETH_HEADER_LEN)?;
    eth[0..ETH_ADDR_LEN].copy_from_slice(dst_mac.as_bytes());
    eth[ETH_ADDR_LEN..ETH_ADDR_LEN * 2].copy_from_slice(our_mac.as_bytes());
    eth[ETH_ADDR_LEN * 2..ETH_HEADER_LEN].copy_from_slice(&ETHERTYPE_ARP.to_be_bytes());
    pkt.set_l2(pkt.head());

    iface.handle().tx(pkt)
}

fn send_request(iface: &EthernetInterface, target_ip: Ipv4Addr) -> Result<(), NetError> {
    build_and_send(
        iface,
        MacAddr::BROADCAST,
        ARP_OPER_REQUEST,
        iface.ipv4(),
        MacAddr::ZERO,
        target_ip,
    )
}

fn send_reply(
    iface: &EthernetInterface,
    requester_ip: Ipv4Addr,
    requester_mac: MacAddr,
    claimed_ip: Ipv4Addr,
) -> Result<(), NetError> {
    build_and_send(
        iface,
        requester_mac,
        ARP_OPER_REPLY,
        claimed_ip,
        requester_mac,
        requester_ip,
    )
}

// =============================================================================
// Inbound path
// =============================================================================

/// Handle one received frame. `pkt`'s active region starts at the Ethernet
/// header; non-ARP frames are dropped (the caller is expected to demux on
/// ethertype before handing ARP frames here, but this guards against a
/// mis-wired caller too).
pub fn handle_rx(table: &ArpTable, iface: &Arc<EthernetInterface>, mut pkt: PacketBuf) {
    let Ok(eth) = pkt.pull_header(ETH_HEADER_LEN) else {
        return;
    };
    let ethertype = u16::from_be_bytes([eth[ETH_ADDR_LEN * 2], eth[ETH_ADDR_LEN * 2 + 1]]);
    if ethertype != ETHERTYPE_ARP {
        klog_debug!("arp: dropping non-ARP frame (ethertype {:#06x})", ethertype);
        return;
    }

    let Ok(arp) = pkt.pull_header(ARP_HEADER_LEN) else {
        klog_debug!("arp: frame shorter than the ARP header");
        return;
    };

    let htype = u16::from_be_bytes([arp[0], arp[1]]);
    let ptype = u16::from_be_bytes([arp[2], arp[3]]);
    let hlen = arp[4];
    let plen = arp[5];
    let oper = u16::from_be_bytes([arp[6], arp[7]]);

    if htype != ARP_HTYPE_ETHERNET || ptype != ARP_PTYPE_IPV4 || hlen != ARP_HLEN_ETHERNET || plen != ARP_PLEN_IPV4 {
        klog_debug!(
            "arp: malformed header (htype={}, ptype={:#06x}, hlen={}, plen={})",
            htype,
            ptype,
            hlen,
            plen
        );
        return;
    }

    let sender_mac = MacAddr([arp[8], arp[9], arp[10], arp[11], arp[12], arp[13]]);
    let sender_ip = Ipv4Addr::from_bytes([arp[14], arp[15], arp[16], arp[17]]);
    let target_ip = Ipv4Addr::from_bytes([arp[24], arp[25], arp[26], arp[27]]);
    let arp_header: Vec<u8> = arp.to_vec();

    if sender_mac.is_broadcast() || sender_mac.is_multicast() {
        klog_debug!("arp: dropping frame with a non-unicast sender hardware address");
        return;
    }

    let our_ip = iface.ipv4();
    if sender_ip.is_unspecified() {
        if target_ip == our_ip {
            klog_warn!("arp: probe for our address {} from {} (DAD)", our_ip, sender_mac);
        }
    } else if sender_ip == our_ip {
        klog_warn!("arp: {} claims our address {}", sender_mac, our_ip);
    } else {
        learn(table, iface, sender_ip, sender_mac);
    }

    if oper != ARP_OPER_REQUEST {
        return;
    }

    if !our_ip.is_unspecified() && target_ip == our_ip {
        if let Err(e) = send_reply(iface, sender_ip, sender_mac, our_ip) {
            klog_debug!("arp: reply tx failed: {}", e);
        }
        return;
    }

    let target_proto = proto_from_ipv4(target_ip);
    if table.proxy.matches(&target_proto, iface.id()) {
        let params = table.params_for(iface.id());
        let request = Frame::new(arp_header.into_boxed_slice());
        table.proxy.schedule_reply(
            target_proto,
            iface.clone(),
            request,
            table.now_ms(),
            params.proxy_delay(),
            params.proxy_qlen(),
        );
    }
}

/// Opportunistic learning (RFC 826): refresh an *existing* entry's binding
/// from a passively observed sender address/MAC pair. Never creates a new
/// entry — only a solicited lookup does that.
fn learn(table: &ArpTable, iface: &Arc<EthernetInterface>, sender_ip: Ipv4Addr, sender_mac: MacAddr) {
    let Some(entry) = table.lookup(&proto_from_ipv4(sender_ip), iface.id()) else {
        return;
    };
    let ll = LlAddr::new(sender_mac.as_bytes());
    let current = entry.read().nud;
    if current == NudState::Incomplete {
        nud::on_solicit_reply(table, &entry, ll, false);
    } else if current.valid() {
        let _ = nud::update(table, &entry, ll, NudState::Stale, false);
    }
}
