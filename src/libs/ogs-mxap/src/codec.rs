//! MxAP Protocol IE Container Codec
//!
//! Octet-aligned rendering of the M2AP/M3AP PDU structure:
//!
//! ```text
//! +-----------+----------------+-------------+----------+
//! | direction | procedure code | criticality | IE count |   header (5 octets)
//! +-----------+----------------+-------------+----------+
//! | IE id (2) | criticality (1) | length (2) | value ... |   repeated
//! ```
//!
//! The ASN.1 APER transfer syntax lives outside this crate; the container
//! keeps the same procedure/IE layering so a personality only has to supply
//! its procedure-code and IE-id tables (`WireProfile`).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MxapError, MxapResult};
use crate::pdu::*;
use crate::types::*;

/// Marker bit set on service-area values inside session PDUs
pub const SERVICE_AREA_MARKER: u32 = 1 << 16;

/// Container header length
const HEADER_LEN: usize = 5;
/// Per-IE header length
const IE_HEADER_LEN: usize = 5;

// ============================================================================
// Wire profile
// ============================================================================

/// Protocol IE identifiers of one personality
#[derive(Debug, Clone, Copy)]
pub struct IeIds {
    /// Our MBMS session id
    pub local_id: u16,
    /// The peer's MBMS session id
    pub remote_id: u16,
    pub tmgi: u16,
    pub service_area: u16,
    pub qos: u16,
    pub tnl_information: u16,
    pub cause: u16,
    pub time_to_wait: u16,
    pub reset_type: u16,
    pub reset_ack_list: u16,
    pub global_node_id: u16,
    pub node_name: u16,
    pub service_area_list: u16,
    pub mbsfn_area_list: u16,
}

/// Everything the codec needs to know about a personality's wire format
#[derive(Debug)]
pub struct WireProfile {
    pub name: &'static str,
    /// Wire procedure code to procedure
    pub procedures: &'static [(u8, Procedure)],
    pub ie: IeIds,
    /// Valid bits of our session id
    pub local_id_mask: u32,
    /// Valid bits of the peer's session id
    pub remote_id_mask: u32,
}

impl WireProfile {
    pub fn procedure(&self, code: u8) -> Option<Procedure> {
        self.procedures
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, p)| *p)
    }

    pub fn procedure_code(&self, procedure: Procedure) -> Option<u8> {
        self.procedures
            .iter()
            .find(|(_, p)| *p == procedure)
            .map(|(c, _)| *c)
    }
}

// ============================================================================
// IE container
// ============================================================================

/// One protocol IE
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolIe {
    pub id: u16,
    pub criticality: Criticality,
    pub value: Bytes,
}

/// A PDU as a list of protocol IEs
#[derive(Debug, Clone, PartialEq)]
pub struct IeContainer {
    pub direction: Direction,
    pub procedure_code: u8,
    pub criticality: Criticality,
    pub ies: Vec<ProtocolIe>,
}

impl IeContainer {
    pub fn new(direction: Direction, procedure_code: u8, criticality: Criticality) -> Self {
        Self {
            direction,
            procedure_code,
            criticality,
            ies: Vec::new(),
        }
    }

    pub fn push(&mut self, id: u16, criticality: Criticality, value: Bytes) {
        self.ies.push(ProtocolIe { id, criticality, value });
    }

    pub fn find(&self, id: u16) -> Option<&ProtocolIe> {
        self.ies.iter().find(|ie| ie.id == id)
    }

    pub fn encode(&self) -> MxapResult<Bytes> {
        if self.ies.len() > u16::MAX as usize {
            return Err(MxapError::Encode(format!("too many IEs ({})", self.ies.len())));
        }
        let len = HEADER_LEN
            + self
                .ies
                .iter()
                .map(|ie| IE_HEADER_LEN + ie.value.len())
                .sum::<usize>();
        let mut buf = BytesMut::with_capacity(len);
        buf.put_u8(self.direction as u8);
        buf.put_u8(self.procedure_code);
        buf.put_u8(self.criticality as u8);
        buf.put_u16(self.ies.len() as u16);
        for ie in &self.ies {
            if ie.value.len() > u16::MAX as usize {
                return Err(MxapError::Encode(format!(
                    "IE {} value too long ({} octets)",
                    ie.id,
                    ie.value.len()
                )));
            }
            buf.put_u16(ie.id);
            buf.put_u8(ie.criticality as u8);
            buf.put_u16(ie.value.len() as u16);
            buf.put_slice(&ie.value);
        }
        Ok(buf.freeze())
    }

    pub fn decode(data: &[u8]) -> MxapResult<Self> {
        let mut r = Reader::new(data);
        let direction = Direction::try_from(r.u8()?).map_err(MxapError::UnknownDirection)?;
        let procedure_code = r.u8()?;
        let criticality = Criticality::try_from(r.u8()?)
            .map_err(|c| MxapError::Decode(format!("invalid criticality {c}")))?;
        let count = r.u16()?;
        let mut container = Self::new(direction, procedure_code, criticality);
        for _ in 0..count {
            let id = r.u16()?;
            let criticality = Criticality::try_from(r.u8()?)
                .map_err(|c| MxapError::Decode(format!("invalid IE criticality {c}")))?;
            let len = r.u16()? as usize;
            let value = Bytes::copy_from_slice(r.bytes(len)?);
            container.ies.push(ProtocolIe { id, criticality, value });
        }
        if r.remaining() != 0 {
            return Err(MxapError::Decode(format!("{} trailing octets", r.remaining())));
        }
        Ok(container)
    }
}

/// Bounds-checked reader over an octet slice
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> MxapResult<()> {
        if self.buf.remaining() < n {
            return Err(MxapError::Decode(format!(
                "buffer underflow: need {n} octets, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> MxapResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> MxapResult<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> MxapResult<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> MxapResult<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    fn bytes(&mut self, n: usize) -> MxapResult<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn finish(&self, ie_name: &'static str) -> MxapResult<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(MxapError::InvalidIeValue {
                ie_name,
                reason: format!("{} trailing octets", self.buf.len()),
            })
        }
    }
}

// ============================================================================
// IE values
// ============================================================================

fn put_id(mask: u32, id: u32, ie_name: &'static str) -> MxapResult<Bytes> {
    if id & !mask != 0 {
        return Err(MxapError::InvalidIeValue {
            ie_name,
            reason: format!("{id:#x} exceeds {mask:#x}"),
        });
    }
    let mut b = BytesMut::with_capacity(4);
    b.put_u32(id);
    Ok(b.freeze())
}

fn get_id(mask: u32, ie: &ProtocolIe, ie_name: &'static str) -> MxapResult<u32> {
    let mut r = Reader::new(&ie.value);
    let id = r.u32()?;
    r.finish(ie_name)?;
    Ok(id & mask)
}

fn put_plmn_id(b: &mut BytesMut, plmn_id: &PlmnId) {
    b.put_slice(&plmn_id.to_bytes());
}

fn get_plmn_id(r: &mut Reader<'_>) -> MxapResult<PlmnId> {
    let raw = r.bytes(3)?;
    Ok(PlmnId::from_bytes(&[raw[0], raw[1], raw[2]]))
}

fn put_tmgi(tmgi: &Tmgi) -> MxapResult<Bytes> {
    if tmgi.service_id > 0x00ff_ffff {
        return Err(MxapError::InvalidIeValue {
            ie_name: "TMGI",
            reason: format!("service id {:#x} exceeds 24 bits", tmgi.service_id),
        });
    }
    let mut b = BytesMut::with_capacity(6);
    put_plmn_id(&mut b, &tmgi.plmn_id);
    b.put_uint(tmgi.service_id as u64, 3);
    Ok(b.freeze())
}

fn get_tmgi(ie: &ProtocolIe) -> MxapResult<Tmgi> {
    let mut r = Reader::new(&ie.value);
    let plmn_id = get_plmn_id(&mut r)?;
    let sid = r.bytes(3)?;
    r.finish("TMGI")?;
    let service_id = ((sid[0] as u32) << 16) | ((sid[1] as u32) << 8) | sid[2] as u32;
    Ok(Tmgi { plmn_id, service_id })
}

fn put_service_area(sai: ServiceAreaId) -> Bytes {
    let mut b = BytesMut::with_capacity(4);
    b.put_u32(sai as u32 | SERVICE_AREA_MARKER);
    b.freeze()
}

fn get_service_area(ie: &ProtocolIe) -> MxapResult<ServiceAreaId> {
    let mut r = Reader::new(&ie.value);
    let v = r.u32()?;
    r.finish("MBMS-Service-Area")?;
    Ok((v & 0xffff) as ServiceAreaId)
}

fn put_qos(qos: &BearerQos) -> Bytes {
    let mut b = BytesMut::with_capacity(35);
    b.put_u8(qos.qci);
    b.put_u64(qos.mbr_ul);
    b.put_u64(qos.mbr_dl);
    b.put_u64(qos.gbr_ul);
    b.put_u64(qos.gbr_dl);
    b.put_u8(qos.arp.priority_level);
    b.put_u8(
        (qos.arp.pre_emption_capability as u8) << 1 | qos.arp.pre_emption_vulnerability as u8,
    );
    b.freeze()
}

fn get_qos(ie: &ProtocolIe) -> MxapResult<BearerQos> {
    let mut r = Reader::new(&ie.value);
    let qci = r.u8()?;
    let mbr_ul = r.u64()?;
    let mbr_dl = r.u64()?;
    let gbr_ul = r.u64()?;
    let gbr_dl = r.u64()?;
    let priority_level = r.u8()?;
    let flags = r.u8()?;
    r.finish("MBMS-E-RAB-QoS-Parameters")?;
    Ok(BearerQos {
        qci,
        mbr_ul,
        mbr_dl,
        gbr_ul,
        gbr_dl,
        arp: Arp {
            priority_level,
            pre_emption_capability: flags & 0x02 != 0,
            pre_emption_vulnerability: flags & 0x01 != 0,
        },
    })
}

fn put_ip_addr(b: &mut BytesMut, addr: &IpAddr) {
    match addr {
        IpAddr::V4(v4) => {
            b.put_u8(4);
            b.put_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            b.put_u8(16);
            b.put_slice(&v6.octets());
        }
    }
}

fn get_ip_addr(r: &mut Reader<'_>) -> MxapResult<IpAddr> {
    match r.u8()? {
        4 => {
            let o = r.bytes(4)?;
            Ok(IpAddr::V4(Ipv4Addr::new(o[0], o[1], o[2], o[3])))
        }
        16 => {
            let mut o = [0u8; 16];
            o.copy_from_slice(r.bytes(16)?);
            Ok(IpAddr::V6(Ipv6Addr::from(o)))
        }
        len => Err(MxapError::InvalidIeValue {
            ie_name: "TNL-Information",
            reason: format!("address length {len}"),
        }),
    }
}

/// DL TEID, IP multicast address, source address; each address carries its
/// own length so IPv4 and IPv6 may be mixed.
fn put_tnl(tnl: &IpMcDistribution) -> Bytes {
    let mut b = BytesMut::with_capacity(38);
    b.put_u32(tnl.cteid);
    put_ip_addr(&mut b, &tnl.distribution_address);
    put_ip_addr(&mut b, &tnl.source_address);
    b.freeze()
}

fn get_tnl(ie: &ProtocolIe) -> MxapResult<IpMcDistribution> {
    let mut r = Reader::new(&ie.value);
    let cteid = r.u32()?;
    let distribution_address = get_ip_addr(&mut r)?;
    let source_address = get_ip_addr(&mut r)?;
    r.finish("TNL-Information")?;
    Ok(IpMcDistribution { cteid, distribution_address, source_address })
}

fn put_cause(cause: &Cause) -> Bytes {
    Bytes::copy_from_slice(&[cause.group(), cause.value()])
}

fn get_cause(ie: &ProtocolIe) -> MxapResult<Cause> {
    let mut r = Reader::new(&ie.value);
    let group = r.u8()?;
    let value = r.u8()?;
    r.finish("Cause")?;
    Cause::from_parts(group, value).ok_or(MxapError::InvalidIeValue {
        ie_name: "Cause",
        reason: format!("cause group {group}"),
    })
}

fn put_global_id(plmn_id: &PlmnId, global_id: u32) -> Bytes {
    let mut b = BytesMut::with_capacity(7);
    put_plmn_id(&mut b, plmn_id);
    b.put_u32(global_id);
    b.freeze()
}

fn get_global_id(ie: &ProtocolIe) -> MxapResult<(PlmnId, u32)> {
    let mut r = Reader::new(&ie.value);
    let plmn_id = get_plmn_id(&mut r)?;
    let id = r.u32()?;
    r.finish("Global-ID")?;
    Ok((plmn_id, id))
}

fn get_name(ie: &ProtocolIe) -> MxapResult<String> {
    String::from_utf8(ie.value.to_vec()).map_err(|e| MxapError::InvalidIeValue {
        ie_name: "Name",
        reason: e.to_string(),
    })
}

fn put_service_area_list(list: &[ServiceAreaId]) -> MxapResult<Bytes> {
    if list.len() > u8::MAX as usize {
        return Err(MxapError::Encode(format!("{} service areas", list.len())));
    }
    let mut b = BytesMut::with_capacity(1 + 2 * list.len());
    b.put_u8(list.len() as u8);
    for sai in list {
        b.put_u16(*sai);
    }
    Ok(b.freeze())
}

fn get_service_area_list(ie: &ProtocolIe) -> MxapResult<Vec<ServiceAreaId>> {
    let mut r = Reader::new(&ie.value);
    let n = r.u8()?;
    let mut list = Vec::with_capacity(n as usize);
    for _ in 0..n {
        list.push(r.u16()?);
    }
    r.finish("MBMS-Service-Area-List")?;
    Ok(list)
}

fn put_mbsfn_area_list(list: &[MbsfnArea]) -> MxapResult<Bytes> {
    if list.len() > u8::MAX as usize {
        return Err(MxapError::Encode(format!("{} MBSFN areas", list.len())));
    }
    let mut b = BytesMut::with_capacity(1 + 3 * list.len());
    b.put_u8(list.len() as u8);
    for area in list {
        b.put_u8(area.mbsfn_area_id);
        b.put_u16(area.service_area_id);
    }
    Ok(b.freeze())
}

fn get_mbsfn_area_list(ie: &ProtocolIe) -> MxapResult<Vec<MbsfnArea>> {
    let mut r = Reader::new(&ie.value);
    let n = r.u8()?;
    let mut list = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let mbsfn_area_id = r.u8()?;
        let service_area_id = r.u16()?;
        list.push(MbsfnArea { mbsfn_area_id, service_area_id });
    }
    r.finish("MBSFN-Area-List")?;
    Ok(list)
}

fn put_reset_items(b: &mut BytesMut, items: &[ResetItem]) -> MxapResult<()> {
    if items.len() > u8::MAX as usize {
        return Err(MxapError::Encode(format!("{} reset items", items.len())));
    }
    b.put_u8(items.len() as u8);
    for item in items {
        let flags = (item.local_id.is_some() as u8) << 1 | item.remote_id.is_some() as u8;
        b.put_u8(flags);
        if let Some(id) = item.local_id {
            b.put_u32(id);
        }
        if let Some(id) = item.remote_id {
            b.put_u32(id);
        }
    }
    Ok(())
}

fn get_reset_items(r: &mut Reader<'_>, profile: &WireProfile) -> MxapResult<Vec<ResetItem>> {
    let n = r.u8()?;
    let mut items = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let flags = r.u8()?;
        let local_id = if flags & 0x02 != 0 {
            Some(r.u32()? & profile.local_id_mask)
        } else {
            None
        };
        let remote_id = if flags & 0x01 != 0 {
            Some(r.u32()? & profile.remote_id_mask)
        } else {
            None
        };
        items.push(ResetItem { local_id, remote_id });
    }
    Ok(items)
}

fn put_reset_type(reset_type: &ResetType) -> MxapResult<Bytes> {
    let mut b = BytesMut::new();
    match reset_type {
        ResetType::Interface => b.put_u8(0),
        ResetType::PartOfInterface(items) => {
            b.put_u8(1);
            put_reset_items(&mut b, items)?;
        }
    }
    Ok(b.freeze())
}

fn get_reset_type(ie: &ProtocolIe, profile: &WireProfile) -> MxapResult<ResetType> {
    let mut r = Reader::new(&ie.value);
    let reset_type = match r.u8()? {
        0 => ResetType::Interface,
        1 => ResetType::PartOfInterface(get_reset_items(&mut r, profile)?),
        other => {
            return Err(MxapError::InvalidIeValue {
                ie_name: "ResetType",
                reason: format!("choice {other}"),
            })
        }
    };
    r.finish("ResetType")?;
    Ok(reset_type)
}

// ============================================================================
// Message encode / decode
// ============================================================================

/// Encode a typed message with the given personality profile
pub fn encode_message(profile: &WireProfile, msg: &MxapMessage) -> MxapResult<Bytes> {
    let procedure = msg.procedure();
    let code = profile.procedure_code(procedure).ok_or_else(|| {
        MxapError::Encode(format!("{} has no code for {procedure}", profile.name))
    })?;
    let ie = &profile.ie;
    let local = |id: u32| put_id(profile.local_id_mask, id, "local MBMS id");
    let remote = |id: u32| put_id(profile.remote_id_mask, id, "remote MBMS id");
    let reject = Criticality::Reject;
    let ignore = Criticality::Ignore;

    let mut c = IeContainer::new(msg.direction(), code, msg.criticality());
    match msg {
        MxapMessage::SessionStartRequest(m) => {
            c.push(ie.local_id, reject, local(m.local_id)?);
            c.push(ie.tmgi, reject, put_tmgi(&m.tmgi)?);
            c.push(ie.qos, reject, put_qos(&m.bearer_qos));
            c.push(ie.service_area, reject, put_service_area(m.service_area_id));
            c.push(ie.tnl_information, reject, put_tnl(&m.tnl));
        }
        MxapMessage::SessionUpdateRequest(m) => {
            c.push(ie.local_id, reject, local(m.local_id)?);
            c.push(ie.remote_id, reject, remote(m.remote_id)?);
            c.push(ie.tmgi, reject, put_tmgi(&m.tmgi)?);
            c.push(ie.qos, reject, put_qos(&m.bearer_qos));
            c.push(ie.service_area, ignore, put_service_area(m.service_area_id));
            c.push(ie.tnl_information, ignore, put_tnl(&m.tnl));
        }
        MxapMessage::SessionStartResponse(m)
        | MxapMessage::SessionStopRequest(m)
        | MxapMessage::SessionStopResponse(m)
        | MxapMessage::SessionUpdateResponse(m) => {
            c.push(ie.local_id, reject, local(m.local_id)?);
            if let Some(id) = m.remote_id {
                c.push(ie.remote_id, reject, remote(id)?);
            }
        }
        MxapMessage::SessionStartFailure(m) | MxapMessage::SessionUpdateFailure(m) => {
            c.push(ie.local_id, reject, local(m.local_id)?);
            if let Some(id) = m.remote_id {
                c.push(ie.remote_id, ignore, remote(id)?);
            }
            c.push(ie.cause, ignore, put_cause(&m.cause));
        }
        MxapMessage::ErrorIndication(m) => {
            if let Some(id) = m.local_id {
                c.push(ie.local_id, ignore, local(id)?);
            }
            if let Some(id) = m.remote_id {
                c.push(ie.remote_id, ignore, remote(id)?);
            }
            if let Some(cause) = &m.cause {
                c.push(ie.cause, ignore, put_cause(cause));
            }
        }
        MxapMessage::Reset(m) => {
            c.push(ie.cause, ignore, put_cause(&m.cause));
            c.push(ie.reset_type, reject, put_reset_type(&m.reset_type)?);
        }
        MxapMessage::ResetAcknowledge(m) => {
            if !m.items.is_empty() {
                let mut b = BytesMut::new();
                put_reset_items(&mut b, &m.items)?;
                c.push(ie.reset_ack_list, ignore, b.freeze());
            }
        }
        MxapMessage::SetupRequest(m) => {
            c.push(ie.global_node_id, reject, put_global_id(&m.plmn_id, m.global_id));
            if let Some(name) = &m.name {
                c.push(ie.node_name, ignore, Bytes::copy_from_slice(name.as_bytes()));
            }
            c.push(ie.service_area_list, reject, put_service_area_list(&m.service_areas)?);
        }
        MxapMessage::SetupResponse(m) => {
            c.push(ie.global_node_id, reject, put_global_id(&m.plmn_id, m.global_id));
            if let Some(name) = &m.name {
                c.push(ie.node_name, ignore, Bytes::copy_from_slice(name.as_bytes()));
            }
            c.push(ie.mbsfn_area_list, reject, put_mbsfn_area_list(&m.mbsfn_areas)?);
        }
        MxapMessage::SetupFailure(m) => {
            c.push(ie.cause, ignore, put_cause(&m.cause));
            if let Some(ttw) = m.time_to_wait {
                c.push(ie.time_to_wait, ignore, Bytes::copy_from_slice(&[ttw as u8]));
            }
        }
    }
    c.encode()
}

fn mandatory<'a>(
    c: &'a IeContainer,
    id: u16,
    ie_name: &'static str,
) -> MxapResult<&'a ProtocolIe> {
    c.find(id).ok_or(MxapError::MissingMandatoryIe(ie_name))
}

/// Decode a PDU. Procedures the profile knows no message layout for come
/// back with `message: None`; the dispatcher decides what to do with them.
pub fn decode_pdu(profile: &WireProfile, data: &[u8]) -> MxapResult<MxapPdu> {
    let c = IeContainer::decode(data)?;
    let message = match profile.procedure(c.procedure_code) {
        Some(procedure) => decode_message(profile, &c, procedure)?,
        None => None,
    };
    Ok(MxapPdu {
        procedure_code: c.procedure_code,
        direction: c.direction,
        message,
    })
}

fn decode_message(
    profile: &WireProfile,
    c: &IeContainer,
    procedure: Procedure,
) -> MxapResult<Option<MxapMessage>> {
    use Direction::*;

    let ie = &profile.ie;
    let local_id = |c: &IeContainer| -> MxapResult<u32> {
        get_id(profile.local_id_mask, mandatory(c, ie.local_id, "local MBMS id")?, "local MBMS id")
    };
    let opt_local_id = |c: &IeContainer| -> MxapResult<Option<u32>> {
        c.find(ie.local_id)
            .map(|v| get_id(profile.local_id_mask, v, "local MBMS id"))
            .transpose()
    };
    let opt_remote_id = |c: &IeContainer| -> MxapResult<Option<u32>> {
        c.find(ie.remote_id)
            .map(|v| get_id(profile.remote_id_mask, v, "remote MBMS id"))
            .transpose()
    };
    let ids = |c: &IeContainer| -> MxapResult<SessionIds> {
        Ok(SessionIds { local_id: local_id(c)?, remote_id: opt_remote_id(c)? })
    };
    let failure = |c: &IeContainer| -> MxapResult<SessionFailure> {
        Ok(SessionFailure {
            local_id: local_id(c)?,
            remote_id: opt_remote_id(c)?,
            cause: get_cause(mandatory(c, ie.cause, "Cause")?)?,
        })
    };

    let msg = match (procedure, c.direction) {
        (Procedure::SessionStart, InitiatingMessage) => {
            MxapMessage::SessionStartRequest(SessionStartRequest {
                local_id: local_id(c)?,
                tmgi: get_tmgi(mandatory(c, ie.tmgi, "TMGI")?)?,
                service_area_id: get_service_area(mandatory(c, ie.service_area, "MBMS-Service-Area")?)?,
                bearer_qos: get_qos(mandatory(c, ie.qos, "MBMS-E-RAB-QoS-Parameters")?)?,
                tnl: get_tnl(mandatory(c, ie.tnl_information, "TNL-Information")?)?,
            })
        }
        (Procedure::SessionStart, SuccessfulOutcome) => MxapMessage::SessionStartResponse(ids(c)?),
        (Procedure::SessionStart, UnsuccessfulOutcome) => MxapMessage::SessionStartFailure(failure(c)?),
        (Procedure::SessionStop, InitiatingMessage) => MxapMessage::SessionStopRequest(ids(c)?),
        (Procedure::SessionStop, SuccessfulOutcome) => MxapMessage::SessionStopResponse(ids(c)?),
        (Procedure::SessionUpdate, InitiatingMessage) => {
            let remote_id = opt_remote_id(c)?.ok_or(MxapError::MissingMandatoryIe("remote MBMS id"))?;
            MxapMessage::SessionUpdateRequest(SessionUpdateRequest {
                local_id: local_id(c)?,
                remote_id,
                tmgi: get_tmgi(mandatory(c, ie.tmgi, "TMGI")?)?,
                service_area_id: get_service_area(mandatory(c, ie.service_area, "MBMS-Service-Area")?)?,
                bearer_qos: get_qos(mandatory(c, ie.qos, "MBMS-E-RAB-QoS-Parameters")?)?,
                tnl: get_tnl(mandatory(c, ie.tnl_information, "TNL-Information")?)?,
            })
        }
        (Procedure::SessionUpdate, SuccessfulOutcome) => MxapMessage::SessionUpdateResponse(ids(c)?),
        (Procedure::SessionUpdate, UnsuccessfulOutcome) => MxapMessage::SessionUpdateFailure(failure(c)?),
        (Procedure::ErrorIndication, InitiatingMessage) => {
            MxapMessage::ErrorIndication(ErrorIndication {
                local_id: opt_local_id(c)?,
                remote_id: opt_remote_id(c)?,
                cause: c.find(ie.cause).map(get_cause).transpose()?,
            })
        }
        (Procedure::Reset, InitiatingMessage) => MxapMessage::Reset(Reset {
            cause: get_cause(mandatory(c, ie.cause, "Cause")?)?,
            reset_type: get_reset_type(mandatory(c, ie.reset_type, "ResetType")?, profile)?,
        }),
        (Procedure::Reset, SuccessfulOutcome) => {
            let items = match c.find(ie.reset_ack_list) {
                Some(v) => {
                    let mut r = Reader::new(&v.value);
                    let items = get_reset_items(&mut r, profile)?;
                    r.finish("Reset-Acknowledge-List")?;
                    items
                }
                None => Vec::new(),
            };
            MxapMessage::ResetAcknowledge(ResetAcknowledge { items })
        }
        (Procedure::Setup, InitiatingMessage) => {
            let (plmn_id, global_id) = get_global_id(mandatory(c, ie.global_node_id, "Global-ID")?)?;
            MxapMessage::SetupRequest(SetupRequest {
                plmn_id,
                global_id,
                name: c.find(ie.node_name).map(get_name).transpose()?,
                service_areas: get_service_area_list(mandatory(
                    c,
                    ie.service_area_list,
                    "MBMS-Service-Area-List",
                )?)?,
            })
        }
        (Procedure::Setup, SuccessfulOutcome) => {
            let (plmn_id, global_id) = get_global_id(mandatory(c, ie.global_node_id, "Global-ID")?)?;
            MxapMessage::SetupResponse(SetupResponse {
                plmn_id,
                global_id,
                name: c.find(ie.node_name).map(get_name).transpose()?,
                mbsfn_areas: get_mbsfn_area_list(mandatory(c, ie.mbsfn_area_list, "MBSFN-Area-List")?)?,
            })
        }
        (Procedure::Setup, UnsuccessfulOutcome) => {
            let time_to_wait = match c.find(ie.time_to_wait) {
                Some(v) => {
                    let mut r = Reader::new(&v.value);
                    let raw = r.u8()?;
                    r.finish("TimeToWait")?;
                    Some(TimeToWait::try_from(raw).map_err(|v| MxapError::InvalidIeValue {
                        ie_name: "TimeToWait",
                        reason: format!("value {v}"),
                    })?)
                }
                None => None,
            };
            MxapMessage::SetupFailure(SetupFailure {
                cause: get_cause(mandatory(c, ie.cause, "Cause")?)?,
                time_to_wait,
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(msg))
}
