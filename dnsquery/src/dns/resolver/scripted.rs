//! In-memory [`Transport`] replaying canned replies, for engine tests.
use crate::dns::resolver::rdata::{RData, SoaData};
use crate::dns::resolver::standard::{
    DnsHeaderFlags, DnsMessage, HeaderSection, RecordType, ResourceRecord, parse_response,
};
use crate::dns::resolver::transporter::{Transport, UdpErrors};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};

/// A query as seen by the scripted peer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentQuery {
    pub(crate) server: SocketAddr,
    pub(crate) id: u16,
    pub(crate) name: String,
    pub(crate) record_type: RecordType,
    pub(crate) recursion_desired: bool,
}

/// Answers each exchange with the next queued reply, echoing the query ID and question.
///
/// An empty queue behaves like a silent server.
pub(crate) struct ScriptedTransport {
    replies: RefCell<VecDeque<DnsMessage>>,
    sent: RefCell<Vec<SentQuery>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<DnsMessage>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<SentQuery> {
        self.sent.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn exchange(&self, query: &[u8], server: SocketAddr) -> Result<Vec<u8>, UdpErrors> {
        let parsed = parse_response(query).expect("engine sent an undecodable query");
        let question = parsed.question.clone().expect("query without question");
        let flags = parsed.flags();

        self.sent.borrow_mut().push(SentQuery {
            server,
            id: parsed.header.id,
            name: question.name.clone(),
            record_type: question.record_type,
            recursion_desired: flags.rd,
        });

        let Some(mut reply) = self.replies.borrow_mut().pop_front() else {
            return Err(UdpErrors::NoResponse {
                server,
                attempts: 1,
            });
        };

        let reply_flags = DnsHeaderFlags::from_u16(reply.header.flags);
        reply.header.id = parsed.header.id;
        reply.header.flags = DnsHeaderFlags {
            qr: true,
            rd: flags.rd,
            ..reply_flags
        }
        .to_u16();
        reply.question = Some(question);

        Ok(reply.encode().expect("scripted reply must encode"))
    }
}

pub(crate) fn empty_reply() -> DnsMessage {
    DnsMessage {
        header: HeaderSection::default(),
        question: None,
        answer: Vec::new(),
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

pub(crate) fn error_reply(rcode: u8) -> DnsMessage {
    let mut reply = empty_reply();
    reply.header.flags = DnsHeaderFlags {
        rcode,
        ..DnsHeaderFlags::default()
    }
    .to_u16();
    reply
}

pub(crate) fn answer_a(name: &str, address: Ipv4Addr) -> DnsMessage {
    let mut reply = empty_reply();
    reply.answer = vec![ResourceRecord::new(name, 300, RData::A(address))];
    reply
}

/// Referral to `zone` served by `ns`, with an A glue record when `glue` is given.
pub(crate) fn referral(zone: &str, ns: &str, glue: Option<Ipv4Addr>) -> DnsMessage {
    let mut reply = empty_reply();
    reply.authority = vec![ResourceRecord::new(zone, 172800, RData::Ns(ns.to_string()))];
    if let Some(address) = glue {
        reply.additional = vec![ResourceRecord::new(ns, 172800, RData::A(address))];
    }
    reply
}

/// Root priming reply: the root NS set in the answer section plus glue.
pub(crate) fn root_reply(glue: Option<Ipv4Addr>) -> DnsMessage {
    let mut reply = empty_reply();
    reply.answer = vec![ResourceRecord::new(
        "",
        518400,
        RData::Ns("a.root-servers.net".to_string()),
    )];
    if let Some(address) = glue {
        reply.additional = vec![ResourceRecord::new(
            "a.root-servers.net",
            518400,
            RData::A(address),
        )];
    }
    reply
}

/// Authoritative NODATA reply carrying only the zone SOA.
pub(crate) fn nodata(zone: &str) -> DnsMessage {
    let mut reply = empty_reply();
    reply.authority = vec![ResourceRecord::new(
        zone,
        3600,
        RData::Soa(SoaData {
            mname: format!("ns.{zone}"),
            rname: format!("hostmaster.{zone}"),
            serial: 1,
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum: 300,
        }),
    )];
    reply
}
