//! Iterative resolution.
//!
//! The walk starts by asking the configured server for the root NS set, then follows the
//! delegation chain one label at a time:
//!
//! ```text
//! .            NS  @configured server    -> root server (glue)
//! com          NS  @root server          -> TLD server (glue)
//! example.com  A   @TLD server           -> answer, or one more referral
//! ```
//!
//! Suffixes shorter than the target are asked for their NS records; the target itself is asked
//! with the requested type. A delegation without glue is resolved by asking the local resolver
//! (first system nameserver, RD set) for the A record of the first NS target, after which the
//! same suffix is asked again against the new server.
//!
//! Every exchange, glue lookups included, counts against `max_steps`, so the walk always ends.
use crate::dns::resolver::config::{DNS_PORT, ResolverConfig};
use crate::dns::resolver::standard::{DnsMessage, RecordType, ResourceRecord};
use crate::dns::resolver::transporter::Transport;
use crate::dns::resolver::{Resolution, ResolutionStatus, Resolver, ResolverErrors};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, warn};

/// Phase of an iterative resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Phase {
    Start,
    QueryingRoot,
    QueryingDelegate,
    AwaitingGlueViaLocalResolver,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Phase::Start => "start",
            Phase::QueryingRoot => "root",
            Phase::QueryingDelegate => "delegate",
            Phase::AwaitingGlueViaLocalResolver => "glue",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(phase)
    }
}

/// One exchange of the walk, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IterationStep {
    pub server: SocketAddr,
    pub name: String,
    pub record_type: RecordType,
    pub phase: Phase,
    pub answers: usize,
    pub authority: usize,
    pub additional: usize,
}

/// Working state of one iterative resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverState {
    pub target: String,
    labels: Vec<String>,
    /// Number of trailing labels of `target` currently being resolved, 0 is the root.
    pub depth: usize,
    pub server: SocketAddr,
    /// Exchanges performed so far.
    pub steps: usize,
    pub phase: Phase,
    /// Set once a referral received for the full name has been followed.
    pub final_attempt: bool,
}

impl ResolverState {
    pub fn new(target: &str, server: SocketAddr) -> Self {
        Self {
            target: target.to_string(),
            labels: target
                .split('.')
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .collect(),
            depth: 0,
            server,
            steps: 0,
            phase: Phase::Start,
            final_attempt: false,
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// The suffix currently being resolved, `"."` for the root.
    pub fn current_name(&self) -> String {
        if self.depth == 0 {
            ".".to_string()
        } else {
            self.labels[self.labels.len() - self.depth..].join(".")
        }
    }

    pub fn at_target(&self) -> bool {
        self.depth >= self.labels.len()
    }

    fn advance(&mut self) {
        if self.depth < self.labels.len() {
            self.depth += 1;
        }
    }

    fn transition(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, depth = self.depth, "iterative phase change");
            self.phase = phase;
        }
    }
}

/// Where a reply sends the walk next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Referral<'m> {
    Glue(Ipv4Addr),
    Delegation(&'m str),
}

fn first_ns(records: &[ResourceRecord]) -> Option<&str> {
    records.iter().find_map(|record| record.rdata.as_ns())
}

/// First A glue record, else the first NS target of the authority section (and of the answer
/// section when `include_answer` is set).
fn referral(reply: &DnsMessage, include_answer: bool) -> Option<Referral<'_>> {
    if let Some(address) = reply.additional.iter().find_map(|record| record.rdata.as_ipv4()) {
        return Some(Referral::Glue(address));
    }

    first_ns(&reply.authority)
        .or_else(|| if include_answer { first_ns(&reply.answer) } else { None })
        .map(Referral::Delegation)
}

pub(crate) fn resolve<T: Transport>(
    resolver: &Resolver<T>,
    config: &ResolverConfig,
) -> Result<Resolution, ResolverErrors> {
    let server = config.default_server()?;
    IterativeWalk {
        resolver,
        config,
        state: ResolverState::new(&config.name, server),
        trace: Vec::new(),
    }
    .run()
}

struct IterativeWalk<'a, T: Transport> {
    resolver: &'a Resolver<T>,
    config: &'a ResolverConfig,
    state: ResolverState,
    trace: Vec<IterationStep>,
}

impl<T: Transport> IterativeWalk<'_, T> {
    fn run(mut self) -> Result<Resolution, ResolverErrors> {
        let config = self.config;
        self.state.transition(Phase::QueryingRoot);
        let root = self.exchange(self.state.server, ".", RecordType::Ns, false)?;

        if self.state.label_count() == 0 {
            let status = if root.answer.is_empty() {
                ResolutionStatus::Exhausted
            } else {
                ResolutionStatus::Done
            };
            return Ok(self.finish(root, status));
        }

        match referral(&root, true) {
            Some(Referral::Glue(address)) => self.state.server = delegate(address),
            Some(Referral::Delegation(ns)) => self.state.server = self.glue_lookup(ns)?,
            None => return Err(self.fail("the root reply names no name server")),
        }
        self.state.depth = 1;
        self.state.transition(Phase::QueryingDelegate);

        loop {
            if self.state.at_target() {
                let reply =
                    self.exchange(self.state.server, &config.name, config.record_type, false)?;

                if !reply.answer.is_empty() {
                    return Ok(self.finish(reply, ResolutionStatus::Done));
                }
                if self.state.final_attempt {
                    return Ok(self.finish(reply, ResolutionStatus::Exhausted));
                }

                match referral(&reply, false) {
                    Some(Referral::Glue(address)) => self.state.server = delegate(address),
                    Some(Referral::Delegation(ns)) => self.state.server = self.glue_lookup(ns)?,
                    None => return Ok(self.finish(reply, ResolutionStatus::Exhausted)),
                }
                self.state.final_attempt = true;
            } else {
                let name = self.state.current_name();
                let reply = self.exchange(self.state.server, &name, RecordType::Ns, false)?;

                match referral(&reply, false) {
                    Some(Referral::Glue(address)) => {
                        self.state.server = delegate(address);
                        self.state.advance();
                    }
                    // resume at the same suffix against the server found
                    Some(Referral::Delegation(ns)) if reply.answer.is_empty() => {
                        self.state.server = self.glue_lookup(ns)?
                    }
                    // authoritative for this level
                    _ => self.state.advance(),
                }
            }
        }
    }

    /// Resolves the address of a glueless name server through the local resolver.
    fn glue_lookup(&mut self, ns: &str) -> Result<SocketAddr, ResolverErrors> {
        let phase = self.state.phase;
        self.state.transition(Phase::AwaitingGlueViaLocalResolver);

        let local = self
            .config
            .local_resolver()
            .or_else(|_| self.config.default_server())?;
        let reply = self.exchange(local, ns, RecordType::A, true)?;

        let Some(address) = reply.answer.iter().find_map(|record| record.rdata.as_ipv4()) else {
            warn!(ns, %local, "glue lookup returned no address");
            return Err(self.fail("the glue lookup returned no address"));
        };

        self.state.transition(phase);
        Ok(delegate(address))
    }

    fn exchange(
        &mut self,
        server: SocketAddr,
        name: &str,
        record_type: RecordType,
        recursion_desired: bool,
    ) -> Result<DnsMessage, ResolverErrors> {
        if self.state.steps >= self.config.max_steps {
            return Err(self.fail("the step budget is spent"));
        }
        self.state.steps += 1;

        debug!(
            step = self.state.steps,
            phase = %self.state.phase,
            %server,
            name,
            %record_type,
            "iterative query"
        );
        let reply = self
            .resolver
            .query(self.config, server, name, record_type, recursion_desired)
            .inspect_err(|_| self.state.transition(Phase::Failed))?;

        self.trace.push(IterationStep {
            server,
            name: name.to_string(),
            record_type,
            phase: self.state.phase,
            answers: reply.answer.len(),
            authority: reply.authority.len(),
            additional: reply.additional.len(),
        });
        Ok(reply)
    }

    fn finish(mut self, reply: DnsMessage, status: ResolutionStatus) -> Resolution {
        self.state.transition(Phase::Done);
        debug!(steps = self.state.steps, ?status, "iterative resolution finished");
        Resolution::from_reply(reply, status, self.state.server, self.trace)
    }

    fn fail(&mut self, reason: &'static str) -> ResolverErrors {
        self.state.transition(Phase::Failed);
        warn!(
            name = %self.state.target,
            steps = self.state.steps,
            reason,
            "iterative resolution failed"
        );
        ResolverErrors::IterativeResolutionFailed {
            name: self.state.target.clone(),
            steps: self.state.steps,
            reason,
        }
    }
}

fn delegate(address: Ipv4Addr) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(address), DNS_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::resolver::scripted::{
        ScriptedTransport, answer_a, empty_reply, error_reply, nodata, referral as referral_to,
        root_reply,
    };
    use crate::dns::resolver::{QueryMode, ResponseCode};

    const CONFIGURED: &str = "198.51.100.1";
    const LOCAL: &str = "10.0.0.53";

    fn config(name: &str) -> ResolverConfig {
        ResolverConfig::new(name, RecordType::A)
            .with_mode(QueryMode::Iterative)
            .with_server(CONFIGURED.parse().unwrap())
            .with_nameservers(vec![LOCAL.parse().unwrap()])
    }

    fn at(ip: [u8; 4]) -> SocketAddr {
        delegate(Ipv4Addr::from(ip))
    }

    fn addr(address: &str) -> SocketAddr {
        address.parse().unwrap()
    }

    #[test]
    fn test_state_suffix_walk() {
        let mut state = ResolverState::new("www.example.com.", at([1, 1, 1, 1]));
        assert_eq!(state.label_count(), 3);
        assert_eq!(state.current_name(), ".");

        state.advance();
        assert_eq!(state.current_name(), "com");
        state.advance();
        assert_eq!(state.current_name(), "example.com");
        assert!(!state.at_target());
        state.advance();
        state.advance();
        assert_eq!(state.current_name(), "www.example.com");
        assert!(state.at_target());
    }

    #[test]
    fn test_three_level_chain_with_glue() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("example.com")).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Done);
        assert_eq!(resolution.answer.len(), 1);
        assert_eq!(resolution.answer[0].rdata.to_string(), "93.184.216.34");
        assert_eq!(resolution.server, at([192, 0, 2, 20]));

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        let hops: Vec<_> = sent
            .iter()
            .map(|query| (query.server, query.name.as_str(), query.record_type))
            .collect();
        assert_eq!(
            hops,
            vec![
                (addr("198.51.100.1:53"), "", RecordType::Ns),
                (at([192, 0, 2, 10]), "com", RecordType::Ns),
                (at([192, 0, 2, 20]), "example.com", RecordType::A),
            ]
        );
        assert!(sent.iter().all(|query| !query.recursion_desired));

        let phases: Vec<_> = resolution.steps.iter().map(|step| step.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::QueryingRoot, Phase::QueryingDelegate, Phase::QueryingDelegate]
        );
    }

    #[test]
    fn test_root_step_uses_configured_port() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            answer_a("com", Ipv4Addr::new(192, 0, 2, 99)),
        ]);
        let resolver = Resolver::new(&transport);

        resolver.resolve(&config("com").with_port(5353)).unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].server, addr("198.51.100.1:5353"));
        assert_eq!(sent[1].server, at([192, 0, 2, 10]));
    }

    #[test]
    fn test_glueless_delegation_resolved_through_local_resolver() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "ns.tld-servers.net", None),
            answer_a("ns.tld-servers.net", Ipv4Addr::new(192, 0, 2, 30)),
            // the TLD server answers for its own zone, no referral
            {
                let mut reply = empty_reply();
                reply.answer = referral_to("com", "ns.tld-servers.net", None).authority;
                reply
            },
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("example.com")).unwrap();
        assert_eq!(resolution.status, ResolutionStatus::Done);

        let sent = transport.sent();
        let names: Vec<_> = sent.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(names, vec!["", "com", "ns.tld-servers.net", "com", "example.com"]);

        assert!(sent[2].recursion_desired);
        assert_eq!(sent[2].server, addr("10.0.0.53:53"));
        assert_eq!(sent[2].record_type, RecordType::A);
        assert_eq!(sent[3].server, at([192, 0, 2, 30]));
        assert_eq!(sent[4].server, at([192, 0, 2, 30]));

        assert_eq!(resolution.steps[2].phase, Phase::AwaitingGlueViaLocalResolver);
        assert_eq!(resolution.steps[3].phase, Phase::QueryingDelegate);
    }

    #[test]
    fn test_root_delegation_without_glue() {
        let transport = ScriptedTransport::new(vec![
            root_reply(None),
            answer_a("a.root-servers.net", Ipv4Addr::new(198, 41, 0, 4)),
            answer_a("com", Ipv4Addr::new(192, 0, 2, 99)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("com")).unwrap();

        let sent = transport.sent();
        assert_eq!(sent[1].name, "a.root-servers.net");
        assert_eq!(sent[2].server, at([198, 41, 0, 4]));
        assert_eq!(resolution.status, ResolutionStatus::Done);
    }

    #[test]
    fn test_authoritative_intermediate_keeps_server() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            referral_to("example.com", "ns.example.com", Some(Ipv4Addr::new(192, 0, 2, 40))),
            nodata("example.com"),
            answer_a("www.sub.example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("www.sub.example.com")).unwrap();

        let sent = transport.sent();
        let names: Vec<_> = sent.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["", "com", "example.com", "sub.example.com", "www.sub.example.com"]
        );
        assert_eq!(sent[3].server, at([192, 0, 2, 40]));
        assert_eq!(sent[4].server, at([192, 0, 2, 40]));
        assert_eq!(resolution.status, ResolutionStatus::Done);
    }

    #[test]
    fn test_intermediate_answer_with_name_servers_advances() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            {
                let mut reply = referral_to("com", "ns.tld-servers.net", None);
                reply.answer = reply.authority.clone();
                reply
            },
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("example.com")).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Done);
        let sent = transport.sent();
        let names: Vec<_> = sent.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(names, vec!["", "com", "example.com"]);
        assert_eq!(sent[2].server, at([192, 0, 2, 10]));
        assert_eq!(sent[2].record_type, RecordType::A);
    }

    #[test]
    fn test_glueless_referral_for_target_then_final_attempt() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            referral_to("example.com", "ns1.example.net", None),
            answer_a("ns1.example.net", Ipv4Addr::new(192, 0, 2, 70)),
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("example.com")).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Done);
        assert_eq!(resolution.server, at([192, 0, 2, 70]));

        let sent = transport.sent();
        let names: Vec<_> = sent.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["", "com", "example.com", "ns1.example.net", "example.com"]
        );
        assert!(sent[3].recursion_desired);
        assert_eq!(sent[3].server, addr("10.0.0.53:53"));
        assert_eq!(sent[4].server, at([192, 0, 2, 70]));
        assert_eq!(sent[4].record_type, RecordType::A);

        let phases: Vec<_> = resolution.steps.iter().map(|step| step.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::QueryingRoot,
                Phase::QueryingDelegate,
                Phase::QueryingDelegate,
                Phase::AwaitingGlueViaLocalResolver,
                Phase::QueryingDelegate,
            ]
        );
    }

    #[test]
    fn test_final_referral_is_followed_once() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            referral_to("example.com", "ns1.example.com", Some(Ipv4Addr::new(192, 0, 2, 40))),
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);
        let config = config("example.com");

        let resolution = resolver.resolve(&config).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Done);
        assert_eq!(transport.sent().len(), 4);
        assert_eq!(transport.sent()[3].server, at([192, 0, 2, 40]));
    }

    #[test]
    fn test_second_referral_for_target_is_exhausted() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            referral_to("example.com", "ns1.example.com", Some(Ipv4Addr::new(192, 0, 2, 40))),
            referral_to("example.com", "ns2.example.com", Some(Ipv4Addr::new(192, 0, 2, 50))),
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("example.com")).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Exhausted);
        assert!(resolution.answer.is_empty());
        assert_eq!(resolution.authority[0].rdata.as_ns(), Some("ns2.example.com"));
        assert_eq!(transport.sent().len(), 4);
    }

    #[test]
    fn test_target_without_referral_is_exhausted() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            nodata("com"),
        ]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config("com")).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Exhausted);
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_root_target() {
        let transport =
            ScriptedTransport::new(vec![root_reply(Some(Ipv4Addr::new(192, 0, 2, 10)))]);
        let resolver = Resolver::new(&transport);

        let resolution = resolver.resolve(&config(".").with_mode(QueryMode::Iterative)).unwrap();

        assert_eq!(resolution.status, ResolutionStatus::Done);
        assert_eq!(resolution.answer[0].rdata.as_ns(), Some("a.root-servers.net"));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_step_budget_is_enforced() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "a.gtld-servers.net", Some(Ipv4Addr::new(192, 0, 2, 20))),
            answer_a("example.com", Ipv4Addr::new(93, 184, 216, 34)),
        ]);
        let resolver = Resolver::new(&transport);

        let result = resolver.resolve(&config("example.com").with_max_steps(2));

        assert!(matches!(
            result,
            Err(ResolverErrors::IterativeResolutionFailed { steps: 2, .. })
        ));
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_endless_glueless_referrals_hit_the_budget() {
        let mut replies = vec![root_reply(Some(Ipv4Addr::new(192, 0, 2, 10)))];
        for _ in 0..20 {
            replies.push(referral_to("com", "ns.loop.test", None));
            replies.push(answer_a("ns.loop.test", Ipv4Addr::new(192, 0, 2, 66)));
        }
        let transport = ScriptedTransport::new(replies);
        let resolver = Resolver::new(&transport);

        let result = resolver.resolve(&config("example.com").with_max_steps(9));

        assert!(matches!(
            result,
            Err(ResolverErrors::IterativeResolutionFailed { steps: 9, .. })
        ));
    }

    #[test]
    fn test_glue_lookup_without_address_fails() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            referral_to("com", "ns.tld-servers.net", None),
            empty_reply(),
        ]);
        let resolver = Resolver::new(&transport);

        let result = resolver.resolve(&config("example.com"));

        assert!(matches!(
            result,
            Err(ResolverErrors::IterativeResolutionFailed { steps: 3, .. })
        ));
    }

    #[test]
    fn test_root_reply_without_name_servers_fails() {
        let transport = ScriptedTransport::new(vec![empty_reply()]);
        let resolver = Resolver::new(&transport);

        let result = resolver.resolve(&config("example.com"));
        assert!(matches!(
            result,
            Err(ResolverErrors::IterativeResolutionFailed { steps: 1, .. })
        ));
    }

    #[test]
    fn test_server_error_surfaces() {
        let transport = ScriptedTransport::new(vec![
            root_reply(Some(Ipv4Addr::new(192, 0, 2, 10))),
            error_reply(2),
        ]);
        let resolver = Resolver::new(&transport);

        let result = resolver.resolve(&config("example.com"));
        assert!(matches!(
            result,
            Err(ResolverErrors::ServerError(ResponseCode::ServerFailure))
        ));
    }
}
