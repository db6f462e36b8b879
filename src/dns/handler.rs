//! DNS query handling.
//!
//! Maps one inbound question onto the store and builds the reply. The
//! handler is transport-agnostic: it takes a decoded [`Message`] and returns
//! the reply to send, or `None` when nothing should be sent.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use hickory_proto::op::{Edns, Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::opt::EdnsOption;
use hickory_proto::rr::rdata::{A, AAAA, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tracing::{debug, error, info, instrument, warn};

use crate::admission::{validate_domain, DomainPolicy};
use crate::store::CachePort;

/// TTL of the fixed A/AAAA answers.
pub const STATIC_ANSWER_TTL: u32 = 300;

/// EDNS option code of Extended DNS Errors (RFC 8914).
pub const EDE_OPTION_CODE: u16 = 15;

/// EDE info code "Other Error".
pub const EDE_INFO_OTHER: u16 = 0;

const EDNS_MAX_PAYLOAD: u16 = 4096;

/// Addresses handed out for A and AAAA questions. These are not stored in
/// the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticAnswer {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Resolves TXT questions from the store and A/AAAA questions from the
/// static answer, for names inside the configured domain.
pub struct QueryHandler {
    store: Arc<dyn CachePort>,
    domain: DomainPolicy,
    answer: StaticAnswer,
}

impl QueryHandler {
    pub fn new(store: Arc<dyn CachePort>, domain: DomainPolicy, answer: StaticAnswer) -> Self {
        Self {
            store,
            domain,
            answer,
        }
    }

    pub fn domain(&self) -> &DomainPolicy {
        &self.domain
    }

    /// Decodes a datagram, handles it and encodes the reply.
    ///
    /// Undecodable datagrams and messages without a question yield `None`.
    /// A reply that cannot be encoded is replaced by a bare `ServerFailure`.
    pub async fn handle_datagram(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let request = match Message::from_bytes(datagram) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Failed to parse DNS message");
                return None;
            }
        };

        let response = self.handle_query(&request).await?;
        match response.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                error!(error = %err, "Failed to encode DNS response");
                let question = response.queries().first().cloned();
                let mut fallback = reply_to(&request, question);
                fallback.set_response_code(ResponseCode::ServFail);
                fallback.to_bytes().ok()
            }
        }
    }

    /// Builds the reply for the first question of `request`.
    #[instrument(skip(self, request), fields(qname, qtype))]
    pub async fn handle_query(&self, request: &Message) -> Option<Message> {
        let Some(question) = request.queries().first() else {
            debug!("Query has no questions");
            return None;
        };

        let name = question.name().to_lowercase();
        let qtype = question.query_type();
        let span = tracing::Span::current();
        span.record("qname", tracing::field::display(&name));
        span.record("qtype", tracing::field::display(qtype));

        // the question is echoed with the client's casing
        let mut response = reply_to(request, Some(question.clone()));

        if let Err(rejection) = validate_domain(&name.to_ascii(), &self.domain) {
            info!(reason = %rejection, "Refusing name outside served domain");
            response.set_response_code(ResponseCode::NXDomain);
            *response.extensions_mut() =
                Some(extended_error(EDE_INFO_OTHER, &rejection.to_string()));
            return Some(response);
        }

        info!("Handling {} query for {}", qtype, name);

        match qtype {
            RecordType::TXT => self.answer_txt(name, &mut response).await,
            RecordType::A => {
                if let Some(ip) = self.answer.ipv4 {
                    response.add_answer(Record::from_rdata(name, STATIC_ANSWER_TTL, RData::A(A(ip))));
                }
            }
            RecordType::AAAA => {
                if let Some(ip) = self.answer.ipv6 {
                    response.add_answer(Record::from_rdata(
                        name,
                        STATIC_ANSWER_TTL,
                        RData::AAAA(AAAA(ip)),
                    ));
                }
            }
            _ => {}
        }

        Some(response)
    }

    /// The leftmost label is the key; TXT replies are bounded to about 255
    /// bytes by the wire format.
    async fn answer_txt(&self, name: Name, response: &mut Message) {
        let key = name
            .iter()
            .next()
            .map(|label| String::from_utf8_lossy(label).into_owned())
            .unwrap_or_default();

        match self.store.get(&key).await {
            Ok(Some(stored)) => {
                debug!(key = %key, ttl = stored.ttl_seconds(), "Cache hit");
                let ttl = u32::try_from(stored.ttl_seconds()).unwrap_or(u32::MAX);
                let txt = TXT::new(vec![stored.value]);
                response.add_answer(Record::from_rdata(name, ttl, RData::TXT(txt)));
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                response.set_response_code(ResponseCode::NXDomain);
            }
            Err(err) => {
                error!(key = %key, error = %err, "System error handling DNS request");
                response.set_response_code(ResponseCode::ServFail);
            }
        }
    }
}

/// Reply skeleton echoing the request id, op code, RD/CD flags and question.
fn reply_to(request: &Message, question: Option<Query>) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .set_response_code(ResponseCode::NoError);

    if let Some(question) = question {
        response.add_query(question);
    }
    response
}

/// OPT pseudo-record carrying one Extended DNS Error option.
fn extended_error(info_code: u16, text: &str) -> Edns {
    let mut payload = Vec::with_capacity(2 + text.len());
    payload.extend_from_slice(&info_code.to_be_bytes());
    payload.extend_from_slice(text.as_bytes());

    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_MAX_PAYLOAD);
    edns.options_mut()
        .insert(EdnsOption::Unknown(EDE_OPTION_CODE, payload));
    edns
}
