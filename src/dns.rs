//! DNS message helpers.
//!
//! Wire encoding and decoding is done by `hickory-proto`; this module only
//! builds the replies the sinkhole sends and derives cache keys from queries.

use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Record, RecordType};

/// Size of the fixed DNS header; anything shorter is not a DNS message.
pub const HEADER_LEN: usize = 12;

/// Identity of a cache entry: the first question of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: DNSClass,
}

impl QueryKey {
    /// Derive the key from a question. The name is kept fully qualified and
    /// lower-cased so `Example.COM.` and `example.com.` share an entry.
    pub fn from_query(query: &Query) -> Self {
        Self {
            name: query.name().to_ascii().to_ascii_lowercase(),
            qtype: query.query_type(),
            qclass: query.query_class(),
        }
    }
}

/// The question the sinkhole acts on. Additional questions are ignored.
pub fn first_question(message: &Message) -> Option<&Query> {
    message.queries().first()
}

/// Strip a single trailing dot and lower-case a domain name for matching.
pub fn normalize(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

/// Response skeleton for `request`: same ID, opcode, RD flag and question.
pub fn reply_to(request: &Message) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(ResponseCode::NoError);
    reply.add_queries(request.queries().iter().cloned());
    reply
}

/// Reply refusing to answer a blocked query.
pub fn refused(request: &Message) -> Message {
    let mut reply = reply_to(request);
    reply.set_response_code(ResponseCode::Refused);
    reply
}

/// Reply carrying previously cached answer records.
pub fn answered(request: &Message, answers: &[Record]) -> Message {
    let mut reply = reply_to(request);
    reply.add_answers(answers.iter().cloned());
    reply
}

/// Reply for a message that carries no question at all.
pub fn format_error(request: &Message) -> Message {
    let mut reply = reply_to(request);
    reply.set_response_code(ResponseCode::FormErr);
    reply
}


#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::testing::{a_record, query};
    use super::*;

    #[test]
    fn normalize_strips_trailing_dot_and_lowercases() {
        assert_eq!(normalize("Ads.Example.COM."), "ads.example.com");
        assert_eq!(normalize("example.com"), "example.com");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn query_key_differs_for_differing_queries() {
        let a = query(1, "a.com.", RecordType::A);
        let b = query(1, "b.com.", RecordType::A);
        let a_aaaa = query(1, "a.com.", RecordType::AAAA);

        let key_a = QueryKey::from_query(first_question(&a).unwrap());
        let key_b = QueryKey::from_query(first_question(&b).unwrap());
        let key_a_aaaa = QueryKey::from_query(first_question(&a_aaaa).unwrap());

        assert_ne!(key_a, key_b);
        assert_ne!(key_a, key_a_aaaa);
        assert_eq!(key_a.name, "a.com.");
    }

    #[test]
    fn query_key_ignores_case() {
        let upper = query(1, "A.COM.", RecordType::A);
        let lower = query(2, "a.com.", RecordType::A);

        assert_eq!(
            QueryKey::from_query(first_question(&upper).unwrap()),
            QueryKey::from_query(first_question(&lower).unwrap())
        );
    }

    #[test]
    fn first_question_ignores_the_rest() {
        let mut message = query(7, "first.com.", RecordType::A);
        message.add_query(Query::query(
            "second.com.".parse().unwrap(),
            RecordType::AAAA,
        ));

        let question = first_question(&message).unwrap();
        assert_eq!(question.name().to_ascii(), "first.com.");
    }

    #[test]
    fn refused_keeps_id_and_question() {
        let request = query(0xBEEF, "ads.example.com.", RecordType::A);
        let reply = refused(&request);

        assert_eq!(reply.id(), 0xBEEF);
        assert_eq!(reply.message_type(), MessageType::Response);
        assert_eq!(reply.response_code(), ResponseCode::Refused);
        assert_eq!(reply.queries(), request.queries());
        assert!(reply.answers().is_empty());
    }

    #[test]
    fn answered_copies_records() {
        let request = query(42, "a.com.", RecordType::A);
        let record = a_record("a.com.", 30, Ipv4Addr::new(192, 0, 2, 1));
        let reply = answered(&request, std::slice::from_ref(&record));

        assert_eq!(reply.id(), 42);
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert_eq!(reply.answers(), &[record]);
    }

    #[test]
    fn format_error_for_empty_message() {
        let mut request = Message::new();
        request.set_id(9);
        let reply = format_error(&request);

        assert_eq!(reply.id(), 9);
        assert_eq!(reply.response_code(), ResponseCode::FormErr);
    }
}
