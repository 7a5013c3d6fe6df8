//! Database schemas for Madang
//!
//! Typed records over the untyped [`DocumentStore`](crate::store::DocumentStore)
//! fields, with the Mongo indexes each collection needs.

pub mod schemas;

pub use schemas::{
    AgentDoc, AgentProfile, CommentDoc, NotificationDoc, NotificationType, PostDoc, Record,
    SubmadangDoc, TargetKind, VoteDirection, VoteDoc,
};
