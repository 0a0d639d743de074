//! Database schemas

mod member;
mod metadata;

pub use member::{MemberDoc, MEMBER_COLLECTION};
pub use metadata::Metadata;
